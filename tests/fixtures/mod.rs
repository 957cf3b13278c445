//! Test fixtures: temp workspaces with convention-based package layouts
//!
//! A [`Workspace`] owns a temp directory holding one workspace root, a
//! cache directory, and a written `packlane.toml`, so tests can drive the
//! full pipeline against real files.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use packlane::pipeline::PipelineConfig;

pub struct Workspace {
    temp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("ws")).unwrap();
        let workspace = Self { temp };
        workspace.write_config(2);
        workspace
    }

    /// The workspace root packages resolve under.
    pub fn root(&self) -> PathBuf {
        self.temp.path().join("ws")
    }

    /// The cache root used by the written config.
    pub fn cache_dir(&self) -> PathBuf {
        self.temp.path().join("cache")
    }

    /// Path of the written workspace config.
    pub fn config_path(&self) -> PathBuf {
        self.temp.path().join("packlane.toml")
    }

    /// Write `packlane.toml` pointing at this workspace.
    pub fn write_config(&self, jobs: usize) {
        let body = format!(
            "roots = [{:?}]\ncache_dir = {:?}\njobs = {}\nplatform = \"linux/amd64\"\n",
            self.root().display().to_string(),
            self.cache_dir().display().to_string(),
            jobs,
        );
        fs::write(self.config_path(), body).unwrap();
    }

    /// Create a package directory with one `lib.pk` source.
    pub fn add_package(&self, ident: &str, declared: &str, imports: &[&str]) {
        let mut body = format!("package {}\n", declared);
        for import in imports {
            body.push_str(&format!("import \"{}\"\n", import));
        }
        body.push_str("\nbody\n");
        self.add_source(ident, "lib.pk", &body);
    }

    /// Add one source file to a package directory, creating it if needed.
    pub fn add_source(&self, ident: &str, file: &str, contents: &str) {
        let dir = self.root().join(ident);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), contents).unwrap();
    }

    /// Rewrite one source file of an existing package.
    pub fn edit_source(&self, ident: &str, file: &str, contents: &str) {
        let path = self.root().join(ident).join(file);
        assert!(path.exists(), "no such source: {}", path.display());
        fs::write(path, contents).unwrap();
    }

    /// Pipeline config pointing at this workspace.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            config_path: self.config_path(),
            ..Default::default()
        }
    }
}

/// Contents for a command package's entry source.
pub fn main_source(imports: &[&str]) -> String {
    let mut body = "package main\n".to_string();
    for import in imports {
        body.push_str(&format!("import \"{}\"\n", import));
    }
    body.push_str("\nbody\n");
    body
}

/// Seed pattern list helper.
pub fn patterns(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Assert that a path is a regular file.
pub fn assert_file(path: &Path) {
    assert!(path.is_file(), "expected file at {}", path.display());
}
