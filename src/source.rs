//! Source reader collaborator
//!
//! The core trusts this listing verbatim: file order, declared package
//! names, raw import strings, and platform directives all come from here.
//! `FsSourceReader` is the reference implementation for the on-disk
//! header convention; tests substitute their own readers through the
//! trait.
//!
//! The header convention is a line scan, not language parsing: the reader
//! consumes leading `package`, `import`, and `//pk:build` lines and stops
//! at the first line that is none of these.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Extension of source files belonging to a package directory.
pub const SOURCE_EXTENSION: &str = "pk";

/// Errors for source reading
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{file}: missing package declaration")]
    MissingPackageDecl { file: String },

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// One source file as reported by the reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// File name within the package directory
    pub name: String,

    /// SHA-256 hex digest of the file contents
    pub sha256: String,

    /// Size in bytes
    pub size: u64,

    /// Declared package name from the `package` header line
    pub declared_name: String,

    /// Raw import identifier strings, in declaration order
    pub imports: Vec<String>,

    /// Platform constraints from `//pk:build` directive lines
    pub build_constraints: Vec<String>,
}

/// The ordered source listing for one package directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceListing {
    pub files: Vec<SourceFile>,
}

impl SourceListing {
    /// Declared names present in the listing, deduplicated in file order.
    pub fn declared_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for file in &self.files {
            if !names.contains(&file.declared_name.as_str()) {
                names.push(&file.declared_name);
            }
        }
        names
    }
}

/// Source reader collaborator interface.
pub trait SourceReader {
    /// List the source files of a package directory, in lexical order.
    fn read_dir(&self, dir: &Path) -> Result<SourceListing, SourceError>;

    /// Read an explicit file list, in the given order.
    fn read_files(&self, files: &[PathBuf]) -> Result<SourceListing, SourceError>;
}

/// Filesystem source reader for the `.pk` header convention.
#[derive(Debug, Default)]
pub struct FsSourceReader;

impl FsSourceReader {
    pub fn new() -> Self {
        Self
    }

    fn read_one(&self, path: &Path) -> Result<SourceFile, SourceError> {
        let bytes = fs::read(path).map_err(|e| SourceError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let sha256 = hex::encode(hasher.finalize());

        let text = String::from_utf8_lossy(&bytes);
        let header = scan_header(&text);

        let declared_name = header
            .declared_name
            .ok_or_else(|| SourceError::MissingPackageDecl { file: name.clone() })?;

        Ok(SourceFile {
            name,
            sha256,
            size: bytes.len() as u64,
            declared_name,
            imports: header.imports,
            build_constraints: header.build_constraints,
        })
    }
}

impl SourceReader for FsSourceReader {
    fn read_dir(&self, dir: &Path) -> Result<SourceListing, SourceError> {
        if !dir.is_dir() {
            return Err(SourceError::NotADirectory(dir.to_path_buf()));
        }

        let entries = fs::read_dir(dir).map_err(|e| SourceError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SourceError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let path = entry.path();
            if path.is_file()
                && path.extension().map(|e| e == SOURCE_EXTENSION).unwrap_or(false)
            {
                paths.push(path);
            }
        }
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            files.push(self.read_one(path)?);
        }

        Ok(SourceListing { files })
    }

    fn read_files(&self, file_paths: &[PathBuf]) -> Result<SourceListing, SourceError> {
        let mut files = Vec::with_capacity(file_paths.len());
        for path in file_paths {
            files.push(self.read_one(path)?);
        }
        Ok(SourceListing { files })
    }
}

struct Header {
    declared_name: Option<String>,
    imports: Vec<String>,
    build_constraints: Vec<String>,
}

/// Scan leading header lines of a source file.
fn scan_header(text: &str) -> Header {
    let package_re = Regex::new(r"^package\s+([A-Za-z_][A-Za-z0-9_]*)\s*$").unwrap();
    let import_re = Regex::new(r#"^import\s+"([^"]+)"\s*$"#).unwrap();
    let build_re = Regex::new(r"^//pk:build\s+(.+)$").unwrap();

    let mut header = Header {
        declared_name: None,
        imports: Vec::new(),
        build_constraints: Vec::new(),
    };

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(caps) = build_re.captures(line) {
            for constraint in caps[1].split_whitespace() {
                header.build_constraints.push(constraint.to_string());
            }
            continue;
        }
        if let Some(caps) = package_re.captures(line) {
            if header.declared_name.is_none() {
                header.declared_name = Some(caps[1].to_string());
            }
            continue;
        }
        if let Some(caps) = import_re.captures(line) {
            header.imports.push(caps[1].to_string());
            continue;
        }
        // First non-header line ends the scan
        break;
    }

    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_source(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_read_dir_lexical_order() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "zeta.pk", "package demo\n");
        write_source(temp.path(), "alpha.pk", "package demo\n");
        write_source(temp.path(), "notes.txt", "ignored");

        let listing = FsSourceReader::new().read_dir(temp.path()).unwrap();
        let names: Vec<&str> = listing.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["alpha.pk", "zeta.pk"]);
    }

    #[test]
    fn test_header_scan_full() {
        let temp = TempDir::new().unwrap();
        write_source(
            temp.path(),
            "lib.pk",
            "//pk:build linux darwin/arm64\npackage codec\nimport \"acme/base\"\nimport \"acme/util\"\n\nbody starts here\nimport \"late/ignored\"\n",
        );

        let listing = FsSourceReader::new().read_dir(temp.path()).unwrap();
        let file = &listing.files[0];
        assert_eq!(file.declared_name, "codec");
        assert_eq!(file.imports, vec!["acme/base", "acme/util"]);
        assert_eq!(file.build_constraints, vec!["linux", "darwin/arm64"]);
    }

    #[test]
    fn test_missing_package_decl() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "bad.pk", "just text\n");

        let err = FsSourceReader::new().read_dir(temp.path()).unwrap_err();
        assert!(matches!(err, SourceError::MissingPackageDecl { .. }));
    }

    #[test]
    fn test_digest_changes_with_content() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "a.pk", "package x\nbody v1\n");
        let first = FsSourceReader::new().read_dir(temp.path()).unwrap();

        write_source(temp.path(), "a.pk", "package x\nbody v2\n");
        let second = FsSourceReader::new().read_dir(temp.path()).unwrap();

        assert_ne!(first.files[0].sha256, second.files[0].sha256);
        assert_eq!(first.files[0].declared_name, second.files[0].declared_name);
    }

    #[test]
    fn test_read_files_preserves_order() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "b.pk", "package main\n");
        write_source(temp.path(), "a.pk", "package main\n");

        let listing = FsSourceReader::new()
            .read_files(&[temp.path().join("b.pk"), temp.path().join("a.pk")])
            .unwrap();
        let names: Vec<&str> = listing.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b.pk", "a.pk"]);
    }
}
