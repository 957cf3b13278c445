//! Workspace configuration
//!
//! Parses and validates the workspace file (`packlane.toml`): the ordered
//! workspace roots, cache location, worker pool size, default platform,
//! and the external compiler/linker tool specs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::invoke::ToolSpec;

/// Default workspace config file name.
pub const CONFIG_FILE: &str = "packlane.toml";

/// Workspace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Schema version for forward compatibility
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Ordered workspace roots consulted during resolution
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Artifact cache root (default: ~/.cache/packlane)
    pub cache_dir: Option<PathBuf>,

    /// Worker pool size (default: available parallelism)
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Default target platform (`os/arch`; default: host platform)
    pub platform: Option<String>,

    /// External compiler invocation
    pub compiler: Option<ToolSpec>,

    /// External linker invocation
    pub linker: Option<ToolSpec>,
}

fn default_schema_version() -> u32 {
    1
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            roots: vec![],
            cache_dir: None,
            jobs: default_jobs(),
            platform: None,
            compiler: None,
            linker: None,
        }
    }
}

/// Errors that can occur when loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("No workspace roots configured")]
    NoRoots,

    #[error("Duplicate workspace root: {0}")]
    DuplicateRoot(PathBuf),
}

impl WorkspaceConfig {
    /// Load from the default location (`./packlane.toml`).
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(Path::new(CONFIG_FILE))
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: WorkspaceConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation: at least one root, no duplicates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roots.is_empty() {
            return Err(ConfigError::NoRoots);
        }
        for (i, root) in self.roots.iter().enumerate() {
            if self.roots[..i].contains(root) {
                return Err(ConfigError::DuplicateRoot(root.clone()));
            }
        }
        Ok(())
    }

    /// Effective cache root.
    pub fn cache_root(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".cache/packlane")
    }
}
