//! Target platform identity and conditional file membership
//!
//! A build target is a package bound to a `PlatformPair` (os/arch). File
//! membership is decided before fingerprinting: a file excluded for the
//! target platform participates in neither the fingerprint nor the
//! compile set.
//!
//! Two conditional mechanisms are honored, mirroring the source-layout
//! convention:
//! - file-name tags: `foo_linux.pk`, `foo_arm64.pk`, `foo_linux_arm64.pk`
//! - explicit inclusion directives surfaced by the source reader, each
//!   naming an os or an os/arch pair (`linux`, `darwin/arm64`)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operating systems recognized in file-name tags.
pub const KNOWN_OS: &[&str] = &["linux", "darwin", "windows"];

/// Architectures recognized in file-name tags.
pub const KNOWN_ARCH: &[&str] = &["amd64", "arm64"];

/// Errors for platform parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("invalid platform pair: {0:?} (expected os/arch, e.g. linux/amd64)")]
    Invalid(String),

    #[error("unknown os: {0:?}")]
    UnknownOs(String),

    #[error("unknown arch: {0:?}")]
    UnknownArch(String),
}

/// A target platform: operating system plus architecture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformPair {
    pub os: String,
    pub arch: String,
}

impl PlatformPair {
    /// Construct a platform pair, validating against the known sets.
    pub fn new(os: &str, arch: &str) -> Result<Self, PlatformError> {
        if !KNOWN_OS.contains(&os) {
            return Err(PlatformError::UnknownOs(os.to_string()));
        }
        if !KNOWN_ARCH.contains(&arch) {
            return Err(PlatformError::UnknownArch(arch.to_string()));
        }
        Ok(Self {
            os: os.to_string(),
            arch: arch.to_string(),
        })
    }

    /// The platform pair of the host process, normalized to the tag names.
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            "windows" => "windows",
            _ => "linux",
        };
        let arch = match std::env::consts::ARCH {
            "aarch64" => "arm64",
            _ => "amd64",
        };
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }

    /// Filesystem-safe cache key component (`linux-amd64`).
    pub fn cache_key(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }

    /// Whether a constraint string (`linux` or `linux/amd64`) matches.
    pub fn matches_constraint(&self, constraint: &str) -> bool {
        match constraint.split_once('/') {
            Some((os, arch)) => os == self.os && arch == self.arch,
            None => constraint == self.os,
        }
    }
}

impl fmt::Display for PlatformPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

impl FromStr for PlatformPair {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (os, arch) = s
            .split_once('/')
            .ok_or_else(|| PlatformError::Invalid(s.to_string()))?;
        Self::new(os, arch)
    }
}

/// Decide whether a file belongs to the compile set for `platform`.
///
/// Directives win over file-name tags: a file carrying explicit inclusion
/// directives is included iff any directive matches, regardless of its
/// name. Otherwise the `_os`, `_arch`, and `_os_arch` name suffixes are
/// consulted; an untagged file is included everywhere.
pub fn file_included(file_name: &str, directives: &[String], platform: &PlatformPair) -> bool {
    if !directives.is_empty() {
        return directives.iter().any(|d| platform.matches_constraint(d));
    }

    let stem = match file_name.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => file_name,
    };

    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 2 {
        return true;
    }

    let last = parts[parts.len() - 1];
    let prev = parts[parts.len() - 2];

    // `_os_arch` suffix
    if parts.len() >= 3 && KNOWN_OS.contains(&prev) && KNOWN_ARCH.contains(&last) {
        return prev == platform.os && last == platform.arch;
    }
    // `_os` suffix
    if KNOWN_OS.contains(&last) {
        return last == platform.os;
    }
    // `_arch` suffix
    if KNOWN_ARCH.contains(&last) {
        return last == platform.arch;
    }

    true
}
