//! Persistent artifact cache
//!
//! Entries are addressable by (identifier, platform pair, fingerprint) and
//! survive process restarts. Layout under the cache root:
//!
//! ```text
//! entries/<platform-key>/<ident-digest>/<fingerprint>/entry.json
//! entries/<platform-key>/<ident-digest>/<fingerprint>/artifact.bin
//! ```
//!
//! The identifier digest keeps directory names filesystem-safe; the human
//! identifier lives inside `entry.json`. Reads may proceed concurrently;
//! writes for distinct keys are independent, and a same-key put is an
//! idempotent no-op. An entry whose recorded key does not match the path
//! it was loaded from is a defect, surfaced as `KeyMismatch` and never
//! served.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::ident::PackageIdent;
use crate::platform::PlatformPair;

/// Schema version for entry.json
pub const ENTRY_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for entry.json
pub const ENTRY_SCHEMA_ID: &str = "packlane/cache_entry@1";

/// File name of the stored artifact within an entry directory.
pub const ARTIFACT_FILE: &str = "artifact.bin";

/// Errors for cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cache key mismatch for {ident} ({platform}): entry records fingerprint {found}, expected {expected}")]
    KeyMismatch {
        ident: PackageIdent,
        platform: PlatformPair,
        expected: String,
        found: String,
    },
}

/// Cache entry metadata (entry.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// Package identifier this artifact was compiled from
    pub ident: PackageIdent,

    /// Target platform
    pub platform: PlatformPair,

    /// Content fingerprint (cache key component)
    pub fingerprint: String,

    /// Fingerprints of the direct dependency artifacts at compile time,
    /// kept so reuse can be validated without recomputation
    pub dep_fingerprints: Vec<String>,

    /// Artifact file name within the entry directory
    pub artifact_file: String,

    /// When the entry was created
    pub created_at: DateTime<Utc>,
}

/// A served cache hit: the entry plus the on-disk artifact location.
#[derive(Debug, Clone)]
pub struct CachedArtifact {
    pub entry: CacheEntry,
    pub artifact_path: PathBuf,
}

/// Filesystem-backed artifact cache.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    /// Open (or lazily create) a cache rooted at `root`.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(
        &self,
        ident: &PackageIdent,
        platform: &PlatformPair,
        fingerprint: &str,
    ) -> PathBuf {
        self.root
            .join("entries")
            .join(platform.cache_key())
            .join(ident_digest(ident))
            .join(fingerprint)
    }

    /// Look up an entry; `Ok(None)` is a miss.
    pub fn get(
        &self,
        ident: &PackageIdent,
        platform: &PlatformPair,
        fingerprint: &str,
    ) -> Result<Option<CachedArtifact>, CacheError> {
        let dir = self.entry_dir(ident, platform, fingerprint);
        let entry_path = dir.join("entry.json");
        if !entry_path.is_file() {
            return Ok(None);
        }

        let entry: CacheEntry = serde_json::from_str(&fs::read_to_string(&entry_path)?)?;

        // The key must match exactly; anything else is a defect, not a miss.
        if entry.ident != *ident || entry.platform != *platform || entry.fingerprint != fingerprint
        {
            return Err(CacheError::KeyMismatch {
                ident: ident.clone(),
                platform: platform.clone(),
                expected: fingerprint.to_string(),
                found: entry.fingerprint,
            });
        }

        let artifact_path = dir.join(&entry.artifact_file);
        if !artifact_path.is_file() {
            return Ok(None);
        }

        Ok(Some(CachedArtifact {
            entry,
            artifact_path,
        }))
    }

    /// Store a compiled artifact under (ident, platform, fingerprint).
    ///
    /// A put for an already-present key is a no-op returning the existing
    /// entry.
    pub fn put(
        &self,
        ident: &PackageIdent,
        platform: &PlatformPair,
        fingerprint: &str,
        dep_fingerprints: &[String],
        artifact: &Path,
    ) -> Result<CachedArtifact, CacheError> {
        if let Some(existing) = self.get(ident, platform, fingerprint)? {
            return Ok(existing);
        }

        let dir = self.entry_dir(ident, platform, fingerprint);
        fs::create_dir_all(&dir)?;

        let artifact_path = dir.join(ARTIFACT_FILE);
        fs::copy(artifact, &artifact_path)?;

        let entry = CacheEntry {
            schema_version: ENTRY_SCHEMA_VERSION,
            schema_id: ENTRY_SCHEMA_ID.to_string(),
            ident: ident.clone(),
            platform: platform.clone(),
            fingerprint: fingerprint.to_string(),
            dep_fingerprints: dep_fingerprints.to_vec(),
            artifact_file: ARTIFACT_FILE.to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string_pretty(&entry)?;
        fs::write(dir.join("entry.json"), json)?;

        Ok(CachedArtifact {
            entry,
            artifact_path,
        })
    }

    /// Enumerate every stored entry for an identifier, across platforms.
    ///
    /// Used by inspection collaborators; retention policy stays out of the
    /// core.
    pub fn entries(&self, ident: &PackageIdent) -> Result<Vec<CacheEntry>, CacheError> {
        let entries_root = self.root.join("entries");
        let mut found = Vec::new();
        if !entries_root.is_dir() {
            return Ok(found);
        }

        let digest = ident_digest(ident);
        for platform_dir in fs::read_dir(&entries_root)?.flatten() {
            let ident_dir = platform_dir.path().join(&digest);
            if !ident_dir.is_dir() {
                continue;
            }
            for fp_dir in fs::read_dir(&ident_dir)?.flatten() {
                let entry_path = fp_dir.path().join("entry.json");
                if !entry_path.is_file() {
                    continue;
                }
                let entry: CacheEntry = serde_json::from_str(&fs::read_to_string(&entry_path)?)?;
                found.push(entry);
            }
        }

        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }
}

/// Filesystem-safe directory name for an identifier.
fn ident_digest(ident: &PackageIdent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ident.as_str().as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}
