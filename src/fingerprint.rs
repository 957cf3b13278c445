//! Content fingerprint computation
//!
//! A build target's fingerprint is the SHA-256 hex digest of the RFC 8785
//! canonical JSON of its fingerprint inputs: the platform-filtered source
//! digests plus the fingerprints of its direct dependency artifacts. The
//! rollup is Merkle-style: changing any transitive dependency changes
//! every ancestor's fingerprint.

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::platform::{file_included, PlatformPair};
use crate::resolver::PackageRecord;
use crate::source::SourceFile;

/// Errors for fingerprint computation
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("canonicalization error: {0}")]
    Jcs(String),
}

/// One source file's contribution to the fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct SourceDigest {
    pub name: String,
    pub sha256: String,
}

/// The canonical, output-affecting inputs hashed into a fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct FingerprintInputs {
    /// Digests of the files in the compile set, in listing order
    pub sources: Vec<SourceDigest>,

    /// Fingerprints of the direct dependency artifacts, sorted
    pub dep_fingerprints: Vec<String>,
}

impl FingerprintInputs {
    /// Assemble inputs for a record on a platform, with the already-computed
    /// direct dependency fingerprints.
    ///
    /// Files excluded for the platform do not participate.
    pub fn new(
        record: &PackageRecord,
        platform: &PlatformPair,
        dep_fingerprints: &[String],
    ) -> Self {
        let sources = compile_set(record, platform)
            .into_iter()
            .map(|f| SourceDigest {
                name: f.name.clone(),
                sha256: f.sha256.clone(),
            })
            .collect();

        let mut dep_fingerprints: Vec<String> = dep_fingerprints.to_vec();
        dep_fingerprints.sort();

        Self {
            sources,
            dep_fingerprints,
        }
    }

    /// SHA-256 hex digest of the canonical JSON of these inputs.
    pub fn compute(&self) -> Result<String, FingerprintError> {
        let jcs_bytes = serde_json_canonicalizer::to_vec(self)
            .map_err(|e| FingerprintError::Jcs(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&jcs_bytes);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// The platform-filtered compile set of a record.
pub fn compile_set<'a>(record: &'a PackageRecord, platform: &PlatformPair) -> Vec<&'a SourceFile> {
    record
        .files
        .iter()
        .filter(|f| file_included(&f.name, &f.build_constraints, platform))
        .collect()
}
