//! Build report (build_report.json)
//!
//! One report per invocation: per-node outcome, fingerprints, durations,
//! and, for every failing node, the set of nodes it blocked. The report is
//! what CLI and query collaborators render; nothing in it is swallowed.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ident::PackageIdent;
use crate::invoke::CompileFailure;
use crate::platform::PlatformPair;
use crate::schedule::{NodeFailure, NodeOutcome, NodeResult};

/// Schema version for build_report.json
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for build_report.json
pub const REPORT_SCHEMA_ID: &str = "packlane/build_report@1";

/// Node or invocation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    Failed,
    Blocked,
}

/// Which collaborator step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Compile,
    Link,
    Fingerprint,
}

/// Per-node entry of the build report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSummary {
    /// Package identifier
    pub ident: PackageIdent,

    /// Node status
    pub status: Status,

    /// Content fingerprint (absent for failed/blocked nodes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Whether the artifact was reused from cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,

    /// Linked executable path, for command packages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    /// Failure classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    /// Collaborator failure payload, surfaced verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    /// Originating file of a compile failure, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_file: Option<String>,

    /// Originating line of a compile failure, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_line: Option<u32>,

    /// Failing nodes that prevented this node from starting
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<PackageIdent>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Build report (build_report.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// Invocation identifier
    pub invocation_id: String,

    /// Target platform
    pub platform: PlatformPair,

    /// When the report was created
    pub created_at: DateTime<Utc>,

    /// Overall status
    pub status: Status,

    /// Per-node outcomes, ordered by identifier
    pub nodes: Vec<NodeSummary>,

    /// Failing nodes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<PackageIdent>,

    /// For each failing node, the nodes it blocked
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocked: BTreeMap<String, Vec<PackageIdent>>,
}

impl BuildReport {
    /// Assemble a report from scheduler results.
    pub fn from_results(
        invocation_id: String,
        platform: PlatformPair,
        results: &BTreeMap<PackageIdent, NodeResult>,
    ) -> Self {
        let mut nodes = Vec::with_capacity(results.len());
        let mut failed: Vec<PackageIdent> = Vec::new();
        let mut blocked: BTreeMap<String, Vec<PackageIdent>> = BTreeMap::new();

        for (ident, result) in results {
            let node = match &result.outcome {
                NodeOutcome::Built {
                    fingerprint,
                    cached,
                    executable,
                    ..
                } => NodeSummary {
                    ident: ident.clone(),
                    status: Status::Success,
                    fingerprint: Some(fingerprint.clone()),
                    cached: Some(*cached),
                    executable: executable.clone(),
                    failure_kind: None,
                    failure: None,
                    failure_file: None,
                    failure_line: None,
                    blocked_by: vec![],
                    duration_ms: result.duration_ms,
                },
                NodeOutcome::Failed { failure } => {
                    failed.push(ident.clone());
                    let (kind, message, file, line) = describe_failure(failure);
                    NodeSummary {
                        ident: ident.clone(),
                        status: Status::Failed,
                        fingerprint: None,
                        cached: None,
                        executable: None,
                        failure_kind: Some(kind),
                        failure: Some(message),
                        failure_file: file,
                        failure_line: line,
                        blocked_by: vec![],
                        duration_ms: result.duration_ms,
                    }
                }
                NodeOutcome::Blocked { blocked_by } => {
                    for root in blocked_by {
                        blocked
                            .entry(root.as_str().to_string())
                            .or_default()
                            .push(ident.clone());
                    }
                    NodeSummary {
                        ident: ident.clone(),
                        status: Status::Blocked,
                        fingerprint: None,
                        cached: None,
                        executable: None,
                        failure_kind: None,
                        failure: None,
                        failure_file: None,
                        failure_line: None,
                        blocked_by: blocked_by.clone(),
                        duration_ms: result.duration_ms,
                    }
                }
            };
            nodes.push(node);
        }

        let status = if failed.is_empty() {
            Status::Success
        } else {
            Status::Failed
        };

        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            schema_id: REPORT_SCHEMA_ID.to_string(),
            invocation_id,
            platform,
            created_at: Utc::now(),
            status,
            nodes,
            failed,
            blocked,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == Status::Success
    }

    /// Number of nodes served from cache.
    pub fn cached_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.cached == Some(true)).count()
    }

    /// Number of nodes freshly compiled.
    pub fn compiled_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.cached == Some(false))
            .count()
    }

    /// Serialize to JSON (pretty printed)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }
}

fn describe_failure(
    failure: &NodeFailure,
) -> (FailureKind, String, Option<String>, Option<u32>) {
    match failure {
        NodeFailure::Compile(CompileFailure {
            message,
            file,
            line,
        }) => (
            FailureKind::Compile,
            message.clone(),
            file.clone(),
            *line,
        ),
        NodeFailure::Link(f) => (FailureKind::Link, f.message.clone(), None, None),
        NodeFailure::Fingerprint(msg) => (FailureKind::Fingerprint, msg.clone(), None, None),
    }
}
