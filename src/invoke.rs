//! Compiler and linker collaborator interfaces
//!
//! The lane treats compilation and linking as black boxes invocable per
//! package: file set and dependency artifacts in, artifact handle or a
//! structured failure out. `CommandCompiler`/`CommandLinker` shell out to
//! configured external tools; `src/mock` provides recording doubles for
//! tests.

use std::path::{Path, PathBuf};
use std::process::Command;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resolver::PackageRecord;
use crate::source::SourceFile;

/// A compiled-artifact handle. Opaque to the core beyond its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    pub path: PathBuf,
}

/// Structured compile failure surfaced verbatim from the collaborator.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct CompileFailure {
    pub message: String,

    /// Originating file, when the collaborator reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Originating line, when the collaborator reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Structured link failure surfaced verbatim from the collaborator.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct LinkFailure {
    pub message: String,
}

/// Compiler collaborator: one invocation per package.
pub trait Compiler: Send + Sync {
    /// Compile the platform-filtered file set of `record`, with the
    /// resolved artifacts of its direct dependencies, writing the artifact
    /// to `out_path`.
    fn compile(
        &self,
        record: &PackageRecord,
        compile_set: &[&SourceFile],
        dep_artifacts: &[PathBuf],
        out_path: &Path,
    ) -> Result<CompiledArtifact, CompileFailure>;
}

/// Linker collaborator: invoked for command packages only.
pub trait Linker: Send + Sync {
    /// Link a command package's own artifact with its full transitive
    /// artifact set into an executable at `out_path`.
    fn link(
        &self,
        record: &PackageRecord,
        artifact: &Path,
        transitive: &[PathBuf],
        out_path: &Path,
    ) -> Result<PathBuf, LinkFailure>;
}

/// External tool specification (program plus leading arguments).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,
}

/// Compiler that shells out to a configured external tool.
///
/// Invocation shape:
/// `<program> <args..> --out <artifact> [--dep <artifact>].. <files>..`
pub struct CommandCompiler {
    spec: ToolSpec,
}

impl CommandCompiler {
    pub fn new(spec: ToolSpec) -> Self {
        Self { spec }
    }
}

impl Compiler for CommandCompiler {
    fn compile(
        &self,
        record: &PackageRecord,
        compile_set: &[&SourceFile],
        dep_artifacts: &[PathBuf],
        out_path: &Path,
    ) -> Result<CompiledArtifact, CompileFailure> {
        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args);
        cmd.arg("--out").arg(out_path);
        for dep in dep_artifacts {
            cmd.arg("--dep").arg(dep);
        }
        for file in compile_set {
            cmd.arg(record.dir.join(&file.name));
        }

        let output = cmd.output().map_err(|e| CompileFailure {
            message: format!("failed to spawn {}: {}", self.spec.program, e),
            file: None,
            line: None,
        })?;

        if output.status.success() {
            Ok(CompiledArtifact {
                path: out_path.to_path_buf(),
            })
        } else {
            Err(parse_compile_failure(&String::from_utf8_lossy(&output.stderr)))
        }
    }
}

/// Linker that shells out to a configured external tool.
///
/// Invocation shape:
/// `<program> <args..> --out <executable> <artifact> <transitive>..`
pub struct CommandLinker {
    spec: ToolSpec,
}

impl CommandLinker {
    pub fn new(spec: ToolSpec) -> Self {
        Self { spec }
    }
}

impl Linker for CommandLinker {
    fn link(
        &self,
        _record: &PackageRecord,
        artifact: &Path,
        transitive: &[PathBuf],
        out_path: &Path,
    ) -> Result<PathBuf, LinkFailure> {
        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args);
        cmd.arg("--out").arg(out_path);
        cmd.arg(artifact);
        for dep in transitive {
            cmd.arg(dep);
        }

        let output = cmd.output().map_err(|e| LinkFailure {
            message: format!("failed to spawn {}: {}", self.spec.program, e),
        })?;

        if output.status.success() {
            Ok(out_path.to_path_buf())
        } else {
            Err(LinkFailure {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Extract file/line from the first `path:line:col: error: msg` diagnostic,
/// falling back to the whole stderr text.
fn parse_compile_failure(stderr: &str) -> CompileFailure {
    let diag_re = Regex::new(r"^([^:]+):(\d+):(?:\d+:)?\s*(?:error:\s*)?(.+)$").unwrap();

    for line in stderr.lines() {
        if let Some(caps) = diag_re.captures(line) {
            return CompileFailure {
                message: caps[3].to_string(),
                file: Some(caps[1].to_string()),
                line: caps[2].parse().ok(),
            };
        }
    }

    CompileFailure {
        message: stderr.trim().to_string(),
        file: None,
        line: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compile_failure_with_location() {
        let failure = parse_compile_failure("lib.pk:12:3: error: unknown symbol\n");
        assert_eq!(failure.file.as_deref(), Some("lib.pk"));
        assert_eq!(failure.line, Some(12));
        assert_eq!(failure.message, "unknown symbol");
    }

    #[test]
    fn test_parse_compile_failure_without_column() {
        let failure = parse_compile_failure("main.pk:4: bad import\n");
        assert_eq!(failure.file.as_deref(), Some("main.pk"));
        assert_eq!(failure.line, Some(4));
        assert_eq!(failure.message, "bad import");
    }

    #[test]
    fn test_parse_compile_failure_opaque() {
        let failure = parse_compile_failure("linker exploded\n");
        assert!(failure.file.is_none());
        assert_eq!(failure.message, "linker exploded");
    }
}
