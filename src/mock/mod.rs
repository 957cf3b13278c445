//! Recording mock collaborators for tests
//!
//! `MockCompiler` and `MockLinker` implement the collaborator traits with
//! deterministic artifacts, record every invocation, and fail on demand
//! for configured identifiers.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::ident::PackageIdent;
use crate::invoke::{CompileFailure, CompiledArtifact, Compiler, LinkFailure, Linker};
use crate::resolver::PackageRecord;
use crate::source::SourceFile;

/// Compiler double: writes a deterministic artifact derived from the
/// compile set and records the invocation.
#[derive(Debug, Default)]
pub struct MockCompiler {
    calls: Mutex<Vec<PackageIdent>>,
    fail_idents: Mutex<HashSet<String>>,
}

impl MockCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make compilation fail for the given identifier.
    pub fn fail_on(&self, ident: &str) {
        self.fail_idents.lock().unwrap().insert(ident.to_string());
    }

    /// Every invocation so far, in order.
    pub fn calls(&self) -> Vec<PackageIdent> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of invocations for one identifier.
    pub fn call_count(&self, ident: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.as_str() == ident)
            .count()
    }
}

impl Compiler for MockCompiler {
    fn compile(
        &self,
        record: &PackageRecord,
        compile_set: &[&SourceFile],
        dep_artifacts: &[PathBuf],
        out_path: &Path,
    ) -> Result<CompiledArtifact, CompileFailure> {
        self.calls.lock().unwrap().push(record.ident.clone());

        if self.fail_idents.lock().unwrap().contains(record.ident.as_str()) {
            return Err(CompileFailure {
                message: format!("mock compile failure for {}", record.ident),
                file: compile_set.first().map(|f| f.name.clone()),
                line: Some(1),
            });
        }

        let mut body = format!("compiled {}\n", record.ident);
        for file in compile_set {
            body.push_str(&format!("{} {}\n", file.name, file.sha256));
        }
        for dep in dep_artifacts {
            body.push_str(&format!("dep {}\n", dep.display()));
        }

        fs::write(out_path, body).map_err(|e| CompileFailure {
            message: format!("mock write failed: {}", e),
            file: None,
            line: None,
        })?;

        Ok(CompiledArtifact {
            path: out_path.to_path_buf(),
        })
    }
}

/// Linker double: concatenates artifact names into the executable and
/// records the invocation.
#[derive(Debug, Default)]
pub struct MockLinker {
    calls: Mutex<Vec<PackageIdent>>,
    fail_idents: Mutex<HashSet<String>>,
}

impl MockLinker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, ident: &str) {
        self.fail_idents.lock().unwrap().insert(ident.to_string());
    }

    pub fn calls(&self) -> Vec<PackageIdent> {
        self.calls.lock().unwrap().clone()
    }
}

impl Linker for MockLinker {
    fn link(
        &self,
        record: &PackageRecord,
        artifact: &Path,
        transitive: &[PathBuf],
        out_path: &Path,
    ) -> Result<PathBuf, LinkFailure> {
        self.calls.lock().unwrap().push(record.ident.clone());

        if self.fail_idents.lock().unwrap().contains(record.ident.as_str()) {
            return Err(LinkFailure {
                message: format!("mock link failure for {}", record.ident),
            });
        }

        let mut body = format!("linked {}\n", record.ident);
        body.push_str(&format!("self {}\n", artifact.display()));
        for dep in transitive {
            body.push_str(&format!("with {}\n", dep.display()));
        }

        fs::write(out_path, body).map_err(|e| LinkFailure {
            message: format!("mock write failed: {}", e),
        })?;

        Ok(out_path.to_path_buf())
    }
}
