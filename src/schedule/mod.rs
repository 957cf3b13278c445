//! Parallel, dependency-ordered build scheduling
//!
//! The scheduler drives a validated graph bottom-up: a node is dispatched
//! to a worker only once every direct dependency has resolved
//! successfully, so a node is never compiled before its transitive
//! dependencies complete. Independent subtrees run concurrently on a
//! bounded worker pool; sibling completion order is unspecified.
//!
//! Failure containment: a failed node resolves every ancestor as blocked
//! without dispatching it, while unrelated subtrees continue. In-flight
//! work is never aborted. Nodes are keyed by identifier, so a package
//! reached via multiple graph paths is scheduled at most once per
//! invocation.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use thiserror::Error;

use crate::cache::{ArtifactCache, CacheError};
use crate::fingerprint::{compile_set, FingerprintInputs};
use crate::graph::PackageGraph;
use crate::ident::PackageIdent;
use crate::invoke::{CompileFailure, Compiler, LinkFailure, Linker};
use crate::platform::PlatformPair;

/// Errors that abort the whole scheduling pass
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // A key mismatch is an internal defect, never user-caused; the pass
    // stops rather than recovering.
    #[error("cache defect: {0}")]
    Cache(#[from] CacheError),

    #[error("worker pool disconnected")]
    Disconnected,
}

/// Per-node failure, localized to the node and its ancestors
#[derive(Debug, Clone)]
pub enum NodeFailure {
    Compile(CompileFailure),
    Link(LinkFailure),
    Fingerprint(String),
}

/// How a node resolved.
#[derive(Debug, Clone)]
pub enum NodeOutcome {
    /// Artifact available, either reused from cache or freshly compiled
    Built {
        fingerprint: String,
        artifact: PathBuf,
        cached: bool,
        executable: Option<PathBuf>,
    },

    /// The node's own compile or link step failed
    Failed { failure: NodeFailure },

    /// Never started: a transitive dependency failed
    Blocked { blocked_by: Vec<PackageIdent> },
}

/// A resolved node with its wall-clock duration.
#[derive(Debug, Clone)]
pub struct NodeResult {
    pub outcome: NodeOutcome,
    pub duration_ms: u64,
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Worker pool size
    pub jobs: usize,

    /// Scratch directory for freshly compiled artifacts
    pub work_dir: PathBuf,

    /// Output directory for linked executables
    pub bin_dir: PathBuf,

    /// Verbose progress output
    pub verbose: bool,
}

/// Drives one build invocation over a validated graph.
pub struct BuildScheduler<'a> {
    graph: &'a PackageGraph,
    platform: PlatformPair,
    cache: &'a ArtifactCache,
    compiler: &'a dyn Compiler,
    linker: &'a dyn Linker,
    config: SchedulerConfig,
}

/// Successful artifact info shared with dependent workers.
#[derive(Debug, Clone)]
struct BuiltNode {
    fingerprint: String,
    artifact: PathBuf,
}

/// What a worker sends back to the dispatch loop.
enum WorkReport {
    Resolved(Box<NodeOutcome>),
    Defect(CacheError),
}

impl<'a> BuildScheduler<'a> {
    pub fn new(
        graph: &'a PackageGraph,
        platform: PlatformPair,
        cache: &'a ArtifactCache,
        compiler: &'a dyn Compiler,
        linker: &'a dyn Linker,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            graph,
            platform,
            cache,
            compiler,
            linker,
            config,
        }
    }

    /// Execute the invocation, resolving every node.
    pub fn execute(&self) -> Result<BTreeMap<PackageIdent, NodeResult>, ScheduleError> {
        fs::create_dir_all(&self.config.work_dir)?;
        fs::create_dir_all(&self.config.bin_dir)?;

        let idents: Vec<&PackageIdent> = self.graph.idents().collect();
        let total = idents.len();
        let mut results: BTreeMap<PackageIdent, NodeResult> = BTreeMap::new();
        if total == 0 {
            return Ok(results);
        }

        // Dependency bookkeeping, one slot per node
        let mut remaining: HashMap<&PackageIdent, usize> = HashMap::new();
        let mut dependents: HashMap<&PackageIdent, Vec<&PackageIdent>> = HashMap::new();
        for ident in &idents {
            remaining.insert(ident, self.graph.dependencies(ident).len());
            dependents.insert(ident, self.graph.dependents(ident));
        }

        let built: Arc<Mutex<HashMap<PackageIdent, BuiltNode>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let jobs = self.config.jobs.max(1);
        let (work_tx, work_rx) = mpsc::channel::<PackageIdent>();
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (done_tx, done_rx) = mpsc::channel::<(PackageIdent, WorkReport, u64)>();

        let mut defect: Option<CacheError> = None;

        thread::scope(|scope| {
            for _ in 0..jobs {
                let work_rx = Arc::clone(&work_rx);
                let done_tx = done_tx.clone();
                let built = Arc::clone(&built);
                scope.spawn(move || loop {
                    let task = {
                        let rx = work_rx.lock().unwrap();
                        rx.recv()
                    };
                    let ident = match task {
                        Ok(ident) => ident,
                        Err(_) => break,
                    };

                    let start = Instant::now();
                    let report = self.run_node(&ident, &built);
                    let duration_ms = start.elapsed().as_millis() as u64;
                    if done_tx.send((ident, report, duration_ms)).is_err() {
                        break;
                    }
                });
            }
            drop(done_tx);

            let mut work_tx = Some(work_tx);
            let mut resolved = 0usize;

            // Seed the pool with the nodes that have no dependencies
            for ident in &idents {
                if remaining[ident] == 0 {
                    if let Some(tx) = &work_tx {
                        let _ = tx.send((*ident).clone());
                    }
                }
            }

            while resolved < total {
                let (ident, report, duration_ms) = match done_rx.recv() {
                    Ok(msg) => msg,
                    Err(_) => break,
                };

                let outcome = match report {
                    WorkReport::Resolved(outcome) => *outcome,
                    WorkReport::Defect(e) => {
                        // Stop dispatching; in-flight workers drain on their own
                        defect = Some(e);
                        work_tx = None;
                        break;
                    }
                };

                if self.config.verbose {
                    match &outcome {
                        NodeOutcome::Built { cached: true, .. } => {
                            eprintln!("  {} (cached)", ident)
                        }
                        NodeOutcome::Built { .. } => eprintln!("  {} compiled", ident),
                        NodeOutcome::Failed { .. } => eprintln!("  {} FAILED", ident),
                        NodeOutcome::Blocked { .. } => {}
                    }
                }

                resolved += 1;
                let mut cascade: Vec<PackageIdent> = vec![ident.clone()];
                results.insert(ident, NodeResult { outcome, duration_ms });

                // Release or block dependents, cascading through blocked nodes
                while let Some(completed) = cascade.pop() {
                    let next: Vec<PackageIdent> = dependents
                        .get(&completed)
                        .map(|d| d.iter().map(|i| (*i).clone()).collect())
                        .unwrap_or_default();

                    for dependent in next {
                        let slot = match remaining.get_mut(&dependent) {
                            Some(slot) => slot,
                            None => continue,
                        };
                        *slot = slot.saturating_sub(1);
                        if *slot != 0 || results.contains_key(&dependent) {
                            continue;
                        }

                        let blocked_by = self.failed_dependencies(&dependent, &results);
                        if blocked_by.is_empty() {
                            if let Some(tx) = &work_tx {
                                let _ = tx.send(dependent);
                            }
                        } else {
                            results.insert(
                                dependent.clone(),
                                NodeResult {
                                    outcome: NodeOutcome::Blocked { blocked_by },
                                    duration_ms: 0,
                                },
                            );
                            resolved += 1;
                            cascade.push(dependent);
                        }
                    }
                }
            }

            drop(work_tx);
        });

        match defect {
            Some(e) => Err(ScheduleError::Cache(e)),
            None if results.len() < total => Err(ScheduleError::Disconnected),
            None => Ok(results),
        }
    }

    /// Failing roots among a node's direct dependencies: failed deps
    /// themselves, plus the roots blocking any blocked dep.
    fn failed_dependencies(
        &self,
        ident: &PackageIdent,
        results: &BTreeMap<PackageIdent, NodeResult>,
    ) -> Vec<PackageIdent> {
        let mut roots: Vec<PackageIdent> = Vec::new();
        for dep in self.graph.dependencies(ident) {
            match results.get(dep).map(|r| &r.outcome) {
                Some(NodeOutcome::Failed { .. }) => {
                    if !roots.contains(dep) {
                        roots.push(dep.clone());
                    }
                }
                Some(NodeOutcome::Blocked { blocked_by }) => {
                    for root in blocked_by {
                        if !roots.contains(root) {
                            roots.push(root.clone());
                        }
                    }
                }
                _ => {}
            }
        }
        roots.sort();
        roots
    }

    /// Resolve one node on a worker: fingerprint, cache lookup, compile on
    /// miss, link for commands.
    fn run_node(
        &self,
        ident: &PackageIdent,
        built: &Mutex<HashMap<PackageIdent, BuiltNode>>,
    ) -> WorkReport {
        let record = match self.graph.record(ident) {
            Some(r) => r,
            None => {
                return WorkReport::Resolved(Box::new(NodeOutcome::Failed {
                    failure: NodeFailure::Fingerprint(format!("no record for {}", ident)),
                }))
            }
        };

        // Direct dependency fingerprints, all resolved before dispatch
        let deps = self.graph.dependencies(ident);
        let (dep_fingerprints, dep_artifacts) = {
            let built = built.lock().unwrap();
            let mut fps = Vec::with_capacity(deps.len());
            let mut artifacts = Vec::with_capacity(deps.len());
            for dep in &deps {
                if let Some(node) = built.get(*dep) {
                    fps.push(node.fingerprint.clone());
                    artifacts.push(node.artifact.clone());
                }
            }
            (fps, artifacts)
        };

        let files = compile_set(record, &self.platform);
        let inputs = FingerprintInputs::new(record, &self.platform, &dep_fingerprints);
        let fingerprint = match inputs.compute() {
            Ok(fp) => fp,
            Err(e) => {
                return WorkReport::Resolved(Box::new(NodeOutcome::Failed {
                    failure: NodeFailure::Fingerprint(e.to_string()),
                }))
            }
        };

        // Cache consultation decides staleness
        let (artifact, cached) = match self.cache.get(ident, &self.platform, &fingerprint) {
            Ok(Some(hit)) => (hit.artifact_path, true),
            Ok(None) => {
                let out_path = self.config.work_dir.join(format!(
                    "{}-{}.obj",
                    record.short_name,
                    &fingerprint[..12]
                ));
                let compiled =
                    match self
                        .compiler
                        .compile(record, &files, &dep_artifacts, &out_path)
                    {
                        Ok(artifact) => artifact,
                        Err(failure) => {
                            return WorkReport::Resolved(Box::new(NodeOutcome::Failed {
                                failure: NodeFailure::Compile(failure),
                            }))
                        }
                    };

                match self.cache.put(
                    ident,
                    &self.platform,
                    &fingerprint,
                    &dep_fingerprints,
                    &compiled.path,
                ) {
                    Ok(stored) => (stored.artifact_path, false),
                    Err(e) => return WorkReport::Defect(e),
                }
            }
            Err(e) => return WorkReport::Defect(e),
        };

        built.lock().unwrap().insert(
            ident.clone(),
            BuiltNode {
                fingerprint: fingerprint.clone(),
                artifact: artifact.clone(),
            },
        );

        // Command packages additionally link an executable
        let executable = if record.is_command {
            let exe_name = record
                .executable_name
                .clone()
                .unwrap_or_else(|| record.short_name.clone());
            let out_path = self.config.bin_dir.join(exe_name);

            let transitive: Vec<PathBuf> = {
                let built = built.lock().unwrap();
                self.graph
                    .transitive_dependencies(ident)
                    .iter()
                    .filter_map(|dep| built.get(dep).map(|n| n.artifact.clone()))
                    .collect()
            };

            match self.linker.link(record, &artifact, &transitive, &out_path) {
                Ok(path) => Some(path),
                Err(failure) => {
                    return WorkReport::Resolved(Box::new(NodeOutcome::Failed {
                        failure: NodeFailure::Link(failure),
                    }))
                }
            }
        } else {
            None
        };

        WorkReport::Resolved(Box::new(NodeOutcome::Built {
            fingerprint,
            artifact,
            cached,
            executable,
        }))
    }
}
