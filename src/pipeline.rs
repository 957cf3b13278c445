//! Build pipeline orchestration
//!
//! Drives one invocation end to end:
//! - expand seed patterns and resolve identifiers
//! - build the dependency graph (cycle detection included)
//! - enforce restricted-import visibility on every edge
//! - schedule compilation against the artifact cache
//! - emit build_report.json under the invocation directory
//!
//! Structural errors (resolution, cycles, visibility) abort before any
//! compilation starts; per-node compile/link failures are localized and
//! land in the report instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::cache::{ArtifactCache, CacheEntry};
use crate::config::{ConfigError, WorkspaceConfig};
use crate::graph::{GraphBuilder, GraphError, PackageGraph};
use crate::ident::{IdentError, PackageIdent};
use crate::invoke::{CommandCompiler, CommandLinker, Compiler, Linker};
use crate::platform::{PlatformError, PlatformPair};
use crate::resolver::{PackageRecord, ResolveError, WorkspaceResolver};
use crate::schedule::{BuildScheduler, ScheduleError, SchedulerConfig};
use crate::summary::BuildReport;
use crate::visibility::{self, VisibilityError};

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("configuration error: {0}")]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Ident(#[from] IdentError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Visibility(#[from] VisibilityError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no packages matched the given patterns")]
    NoPackages,
}

impl PipelineError {
    /// Get the stable exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => 1,
            PipelineError::ConfigFile(_) => 1,
            PipelineError::Ident(_) => 10,
            PipelineError::Resolve(_) => 10,
            PipelineError::Graph(GraphError::CycleDetected(_)) => 20,
            PipelineError::Graph(_) => 10,
            PipelineError::Visibility(_) => 21,
            PipelineError::Platform(_) => 1,
            PipelineError::Schedule(_) => 70,
            PipelineError::Io(_) => 1,
            PipelineError::Serialization(_) => 1,
            PipelineError::NoPackages => 10,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Exit code for an invocation where one or more nodes failed to build.
pub const BUILD_FAILED_EXIT_CODE: i32 = 50;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path to the workspace config file
    pub config_path: PathBuf,

    /// Target platform override (default: config, then host)
    pub platform: Option<PlatformPair>,

    /// Worker pool size override
    pub jobs: Option<usize>,

    /// Cache root override
    pub cache_dir: Option<PathBuf>,

    /// Executable output directory override
    pub bin_dir: Option<PathBuf>,

    /// Verbose output
    pub verbose: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(crate::config::CONFIG_FILE),
            platform: None,
            jobs: None,
            cache_dir: None,
            bin_dir: None,
            verbose: false,
        }
    }
}

/// Summary of a structural check (resolution + graph + visibility).
#[derive(Debug, Clone)]
pub struct CheckSummary {
    pub packages: usize,
    pub edges: usize,
    pub commands: usize,
}

/// Pipeline execution context
pub struct Pipeline {
    config: PipelineConfig,
    workspace: Option<WorkspaceConfig>,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            workspace: None,
        }
    }

    /// Load the workspace config (idempotent).
    fn load_workspace(&mut self) -> PipelineResult<&WorkspaceConfig> {
        if self.workspace.is_none() {
            self.workspace = Some(WorkspaceConfig::load(&self.config.config_path)?);
        }
        Ok(self.workspace.as_ref().expect("just loaded"))
    }

    fn resolver(&mut self) -> PipelineResult<WorkspaceResolver> {
        let workspace = self.load_workspace()?;
        Ok(WorkspaceResolver::new(workspace.roots.clone()))
    }

    fn target_platform(&mut self) -> PipelineResult<PlatformPair> {
        if let Some(platform) = &self.config.platform {
            return Ok(platform.clone());
        }
        let workspace = self.load_workspace()?;
        match &workspace.platform {
            Some(s) => Ok(s.parse()?),
            None => Ok(PlatformPair::host()),
        }
    }

    fn cache_root(&mut self) -> PipelineResult<PathBuf> {
        if let Some(dir) = &self.config.cache_dir {
            return Ok(dir.clone());
        }
        Ok(self.load_workspace()?.cache_root())
    }

    /// Resolve a single identifier to its record.
    pub fn resolve(&mut self, ident_str: &str) -> PipelineResult<PackageRecord> {
        let resolver = self.resolver()?;
        let ident = PackageIdent::parse(ident_str)?;
        Ok(crate::resolver::Resolver::resolve(&resolver, &ident)?)
    }

    /// Enumerate the identifiers matching a pattern.
    pub fn list(&mut self, pattern: &str) -> PipelineResult<Vec<PackageIdent>> {
        let resolver = self.resolver()?;
        let pattern = PackageIdent::parse(pattern)?;
        Ok(resolver.expand(&pattern)?)
    }

    /// Expand patterns into a deduplicated seed sequence.
    fn expand_patterns(
        &self,
        resolver: &WorkspaceResolver,
        patterns: &[String],
    ) -> PipelineResult<Vec<PackageIdent>> {
        let mut seeds: Vec<PackageIdent> = Vec::new();
        for raw in patterns {
            let pattern = PackageIdent::parse(raw)?;
            for ident in resolver.expand(&pattern)? {
                if !seeds.contains(&ident) {
                    seeds.push(ident);
                }
            }
        }
        if seeds.is_empty() {
            return Err(PipelineError::NoPackages);
        }
        Ok(seeds)
    }

    /// Build and validate the graph for the given patterns.
    fn validated_graph(&mut self, patterns: &[String]) -> PipelineResult<PackageGraph> {
        let resolver = self.resolver()?;
        let seeds = self.expand_patterns(&resolver, patterns)?;

        if self.config.verbose {
            eprintln!("Resolving {} seed package(s)...", seeds.len());
        }

        let graph = GraphBuilder::new(&resolver).build(&seeds)?;
        visibility::enforce(&graph)?;
        Ok(graph)
    }

    /// Structural validation without scheduling.
    pub fn check(&mut self, patterns: &[String]) -> PipelineResult<CheckSummary> {
        let graph = self.validated_graph(patterns)?;
        Ok(CheckSummary {
            packages: graph.len(),
            edges: graph.edges().len(),
            commands: graph.records().filter(|r| r.is_command).count(),
        })
    }

    /// Execute a build with the configured external compiler and linker.
    pub fn build(&mut self, patterns: &[String]) -> PipelineResult<BuildReport> {
        let workspace = self.load_workspace()?;
        let compiler_spec = workspace
            .compiler
            .clone()
            .ok_or_else(|| PipelineError::Config("no compiler configured".to_string()))?;
        let linker_spec = workspace
            .linker
            .clone()
            .ok_or_else(|| PipelineError::Config("no linker configured".to_string()))?;

        let compiler = CommandCompiler::new(compiler_spec);
        let linker = CommandLinker::new(linker_spec);
        self.build_with(patterns, &compiler, &linker)
    }

    /// Execute a build with explicit collaborator implementations.
    pub fn build_with(
        &mut self,
        patterns: &[String],
        compiler: &dyn Compiler,
        linker: &dyn Linker,
    ) -> PipelineResult<BuildReport> {
        let graph = self.validated_graph(patterns)?;
        let platform = self.target_platform()?;
        let cache_root = self.cache_root()?;
        let cache = ArtifactCache::new(cache_root.clone());

        let invocation_id = generate_invocation_id();
        let invocation_dir = cache_root.join("invocations").join(&invocation_id);
        std::fs::create_dir_all(&invocation_dir)?;

        let jobs = self
            .config
            .jobs
            .unwrap_or_else(|| self.workspace.as_ref().map(|w| w.jobs).unwrap_or(1));

        let scheduler_config = SchedulerConfig {
            jobs,
            work_dir: invocation_dir.join("obj"),
            bin_dir: self
                .config
                .bin_dir
                .clone()
                .unwrap_or_else(|| invocation_dir.join("bin")),
            verbose: self.config.verbose,
        };

        if self.config.verbose {
            eprintln!(
                "Building {} package(s) for {} with {} worker(s)...",
                graph.len(),
                platform,
                jobs
            );
        }

        let scheduler =
            BuildScheduler::new(&graph, platform.clone(), &cache, compiler, linker, scheduler_config);
        let results = scheduler.execute()?;

        let report = BuildReport::from_results(invocation_id, platform, &results);
        report.write_to_file(&invocation_dir.join("build_report.json"))?;

        Ok(report)
    }

    /// Enumerate cache entries for one identifier.
    pub fn cache_entries(&mut self, ident_str: &str) -> PipelineResult<Vec<CacheEntry>> {
        let ident = PackageIdent::parse(ident_str)?;
        let cache = ArtifactCache::new(self.cache_root()?);
        cache
            .entries(&ident)
            .map_err(|e| PipelineError::Schedule(ScheduleError::Cache(e)))
    }
}

/// Generate a new invocation_id using ULID (sortable, filesystem-safe)
pub fn generate_invocation_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}
