//! Packlane - workspace package resolver and incremental build lane
//!
//! This crate resolves symbolic package identifiers in a workspace, builds
//! a dependency graph over them, enforces restricted-import visibility,
//! and drives incremental, cached, parallel compilation through external
//! compiler and linker collaborators.

// The capability registry lives in its own crate so optional format
// units can link against it without pulling in the lane.
pub use packlane_registry as registry;

pub mod cache;
pub mod config;
pub mod fingerprint;
pub mod graph;
pub mod ident;
pub mod invoke;
pub mod mock;
pub mod pipeline;
pub mod platform;
pub mod resolver;
pub mod schedule;
pub mod source;
pub mod summary;
pub mod visibility;

pub use cache::{ArtifactCache, CacheEntry, CacheError};
pub use graph::{DependencyEdge, GraphBuilder, GraphError, PackageGraph};
pub use ident::{IdentError, PackageIdent};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError};
pub use platform::PlatformPair;
pub use resolver::{PackageRecord, ResolveError, Resolver, WorkspaceResolver};
pub use schedule::{BuildScheduler, NodeOutcome, SchedulerConfig};
pub use summary::{BuildReport, NodeSummary, Status};
