//! Feature-graph execution framework.
//!
//! This module provides the orchestration engine that brings a virtual device
//! instance up and takes it down again:
//! - Features declare a name, an enabled flag and their dependencies
//! - The resolver turns the graph into a deterministic execution order
//! - The executor runs setup actions in that order (sequentially or with
//!   bounded parallelism) and stops on the first failure
//! - The teardown coordinator unwinds the commit log in reverse
//!
//! ## Architecture
//!
//! ```text
//! FeatureGraph ──resolve──→ ExecutionPlan ──execute──→ SetupOutcome
//!                                                        │
//!                          ┌─────── failure/cancel ──────┤
//!                          ▼                             ▼ success
//!                 TeardownCoordinator            PipelineSession
//!                                                  └─ shutdown() → TeardownCoordinator
//! ```
//!
//! Features hand results to their dependents through the `ProviderRegistry`,
//! which is populated as setups complete.
//!
//! ## Example
//!
//! ```ignore
//! use vdlaunch::pipeline::{ExecutionMode, FeatureGraph, Pipeline};
//! use tokio_util::sync::CancellationToken;
//!
//! let mut graph = FeatureGraph::new();
//! graph.register(DiskFeature)?;
//! graph.register(NetworkFeature)?;
//!
//! let pipeline = Pipeline::new(graph.resolve()?, ExecutionMode::Sequential);
//! let session = pipeline.run(&CancellationToken::new()).await?;
//! let report = session.shutdown().await;
//! ```

mod error;
mod executor;
mod feature;
mod graph;
mod metrics;
mod mode;
#[allow(clippy::module_inception)]
mod pipeline;
mod registry;
mod resolver;
mod state;
mod teardown;

pub use error::{
    GraphError, LaunchError, RegistryError, SetupFailure, TeardownFailure, describe_launch_failure,
};
pub use executor::{CommitEntry, CommitLog, SetupExecutor, SetupOutcome, SetupStop};
pub use feature::{BoxedFeature, Dependency, DependencyKind, Feature, FeatureCtx};
pub use graph::FeatureGraph;
pub use metrics::{FeatureMetrics, PipelineMetrics};
pub use mode::ExecutionMode;
pub use pipeline::{Pipeline, PipelineSession};
pub use registry::ProviderRegistry;
pub use resolver::ExecutionPlan;
pub use state::{FeatureRun, FeatureState};
pub use teardown::{TeardownCoordinator, TeardownReport};
