//! Orchestration entry point: execute a resolved graph, unwind on failure.

use super::error::{GraphError, LaunchError, RegistryError};
use super::executor::{CommitLog, SetupExecutor, SetupOutcome, SetupStop};
use super::graph::FeatureGraph;
use super::metrics::PipelineMetrics;
use super::mode::ExecutionMode;
use super::registry::ProviderRegistry;
use super::resolver::ExecutionPlan;
use super::state::{FeatureRun, FeatureState};
use super::teardown::{TeardownCoordinator, TeardownReport};
use std::any::Any;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A resolved feature graph ready to run once.
pub struct Pipeline {
    plan: ExecutionPlan,
    mode: ExecutionMode,
}

impl Pipeline {
    pub fn new(plan: ExecutionPlan, mode: ExecutionMode) -> Self {
        Self { plan, mode }
    }

    /// Resolve `graph` and wrap the result.
    pub fn from_graph(graph: FeatureGraph, mode: ExecutionMode) -> Result<Self, GraphError> {
        Ok(Self::new(graph.resolve()?, mode))
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Set up every feature.
    ///
    /// On failure or cancellation the commit log is torn down before the
    /// error is returned, so no acquired resource outlives the attempt.
    pub async fn run(self, cancel: &CancellationToken) -> Result<PipelineSession, LaunchError> {
        tracing::debug!(
            features = self.plan.len(),
            skipped = ?self.plan.skipped(),
            mode = ?self.mode,
            "Running feature pipeline"
        );

        let outcome = SetupExecutor::new(self.mode)
            .execute(self.plan, ProviderRegistry::new(), cancel)
            .await;

        let SetupOutcome {
            mut run,
            commit_log,
            registry,
            metrics,
            stop,
        } = outcome;

        let Some(stop) = stop else {
            return Ok(PipelineSession {
                run,
                commit_log,
                registry,
                metrics,
                active: true,
            });
        };

        let report = TeardownCoordinator::teardown(&mut run, &commit_log).await;
        Err(match stop {
            SetupStop::Failed {
                failure,
                concurrent,
            } => LaunchError::Setup {
                failure,
                concurrent,
                teardown_failures: report.failures,
            },
            SetupStop::Cancelled => LaunchError::Cancelled {
                teardown_failures: report.failures,
            },
        })
    }
}

/// All features set up; holds their resources until [`PipelineSession::shutdown`].
pub struct PipelineSession {
    run: FeatureRun,
    commit_log: CommitLog,
    registry: ProviderRegistry,
    metrics: PipelineMetrics,
    active: bool,
}

impl PipelineSession {
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn lookup<T>(&self, capability: &str) -> Result<Arc<T>, RegistryError>
    where
        T: Any + Send + Sync,
    {
        self.registry.lookup(capability)
    }

    pub fn commit_log(&self) -> &CommitLog {
        &self.commit_log
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn state_of(&self, feature: &str) -> Option<FeatureState> {
        self.run.state_of(feature)
    }

    /// Tear down every committed feature in reverse order.
    pub async fn shutdown(mut self) -> TeardownReport {
        self.active = false;
        TeardownCoordinator::teardown(&mut self.run, &self.commit_log).await
    }
}

impl Drop for PipelineSession {
    fn drop(&mut self) {
        if !self.active {
            return;
        }

        tracing::warn!(
            features = ?self.commit_log.names(),
            "Session dropped without shutdown, feature resources were not torn down"
        );
    }
}
