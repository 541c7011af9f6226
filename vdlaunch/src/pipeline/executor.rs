//! Setup executor: runs the execution plan and records the commit log.

use super::error::SetupFailure;
use super::feature::{BoxedFeature, Feature, FeatureCtx};
use super::metrics::{FeatureMetrics, PipelineMetrics};
use super::mode::ExecutionMode;
use super::registry::ProviderRegistry;
use super::resolver::ExecutionPlan;
use super::state::{FeatureRun, FeatureState, StateTable};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use vdlaunch_shared::errors::VdResult;

/// A feature whose setup completed successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    pub(crate) index: usize,
    pub name: String,
}

/// Ordered record of successful setups in the current attempt.
#[derive(Debug, Clone, Default)]
pub struct CommitLog {
    entries: Vec<CommitEntry>,
}

impl CommitLog {
    pub(crate) fn push(&mut self, index: usize, name: &str) {
        self.entries.push(CommitEntry {
            index,
            name: name.to_string(),
        });
    }

    pub fn entries(&self) -> &[CommitEntry] {
        &self.entries
    }

    /// Committed feature names in completion order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Why the executor stopped before reaching the end of the plan.
#[derive(Debug)]
pub enum SetupStop {
    Failed {
        failure: SetupFailure,
        /// Failures of features that were already in flight (parallel mode).
        concurrent: Vec<SetupFailure>,
    },
    Cancelled,
}

/// Everything the executor produced for one attempt.
pub struct SetupOutcome {
    pub run: FeatureRun,
    pub commit_log: CommitLog,
    pub registry: ProviderRegistry,
    pub metrics: PipelineMetrics,
    pub stop: Option<SetupStop>,
}

impl SetupOutcome {
    pub fn is_success(&self) -> bool {
        self.stop.is_none()
    }
}

/// Runs setup actions in resolved order and stops on the first failure.
pub struct SetupExecutor {
    mode: ExecutionMode,
}

impl SetupExecutor {
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    /// Execute `plan`.
    ///
    /// `cancel` is checked before each feature is released and once more
    /// after the last one settles; features already running are allowed to
    /// finish and are committed if they succeed.
    pub async fn execute(
        &self,
        plan: ExecutionPlan,
        registry: ProviderRegistry,
        cancel: &CancellationToken,
    ) -> SetupOutcome {
        let total_start = Instant::now();
        let ExecutionPlan {
            features,
            order,
            deps,
        } = plan;

        let mut run = FeatureRun::new(features);
        let mut progress = Progress::default();

        let stop = match self.mode {
            ExecutionMode::Sequential => {
                execute_sequential(&mut run, &order, &registry, cancel, &mut progress).await
            }
            ExecutionMode::Parallel { .. } => {
                execute_parallel(
                    &mut run,
                    &order,
                    &deps,
                    self.mode.limit(),
                    &registry,
                    cancel,
                    &mut progress,
                )
                .await
            }
        };

        let metrics = PipelineMetrics {
            execution: self.mode,
            total_duration_ms: total_start.elapsed().as_millis(),
            features: progress.metrics,
        };

        match &stop {
            None => tracing::info!(
                committed = progress.commit_log.len(),
                duration_ms = metrics.total_duration_ms,
                "All features set up"
            ),
            Some(SetupStop::Failed { failure, .. }) => tracing::error!(
                feature = %failure.feature,
                committed = progress.commit_log.len(),
                "Feature setup failed, stopping"
            ),
            Some(SetupStop::Cancelled) => tracing::warn!(
                committed = progress.commit_log.len(),
                "Setup cancelled"
            ),
        }

        SetupOutcome {
            run,
            commit_log: progress.commit_log,
            registry,
            metrics,
            stop,
        }
    }
}

#[derive(Default)]
struct Progress {
    commit_log: CommitLog,
    metrics: Vec<FeatureMetrics>,
}

async fn execute_sequential(
    run: &mut FeatureRun,
    order: &[usize],
    registry: &ProviderRegistry,
    cancel: &CancellationToken,
    progress: &mut Progress,
) -> Option<SetupStop> {
    let FeatureRun { features, states } = run;
    let features: &[BoxedFeature] = features;

    for &index in order {
        if cancel.is_cancelled() {
            return Some(SetupStop::Cancelled);
        }

        if let Err(failure) = begin(features, states, index) {
            return Some(SetupStop::Failed {
                failure,
                concurrent: Vec::new(),
            });
        }

        let (result, elapsed) = setup_one(features[index].as_ref(), registry.clone()).await;
        if let Some(failure) = settle(features, states, index, result, elapsed, progress) {
            return Some(SetupStop::Failed {
                failure,
                concurrent: Vec::new(),
            });
        }
    }

    // A signal raised during the last setup still aborts the launch.
    if cancel.is_cancelled() {
        return Some(SetupStop::Cancelled);
    }
    None
}

async fn execute_parallel(
    run: &mut FeatureRun,
    order: &[usize],
    deps: &[Vec<usize>],
    limit: usize,
    registry: &ProviderRegistry,
    cancel: &CancellationToken,
    progress: &mut Progress,
) -> Option<SetupStop> {
    let FeatureRun { features, states } = run;
    let features: &[BoxedFeature] = features;

    let mut position = vec![usize::MAX; features.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); features.len()];
    let mut pending: Vec<usize> = deps.iter().map(Vec::len).collect();
    for (pos, &node) in order.iter().enumerate() {
        position[node] = pos;
        for &dep in &deps[node] {
            dependents[dep].push(node);
        }
    }

    // Ready set keyed by position in the resolved order, so releases follow it.
    let mut ready: BTreeSet<usize> = order
        .iter()
        .enumerate()
        .filter(|&(_, &node)| pending[node] == 0)
        .map(|(pos, _)| pos)
        .collect();

    let mut in_flight = FuturesUnordered::new();
    let mut first_failure: Option<SetupFailure> = None;
    let mut concurrent = Vec::new();
    let mut cancelled = false;

    loop {
        while first_failure.is_none() && !cancelled && in_flight.len() < limit {
            let Some(pos) = ready.pop_first() else {
                break;
            };
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let index = order[pos];
            if let Err(failure) = begin(features, states, index) {
                first_failure = Some(failure);
                break;
            }

            let feature = features[index].as_ref();
            let registry = registry.clone();
            in_flight.push(async move {
                let (result, elapsed) = setup_one(feature, registry).await;
                (index, result, elapsed)
            });
        }

        let Some((index, result, elapsed)) = in_flight.next().await else {
            break;
        };

        match settle(features, states, index, result, elapsed, progress) {
            None => {
                for &dependent in &dependents[index] {
                    pending[dependent] -= 1;
                    if pending[dependent] == 0 {
                        ready.insert(position[dependent]);
                    }
                }
            }
            Some(failure) if first_failure.is_none() => first_failure = Some(failure),
            Some(failure) => concurrent.push(failure),
        }
    }

    match first_failure {
        Some(failure) => Some(SetupStop::Failed {
            failure,
            concurrent,
        }),
        None if cancelled || cancel.is_cancelled() => Some(SetupStop::Cancelled),
        None => None,
    }
}

fn begin(
    features: &[BoxedFeature],
    states: &mut StateTable,
    index: usize,
) -> Result<(), SetupFailure> {
    let name = features[index].name();
    states
        .transition(index, FeatureState::SettingUp, name)
        .map_err(|cause| SetupFailure {
            feature: name.to_string(),
            cause,
        })
}

async fn setup_one(feature: &dyn Feature, registry: ProviderRegistry) -> (VdResult<()>, Duration) {
    let name = feature.name();
    tracing::debug!(feature = %name, "Setting up feature");

    let ctx = FeatureCtx::new(name, registry);
    let started = Instant::now();
    let result = feature.setup(&ctx).await;
    (result, started.elapsed())
}

/// Record the result of one setup; returns the failure if it did not succeed.
fn settle(
    features: &[BoxedFeature],
    states: &mut StateTable,
    index: usize,
    result: VdResult<()>,
    elapsed: Duration,
    progress: &mut Progress,
) -> Option<SetupFailure> {
    let name = features[index].name();

    let outcome = result.and_then(|()| states.transition(index, FeatureState::SetUp, name));
    match outcome {
        Ok(()) => {
            tracing::info!(
                feature = %name,
                duration_ms = elapsed.as_millis(),
                "Feature set up"
            );
            progress.commit_log.push(index, name);
            progress.metrics.push(FeatureMetrics {
                name: name.to_string(),
                duration_ms: elapsed.as_millis(),
            });
            None
        }
        Err(cause) => {
            if let Err(e) = states.transition(index, FeatureState::FailedSetup, name) {
                tracing::error!(feature = %name, error = %e, "Unexpected feature state");
            }
            tracing::error!(feature = %name, error = %cause, "Feature setup failed");
            Some(SetupFailure {
                feature: name.to_string(),
                cause,
            })
        }
    }
}
