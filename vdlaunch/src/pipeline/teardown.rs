//! Teardown coordinator: best-effort reverse unwinding of the commit log.

use super::error::TeardownFailure;
use super::executor::CommitLog;
use super::state::{FeatureRun, FeatureState};
use std::time::Instant;

/// Result of a teardown sweep.
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Features whose teardown succeeded, in teardown order.
    pub torn_down: Vec<String>,
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of teardown actions invoked.
    pub fn attempted(&self) -> usize {
        self.torn_down.len() + self.failures.len()
    }
}

/// Releases resources of committed features in reverse commit order.
pub struct TeardownCoordinator;

impl TeardownCoordinator {
    /// Tear down every feature in `commit_log`, newest first.
    ///
    /// A failing teardown does not stop the sweep; every committed feature
    /// gets exactly one attempt.
    pub async fn teardown(run: &mut FeatureRun, commit_log: &CommitLog) -> TeardownReport {
        let mut report = TeardownReport::default();
        if commit_log.is_empty() {
            return report;
        }

        let sweep_start = Instant::now();
        tracing::debug!(count = commit_log.len(), "Tearing down committed features");

        for entry in commit_log.entries().iter().rev() {
            let index = entry.index;
            if let Err(cause) = run.transition(index, FeatureState::TearingDown) {
                tracing::warn!(feature = %entry.name, error = %cause, "Skipping teardown");
                report.failures.push(TeardownFailure {
                    feature: entry.name.clone(),
                    cause,
                });
                continue;
            }

            let result = run.features[index].teardown().await;
            match result {
                Ok(()) => {
                    if let Err(e) = run.transition(index, FeatureState::TornDown) {
                        tracing::error!(feature = %entry.name, error = %e, "Unexpected feature state");
                    }
                    tracing::debug!(feature = %entry.name, "Feature torn down");
                    report.torn_down.push(entry.name.clone());
                }
                Err(cause) => {
                    if let Err(e) = run.transition(index, FeatureState::FailedTeardown) {
                        tracing::error!(feature = %entry.name, error = %e, "Unexpected feature state");
                    }
                    tracing::warn!(feature = %entry.name, error = %cause, "Feature teardown failed");
                    report.failures.push(TeardownFailure {
                        feature: entry.name.clone(),
                        cause,
                    });
                }
            }
        }

        tracing::info!(
            torn_down = report.torn_down.len(),
            failed = report.failures.len(),
            duration_ms = sweep_start.elapsed().as_millis(),
            "Teardown finished"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::feature::{BoxedFeature, Feature, FeatureCtx};
    use async_trait::async_trait;
    use vdlaunch_shared::errors::{VdError, VdResult};

    struct Held {
        name: &'static str,
        leaks: bool,
    }

    #[async_trait]
    impl Feature for Held {
        fn name(&self) -> &str {
            self.name
        }

        async fn setup(&self, _ctx: &FeatureCtx) -> VdResult<()> {
            Ok(())
        }

        async fn teardown(&self) -> VdResult<()> {
            if self.leaks {
                return Err(VdError::Storage(format!("{} busy", self.name)));
            }
            Ok(())
        }
    }

    fn committed(features: Vec<BoxedFeature>) -> (FeatureRun, CommitLog) {
        let mut run = FeatureRun::new(features);
        let mut log = CommitLog::default();
        for index in 0..run.features.len() {
            run.transition(index, FeatureState::SettingUp).unwrap();
            run.transition(index, FeatureState::SetUp).unwrap();
            let name = run.features[index].name().to_string();
            log.push(index, &name);
        }
        (run, log)
    }

    #[tokio::test]
    async fn test_final_states_recorded() {
        let (mut run, log) = committed(vec![
            Box::new(Held {
                name: "disk",
                leaks: true,
            }),
            Box::new(Held {
                name: "network",
                leaks: false,
            }),
        ]);

        let report = TeardownCoordinator::teardown(&mut run, &log).await;

        assert_eq!(report.torn_down, vec!["network"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(run.state_of("network"), Some(FeatureState::TornDown));
        assert_eq!(run.state_of("disk"), Some(FeatureState::FailedTeardown));
    }

    #[tokio::test]
    async fn test_second_sweep_is_rejected_per_feature() {
        let (mut run, log) = committed(vec![Box::new(Held {
            name: "disk",
            leaks: false,
        })]);

        assert!(TeardownCoordinator::teardown(&mut run, &log).await.is_clean());

        let again = TeardownCoordinator::teardown(&mut run, &log).await;
        assert!(again.torn_down.is_empty());
        assert_eq!(again.failures.len(), 1);
        assert_eq!(run.state_of("disk"), Some(FeatureState::TornDown));
    }
}
