//! Launch orchestration for one instance.
//!
//! ```text
//! LaunchConfig + FetchManifest
//!        │ features::build_graph
//!        ▼
//!   FeatureGraph ──resolve──→ Pipeline ──run──→ LaunchSession
//!                                  │
//!                                  └─ failure/cancel: teardown, LaunchError
//! ```

use crate::config::LaunchConfig;
use crate::features::{self, BootImages, ConsoleLog, DisplayConfig, InputConnections, names};
use crate::layout::InstanceLayout;
use crate::manifest::FetchManifest;
use crate::pipeline::{
    CommitLog, ExecutionPlan, FeatureState, GraphError, LaunchError, Pipeline, PipelineMetrics,
    PipelineSession, ProviderRegistry, RegistryError, TeardownReport,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use ulid::Ulid;
use vdlaunch_shared::errors::VdResult;

/// Builds and runs the feature graph for one instance.
pub struct Launcher {
    config: LaunchConfig,
    manifest: Arc<FetchManifest>,
}

impl Launcher {
    /// Create a launcher; the configuration is validated here.
    pub fn new(config: LaunchConfig, manifest: FetchManifest) -> VdResult<Self> {
        config.sanitize()?;
        Ok(Self {
            config,
            manifest: Arc::new(manifest),
        })
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    pub fn layout(&self) -> InstanceLayout {
        InstanceLayout::new(&self.config.home_dir)
    }

    /// Resolve the feature graph without running it.
    pub fn plan(&self) -> Result<ExecutionPlan, GraphError> {
        features::build_graph(&self.config, &self.manifest)?.resolve()
    }

    /// Run one launch attempt.
    ///
    /// Every call builds a fresh graph; nothing from a previous attempt is reused.
    pub async fn launch(&self, cancel: &CancellationToken) -> Result<LaunchSession, LaunchError> {
        let attempt_id = Ulid::new();
        let span = tracing::info_span!(
            "launch",
            instance = %self.config.instance_name,
            attempt = %attempt_id
        );

        async {
            let started_at = Utc::now();
            let graph = features::build_graph(&self.config, &self.manifest)?;
            let pipeline = Pipeline::from_graph(graph, self.config.execution)?;

            tracing::info!(
                order = ?pipeline.plan().order_names(),
                "Launching instance"
            );

            let session = pipeline.run(cancel).await.inspect_err(|e| {
                tracing::error!(error = %e, "Launch failed");
            })?;

            Ok::<_, LaunchError>(LaunchSession {
                attempt_id,
                started_at,
                session,
            })
        }
        .instrument(span)
        .await
    }
}

/// A launched instance: every enabled feature is set up.
pub struct LaunchSession {
    attempt_id: Ulid,
    started_at: DateTime<Utc>,
    session: PipelineSession,
}

impl LaunchSession {
    pub fn attempt_id(&self) -> Ulid {
        self.attempt_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn registry(&self) -> &ProviderRegistry {
        self.session.registry()
    }

    pub fn commit_log(&self) -> &CommitLog {
        self.session.commit_log()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        self.session.metrics()
    }

    pub fn state_of(&self, feature: &str) -> Option<FeatureState> {
        self.session.state_of(feature)
    }

    pub fn layout(&self) -> Result<Arc<InstanceLayout>, RegistryError> {
        self.session.lookup(names::INSTANCE_DIRS)
    }

    pub fn boot_images(&self) -> Result<Arc<BootImages>, RegistryError> {
        self.session.lookup(names::BOOT_IMAGES)
    }

    pub fn console_log(&self) -> Result<Arc<ConsoleLog>, RegistryError> {
        self.session.lookup(names::CONSOLE_LOG)
    }

    pub fn display(&self) -> Result<Arc<DisplayConfig>, RegistryError> {
        self.session.lookup(names::DISPLAY)
    }

    pub fn input_connections(&self) -> Result<Arc<InputConnections>, RegistryError> {
        self.session.lookup(names::INPUT_CONNECTIONS)
    }

    /// Tear the instance down in reverse setup order.
    pub async fn shutdown(self) -> TeardownReport {
        let span = tracing::info_span!("shutdown", attempt = %self.attempt_id);
        let report = self.session.shutdown().instrument(span).await;

        for failure in &report.failures {
            tracing::warn!(error = %failure, "Resource may have leaked");
        }
        report
    }
}
