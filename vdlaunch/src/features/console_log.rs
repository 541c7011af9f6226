//! Feature: guest console log file.

use super::names;
use crate::layout::InstanceLayout;
use crate::pipeline::{Dependency, Feature, FeatureCtx};
use async_trait::async_trait;
use std::path::PathBuf;
use vdlaunch_shared::errors::{VdError, VdResult};

/// Location the hypervisor writes the guest console to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLog {
    pub path: PathBuf,
}

/// Truncates (or creates) the console log in the instance log directory.
pub struct ConsoleLogFeature {
    enabled: bool,
}

impl ConsoleLogFeature {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl Feature for ConsoleLogFeature {
    fn name(&self) -> &str {
        names::CONSOLE_LOG
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::required(names::INSTANCE_DIRS)]
    }

    async fn setup(&self, ctx: &FeatureCtx) -> VdResult<()> {
        let layout = ctx.lookup::<InstanceLayout>(names::INSTANCE_DIRS)?;
        let path = layout.console_log_path();

        tokio::fs::File::create(&path).await.map_err(|e| {
            VdError::Storage(format!(
                "Failed to create console log {}: {}",
                path.display(),
                e
            ))
        })?;

        ctx.publish(names::CONSOLE_LOG, ConsoleLog { path })?;
        Ok(())
    }
}
