//! Feature: instance directory layout.

use super::names;
use crate::layout::InstanceLayout;
use crate::pipeline::{Feature, FeatureCtx};
use async_trait::async_trait;
use vdlaunch_shared::errors::VdResult;

/// Creates the instance directories; publishes the [`InstanceLayout`].
///
/// Teardown removes per-attempt runtime state and keeps logs.
pub struct InstanceDirsFeature {
    layout: InstanceLayout,
}

impl InstanceDirsFeature {
    pub fn new(layout: InstanceLayout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl Feature for InstanceDirsFeature {
    fn name(&self) -> &str {
        names::INSTANCE_DIRS
    }

    async fn setup(&self, ctx: &FeatureCtx) -> VdResult<()> {
        self.layout.prepare()?;
        tracing::debug!(home = %self.layout.home_dir().display(), "Prepared instance layout");

        ctx.publish(names::INSTANCE_DIRS, self.layout.clone())?;
        Ok(())
    }

    async fn teardown(&self) -> VdResult<()> {
        self.layout.cleanup_runtime()
    }
}
