//! Feature: display geometry.

use super::names;
use crate::config::DisplayOptions;
use crate::pipeline::{Feature, FeatureCtx};
use async_trait::async_trait;
use vdlaunch_shared::errors::VdResult;

/// Display parameters handed to the display backend and to input devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub refresh_rate_hz: u32,
}

pub struct DisplayFeature {
    options: DisplayOptions,
}

impl DisplayFeature {
    pub fn new(options: DisplayOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Feature for DisplayFeature {
    fn name(&self) -> &str {
        names::DISPLAY
    }

    fn enabled(&self) -> bool {
        self.options.enabled
    }

    async fn setup(&self, ctx: &FeatureCtx) -> VdResult<()> {
        let geometry = DisplayConfig {
            width: self.options.width,
            height: self.options.height,
            dpi: self.options.dpi,
            refresh_rate_hz: self.options.refresh_rate_hz,
        };

        tracing::debug!(
            width = geometry.width,
            height = geometry.height,
            dpi = geometry.dpi,
            "Configured display"
        );

        ctx.publish(names::DISPLAY, geometry)?;
        Ok(())
    }
}
