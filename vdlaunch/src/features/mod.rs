//! Concrete instance features and the factory that wires them into a graph.
//!
//! ## Feature Graph
//!
//! ```text
//! instance_dirs ──┬──→ console_log
//!                 └──→ input_connections ←┄┄ display (optional)
//! boot_images          (independent)
//! ```
//!
//! Each feature publishes one capability named after itself.

mod boot_images;
mod console_log;
mod display;
mod input_connections;
mod instance_dirs;

pub use boot_images::{BootImages, BootImagesFeature};
pub use console_log::{ConsoleLog, ConsoleLogFeature};
pub use display::{DisplayConfig, DisplayFeature};
pub use input_connections::{InputConnections, InputConnectionsFeature, InputEndpoint};
pub use instance_dirs::InstanceDirsFeature;

use crate::config::LaunchConfig;
use crate::layout::InstanceLayout;
use crate::manifest::FetchManifest;
use crate::pipeline::{FeatureGraph, GraphError};
use std::sync::Arc;

/// Feature names. Each feature publishes its payload under the same name.
pub mod names {
    pub const INSTANCE_DIRS: &str = "instance_dirs";
    pub const DISPLAY: &str = "display";
    pub const CONSOLE_LOG: &str = "console_log";
    pub const BOOT_IMAGES: &str = "boot_images";
    pub const INPUT_CONNECTIONS: &str = "input_connections";
}

/// Assemble the feature graph for one launch attempt.
///
/// Registration order is fixed so the resolved order is reproducible.
pub fn build_graph(
    config: &LaunchConfig,
    manifest: &Arc<FetchManifest>,
) -> Result<FeatureGraph, GraphError> {
    let layout = InstanceLayout::new(&config.home_dir);
    let mut graph = FeatureGraph::new();

    graph.register(InstanceDirsFeature::new(layout))?;
    graph.register(DisplayFeature::new(config.display.clone()))?;
    graph.register(ConsoleLogFeature::new(config.console.enabled))?;
    graph.register(BootImagesFeature::new(
        config.boot.clone(),
        Arc::clone(manifest),
    ))?;
    graph.register(InputConnectionsFeature::new(config.input.clone()))?;

    Ok(graph)
}
