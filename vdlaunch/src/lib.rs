//! vdlaunch: host-side launcher for virtual device instances.
//!
//! Subsystems needed before the hypervisor can start (input connections,
//! display, boot images, log plumbing, ...) are modelled as features in a
//! dependency graph. The [`pipeline`] module resolves and executes that graph
//! and unwinds it on failure; [`Launcher`] wires the concrete features from a
//! [`LaunchConfig`] and a [`FetchManifest`].

pub mod config;
pub mod features;
pub mod launcher;
pub mod layout;
pub mod manifest;
pub mod pipeline;

pub use config::LaunchConfig;
pub use launcher::{LaunchSession, Launcher};
pub use layout::InstanceLayout;
pub use manifest::{FetchManifest, FileSource, TrackedFile};
pub use vdlaunch_shared::errors::{VdError, VdResult};

use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Keeps the non-blocking file writer flushing for the life of the process.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber: stderr plus `<logs>/launcher.log`.
///
/// Honours `RUST_LOG`, defaulting to `info`. Calling it again, or after
/// another subscriber was installed, is a no-op.
pub fn init_logging_for(layout: &InstanceLayout) -> VdResult<()> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    let logs_dir = layout.logs_dir();
    std::fs::create_dir_all(&logs_dir).map_err(|e| {
        VdError::Storage(format!(
            "Failed to create log directory {}: {}",
            logs_dir.display(),
            e
        ))
    })?;

    let appender = tracing_appender::rolling::never(&logs_dir, layout.launcher_log_name());
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false),
        )
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();

    if installed.is_ok() {
        let _ = LOG_GUARD.set(guard);
    }

    Ok(())
}
