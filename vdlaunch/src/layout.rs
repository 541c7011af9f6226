//! Instance directory layout.

use std::path::{Path, PathBuf};
use vdlaunch_shared::errors::{VdError, VdResult};

const RUNTIME_DIR: &str = "runtime";
const LOGS_DIR: &str = "logs";
const SOCKETS_DIR: &str = "sockets";
const CONSOLE_LOG: &str = "console.log";
const LAUNCHER_LOG: &str = "launcher.log";

/// Paths under one instance home.
///
/// ```text
/// <home>/
///   runtime/          per-attempt state, removed on teardown
///     sockets/
///   logs/             kept across attempts
///     console.log
///     launcher.log
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceLayout {
    home_dir: PathBuf,
}

impl InstanceLayout {
    pub fn new(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
        }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.home_dir.join(RUNTIME_DIR)
    }

    pub fn sockets_dir(&self) -> PathBuf {
        self.runtime_dir().join(SOCKETS_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home_dir.join(LOGS_DIR)
    }

    pub fn console_log_path(&self) -> PathBuf {
        self.logs_dir().join(CONSOLE_LOG)
    }

    pub fn launcher_log_name(&self) -> &'static str {
        LAUNCHER_LOG
    }

    /// Create all directories.
    pub fn prepare(&self) -> VdResult<()> {
        for dir in [self.sockets_dir(), self.logs_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                VdError::Storage(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }

    /// Remove per-attempt state; logs are kept.
    pub fn cleanup_runtime(&self) -> VdResult<()> {
        let runtime = self.runtime_dir();
        if runtime.exists() {
            std::fs::remove_dir_all(&runtime).map_err(|e| {
                VdError::Storage(format!("Failed to remove {}: {}", runtime.display(), e))
            })?;
        }
        Ok(())
    }
}
