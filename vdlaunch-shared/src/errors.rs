//! Error types for vdlaunch.

use thiserror::Error;

/// Result alias used by every fallible vdlaunch operation.
pub type VdResult<T> = Result<T, VdError>;

/// Operational error raised by the launcher and by feature setup/teardown actions.
///
/// Graph validation and launch aggregation errors live next to the
/// orchestration engine; this type is what an individual feature reports.
#[derive(Debug, Error)]
pub enum VdError {
    /// Invalid or inconsistent launch configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem layout or persistence failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Build-artifact manifest misuse (duplicate path, ambiguous lookup).
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Capability registry contract violation.
    #[error("capability error: {0}")]
    Capability(String),

    /// A resource a feature needs could not be found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A state machine was asked to make an illegal transition.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Subsystem-specific setup failure.
    #[error("feature error: {0}")]
    Feature(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing kernel");
        let err: VdError = io.into();
        assert!(matches!(err, VdError::Io(_)));
        assert!(err.to_string().contains("missing kernel"));
    }

    #[test]
    fn test_display_includes_category() {
        let err = VdError::Manifest("path already tracked".into());
        assert_eq!(err.to_string(), "manifest error: path already tracked");
    }
}
