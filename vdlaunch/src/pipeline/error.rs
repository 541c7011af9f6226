//! Error taxonomy of the orchestration engine.

use thiserror::Error;
use vdlaunch_shared::errors::VdError;

/// The feature graph cannot be executed. Raised before any setup runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("feature '{0}' is registered more than once")]
    DuplicateFeature(String),

    #[error("feature '{feature}' depends on unknown feature '{dependency}'")]
    UnknownDependency { feature: String, dependency: String },

    #[error("feature '{feature}' requires feature '{dependency}', which is disabled")]
    UnsatisfiedDependency { feature: String, dependency: String },

    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },
}

/// Provider registry contract violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("capability '{capability}' already published by '{producer}'")]
    DuplicateCapability { capability: String, producer: String },

    #[error("capability '{0}' not found")]
    CapabilityNotFound(String),

    #[error("capability '{capability}' holds {actual}, not {expected}")]
    CapabilityTypeMismatch {
        capability: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl From<RegistryError> for VdError {
    fn from(err: RegistryError) -> Self {
        VdError::Capability(err.to_string())
    }
}

/// A feature's setup action failed.
#[derive(Debug, Error)]
#[error("feature '{feature}' failed to set up: {cause}")]
pub struct SetupFailure {
    pub feature: String,
    #[source]
    pub cause: VdError,
}

/// A feature's teardown action failed. Collected, never fatal to the sweep.
#[derive(Debug, Error)]
#[error("feature '{feature}' failed to tear down: {cause}")]
pub struct TeardownFailure {
    pub feature: String,
    #[source]
    pub cause: VdError,
}

/// Why a launch attempt did not produce a running session.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("invalid feature graph: {0}")]
    Graph(#[from] GraphError),

    #[error("{}", describe_launch_failure(Some(.failure), .concurrent, .teardown_failures))]
    Setup {
        #[source]
        failure: SetupFailure,
        /// Features that failed while already in flight after `failure`.
        concurrent: Vec<SetupFailure>,
        teardown_failures: Vec<TeardownFailure>,
    },

    #[error("{}", describe_launch_failure(None, &[], .teardown_failures))]
    Cancelled { teardown_failures: Vec<TeardownFailure> },
}

impl LaunchError {
    /// Name of the feature whose setup caused the failure, if any.
    pub fn failed_feature(&self) -> Option<&str> {
        match self {
            LaunchError::Setup { failure, .. } => Some(&failure.feature),
            _ => None,
        }
    }

    pub fn teardown_failures(&self) -> &[TeardownFailure] {
        match self {
            LaunchError::Setup {
                teardown_failures, ..
            }
            | LaunchError::Cancelled { teardown_failures } => teardown_failures,
            LaunchError::Graph(_) => &[],
        }
    }
}

/// Render the primary cause followed by secondary diagnostics.
pub fn describe_launch_failure(
    failure: Option<&SetupFailure>,
    concurrent: &[SetupFailure],
    teardown_failures: &[TeardownFailure],
) -> String {
    let mut message = match failure {
        Some(failure) => failure.to_string(),
        None => "launch cancelled before all features were set up".to_string(),
    };

    if !concurrent.is_empty() {
        let names: Vec<String> = concurrent.iter().map(|f| f.to_string()).collect();
        message.push_str(&format!("; also failed: {}", names.join("; ")));
    }

    if !teardown_failures.is_empty() {
        let names: Vec<String> = teardown_failures.iter().map(|f| f.to_string()).collect();
        message.push_str(&format!("; teardown: {}", names.join("; ")));
    }

    message
}
