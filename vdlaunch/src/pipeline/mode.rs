//! Execution mode for the setup executor.

use serde::{Deserialize, Serialize};

/// How the executor schedules independent features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One feature at a time, in resolved order.
    #[default]
    Sequential,
    /// Independent features run concurrently, at most `max_parallel` at once.
    /// A feature is only released after all its enabled dependencies completed.
    Parallel { max_parallel: usize },
}

impl ExecutionMode {
    pub fn parallel(max_parallel: usize) -> Self {
        ExecutionMode::Parallel { max_parallel }
    }

    /// Effective concurrency limit; never below one.
    pub fn limit(&self) -> usize {
        match self {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Parallel { max_parallel } => (*max_parallel).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit() {
        assert_eq!(ExecutionMode::Sequential.limit(), 1);
        assert_eq!(ExecutionMode::parallel(4).limit(), 4);
        assert_eq!(ExecutionMode::parallel(0).limit(), 1);
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&ExecutionMode::parallel(3)).unwrap();
        assert_eq!(json, r#"{"mode":"parallel","max_parallel":3}"#);

        let mode: ExecutionMode = serde_json::from_str(r#"{"mode":"sequential"}"#).unwrap();
        assert_eq!(mode, ExecutionMode::Sequential);
    }
}
