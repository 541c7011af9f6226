use crate::pipeline::ExecutionMode;

#[derive(Debug, Clone)]
pub struct FeatureMetrics {
    pub name: String,
    pub duration_ms: u128,
}

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub execution: ExecutionMode,
    pub total_duration_ms: u128,
    /// Successful setups, in completion order.
    pub features: Vec<FeatureMetrics>,
}

impl PipelineMetrics {
    pub fn feature_duration_ms(&self, name: &str) -> Option<u128> {
        self.features
            .iter()
            .find(|feature| feature.name == name)
            .map(|feature| feature.duration_ms)
    }
}
