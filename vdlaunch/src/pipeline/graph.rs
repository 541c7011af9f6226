//! Feature graph: the registered features of one launch attempt.

use super::error::GraphError;
use super::feature::{BoxedFeature, Feature};
use super::resolver::{self, ExecutionPlan};
use std::collections::HashMap;

/// All features registered for one launch attempt.
///
/// Registration order is significant: it is the tie-break the resolver uses
/// between features with no ordering constraint. The graph is consumed by
/// [`FeatureGraph::resolve`], so one graph serves exactly one attempt.
#[derive(Default)]
pub struct FeatureGraph {
    features: Vec<BoxedFeature>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for FeatureGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureGraph")
            .field("features", &self.names())
            .finish()
    }
}

impl FeatureGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a feature.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateFeature` if a feature with the same name is already registered.
    pub fn register<F>(&mut self, feature: F) -> Result<(), GraphError>
    where
        F: Feature + 'static,
    {
        self.register_boxed(Box::new(feature))
    }

    pub fn register_boxed(&mut self, feature: BoxedFeature) -> Result<(), GraphError> {
        let name = feature.name().to_string();
        if self.index.contains_key(&name) {
            return Err(GraphError::DuplicateFeature(name));
        }

        tracing::trace!(
            feature = %name,
            enabled = feature.enabled(),
            "Registered feature"
        );

        self.index.insert(name, self.features.len());
        self.features.push(feature);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Feature> {
        self.index.get(name).map(|&i| self.features[i].as_ref())
    }

    /// Feature names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Validate the graph and compute its execution order.
    pub fn resolve(self) -> Result<ExecutionPlan, GraphError> {
        resolver::resolve(self.features, self.index)
    }
}
