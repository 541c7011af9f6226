//! Feature trait: the unit of setup/teardown work.

use super::error::RegistryError;
use super::registry::ProviderRegistry;
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use vdlaunch_shared::errors::VdResult;

/// How strongly a feature needs one of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// The dependency must be present and enabled.
    Required,
    /// The dependency is ordered before the dependent when enabled and
    /// silently dropped when disabled.
    Optional,
}

/// Reference to another feature by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    name: String,
    kind: DependencyKind,
}

impl Dependency {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DependencyKind::Required,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DependencyKind::Optional,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DependencyKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.kind == DependencyKind::Required
    }
}

/// Trait for subsystems that take part in instance setup.
///
/// A feature only describes graph participation and lifecycle; whatever it
/// provides to other features is published through [`FeatureCtx::publish`]
/// as a plain value, keeping the payload separate from the graph contract.
///
/// `setup` is called at most once per launch attempt. `teardown` is only
/// called after a successful `setup`.
#[async_trait]
pub trait Feature: Send + Sync {
    /// Stable identity used for lookups and diagnostics.
    fn name(&self) -> &str;

    /// Whether configuration switched this feature on. Fixed at construction.
    fn enabled(&self) -> bool {
        true
    }

    /// Features that must be set up before this one.
    fn dependencies(&self) -> Vec<Dependency> {
        Vec::new()
    }

    /// Acquire the feature's resources.
    async fn setup(&self, ctx: &FeatureCtx) -> VdResult<()>;

    /// Release whatever `setup` acquired.
    async fn teardown(&self) -> VdResult<()> {
        Ok(())
    }
}

pub type BoxedFeature = Box<dyn Feature>;

/// Per-feature view of the launch attempt handed to `Feature::setup`.
#[derive(Clone)]
pub struct FeatureCtx {
    feature: String,
    registry: ProviderRegistry,
}

impl FeatureCtx {
    pub(crate) fn new(feature: impl Into<String>, registry: ProviderRegistry) -> Self {
        Self {
            feature: feature.into(),
            registry,
        }
    }

    /// Name of the feature currently being set up.
    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// Publish a capability produced by this feature.
    pub fn publish<T>(&self, capability: &str, value: T) -> Result<(), RegistryError>
    where
        T: Any + Send + Sync,
    {
        self.registry.publish(&self.feature, capability, value)
    }

    /// Look up a capability published by a dependency.
    pub fn lookup<T>(&self, capability: &str) -> Result<Arc<T>, RegistryError>
    where
        T: Any + Send + Sync,
    {
        self.registry.lookup(capability)
    }

    /// Look up a capability from an optional dependency.
    ///
    /// Returns `Ok(None)` when nothing was published under `capability`;
    /// a type mismatch is still an error.
    pub fn lookup_optional<T>(&self, capability: &str) -> Result<Option<Arc<T>>, RegistryError>
    where
        T: Any + Send + Sync,
    {
        match self.registry.lookup(capability) {
            Ok(value) => Ok(Some(value)),
            Err(RegistryError::CapabilityNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_kinds() {
        let required = Dependency::required("disk");
        let optional = Dependency::optional("display");

        assert_eq!(required.name(), "disk");
        assert!(required.is_required());
        assert_eq!(optional.kind(), DependencyKind::Optional);
        assert!(!optional.is_required());
    }

    #[test]
    fn test_ctx_publishes_under_own_name() {
        let registry = ProviderRegistry::new();
        let ctx = FeatureCtx::new("network", registry.clone());

        ctx.publish("tap_device", String::from("tap0")).unwrap();

        assert_eq!(registry.producer_of("tap_device").as_deref(), Some("network"));
        assert_eq!(*ctx.lookup::<String>("tap_device").unwrap(), "tap0");
    }

    #[test]
    fn test_lookup_optional_missing_is_none() {
        let ctx = FeatureCtx::new("input", ProviderRegistry::new());
        let display = ctx.lookup_optional::<u32>("display").unwrap();
        assert!(display.is_none());
    }
}
