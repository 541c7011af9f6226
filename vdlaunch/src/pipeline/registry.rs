//! Name-keyed, type-erased store of capabilities published by features.

use super::error::RegistryError;
use parking_lot::RwLock;
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

struct Entry {
    producer: String,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

/// Provider registry for one launch attempt.
///
/// Cloning is cheap; all clones share the same entries. Ordering between
/// publishers and readers is guaranteed by the resolver, not by the registry.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `value` under `capability`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateCapability` if the name was already published in this attempt.
    pub fn publish<T>(&self, producer: &str, capability: &str, value: T) -> Result<(), RegistryError>
    where
        T: Any + Send + Sync,
    {
        let mut entries = self.entries.write();

        if let Some(existing) = entries.get(capability) {
            return Err(RegistryError::DuplicateCapability {
                capability: capability.to_string(),
                producer: existing.producer.clone(),
            });
        }

        tracing::debug!(
            capability = %capability,
            producer = %producer,
            "Published capability"
        );

        entries.insert(
            capability.to_string(),
            Entry {
                producer: producer.to_string(),
                type_name: type_name::<T>(),
                value: Arc::new(value),
            },
        );
        Ok(())
    }

    /// Fetch the value published under `capability` as `T`.
    pub fn lookup<T>(&self, capability: &str) -> Result<Arc<T>, RegistryError>
    where
        T: Any + Send + Sync,
    {
        let entries = self.entries.read();
        let entry = entries
            .get(capability)
            .ok_or_else(|| RegistryError::CapabilityNotFound(capability.to_string()))?;

        Arc::clone(&entry.value)
            .downcast::<T>()
            .map_err(|_| RegistryError::CapabilityTypeMismatch {
                capability: capability.to_string(),
                expected: type_name::<T>(),
                actual: entry.type_name,
            })
    }

    pub fn contains(&self, capability: &str) -> bool {
        self.entries.read().contains_key(capability)
    }

    /// Name of the feature that published `capability`.
    pub fn producer_of(&self, capability: &str) -> Option<String> {
        self.entries
            .read()
            .get(capability)
            .map(|entry| entry.producer.clone())
    }

    /// Published capability names, sorted.
    pub fn capabilities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
