//! Configuration store collaborator
//!
//! Deployed API units get their definition payloads from here. The host
//! provides the real store; [`InMemoryConfigurationStore`] keeps them in a map.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

/// Where definition payloads of deployed units are registered
pub trait ConfigurationStore: Send + Sync {
    /// Register (or replace) the definition payload of `unit`
    fn register_definition(&self, unit: &str, payload: &str) -> anyhow::Result<()>;

    /// Remove the definition of `unit`; removing an unknown unit is not an error
    fn remove_definition(&self, unit: &str) -> anyhow::Result<()>;

    /// Current definition of `unit`
    fn definition(&self, unit: &str) -> Option<String>;
}

#[derive(Debug, Default)]
pub struct InMemoryConfigurationStore {
    definitions: Mutex<HashMap<String, String>>,
}

impl InMemoryConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Units with a registered definition, sorted
    pub fn units(&self) -> Vec<String> {
        let mut units: Vec<String> = self
            .definitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        units.sort();
        units
    }
}

impl ConfigurationStore for InMemoryConfigurationStore {
    fn register_definition(&self, unit: &str, payload: &str) -> anyhow::Result<()> {
        debug!("Registering definition for {}", unit);
        self.definitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(unit.to_string(), payload.to_string());
        Ok(())
    }

    fn remove_definition(&self, unit: &str) -> anyhow::Result<()> {
        if self
            .definitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(unit)
            .is_some()
        {
            debug!("Removed definition for {}", unit);
        }
        Ok(())
    }

    fn definition(&self, unit: &str) -> Option<String> {
        self.definitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(unit)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_remove() {
        let store = InMemoryConfigurationStore::new();
        store.register_definition("OrderAPI", "openapi: 3.0.0").unwrap();
        assert_eq!(store.definition("OrderAPI").as_deref(), Some("openapi: 3.0.0"));
        assert_eq!(store.units(), vec!["OrderAPI"]);

        store.remove_definition("OrderAPI").unwrap();
        store.remove_definition("OrderAPI").unwrap();
        assert_eq!(store.definition("OrderAPI"), None);
    }
}
