//! Builder for [`GeoDataManager`].
//!
//! Composes a store and a configuration, validates them, and can make sure
//! the backing table exists with a compatible schema.

use crate::config::GeoConfig;
use crate::error::{GeoError, Result};
use crate::manager::GeoDataManager;
use crate::storage::{KeyValueStore, MemoryStore, StoreError, TableSchema};
use std::sync::Arc;

/// Builder for a geo data manager over a store and table.
pub struct GeoDataManagerBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    config: Option<GeoConfig>,
    create_table_if_missing: bool,
}

impl GeoDataManagerBuilder {
    /// Create a builder with no store and no table configured.
    pub fn new() -> Self {
        Self {
            store: None,
            config: None,
            create_table_if_missing: false,
        }
    }

    /// Use an existing store handle.
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Back the index with a fresh [`MemoryStore`].
    pub fn in_memory(mut self) -> Self {
        self.store = Some(Arc::new(MemoryStore::new()));
        self
    }

    /// Set the index configuration.
    pub fn config(mut self, config: GeoConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Shorthand for `config(GeoConfig::new(name))`.
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.config = Some(GeoConfig::new(name));
        self
    }

    /// Create the table on `build` if the store does not have it yet. An
    /// existing table is checked for a compatible schema either way.
    pub fn create_table_if_missing(mut self, create: bool) -> Self {
        self.create_table_if_missing = create;
        self
    }

    /// Validate the configuration and connect the manager to its table.
    pub fn build(self) -> Result<GeoDataManager> {
        let store = self
            .store
            .ok_or_else(|| GeoError::InvalidConfig("no store configured".into()))?;
        let config = self
            .config
            .ok_or_else(|| GeoError::InvalidConfig("no table configured".into()))?;

        let manager = GeoDataManager::new(store, config)?;
        let expected = manager.table_schema();

        match manager.describe_table() {
            Ok(existing) => check_schema(&existing, manager.config())?,
            Err(GeoError::StoreRejected(StoreError::TableNotFound(_)))
                if self.create_table_if_missing =>
            {
                log::info!("table '{}' not found, creating it", expected.table_name);
                manager.create_table()?;
            }
            Err(GeoError::StoreRejected(StoreError::TableNotFound(name))) => {
                log::debug!("table '{}' does not exist yet", name);
            }
            Err(e) => return Err(e),
        }

        Ok(manager)
    }
}

fn check_schema(existing: &TableSchema, config: &GeoConfig) -> Result<()> {
    if existing.hash_key_length != config.hash_key_length {
        return Err(GeoError::InvalidConfig(format!(
            "table '{}' was provisioned with hash key length {}, not {}",
            existing.table_name, existing.hash_key_length, config.hash_key_length
        )));
    }
    if !existing.is_compatible_with(config) {
        return Err(GeoError::InvalidConfig(format!(
            "table '{}' exists with an incompatible schema: {:?}",
            existing.table_name, existing
        )));
    }
    Ok(())
}

impl Default for GeoDataManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GeoDataManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoDataManagerBuilder")
            .field("has_store", &self.store.is_some())
            .field("config", &self.config)
            .field("create_table_if_missing", &self.create_table_if_missing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttributeNames;

    #[test]
    fn test_builder_default() {
        let builder = GeoDataManagerBuilder::new();
        assert!(builder.store.is_none());
        assert!(!builder.create_table_if_missing);
    }

    #[test]
    fn test_builder_requires_store_and_config() {
        let err = GeoDataManagerBuilder::new().table_name("geo").build().unwrap_err();
        assert!(matches!(err, GeoError::InvalidConfig(_)));

        let err = GeoDataManagerBuilder::new().in_memory().build().unwrap_err();
        assert!(matches!(err, GeoError::InvalidConfig(_)));
    }

    #[test]
    fn test_builder_creates_table() {
        let store = Arc::new(MemoryStore::new());
        let manager = GeoDataManagerBuilder::new()
            .store(store.clone())
            .table_name("geo")
            .create_table_if_missing(true)
            .build()
            .unwrap();
        assert_eq!(store.list_tables().unwrap(), vec!["geo".to_string()]);
        assert_eq!(manager.describe_table().unwrap(), manager.table_schema());

        // Second build finds the table and accepts it.
        GeoDataManagerBuilder::new()
            .store(store.clone())
            .table_name("geo")
            .create_table_if_missing(true)
            .build()
            .unwrap();
    }

    #[test]
    fn test_builder_without_create_leaves_store_alone() {
        let store = Arc::new(MemoryStore::new());
        GeoDataManagerBuilder::new()
            .store(store.clone())
            .table_name("geo")
            .build()
            .unwrap();
        assert!(store.list_tables().unwrap().is_empty());
    }

    #[test]
    fn test_builder_rejects_incompatible_table() {
        let store = Arc::new(MemoryStore::new());
        GeoDataManagerBuilder::new()
            .store(store.clone())
            .table_name("geo")
            .create_table_if_missing(true)
            .build()
            .unwrap();

        let names = AttributeNames {
            geohash: "gh".into(),
            ..AttributeNames::default()
        };
        let err = GeoDataManagerBuilder::new()
            .store(store)
            .config(GeoConfig::new("geo").with_attribute_names(names))
            .build()
            .unwrap_err();
        assert!(matches!(err, GeoError::InvalidConfig(_)));
    }

    #[test]
    fn test_builder_rejects_different_hash_key_length() {
        let store = Arc::new(MemoryStore::new());
        let writer = GeoDataManagerBuilder::new()
            .store(store.clone())
            .table_name("geo")
            .create_table_if_missing(true)
            .build()
            .unwrap();
        writer
            .put_point(crate::PutPointRequest::new(
                crate::GeoPoint::new(40.7128, -74.0060),
                "someRangeKey",
            ))
            .unwrap();

        let err = GeoDataManagerBuilder::new()
            .store(store)
            .config(GeoConfig::new("geo").with_hash_key_length(12))
            .build()
            .unwrap_err();
        match err {
            GeoError::InvalidConfig(msg) => assert!(msg.contains("hash key length 16"), "{}", msg),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_builder_validates_config() {
        let err = GeoDataManagerBuilder::new()
            .in_memory()
            .config(GeoConfig::new("geo").with_hash_key_length(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, GeoError::InvalidConfig(_)));
    }
}
