//! Table layout required by the index.

use crate::config::GeoConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Number,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAttribute {
    pub name: String,
    pub key_type: KeyType,
}

impl KeyAttribute {
    pub fn new(name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            key_type,
        }
    }
}

/// Local secondary index: same partition key, alternative sort attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryIndex {
    pub index_name: String,
    pub sort_key: KeyAttribute,
}

/// Composite key schema plus the geohash secondary index.
///
/// `hash_key_length` is fixed when the table is provisioned: items written
/// with one partition width are invisible to queries using another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub partition_key: KeyAttribute,
    pub sort_key: KeyAttribute,
    pub geohash_index: SecondaryIndex,
    pub hash_key_length: u8,
}

impl TableSchema {
    /// Build the schema a table must have to back an index with `config`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use geokv::{GeoConfig, storage::TableSchema};
    ///
    /// let schema = TableSchema::for_config(&GeoConfig::new("geo-test"));
    /// assert_eq!(schema.table_name, "geo-test");
    /// assert_eq!(schema.partition_key.name, "hashKey");
    /// assert_eq!(schema.sort_key.name, "rangeKey");
    /// assert_eq!(schema.geohash_index.sort_key.name, "geohash");
    /// assert_eq!(schema.hash_key_length, 16);
    /// ```
    pub fn for_config(config: &GeoConfig) -> Self {
        Self {
            table_name: config.table_name.clone(),
            partition_key: KeyAttribute::new(&config.attributes.hash_key, KeyType::Number),
            sort_key: KeyAttribute::new(&config.attributes.range_key, KeyType::String),
            geohash_index: SecondaryIndex {
                index_name: config.geohash_index_name.clone(),
                sort_key: KeyAttribute::new(&config.attributes.geohash, KeyType::Number),
            },
            hash_key_length: config.hash_key_length,
        }
    }

    /// Check that an existing table can serve `config`.
    pub fn is_compatible_with(&self, config: &GeoConfig) -> bool {
        *self == Self::for_config(config)
    }
}
