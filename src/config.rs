//! Index configuration.
//!
//! One `GeoConfig` describes one table. Writers and readers of the same table
//! must agree on `hash_key_length` and the attribute names, so the config is
//! passed explicitly to every component rather than held globally, and
//! several configurations can coexist in one process.
use crate::error::{GeoError, Result};
use crate::index::retry::RetryPolicy;
use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest and largest supported partition key width in bits.
pub const MIN_HASH_KEY_LENGTH: u8 = 1;
pub const MAX_HASH_KEY_LENGTH: u8 = 32;

/// What `put_point` does when the range key already exists in the target
/// partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Replace the existing item.
    #[default]
    Upsert,
    /// Fail with `GeoError::DuplicateKey`.
    RejectDuplicates,
}

/// Names of the attributes the index reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeNames {
    #[serde(default = "AttributeNames::default_hash_key")]
    pub hash_key: String,
    #[serde(default = "AttributeNames::default_range_key")]
    pub range_key: String,
    #[serde(default = "AttributeNames::default_geohash")]
    pub geohash: String,
    #[serde(default = "AttributeNames::default_geo_json")]
    pub geo_json: String,
}

impl AttributeNames {
    fn default_hash_key() -> String {
        "hashKey".to_string()
    }

    fn default_range_key() -> String {
        "rangeKey".to_string()
    }

    fn default_geohash() -> String {
        "geohash".to_string()
    }

    fn default_geo_json() -> String {
        "geoJson".to_string()
    }

    /// True if `name` is one of the attributes owned by the index.
    pub fn is_reserved(&self, name: &str) -> bool {
        name == self.hash_key || name == self.range_key || name == self.geohash || name == self.geo_json
    }
}

impl Default for AttributeNames {
    fn default() -> Self {
        Self {
            hash_key: Self::default_hash_key(),
            range_key: Self::default_range_key(),
            geohash: Self::default_geohash(),
            geo_json: Self::default_geo_json(),
        }
    }
}

/// Configuration of a geo-indexed table.
///
/// # Example
///
/// ```rust
/// use geokv::GeoConfig;
/// use std::time::Duration;
///
/// let config = GeoConfig::new("geo-test")
///     .with_hash_key_length(12)
///     .with_scan_timeout(Duration::from_secs(2));
/// assert!(config.validate().is_ok());
///
/// let json = r#"{
///     "table_name": "geo-test",
///     "hash_key_length": 20,
///     "max_scan_concurrency": 4,
///     "retry": { "max_attempts": 3, "base_backoff_ms": 10 }
/// }"#;
/// let config = GeoConfig::from_json(json).unwrap();
/// assert_eq!(config.hash_key_length, 20);
/// assert_eq!(config.retry.max_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeoConfig {
    pub table_name: String,

    /// Leading geohash bits that form the partition key. Fixed for the
    /// lifetime of a table.
    #[serde(default = "GeoConfig::default_hash_key_length")]
    pub hash_key_length: u8,

    #[serde(default = "GeoConfig::default_geohash_index_name")]
    pub geohash_index_name: String,

    #[serde(default)]
    pub attributes: AttributeNames,

    /// Upper bound on concurrent cell scans per query.
    #[serde(default = "GeoConfig::default_max_scan_concurrency")]
    pub max_scan_concurrency: usize,

    /// Per-scan timeout in milliseconds (None disables it).
    #[serde(default)]
    pub scan_timeout_ms: Option<u64>,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub write_policy: WritePolicy,

    /// Page size requested from the store per range query (None lets the
    /// store choose).
    #[serde(default)]
    pub query_page_size: Option<usize>,
}

impl GeoConfig {
    const fn default_hash_key_length() -> u8 {
        16
    }

    fn default_geohash_index_name() -> String {
        "geohash-index".to_string()
    }

    fn default_max_scan_concurrency() -> usize {
        std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(2)
            * 2
    }

    /// Defaults for a table called `table_name`.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            hash_key_length: Self::default_hash_key_length(),
            geohash_index_name: Self::default_geohash_index_name(),
            attributes: AttributeNames::default(),
            max_scan_concurrency: Self::default_max_scan_concurrency(),
            scan_timeout_ms: None,
            retry: RetryPolicy::default(),
            write_policy: WritePolicy::default(),
            query_page_size: None,
        }
    }

    pub fn with_hash_key_length(mut self, bits: u8) -> Self {
        self.hash_key_length = bits;
        self
    }

    pub fn with_geohash_index_name(mut self, name: impl Into<String>) -> Self {
        self.geohash_index_name = name.into();
        self
    }

    pub fn with_attribute_names(mut self, names: AttributeNames) -> Self {
        self.attributes = names;
        self
    }

    pub fn with_max_scan_concurrency(mut self, workers: usize) -> Self {
        self.max_scan_concurrency = workers;
        self
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout_ms = Some(timeout.as_millis().min(u64::MAX as u128) as u64);
        self
    }

    pub fn without_scan_timeout(mut self) -> Self {
        self.scan_timeout_ms = None;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn with_query_page_size(mut self, page_size: usize) -> Self {
        self.query_page_size = Some(page_size);
        self
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        self.scan_timeout_ms.map(Duration::from_millis)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(GeoError::InvalidConfig("table name must not be empty".into()));
        }

        if !(MIN_HASH_KEY_LENGTH..=MAX_HASH_KEY_LENGTH).contains(&self.hash_key_length) {
            return Err(GeoError::InvalidConfig(format!(
                "hash key length must be between {} and {} bits, got {}",
                MIN_HASH_KEY_LENGTH, MAX_HASH_KEY_LENGTH, self.hash_key_length
            )));
        }

        if self.geohash_index_name.trim().is_empty() {
            return Err(GeoError::InvalidConfig("geohash index name must not be empty".into()));
        }

        let names = &self.attributes;
        let all = [&names.hash_key, &names.range_key, &names.geohash, &names.geo_json];
        if all.iter().any(|n| n.trim().is_empty()) {
            return Err(GeoError::InvalidConfig("attribute names must not be empty".into()));
        }
        for (i, a) in all.iter().enumerate() {
            if all[i + 1..].contains(a) {
                return Err(GeoError::InvalidConfig(format!(
                    "attribute name '{}' is used twice",
                    a
                )));
            }
        }

        if self.max_scan_concurrency == 0 {
            return Err(GeoError::InvalidConfig(
                "max scan concurrency must be greater than zero".into(),
            ));
        }

        if self.scan_timeout_ms == Some(0) {
            return Err(GeoError::InvalidConfig("scan timeout must be positive".into()));
        }

        if self.query_page_size == Some(0) {
            return Err(GeoError::InvalidConfig("query page size must be positive".into()));
        }

        self.retry.validate()?;

        if self.max_scan_concurrency > 256 {
            log::warn!(
                "max scan concurrency of {} spawns that many threads per query",
                self.max_scan_concurrency
            );
        }

        Ok(())
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: GeoConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as JSON string
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        let config: GeoConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeoConfig::new("geo-test");
        assert_eq!(config.hash_key_length, 16);
        assert_eq!(config.geohash_index_name, "geohash-index");
        assert_eq!(config.attributes.hash_key, "hashKey");
        assert_eq!(config.attributes.geo_json, "geoJson");
        assert_eq!(config.write_policy, WritePolicy::Upsert);
        assert!(config.max_scan_concurrency >= 2);
        assert!(config.scan_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hash_key_length_bounds() {
        assert!(GeoConfig::new("t").with_hash_key_length(0).validate().is_err());
        assert!(GeoConfig::new("t").with_hash_key_length(1).validate().is_ok());
        assert!(GeoConfig::new("t").with_hash_key_length(32).validate().is_ok());
        assert!(GeoConfig::new("t").with_hash_key_length(33).validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_attribute_names() {
        let names = AttributeNames {
            geohash: "hashKey".into(),
            ..AttributeNames::default()
        };
        let err = GeoConfig::new("t").with_attribute_names(names).validate();
        assert!(matches!(err, Err(GeoError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_values() {
        assert!(GeoConfig::new("t").with_max_scan_concurrency(0).validate().is_err());
        assert!(GeoConfig::new("").validate().is_err());
        let mut config = GeoConfig::new("t");
        config.scan_timeout_ms = Some(0);
        assert!(config.validate().is_err());
        assert!(GeoConfig::new("t").with_query_page_size(0).validate().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = GeoConfig::new("places")
            .with_hash_key_length(10)
            .with_write_policy(WritePolicy::RejectDuplicates)
            .with_scan_timeout(Duration::from_millis(1500));
        let json = config.to_json().unwrap();
        let back = GeoConfig::from_json(&json).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.scan_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_json_validation_errors_surface() {
        let json = r#"{ "table_name": "t", "hash_key_length": 40 }"#;
        assert!(GeoConfig::from_json(json).is_err());

        let json = r#"{ "table_name": "t", "unknown_field": 1 }"#;
        assert!(GeoConfig::from_json(json).is_err());
    }
}
