//! Key-value store contract used by the index.
//!
//! The index only needs the primitives a partitioned key-value store
//! exposes: put (optionally conditional), get/delete by primary key, a
//! range query on a numeric secondary sort attribute within one partition
//! key, and batched writes. [`KeyValueStore`] captures exactly that, so the
//! index can sit on top of any store that offers a composite
//! `(partition key, sort key)` layout plus a local secondary index.
//!
//! [`MemoryStore`] is an in-process implementation used by tests, benches
//! and embedders that do not need durability.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

mod memory;
pub mod table;

pub use memory::{MemoryStore, StoreStats};
pub use table::{KeyAttribute, KeyType, SecondaryIndex, TableSchema};

/// Maximum number of write requests accepted by a single `batch_write`.
pub const BATCH_WRITE_LIMIT: usize = 25;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by a store implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("conditional check failed")]
    ConditionalCheckFailed,

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    /// Schema mismatch or malformed request.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl StoreError {
    /// Throttling, unavailability and timeouts are transient; everything
    /// else fails the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Throttled(_) | StoreError::Unavailable(_) | StoreError::Timeout(_)
        )
    }
}

/// A single attribute value of a stored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    String(String),
    /// Unsigned integers; key and geohash attributes use this variant.
    UInt(u64),
    Int(i64),
    Number(f64),
    Bool(bool),
    Binary(Bytes),
    List(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
    Null,
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttributeValue::UInt(v) => Some(*v),
            AttributeValue::Int(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(v) => Some(*v),
            AttributeValue::UInt(v) => Some(*v as f64),
            AttributeValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        AttributeValue::UInt(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<Bytes> for AttributeValue {
    fn from(value: Bytes) -> Self {
        AttributeValue::Binary(value)
    }
}

/// A stored item: attribute name to value.
pub type Item = BTreeMap<String, AttributeValue>;

/// Composite primary key of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimaryKey {
    pub partition: u64,
    pub sort: String,
}

impl PrimaryKey {
    pub fn new(partition: u64, sort: impl Into<String>) -> Self {
        Self {
            partition,
            sort: sort.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PutCondition {
    /// Overwrite any existing item with the same primary key.
    #[default]
    Always,
    /// Fail with `ConditionalCheckFailed` if the primary key already exists.
    IfNotExists,
}

#[derive(Debug, Clone)]
pub struct PutItemRequest {
    pub table_name: String,
    pub item: Item,
    pub condition: PutCondition,
}

/// Position inside a secondary-index query, used to resume pagination.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueryCursor {
    pub geohash: u64,
    pub sort: String,
}

/// `partition = X AND geohash BETWEEN min AND max` on a secondary index.
///
/// Both bounds are inclusive.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub table_name: String,
    pub index_name: String,
    pub partition: u64,
    pub geohash_min: u64,
    pub geohash_max: u64,
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<QueryCursor>,
}

/// One page of query results. `last_evaluated_key` is set when more items
/// may follow.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<QueryCursor>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put(Item),
    Delete(PrimaryKey),
}

/// Primitive operations of a partitioned key-value store.
///
/// Implementations must be safe to call from several scan workers at once.
pub trait KeyValueStore: Send + Sync {
    fn create_table(&self, schema: &TableSchema) -> StoreResult<()>;

    fn describe_table(&self, table_name: &str) -> StoreResult<TableSchema>;

    fn delete_table(&self, table_name: &str) -> StoreResult<()>;

    fn list_tables(&self) -> StoreResult<Vec<String>>;

    /// Write an item, returning the item it replaced (if any).
    fn put_item(&self, request: &PutItemRequest) -> StoreResult<Option<Item>>;

    fn get_item(&self, table_name: &str, key: &PrimaryKey) -> StoreResult<Option<Item>>;

    /// Delete an item, returning it if it existed.
    fn delete_item(&self, table_name: &str, key: &PrimaryKey) -> StoreResult<Option<Item>>;

    /// Range query on the geohash secondary index within one partition.
    fn query(&self, request: &QueryRequest) -> StoreResult<QueryPage>;

    /// Apply up to [`BATCH_WRITE_LIMIT`] writes. Returns the requests the
    /// store did not process; callers resubmit them.
    fn batch_write(
        &self,
        table_name: &str,
        requests: &[WriteRequest],
    ) -> StoreResult<Vec<WriteRequest>>;
}
