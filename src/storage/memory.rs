//! In-memory store implementation.

use super::{
    BATCH_WRITE_LIMIT, Item, KeyType, KeyValueStore, PrimaryKey, PutCondition, PutItemRequest,
    QueryCursor, QueryPage, QueryRequest, StoreError, StoreResult, TableSchema, WriteRequest,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters for a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Items currently stored across all tables
    pub item_count: usize,
    pub put_count: u64,
    pub get_count: u64,
    pub delete_count: u64,
    /// Number of `query` calls (one per page)
    pub query_count: u64,
    pub batch_write_count: u64,
}

#[derive(Default)]
struct Counters {
    puts: AtomicU64,
    gets: AtomicU64,
    deletes: AtomicU64,
    queries: AtomicU64,
    batch_writes: AtomicU64,
}

#[derive(Default)]
struct Partition {
    /// Items ordered by sort key
    items: BTreeMap<String, Item>,
    /// Secondary index entries ordered by (geohash, sort key)
    by_geohash: BTreeSet<(u64, String)>,
}

struct MemoryTable {
    schema: TableSchema,
    partitions: BTreeMap<u64, Partition>,
    len: usize,
}

impl MemoryTable {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            partitions: BTreeMap::new(),
            len: 0,
        }
    }

    fn key_of(&self, item: &Item) -> StoreResult<PrimaryKey> {
        let pk_name = &self.schema.partition_key.name;
        let sk_name = &self.schema.sort_key.name;

        let partition = item
            .get(pk_name)
            .and_then(|v| v.as_u64())
            .ok_or_else(|| {
                StoreError::Validation(format!(
                    "item is missing numeric partition key attribute '{}'",
                    pk_name
                ))
            })?;
        let sort = item.get(sk_name).and_then(|v| v.as_str()).ok_or_else(|| {
            StoreError::Validation(format!(
                "item is missing string sort key attribute '{}'",
                sk_name
            ))
        })?;

        Ok(PrimaryKey::new(partition, sort))
    }

    /// Geohash attribute of an item. Items without it are not indexed.
    fn geohash_of(&self, item: &Item) -> StoreResult<Option<u64>> {
        let name = &self.schema.geohash_index.sort_key.name;
        match item.get(name) {
            None => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                StoreError::Validation(format!("index attribute '{}' must be numeric", name))
            }),
        }
    }

    fn put(&mut self, item: Item, condition: PutCondition) -> StoreResult<Option<Item>> {
        let key = self.key_of(&item)?;
        let geohash = self.geohash_of(&item)?;

        if condition == PutCondition::IfNotExists
            && self
                .partitions
                .get(&key.partition)
                .is_some_and(|p| p.items.contains_key(&key.sort))
        {
            return Err(StoreError::ConditionalCheckFailed);
        }

        let old = self.remove(&key)?;
        let partition = self.partitions.entry(key.partition).or_default();
        if let Some(hash) = geohash {
            partition.by_geohash.insert((hash, key.sort.clone()));
        }
        partition.items.insert(key.sort, item);
        self.len += 1;

        Ok(old)
    }

    fn remove(&mut self, key: &PrimaryKey) -> StoreResult<Option<Item>> {
        let Some(partition) = self.partitions.get_mut(&key.partition) else {
            return Ok(None);
        };
        let Some(old) = partition.items.remove(&key.sort) else {
            return Ok(None);
        };

        let index_name = &self.schema.geohash_index.sort_key.name;
        if let Some(hash) = old.get(index_name).and_then(|v| v.as_u64()) {
            partition.by_geohash.remove(&(hash, key.sort.clone()));
        }
        if partition.items.is_empty() {
            self.partitions.remove(&key.partition);
        }
        self.len = self.len.saturating_sub(1);

        Ok(Some(old))
    }

    fn query(&self, request: &QueryRequest) -> StoreResult<QueryPage> {
        if request.index_name != self.schema.geohash_index.index_name {
            return Err(StoreError::Validation(format!(
                "unknown index '{}' on table '{}'",
                request.index_name, self.schema.table_name
            )));
        }
        if request.geohash_min > request.geohash_max {
            return Err(StoreError::Validation(format!(
                "empty BETWEEN range {}..={}",
                request.geohash_min, request.geohash_max
            )));
        }
        if request.limit == Some(0) {
            return Err(StoreError::Validation("query limit must be positive".into()));
        }

        let Some(partition) = self.partitions.get(&request.partition) else {
            return Ok(QueryPage::default());
        };

        let start = match &request.exclusive_start_key {
            Some(cursor) => Bound::Excluded((cursor.geohash, cursor.sort.clone())),
            None => Bound::Included((request.geohash_min, String::new())),
        };
        let limit = request.limit.unwrap_or(usize::MAX);

        let mut items = Vec::new();
        let mut last = None;
        let mut matching = partition
            .by_geohash
            .range((start, Bound::Unbounded))
            .take_while(|(hash, _)| *hash <= request.geohash_max)
            .peekable();

        while let Some((hash, sort)) = matching.next() {
            if *hash < request.geohash_min {
                continue;
            }
            if let Some(item) = partition.items.get(sort) {
                items.push(item.clone());
            }
            if items.len() >= limit {
                if matching.peek().is_some() {
                    last = Some(QueryCursor {
                        geohash: *hash,
                        sort: sort.clone(),
                    });
                }
                break;
            }
        }

        Ok(QueryPage {
            items,
            last_evaluated_key: last,
        })
    }
}

/// In-memory partitioned store with a geohash secondary index per table.
///
/// Partitions are ordered maps keyed by sort key, mirroring the layout of a
/// hosted key-value store closely enough for the index to behave the same
/// way on both.
///
/// # Examples
///
/// ```rust
/// use geokv::storage::{KeyValueStore, MemoryStore, TableSchema};
/// use geokv::GeoConfig;
///
/// let store = MemoryStore::new();
/// store.create_table(&TableSchema::for_config(&GeoConfig::new("places"))).unwrap();
/// assert_eq!(store.list_tables().unwrap(), vec!["places".to_string()]);
/// ```
pub struct MemoryStore {
    tables: RwLock<FxHashMap<String, MemoryTable>>,
    counters: Counters,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(FxHashMap::default()),
            counters: Counters::default(),
        }
    }

    /// Snapshot of operation counters.
    pub fn stats(&self) -> StoreStats {
        let item_count = self.tables.read().values().map(|t| t.len).sum();
        StoreStats {
            item_count,
            put_count: self.counters.puts.load(Ordering::Relaxed),
            get_count: self.counters.gets.load(Ordering::Relaxed),
            delete_count: self.counters.deletes.load(Ordering::Relaxed),
            query_count: self.counters.queries.load(Ordering::Relaxed),
            batch_write_count: self.counters.batch_writes.load(Ordering::Relaxed),
        }
    }

    /// Number of non-empty partitions in a table.
    pub fn partition_count(&self, table_name: &str) -> StoreResult<usize> {
        let tables = self.tables.read();
        let table = tables
            .get(table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;
        Ok(table.partitions.len())
    }

    fn validate_schema(schema: &TableSchema) -> StoreResult<()> {
        if schema.table_name.is_empty() {
            return Err(StoreError::Validation("table name must not be empty".into()));
        }
        if schema.partition_key.key_type != KeyType::Number {
            return Err(StoreError::Validation(
                "partition key must be numeric".into(),
            ));
        }
        if schema.sort_key.key_type != KeyType::String {
            return Err(StoreError::Validation("sort key must be a string".into()));
        }
        if schema.geohash_index.sort_key.key_type != KeyType::Number {
            return Err(StoreError::Validation(
                "geohash index sort key must be numeric".into(),
            ));
        }
        let names = [
            &schema.partition_key.name,
            &schema.sort_key.name,
            &schema.geohash_index.sort_key.name,
        ];
        if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
            return Err(StoreError::Validation(
                "key attributes must have distinct names".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn create_table(&self, schema: &TableSchema) -> StoreResult<()> {
        Self::validate_schema(schema)?;

        let mut tables = self.tables.write();
        if tables.contains_key(&schema.table_name) {
            return Err(StoreError::TableExists(schema.table_name.clone()));
        }
        tables.insert(schema.table_name.clone(), MemoryTable::new(schema.clone()));
        log::debug!("created table '{}'", schema.table_name);
        Ok(())
    }

    fn describe_table(&self, table_name: &str) -> StoreResult<TableSchema> {
        self.tables
            .read()
            .get(table_name)
            .map(|t| t.schema.clone())
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))
    }

    fn delete_table(&self, table_name: &str) -> StoreResult<()> {
        self.tables
            .write()
            .remove(table_name)
            .map(|_| ())
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))
    }

    fn list_tables(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn put_item(&self, request: &PutItemRequest) -> StoreResult<Option<Item>> {
        self.counters.puts.fetch_add(1, Ordering::Relaxed);
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(&request.table_name)
            .ok_or_else(|| StoreError::TableNotFound(request.table_name.clone()))?;
        table.put(request.item.clone(), request.condition)
    }

    fn get_item(&self, table_name: &str, key: &PrimaryKey) -> StoreResult<Option<Item>> {
        self.counters.gets.fetch_add(1, Ordering::Relaxed);
        let tables = self.tables.read();
        let table = tables
            .get(table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;
        Ok(table
            .partitions
            .get(&key.partition)
            .and_then(|p| p.items.get(&key.sort))
            .cloned())
    }

    fn delete_item(&self, table_name: &str, key: &PrimaryKey) -> StoreResult<Option<Item>> {
        self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;
        table.remove(key)
    }

    fn query(&self, request: &QueryRequest) -> StoreResult<QueryPage> {
        self.counters.queries.fetch_add(1, Ordering::Relaxed);
        let tables = self.tables.read();
        let table = tables
            .get(&request.table_name)
            .ok_or_else(|| StoreError::TableNotFound(request.table_name.clone()))?;
        table.query(request)
    }

    fn batch_write(
        &self,
        table_name: &str,
        requests: &[WriteRequest],
    ) -> StoreResult<Vec<WriteRequest>> {
        self.counters.batch_writes.fetch_add(1, Ordering::Relaxed);
        if requests.len() > BATCH_WRITE_LIMIT {
            return Err(StoreError::Validation(format!(
                "batch of {} writes exceeds limit of {}",
                requests.len(),
                BATCH_WRITE_LIMIT
            )));
        }

        let mut tables = self.tables.write();
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;

        // Validate the whole batch before applying any of it.
        for request in requests {
            if let WriteRequest::Put(item) = request {
                table.key_of(item)?;
                table.geohash_of(item)?;
            }
        }

        for request in requests {
            match request {
                WriteRequest::Put(item) => {
                    table.put(item.clone(), PutCondition::Always)?;
                }
                WriteRequest::Delete(key) => {
                    table.remove(key)?;
                }
            }
        }

        Ok(Vec::new())
    }
}
