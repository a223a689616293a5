//! Store wrappers shared by the integration tests.
#![allow(dead_code)]

use geokv::storage::{
    Item, KeyValueStore, PrimaryKey, PutItemRequest, QueryPage, QueryRequest, StoreError,
    StoreResult, TableSchema, WriteRequest,
};
use geokv::MemoryStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Which store calls a [`FlakyStore`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Puts,
    Queries,
    BatchWrites,
}

/// Delegates to a [`MemoryStore`], failing the first `failures` matching
/// calls with `error`.
pub struct FlakyStore {
    inner: MemoryStore,
    fail_on: FailOn,
    error: StoreError,
    remaining: AtomicUsize,
    pub attempts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(fail_on: FailOn, failures: usize, error: StoreError) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_on,
            error,
            remaining: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn throttled(fail_on: FailOn, failures: usize) -> Self {
        Self::new(fail_on, failures, StoreError::Throttled("rate exceeded".into()))
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn gate(&self, kind: FailOn) -> StoreResult<()> {
        if kind != self.fail_on {
            return Ok(());
        }
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(self.error.clone())
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for FlakyStore {
    fn create_table(&self, schema: &TableSchema) -> StoreResult<()> {
        self.inner.create_table(schema)
    }

    fn describe_table(&self, table_name: &str) -> StoreResult<TableSchema> {
        self.inner.describe_table(table_name)
    }

    fn delete_table(&self, table_name: &str) -> StoreResult<()> {
        self.inner.delete_table(table_name)
    }

    fn list_tables(&self) -> StoreResult<Vec<String>> {
        self.inner.list_tables()
    }

    fn put_item(&self, request: &PutItemRequest) -> StoreResult<Option<Item>> {
        self.gate(FailOn::Puts)?;
        self.inner.put_item(request)
    }

    fn get_item(&self, table_name: &str, key: &PrimaryKey) -> StoreResult<Option<Item>> {
        self.inner.get_item(table_name, key)
    }

    fn delete_item(&self, table_name: &str, key: &PrimaryKey) -> StoreResult<Option<Item>> {
        self.inner.delete_item(table_name, key)
    }

    fn query(&self, request: &QueryRequest) -> StoreResult<QueryPage> {
        self.gate(FailOn::Queries)?;
        self.inner.query(request)
    }

    fn batch_write(
        &self,
        table_name: &str,
        requests: &[WriteRequest],
    ) -> StoreResult<Vec<WriteRequest>> {
        self.gate(FailOn::BatchWrites)?;
        self.inner.batch_write(table_name, requests)
    }
}

/// Delegates to a [`MemoryStore`], sleeping before every query. Tracks the
/// peak number of queries in flight.
pub struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
    active: AtomicUsize,
    pub peak: AtomicUsize,
    partitions: Mutex<Vec<u64>>,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            partitions: Mutex::new(Vec::new()),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Partitions queried so far, in call order.
    pub fn queried_partitions(&self) -> Vec<u64> {
        self.partitions.lock().clone()
    }
}

impl KeyValueStore for SlowStore {
    fn create_table(&self, schema: &TableSchema) -> StoreResult<()> {
        self.inner.create_table(schema)
    }

    fn describe_table(&self, table_name: &str) -> StoreResult<TableSchema> {
        self.inner.describe_table(table_name)
    }

    fn delete_table(&self, table_name: &str) -> StoreResult<()> {
        self.inner.delete_table(table_name)
    }

    fn list_tables(&self) -> StoreResult<Vec<String>> {
        self.inner.list_tables()
    }

    fn put_item(&self, request: &PutItemRequest) -> StoreResult<Option<Item>> {
        self.inner.put_item(request)
    }

    fn get_item(&self, table_name: &str, key: &PrimaryKey) -> StoreResult<Option<Item>> {
        self.inner.get_item(table_name, key)
    }

    fn delete_item(&self, table_name: &str, key: &PrimaryKey) -> StoreResult<Option<Item>> {
        self.inner.delete_item(table_name, key)
    }

    fn query(&self, request: &QueryRequest) -> StoreResult<QueryPage> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.partitions.lock().push(request.partition);
        thread::sleep(self.delay);
        let page = self.inner.query(request);
        self.active.fetch_sub(1, Ordering::SeqCst);
        page
    }

    fn batch_write(
        &self,
        table_name: &str,
        requests: &[WriteRequest],
    ) -> StoreResult<Vec<WriteRequest>> {
        self.inner.batch_write(table_name, requests)
    }
}

/// Delegates to a [`MemoryStore`] but leaves the last write of every batch
/// unprocessed for the first `rounds` batch calls.
pub struct PartialBatchStore {
    inner: MemoryStore,
    rounds: AtomicUsize,
}

impl PartialBatchStore {
    pub fn new(rounds: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            rounds: AtomicUsize::new(rounds),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl KeyValueStore for PartialBatchStore {
    fn create_table(&self, schema: &TableSchema) -> StoreResult<()> {
        self.inner.create_table(schema)
    }

    fn describe_table(&self, table_name: &str) -> StoreResult<TableSchema> {
        self.inner.describe_table(table_name)
    }

    fn delete_table(&self, table_name: &str) -> StoreResult<()> {
        self.inner.delete_table(table_name)
    }

    fn list_tables(&self) -> StoreResult<Vec<String>> {
        self.inner.list_tables()
    }

    fn put_item(&self, request: &PutItemRequest) -> StoreResult<Option<Item>> {
        self.inner.put_item(request)
    }

    fn get_item(&self, table_name: &str, key: &PrimaryKey) -> StoreResult<Option<Item>> {
        self.inner.get_item(table_name, key)
    }

    fn delete_item(&self, table_name: &str, key: &PrimaryKey) -> StoreResult<Option<Item>> {
        self.inner.delete_item(table_name, key)
    }

    fn query(&self, request: &QueryRequest) -> StoreResult<QueryPage> {
        self.inner.query(request)
    }

    fn batch_write(
        &self,
        table_name: &str,
        requests: &[WriteRequest],
    ) -> StoreResult<Vec<WriteRequest>> {
        let hold_back = self
            .rounds
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        match requests.split_last() {
            Some((last, rest)) if hold_back => {
                self.inner.batch_write(table_name, rest)?;
                Ok(vec![last.clone()])
            }
            _ => self.inner.batch_write(table_name, requests),
        }
    }
}
