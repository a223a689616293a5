//! Index operations expressed as store primitives.

use super::context::CallContext;
use super::item::IndexedItem;
use crate::compute::covering::Cell;
use crate::config::GeoConfig;
use crate::error::{GeoError, Result};
use crate::storage::{
    BATCH_WRITE_LIMIT, KeyValueStore, PrimaryKey, PutCondition, PutItemRequest, QueryRequest,
    StoreError, TableSchema, WriteRequest,
};
use std::sync::Arc;

/// Translates index operations into store calls, retrying transient
/// failures according to the configured [`RetryPolicy`](super::RetryPolicy).
///
/// Cheap to clone; clones share the store handle and configuration.
#[derive(Clone)]
pub struct IndexStoreAdapter {
    store: Arc<dyn KeyValueStore>,
    config: Arc<GeoConfig>,
}

impl IndexStoreAdapter {
    pub fn new(store: Arc<dyn KeyValueStore>, config: Arc<GeoConfig>) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &GeoConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn create_table(&self, ctx: &CallContext) -> Result<TableSchema> {
        let schema = TableSchema::for_config(&self.config);
        self.config
            .retry
            .run(ctx, "create_table", || self.store.create_table(&schema))?;
        log::debug!("created geo table '{}'", schema.table_name);
        Ok(schema)
    }

    /// Schema of the configured table as the store reports it.
    pub fn describe_table(&self, ctx: &CallContext) -> Result<TableSchema> {
        self.config
            .retry
            .run(ctx, "describe_table", || {
                self.store.describe_table(&self.config.table_name)
            })
    }

    /// Write one item. Returns the item it replaced, if any.
    ///
    /// A conditional put that finds the key taken fails with `DuplicateKey`.
    pub fn put(
        &self,
        item: &IndexedItem,
        condition: PutCondition,
        ctx: &CallContext,
    ) -> Result<Option<IndexedItem>> {
        let names = &self.config.attributes;
        let request = PutItemRequest {
            table_name: self.config.table_name.clone(),
            item: item.to_item(names)?,
            condition,
        };

        match self
            .config
            .retry
            .run(ctx, "put_item", || self.store.put_item(&request))
        {
            Ok(replaced) => replaced
                .map(|old| IndexedItem::from_item(old, names))
                .transpose(),
            Err(GeoError::StoreRejected(StoreError::ConditionalCheckFailed)) => {
                Err(GeoError::DuplicateKey {
                    partition_key: item.partition_key,
                    range_key: item.range_key.clone(),
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn get(
        &self,
        partition_key: u64,
        range_key: &str,
        ctx: &CallContext,
    ) -> Result<Option<IndexedItem>> {
        let key = PrimaryKey::new(partition_key, range_key);
        self.config
            .retry
            .run(ctx, "get_item", || {
                self.store.get_item(&self.config.table_name, &key)
            })?
            .map(|raw| IndexedItem::from_item(raw, &self.config.attributes))
            .transpose()
    }

    /// Delete by primary key, returning the removed item if it existed.
    pub fn delete(
        &self,
        partition_key: u64,
        range_key: &str,
        ctx: &CallContext,
    ) -> Result<Option<IndexedItem>> {
        let key = PrimaryKey::new(partition_key, range_key);
        self.config
            .retry
            .run(ctx, "delete_item", || {
                self.store.delete_item(&self.config.table_name, &key)
            })?
            .map(|raw| IndexedItem::from_item(raw, &self.config.attributes))
            .transpose()
    }

    /// Write many items in store-sized batches.
    ///
    /// Writes the store leaves unprocessed are resubmitted with backoff;
    /// if some are still pending after `max_attempts` rounds the call fails
    /// with `StoreUnavailable`. Batches are not atomic: on failure, earlier
    /// batches stay written.
    pub fn batch_put(&self, items: &[IndexedItem], ctx: &CallContext) -> Result<()> {
        let names = &self.config.attributes;
        let retry = &self.config.retry;

        for chunk in items.chunks(BATCH_WRITE_LIMIT) {
            let mut pending = chunk
                .iter()
                .map(|item| item.to_item(names).map(WriteRequest::Put))
                .collect::<Result<Vec<_>>>()?;

            let mut rounds = 0u32;
            loop {
                pending = retry.run(ctx, "batch_write", || {
                    self.store.batch_write(&self.config.table_name, &pending)
                })?;
                if pending.is_empty() {
                    break;
                }

                rounds += 1;
                if rounds >= retry.max_attempts {
                    log::warn!(
                        "{} batched write(s) still unprocessed after {} round(s)",
                        pending.len(),
                        rounds
                    );
                    return Err(GeoError::StoreUnavailable {
                        attempts: rounds,
                        source: StoreError::Throttled(format!(
                            "{} write(s) left unprocessed",
                            pending.len()
                        )),
                    });
                }
                let delay = retry.backoff(rounds - 1);
                log::debug!(
                    "resubmitting {} unprocessed write(s) in {:?}",
                    pending.len(),
                    delay
                );
                ctx.sleep(delay)?;
            }
        }

        Ok(())
    }

    /// All items of one cell, following the store's pagination cursor until
    /// the range is exhausted.
    pub fn scan(&self, cell: &Cell, ctx: &CallContext) -> Result<Vec<IndexedItem>> {
        let mut request = QueryRequest {
            table_name: self.config.table_name.clone(),
            index_name: self.config.geohash_index_name.clone(),
            partition: cell.partition_key,
            geohash_min: cell.min_hash,
            geohash_max: cell.max_hash,
            limit: self.config.query_page_size,
            exclusive_start_key: None,
        };

        let mut items = Vec::new();
        let mut pages = 0usize;
        loop {
            let page = self
                .config
                .retry
                .run(ctx, "query", || self.store.query(&request))?;
            pages += 1;

            for raw in page.items {
                items.push(IndexedItem::from_item(raw, &self.config.attributes)?);
            }

            match page.last_evaluated_key {
                Some(cursor) => request.exclusive_start_key = Some(cursor),
                None => break,
            }
        }

        log::trace!("{} returned {} item(s) in {} page(s)", cell, items.len(), pages);
        Ok(items)
    }
}
