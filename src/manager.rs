//! `GeoDataManager`: the public facade over the index.
//!
//! Every request is validated before the store is touched. Writes derive the
//! geohash and partition key from the point; queries go through the
//! [`QueryEngine`].

use crate::builder::GeoDataManagerBuilder;
use crate::compute::geohash::{GeohashValue, encode};
use crate::compute::partition::PartitionKeyMapper;
use crate::compute::validation::validate_points;
use crate::config::{GeoConfig, WritePolicy};
use crate::error::Result;
use crate::index::{CallContext, CancellationToken, IndexStoreAdapter, IndexedItem};
use crate::query::{QueryEngine, QueryStats};
use crate::storage::{AttributeValue, KeyValueStore, PutCondition, TableSchema};
use geokv_types::{GeoCircle, GeoPoint, GeoRect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A stored point as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    pub range_key: String,
    pub point: GeoPoint,
    pub geohash: GeohashValue,
    pub partition_key: u64,
    /// The stored GeoJSON `Point` geometry.
    pub geo_json: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Distance from the query centre; only set by radius queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
}

impl GeoRecord {
    fn from_indexed(item: IndexedItem, distance_meters: Option<f64>) -> Result<Self> {
        let geo_json = item.geo_json()?;
        Ok(Self {
            range_key: item.range_key,
            point: item.point,
            geohash: item.geohash,
            partition_key: item.partition_key,
            geo_json,
            attributes: item.attributes,
            distance_meters,
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}

#[derive(Debug, Clone)]
pub struct PutPointRequest {
    pub point: GeoPoint,
    pub range_key: String,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl PutPointRequest {
    pub fn new(point: GeoPoint, range_key: impl Into<String>) -> Self {
        Self {
            point,
            range_key: range_key.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, AttributeValue>) -> Self {
        self.attributes.extend(attributes);
        self
    }
}

#[derive(Debug, Clone)]
pub struct PutPointResult {
    pub record: GeoRecord,
    /// The record this write overwrote, if the range key already existed in
    /// the partition.
    pub replaced: Option<GeoRecord>,
}

/// Point lookup. The point is needed to locate the partition.
#[derive(Debug, Clone)]
pub struct GetPointRequest {
    pub point: GeoPoint,
    pub range_key: String,
}

impl GetPointRequest {
    pub fn new(point: GeoPoint, range_key: impl Into<String>) -> Self {
        Self {
            point,
            range_key: range_key.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeletePointRequest {
    pub point: GeoPoint,
    pub range_key: String,
}

impl DeletePointRequest {
    pub fn new(point: GeoPoint, range_key: impl Into<String>) -> Self {
        Self {
            point,
            range_key: range_key.into(),
        }
    }
}

/// Move a stored point from `from` to `to`.
///
/// Payload attributes are carried over unless `attributes` replaces them.
#[derive(Debug, Clone)]
pub struct RelocatePointRequest {
    pub from: GeoPoint,
    pub to: GeoPoint,
    pub range_key: String,
    pub attributes: Option<BTreeMap<String, AttributeValue>>,
}

impl RelocatePointRequest {
    pub fn new(from: GeoPoint, to: GeoPoint, range_key: impl Into<String>) -> Self {
        Self {
            from,
            to,
            range_key: range_key.into(),
            attributes: None,
        }
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, AttributeValue>) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

#[derive(Debug, Clone)]
pub struct QueryRadiusRequest {
    pub center: GeoPoint,
    pub radius_meters: f64,
    pub limit: Option<usize>,
    pub sort_by_distance: bool,
    pub cancel: Option<CancellationToken>,
}

impl QueryRadiusRequest {
    pub fn new(center: GeoPoint, radius_meters: f64) -> Self {
        Self {
            center,
            radius_meters,
            limit: None,
            sort_by_distance: false,
            cancel: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sorted_by_distance(mut self) -> Self {
        self.sort_by_distance = true;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[derive(Debug, Clone)]
pub struct QueryRectangleRequest {
    pub rect: GeoRect,
    pub limit: Option<usize>,
    pub cancel: Option<CancellationToken>,
}

impl QueryRectangleRequest {
    pub fn new(rect: GeoRect) -> Self {
        Self {
            rect,
            limit: None,
            cancel: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub records: Vec<GeoRecord>,
    pub stats: QueryStats,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Geospatial index over one table of a [`KeyValueStore`].
///
/// Cheap to clone and safe to share between threads; clones use the same
/// store handle and configuration.
///
/// # Examples
///
/// ```rust
/// use geokv::prelude::*;
///
/// # fn main() -> geokv::Result<()> {
/// let manager = GeoDataManager::builder()
///     .config(GeoConfig::new("places"))
///     .in_memory()
///     .create_table_if_missing(true)
///     .build()?;
///
/// let pike_place = GeoPoint::new(47.6097, -122.3422);
/// manager.put_point(
///     PutPointRequest::new(pike_place, "pike-place").with_attribute("kind", "market"),
/// )?;
///
/// let found = manager.query_radius(
///     QueryRadiusRequest::new(GeoPoint::new(47.6062, -122.3321), 2_000.0),
/// )?;
/// assert_eq!(found.records[0].range_key, "pike-place");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GeoDataManager {
    config: Arc<GeoConfig>,
    mapper: PartitionKeyMapper,
    adapter: IndexStoreAdapter,
    engine: QueryEngine,
}

impl GeoDataManager {
    /// Wrap `store` with an index described by `config`. The table is not
    /// created or checked; use [`GeoDataManager::builder`] for that.
    pub fn new(store: Arc<dyn KeyValueStore>, config: GeoConfig) -> Result<Self> {
        config.validate()?;
        let mapper = PartitionKeyMapper::new(config.hash_key_length)?;
        let config = Arc::new(config);
        let adapter = IndexStoreAdapter::new(store, Arc::clone(&config));
        let engine = QueryEngine::new(adapter.clone(), mapper);
        Ok(Self {
            config,
            mapper,
            adapter,
            engine,
        })
    }

    pub fn builder() -> GeoDataManagerBuilder {
        GeoDataManagerBuilder::new()
    }

    pub fn config(&self) -> &GeoConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        self.adapter.store()
    }

    /// Schema the backing table must have.
    pub fn table_schema(&self) -> TableSchema {
        TableSchema::for_config(&self.config)
    }

    /// Create the backing table. Fails with `StoreRejected(TableExists)` if
    /// it is already there.
    pub fn create_table(&self) -> Result<TableSchema> {
        self.adapter.create_table(&CallContext::unbounded())
    }

    pub fn describe_table(&self) -> Result<TableSchema> {
        self.adapter.describe_table(&CallContext::unbounded())
    }

    fn put_condition(&self) -> PutCondition {
        match self.config.write_policy {
            WritePolicy::Upsert => PutCondition::Always,
            WritePolicy::RejectDuplicates => PutCondition::IfNotExists,
        }
    }

    fn index(&self, point: GeoPoint, range_key: String, attributes: BTreeMap<String, AttributeValue>) -> Result<IndexedItem> {
        IndexedItem::new(point, range_key, attributes, &self.mapper, &self.config.attributes)
    }

    fn partition_of(&self, point: &GeoPoint) -> Result<u64> {
        Ok(self.mapper.partition_key_of(encode(point)?))
    }

    /// Store a point under `range_key`.
    ///
    /// Under `WritePolicy::RejectDuplicates` an existing range key in the
    /// same partition fails with `DuplicateKey`; otherwise it is replaced.
    pub fn put_point(&self, request: PutPointRequest) -> Result<PutPointResult> {
        let item = self.index(request.point, request.range_key, request.attributes)?;
        let replaced = self
            .adapter
            .put(&item, self.put_condition(), &CallContext::unbounded())?;

        log::debug!(
            "put '{}' at {} (partition {}, geohash {})",
            item.range_key,
            item.point,
            item.partition_key,
            item.geohash
        );
        Ok(PutPointResult {
            record: GeoRecord::from_indexed(item, None)?,
            replaced: replaced
                .map(|old| GeoRecord::from_indexed(old, None))
                .transpose()?,
        })
    }

    /// Store many points in store-sized batches.
    ///
    /// Every request is validated before the first write. Batched writes
    /// always overwrite existing range keys regardless of the write policy,
    /// and are not atomic: a failure leaves earlier batches written.
    pub fn batch_put_points(&self, requests: Vec<PutPointRequest>) -> Result<Vec<GeoRecord>> {
        let items = requests
            .into_iter()
            .map(|r| self.index(r.point, r.range_key, r.attributes))
            .collect::<Result<Vec<_>>>()?;
        if self.config.write_policy == WritePolicy::RejectDuplicates {
            log::debug!("batch put ignores the reject-duplicates write policy");
        }

        self.adapter.batch_put(&items, &CallContext::unbounded())?;
        log::debug!("batch put {} point(s)", items.len());

        items
            .into_iter()
            .map(|item| GeoRecord::from_indexed(item, None))
            .collect()
    }

    pub fn get_point(&self, request: GetPointRequest) -> Result<Option<GeoRecord>> {
        let partition_key = self.partition_of(&request.point)?;
        self.adapter
            .get(partition_key, &request.range_key, &CallContext::unbounded())?
            .map(|item| GeoRecord::from_indexed(item, None))
            .transpose()
    }

    /// Delete a point, returning it if it existed.
    pub fn delete_point(&self, request: DeletePointRequest) -> Result<Option<GeoRecord>> {
        let partition_key = self.partition_of(&request.point)?;
        self.adapter
            .delete(partition_key, &request.range_key, &CallContext::unbounded())?
            .map(|item| GeoRecord::from_indexed(item, None))
            .transpose()
    }

    /// Move a stored point. Returns `None` if nothing is stored at `from`.
    ///
    /// The new location is written before the old one is deleted, so a
    /// failure in between leaves the point visible at both locations rather
    /// than at neither.
    pub fn relocate_point(&self, request: RelocatePointRequest) -> Result<Option<GeoRecord>> {
        validate_points(&[request.from, request.to])?;
        let ctx = CallContext::unbounded();
        let old_partition = self.partition_of(&request.from)?;

        let Some(old) = self.adapter.get(old_partition, &request.range_key, &ctx)? else {
            return Ok(None);
        };

        let attributes = request.attributes.unwrap_or_else(|| old.attributes.clone());
        let moved = self.index(request.to, request.range_key, attributes)?;

        if moved.partition_key == old.partition_key {
            self.adapter.put(&moved, PutCondition::Always, &ctx)?;
        } else {
            self.adapter.put(&moved, self.put_condition(), &ctx)?;
            self.adapter.delete(old.partition_key, &old.range_key, &ctx)?;
        }

        log::debug!(
            "relocated '{}' from {} to {} (partition {} -> {})",
            moved.range_key,
            old.point,
            moved.point,
            old.partition_key,
            moved.partition_key
        );
        GeoRecord::from_indexed(moved, None).map(Some)
    }

    /// Points within `radius_meters` of `center`, boundary inclusive.
    ///
    /// Fails with [`CoveringTooLarge`](crate::GeoError::CoveringTooLarge) when the circle spans more
    /// partitions than one query may scan; fine partitioning (a long hash
    /// key length) lowers the radius at which that happens.
    pub fn query_radius(&self, request: QueryRadiusRequest) -> Result<QueryResult> {
        let circle = GeoCircle::new(request.center, request.radius_meters);
        let cancel = request.cancel.unwrap_or_default();

        let outcome =
            self.engine
                .query_radius(&circle, request.limit, request.sort_by_distance, &cancel)?;
        let records = outcome
            .matches
            .into_iter()
            .map(|(item, distance)| GeoRecord::from_indexed(item, Some(distance)))
            .collect::<Result<Vec<_>>>()?;

        Ok(QueryResult {
            records,
            stats: outcome.stats,
        })
    }

    /// Points inside `rect`, edges inclusive.
    ///
    /// Fails with [`CoveringTooLarge`](crate::GeoError::CoveringTooLarge) under the same conditions
    /// as [`query_radius`](Self::query_radius).
    pub fn query_rectangle(&self, request: QueryRectangleRequest) -> Result<QueryResult> {
        let cancel = request.cancel.unwrap_or_default();
        let outcome = self.engine.query_rectangle(&request.rect, request.limit, &cancel)?;
        let records = outcome
            .matches
            .into_iter()
            .map(|item| GeoRecord::from_indexed(item, None))
            .collect::<Result<Vec<_>>>()?;

        Ok(QueryResult {
            records,
            stats: outcome.stats,
        })
    }
}

impl std::fmt::Debug for GeoDataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoDataManager")
            .field("table_name", &self.config.table_name)
            .field("hash_key_length", &self.config.hash_key_length)
            .finish()
    }
}
