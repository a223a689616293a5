//! Radius and rectangle queries.
//!
//! 1. Validate the region and pick a bit length from its extent.
//! 2. Cover the region with cells.
//! 3. Scan every cell, bounded by `max_scan_concurrency`.
//! 4. Merge the scans, dropping duplicate primary keys.
//! 5. Apply the exact shape test.
//! 6. Order deterministically and truncate to the limit.

use super::fanout::{FanOutOptions, fan_out};
use crate::compute::covering::CoveringGenerator;
use crate::compute::geohash::{MAX_BITS, bits_for_resolution};
use crate::compute::partition::PartitionKeyMapper;
use crate::compute::spatial::{distance_meters, extent_meters, reference_latitude};
use crate::compute::validation::validate_region;
use crate::config::GeoConfig;
use crate::error::Result;
use crate::index::{CancellationToken, IndexStoreAdapter, IndexedItem};
use geokv_types::{GeoCircle, GeoRect, Region};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Counters describing how a query was executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    /// Cells scanned.
    pub cells: usize,
    /// Bit length the covering was refined to.
    pub bit_length: u8,
    /// Distinct items returned by the scans, before the exact test.
    pub candidates: usize,
    /// Items that passed the exact test, before the limit.
    pub matched: usize,
}

/// Query results plus execution counters.
#[derive(Debug, Clone)]
pub struct QueryOutcome<T> {
    pub matches: Vec<T>,
    pub stats: QueryStats,
}

/// Executes spatial queries against one table.
#[derive(Clone)]
pub struct QueryEngine {
    adapter: IndexStoreAdapter,
    generator: CoveringGenerator,
}

impl QueryEngine {
    pub fn new(adapter: IndexStoreAdapter, mapper: PartitionKeyMapper) -> Self {
        Self {
            adapter,
            generator: CoveringGenerator::new(mapper),
        }
    }

    fn config(&self) -> &GeoConfig {
        self.adapter.config()
    }

    /// Bit length used to cover `region`: fine enough that a cell is about a
    /// quarter of the region's extent, and never coarser than the
    /// partition key.
    pub fn bit_length_for(&self, region: &Region) -> Result<u8> {
        validate_region(region)?;
        let resolution = extent_meters(region) / 4.0;
        let bits = if resolution > 0.0 {
            bits_for_resolution(resolution, reference_latitude(region))?
        } else {
            MAX_BITS
        };
        Ok(bits.max(self.config().hash_key_length))
    }

    /// Points within `circle.radius_meters` of the center (inclusive), each
    /// paired with its distance in meters.
    pub fn query_radius(
        &self,
        circle: &GeoCircle,
        limit: Option<usize>,
        sort_by_distance: bool,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<(IndexedItem, f64)>> {
        let region = Region::Circle(*circle);
        let (candidates, mut stats) = self.collect_candidates(&region, cancel)?;

        let mut matches: Vec<(IndexedItem, f64)> = candidates
            .into_iter()
            .filter_map(|item| {
                let distance = distance_meters(&circle.center, &item.point);
                (distance <= circle.radius_meters).then_some((item, distance))
            })
            .collect();
        stats.matched = matches.len();

        if sort_by_distance {
            matches.sort_by(|(a, da), (b, db)| {
                da.total_cmp(db).then_with(|| by_key(a, b))
            });
        } else {
            matches.sort_by(|(a, _), (b, _)| by_key(a, b));
        }
        if let Some(limit) = limit {
            matches.truncate(limit);
        }

        log::debug!(
            "radius query at {} r={}m: {} cell(s) at {} bits, {} candidate(s), {} match(es)",
            circle.center,
            circle.radius_meters,
            stats.cells,
            stats.bit_length,
            stats.candidates,
            stats.matched
        );
        Ok(QueryOutcome { matches, stats })
    }

    /// Points inside `rect`, edges inclusive. A rectangle with
    /// `min_longitude > max_longitude` wraps across the antimeridian.
    pub fn query_rectangle(
        &self,
        rect: &GeoRect,
        limit: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<IndexedItem>> {
        let region = Region::Rectangle(*rect);
        let (candidates, mut stats) = self.collect_candidates(&region, cancel)?;

        let mut matches: Vec<IndexedItem> = candidates
            .into_iter()
            .filter(|item| rect.contains(&item.point))
            .collect();
        stats.matched = matches.len();

        matches.sort_by(by_key);
        if let Some(limit) = limit {
            matches.truncate(limit);
        }

        log::debug!(
            "rectangle query {:?}: {} cell(s) at {} bits, {} candidate(s), {} match(es)",
            rect,
            stats.cells,
            stats.bit_length,
            stats.candidates,
            stats.matched
        );
        Ok(QueryOutcome { matches, stats })
    }

    /// Steps 1-4: covering, fan-out and de-duplication.
    fn collect_candidates(
        &self,
        region: &Region,
        cancel: &CancellationToken,
    ) -> Result<(Vec<IndexedItem>, QueryStats)> {
        let bit_length = self.bit_length_for(region)?;
        let cells = self.generator.cover(region, bit_length)?;
        let cell_count = cells.len();

        let adapter = self.adapter.clone();
        let options = FanOutOptions {
            max_concurrency: self.config().max_scan_concurrency,
            scan_timeout: self.config().scan_timeout(),
        };
        let scans = fan_out(cells, options, cancel, move |cell, ctx| {
            adapter.scan(cell, ctx)
        })?;

        let mut unique: FxHashMap<(u64, String), IndexedItem> = FxHashMap::default();
        for item in scans.into_iter().flatten() {
            unique
                .entry((item.partition_key, item.range_key.clone()))
                .or_insert(item);
        }

        let stats = QueryStats {
            cells: cell_count,
            bit_length,
            candidates: unique.len(),
            matched: 0,
        };
        Ok((unique.into_values().collect(), stats))
    }
}

/// Range key, then partition key.
fn by_key(a: &IndexedItem, b: &IndexedItem) -> Ordering {
    a.range_key
        .cmp(&b.range_key)
        .then(a.partition_key.cmp(&b.partition_key))
}
