//! Geospatial point index over partitioned key-value stores.
//!
//! Points are keyed by a 64-bit geohash whose leading bits form the store's
//! partition key. Radius and rectangle queries are answered by covering the
//! region with geohash cells, scanning each cell's range concurrently and
//! filtering the candidates exactly.
//!
//! ```rust
//! use geokv::prelude::*;
//!
//! let manager = GeoDataManager::builder()
//!     .config(GeoConfig::new("geo-test"))
//!     .in_memory()
//!     .create_table_if_missing(true)
//!     .build()?;
//!
//! let capitol_hill = GeoPoint::new(47.61121, -122.31846);
//! manager.put_point(
//!     PutPointRequest::new(capitol_hill, "someRangeKey").with_attribute("name", "Capitol Hill"),
//! )?;
//!
//! let nearby = manager.query_radius(QueryRadiusRequest::new(capitol_hill, 5_000.0))?;
//! assert_eq!(nearby.records.len(), 1);
//! assert_eq!(nearby.records[0].range_key, "someRangeKey");
//! # Ok::<(), geokv::GeoError>(())
//! ```

pub mod builder;
pub mod compute;
pub mod config;
pub mod error;
pub mod index;
pub mod manager;
pub mod query;
pub mod storage;

pub use builder::GeoDataManagerBuilder;
pub use config::{AttributeNames, GeoConfig, WritePolicy};
pub use error::{GeoError, Result};
pub use manager::{
    DeletePointRequest, GeoDataManager, GeoRecord, GetPointRequest, PutPointRequest,
    PutPointResult, QueryRadiusRequest, QueryRectangleRequest, QueryResult, RelocatePointRequest,
};

pub use geokv_types::{GeoCircle, GeoPoint, GeoRect, Region};

pub use compute::covering::{Cell, CoveringGenerator};
pub use compute::geohash::{GeohashValue, bits_for_resolution, decode, encode};
pub use compute::partition::PartitionKeyMapper;

pub use index::{CallContext, CancellationToken, IndexedItem, RetryPolicy};

pub use query::QueryStats;

pub use storage::{AttributeValue, KeyValueStore, MemoryStore, StoreError, TableSchema};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {
    pub use crate::{GeoDataManager, GeoDataManagerBuilder, GeoError, Result};

    pub use crate::{GeoCircle, GeoPoint, GeoRect};

    pub use crate::{
        DeletePointRequest, GeoRecord, GetPointRequest, PutPointRequest, QueryRadiusRequest,
        QueryRectangleRequest, RelocatePointRequest,
    };

    pub use crate::{AttributeValue, GeoConfig, WritePolicy};

    pub use crate::{CancellationToken, KeyValueStore, MemoryStore};

    pub use std::time::Duration;
}
