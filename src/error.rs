//! Error types for the geokv index.

use crate::compute::covering::Cell;
use crate::storage::StoreError;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeoError>;

#[derive(Debug, Error)]
pub enum GeoError {
    /// Latitude/longitude outside their ranges or not finite. Raised before
    /// any store access.
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Zero/negative radius, inverted latitudes or non-finite bounds.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A well-formed region whose covering would exceed `limit` cells at
    /// this partition width. Coarser partitions or a smaller region help.
    #[error("region needs more than {limit} cells at hash key length {hash_key_length}")]
    CoveringTooLarge { limit: usize, hash_key_length: u8 },

    /// A transient store failure that persisted through every retry.
    #[error("store unavailable after {attempts} attempt(s): {source}")]
    StoreUnavailable {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// A non-retryable store failure (schema mismatch, malformed request).
    #[error("store rejected request: {0}")]
    StoreRejected(#[source] StoreError),

    #[error("item already exists: partition {partition_key}, range key {range_key:?}")]
    DuplicateKey {
        partition_key: u64,
        range_key: String,
    },

    /// One cell of a covering could not be scanned; the whole query fails.
    #[error("scan of {cell} failed: {source}")]
    PartialCoverFailure {
        cell: Cell,
        #[source]
        source: Box<GeoError>,
    },

    #[error("scan exceeded timeout of {0:?}")]
    ScanTimeout(Duration),

    #[error("operation cancelled")]
    Cancelled,

    /// A stored item is missing index attributes or carries unreadable ones.
    #[error("malformed index item: {0}")]
    MalformedItem(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("scan worker pool failure: {0}")]
    WorkerPool(String),
}

impl GeoError {
    /// Unwraps `PartialCoverFailure` layers down to the failure that caused
    /// them.
    pub fn root_cause(&self) -> &GeoError {
        match self {
            GeoError::PartialCoverFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the error came from validating caller input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GeoError::InvalidCoordinate(_) | GeoError::InvalidRegion(_) | GeoError::InvalidConfig(_)
        )
    }
}
