//! Partition keys: the most significant `hash_key_length` bits of a geohash.

use super::covering::Cell;
use super::geohash::GeohashValue;
use crate::config::{MAX_HASH_KEY_LENGTH, MIN_HASH_KEY_LENGTH};
use crate::error::{GeoError, Result};

/// Maps geohashes to partition keys for one table.
///
/// The hash key length is fixed per table; every writer and reader of the
/// table must construct its mapper with the same value.
///
/// # Examples
///
/// ```
/// use geokv::compute::partition::PartitionKeyMapper;
/// use geokv::compute::geohash::GeohashValue;
///
/// let mapper = PartitionKeyMapper::new(8).unwrap();
/// let hash = GeohashValue::new(0xAB00_0000_0000_1234);
/// assert_eq!(mapper.partition_key_of(hash), 0xAB);
///
/// let (min, max) = mapper.partition_range(0xAB);
/// assert_eq!(min, 0xAB00_0000_0000_0000);
/// assert_eq!(max, 0xABFF_FFFF_FFFF_FFFF);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionKeyMapper {
    hash_key_length: u8,
}

impl PartitionKeyMapper {
    pub fn new(hash_key_length: u8) -> Result<Self> {
        if !(MIN_HASH_KEY_LENGTH..=MAX_HASH_KEY_LENGTH).contains(&hash_key_length) {
            return Err(GeoError::InvalidConfig(format!(
                "hash key length must be between {} and {} bits, got {}",
                MIN_HASH_KEY_LENGTH, MAX_HASH_KEY_LENGTH, hash_key_length
            )));
        }
        Ok(Self { hash_key_length })
    }

    pub fn hash_key_length(&self) -> u8 {
        self.hash_key_length
    }

    #[inline]
    fn shift(&self) -> u32 {
        64 - self.hash_key_length as u32
    }

    pub fn partition_key_of(&self, hash: GeohashValue) -> u64 {
        hash.as_u64() >> self.shift()
    }

    /// Inclusive hash range stored under `partition_key`.
    pub fn partition_range(&self, partition_key: u64) -> (u64, u64) {
        let min = partition_key << self.shift();
        (min, min | (u64::MAX >> self.hash_key_length))
    }

    /// Number of partitions the inclusive range `min..=max` touches.
    pub fn partition_count(&self, min: u64, max: u64) -> u64 {
        let first = min >> self.shift();
        let last = max >> self.shift();
        last.saturating_sub(first) + 1
    }

    /// Split the inclusive range `min..=max` into one cell per partition.
    pub fn split(&self, min: u64, max: u64) -> Vec<Cell> {
        if min > max {
            return Vec::new();
        }
        let first = min >> self.shift();
        let last = max >> self.shift();
        (first..=last)
            .map(|partition_key| {
                let (lo, hi) = self.partition_range(partition_key);
                Cell::new(partition_key, min.max(lo), max.min(hi))
            })
            .collect()
    }
}
