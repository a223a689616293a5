//! Compute layer: pure geometry and hashing.
//!
//! Nothing in here touches a store. It provides:
//! - The 64-bit geohash codec and resolution estimates
//! - Partition key derivation from a geohash prefix
//! - Covering of query regions by geohash ranges
//! - Great-circle distance helpers and input validation

pub mod covering;
pub mod geohash;
pub mod partition;
pub mod spatial;
pub mod validation;
