//! 64-bit interleaved geohash codec.
//!
//! Each axis is normalised to a 32-bit fixed-point fraction of its range
//! (`floor(frac * 2^32)`, clamped to `2^32 - 1`) and the two are interleaved
//! longitude bit first, most significant first. Hash order is therefore a
//! Z-order curve over the lat/lon plane, and the top `5n` bits of a hash are
//! exactly the `n`-character base32 geohash of the same point.
//!
//! Two consecutive bits form one quadtree level: a node at level `L` is the
//! set of hashes sharing their top `2L` bits.

use super::spatial::METERS_PER_DEGREE;
use super::validation::validate_point;
use crate::error::{GeoError, Result};
use geokv_types::{GeoPoint, GeoRect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bits in a full-resolution hash.
pub const MAX_BITS: u8 = 64;

/// Longest base32 string `to_base32` produces (60 of the 64 bits).
pub const MAX_BASE32_LENGTH: usize = 12;

const AXIS_STEPS: f64 = 4_294_967_296.0; // 2^32

/// A full-resolution 64-bit geohash.
///
/// Ordering and equality are those of the underlying integer, which is the
/// sort key stored in the geohash index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeohashValue(u64);

impl GeohashValue {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Top `bits` bits as an integer (`bits` in 1..=64).
    pub fn prefix(self, bits: u8) -> u64 {
        let bits = bits.clamp(1, MAX_BITS);
        self.0 >> (MAX_BITS - bits)
    }

    /// Base32 geohash string of the first `len` characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use geokv::compute::geohash::encode;
    /// use geokv::GeoPoint;
    ///
    /// let hash = encode(&GeoPoint::new(0.0, 0.0)).unwrap();
    /// assert_eq!(hash.to_base32(5).unwrap(), "s0000");
    /// ```
    pub fn to_base32(self, len: usize) -> Result<String> {
        if !(1..=MAX_BASE32_LENGTH).contains(&len) {
            return Err(GeoError::InvalidConfig(format!(
                "base32 geohash length must be between 1 and {}, got {}",
                MAX_BASE32_LENGTH, len
            )));
        }
        // The centre of the full-resolution cell lies strictly inside every
        // ancestor cell, so bisecting it reproduces this hash's prefix.
        let center = decode(self);
        let coord = geohash::Coord {
            x: center.longitude(),
            y: center.latitude(),
        };
        geohash::encode(coord, len).map_err(|e| GeoError::InvalidCoordinate(e.to_string()))
    }
}

impl From<GeohashValue> for u64 {
    fn from(value: GeohashValue) -> Self {
        value.0
    }
}

impl From<u64> for GeohashValue {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for GeohashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Latitude/longitude box of a hash prefix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl CellBounds {
    /// Bounds of quadtree node `(level, x, y)`, where `x` indexes longitude
    /// and `y` latitude among the `2^level` slices of each axis.
    pub(crate) fn for_node(level: u8, x: u64, y: u64) -> Self {
        Self::for_axes(level, x, level, y)
    }

    fn for_axes(lon_bits: u8, x: u64, lat_bits: u8, y: u64) -> Self {
        let lon_step = 360.0 / (1u64 << lon_bits) as f64;
        let lat_step = 180.0 / (1u64 << lat_bits) as f64;
        let min_longitude = -180.0 + x as f64 * lon_step;
        let min_latitude = -90.0 + y as f64 * lat_step;
        Self {
            min_latitude,
            max_latitude: min_latitude + lat_step,
            min_longitude,
            max_longitude: min_longitude + lon_step,
        }
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_latitude + self.max_latitude) / 2.0,
            (self.min_longitude + self.max_longitude) / 2.0,
        )
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.to_rect().contains(point)
    }

    pub fn to_rect(&self) -> GeoRect {
        GeoRect::new(
            GeoPoint::new(self.min_latitude, self.min_longitude),
            GeoPoint::new(self.max_latitude, self.max_longitude),
        )
    }
}

/// Spread the 32 bits of `v` to the even bit positions of a `u64`.
#[inline]
fn spread(v: u32) -> u64 {
    let mut x = v as u64;
    x = (x | (x << 16)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x << 8)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    x = (x | (x << 1)) & 0x5555_5555_5555_5555;
    x
}

/// Inverse of [`spread`].
#[inline]
fn compact(v: u64) -> u32 {
    let mut x = v & 0x5555_5555_5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333_3333_3333;
    x = (x | (x >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x >> 4)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x >> 8)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x >> 16)) & 0x0000_0000_FFFF_FFFF;
    x as u32
}

/// Interleave longitude index `x` and latitude index `y`, `x` bit first.
#[inline]
pub(crate) fn interleave(x: u32, y: u32) -> u64 {
    (spread(x) << 1) | spread(y)
}

/// Split a hash back into `(x, y)` axis indices.
#[inline]
pub(crate) fn deinterleave(hash: u64) -> (u32, u32) {
    (compact(hash >> 1), compact(hash))
}

fn quantize(value: f64, min: f64, span: f64) -> u32 {
    let scaled = ((value - min) / span * AXIS_STEPS).floor();
    if scaled >= AXIS_STEPS {
        u32::MAX
    } else if scaled <= 0.0 {
        0
    } else {
        scaled as u32
    }
}

/// Encode a point as a full-resolution geohash.
///
/// Deterministic: the same coordinate always yields the same value.
///
/// # Errors
///
/// `InvalidCoordinate` for non-finite or out-of-range coordinates.
pub fn encode(point: &GeoPoint) -> Result<GeohashValue> {
    validate_point(point)?;
    let x = quantize(point.longitude(), GeoPoint::MIN_LONGITUDE, 360.0);
    let y = quantize(point.latitude(), GeoPoint::MIN_LATITUDE, 180.0);
    Ok(GeohashValue(interleave(x, y)))
}

/// Centre of the full-resolution cell a hash denotes.
pub fn decode(hash: GeohashValue) -> GeoPoint {
    cell_bounds(hash, MAX_BITS).center()
}

/// Box covered by the first `bits` bits of `hash`.
///
/// Odd bit counts carry one more longitude bit than latitude bits, so the
/// box is a half-cell of the enclosing quadtree node.
pub fn cell_bounds(hash: GeohashValue, bits: u8) -> CellBounds {
    let bits = bits.min(MAX_BITS);
    let lon_bits = bits.div_ceil(2);
    let lat_bits = bits / 2;
    let (x, y) = deinterleave(hash.0);
    let x = if lon_bits == 0 { 0 } else { (x as u64) >> (32 - lon_bits) };
    let y = if lat_bits == 0 { 0 } else { (y as u64) >> (32 - lat_bits) };
    CellBounds::for_axes(lon_bits, x, lat_bits, y)
}

/// Smallest even bit count whose quadtree cell measures at most
/// `distance_meters` on both sides at `latitude`.
///
/// The longitude side is scaled by `cos(latitude)`. The result is capped at
/// [`MAX_BITS`] when even the finest cell is larger than `distance_meters`.
///
/// # Examples
///
/// ```
/// use geokv::compute::geohash::bits_for_resolution;
///
/// let coarse = bits_for_resolution(100_000.0, 47.6).unwrap();
/// let fine = bits_for_resolution(100.0, 47.6).unwrap();
/// assert!(fine > coarse);
/// assert_eq!(coarse % 2, 0);
/// ```
pub fn bits_for_resolution(distance_meters: f64, latitude: f64) -> Result<u8> {
    if !distance_meters.is_finite() || distance_meters <= 0.0 {
        return Err(GeoError::InvalidRegion(format!(
            "resolution must be finite and positive, got: {}",
            distance_meters
        )));
    }
    validate_point(&GeoPoint::new(latitude, 0.0))?;

    let cos_lat = latitude.to_radians().cos().abs();
    let max_level = MAX_BITS / 2;
    for level in 0..=max_level {
        let slices = (1u64 << level) as f64;
        let lat_side = 180.0 / slices * METERS_PER_DEGREE;
        let lon_side = 360.0 / slices * METERS_PER_DEGREE * cos_lat;
        if lat_side.max(lon_side) <= distance_meters {
            return Ok(level * 2);
        }
    }
    Ok(MAX_BITS)
}
