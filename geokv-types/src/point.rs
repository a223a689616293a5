use serde::{Deserialize, Serialize};
use std::fmt;

/// A geographic point given as latitude/longitude in degrees.
///
/// The constructor takes latitude first, matching how coordinates are usually
/// written down. Conversions to `geo::Point` use `x = longitude`,
/// `y = latitude`.
///
/// `GeoPoint` does not validate its coordinates; range checks happen at the
/// index boundary so that invalid input is rejected before any store access.
///
/// # Examples
///
/// ```
/// use geokv_types::GeoPoint;
///
/// let p = GeoPoint::new(47.61121, -122.31846);
/// assert_eq!(p.latitude(), 47.61121);
/// assert_eq!(p.longitude(), -122.31846);
/// assert!(p.is_valid());
///
/// let g: geo::Point = p.into();
/// assert_eq!(g.x(), -122.31846);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    pub const MIN_LATITUDE: f64 = -90.0;
    pub const MAX_LATITUDE: f64 = 90.0;
    pub const MIN_LONGITUDE: f64 = -180.0;
    pub const MAX_LONGITUDE: f64 = 180.0;

    #[inline]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    #[inline]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[inline]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Whether both coordinates are finite and inside their ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (Self::MIN_LATITUDE..=Self::MAX_LATITUDE).contains(&self.latitude)
            && (Self::MIN_LONGITUDE..=Self::MAX_LONGITUDE).contains(&self.longitude)
    }

    /// Convert to a `geo::Point` (`x` = longitude, `y` = latitude).
    #[inline]
    pub fn to_geo(&self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }
}

impl From<GeoPoint> for geo::Point<f64> {
    fn from(point: GeoPoint) -> Self {
        point.to_geo()
    }
}

impl From<geo::Point<f64>> for GeoPoint {
    fn from(point: geo::Point<f64>) -> Self {
        Self::new(point.y(), point.x())
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}
