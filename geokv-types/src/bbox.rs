use crate::point::GeoPoint;
use serde::{Deserialize, Serialize};

/// An axis-aligned latitude/longitude rectangle.
///
/// `min` is the south-west corner and `max` the north-east corner. When
/// `min.longitude() > max.longitude()` the rectangle crosses the antimeridian:
/// it spans from `min.longitude()` eastwards through ±180° to
/// `max.longitude()`.
///
/// All containment checks are inclusive on every edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRect {
    pub min: GeoPoint,
    pub max: GeoPoint,
}

impl GeoRect {
    /// Create a rectangle from its south-west and north-east corners.
    ///
    /// # Examples
    ///
    /// ```
    /// use geokv_types::{GeoPoint, GeoRect};
    ///
    /// // Fiji straddles the antimeridian.
    /// let fiji = GeoRect::new(GeoPoint::new(-21.0, 177.0), GeoPoint::new(-12.0, -178.0));
    /// assert!(fiji.crosses_antimeridian());
    /// assert!(fiji.contains(&GeoPoint::new(-17.7, 179.999)));
    /// assert!(fiji.contains(&GeoPoint::new(-17.7, -179.5)));
    /// assert!(!fiji.contains(&GeoPoint::new(-17.7, 0.0)));
    /// ```
    pub const fn new(min: GeoPoint, max: GeoPoint) -> Self {
        Self { min, max }
    }

    pub fn min_latitude(&self) -> f64 {
        self.min.latitude()
    }

    pub fn max_latitude(&self) -> f64 {
        self.max.latitude()
    }

    pub fn min_longitude(&self) -> f64 {
        self.min.longitude()
    }

    pub fn max_longitude(&self) -> f64 {
        self.max.longitude()
    }

    /// True when the rectangle wraps across ±180° longitude.
    pub fn crosses_antimeridian(&self) -> bool {
        self.min.longitude() > self.max.longitude()
    }

    /// Longitudinal span in degrees, accounting for antimeridian wrap.
    pub fn longitude_span(&self) -> f64 {
        if self.crosses_antimeridian() {
            (180.0 - self.min.longitude()) + (self.max.longitude() + 180.0)
        } else {
            self.max.longitude() - self.min.longitude()
        }
    }

    pub fn latitude_span(&self) -> f64 {
        self.max.latitude() - self.min.latitude()
    }

    /// Inclusive point-in-rectangle test.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        let lat = point.latitude();
        let lon = point.longitude();

        if lat < self.min.latitude() || lat > self.max.latitude() {
            return false;
        }

        if self.crosses_antimeridian() {
            lon >= self.min.longitude() || lon <= self.max.longitude()
        } else {
            lon >= self.min.longitude() && lon <= self.max.longitude()
        }
    }

    /// Split into rectangles that do not cross the antimeridian.
    ///
    /// Returns one piece for an ordinary rectangle and two for a wrapping
    /// one (`[min_lon, 180]` and `[-180, max_lon]`).
    pub fn split_antimeridian(&self) -> Vec<GeoRect> {
        if !self.crosses_antimeridian() {
            return vec![*self];
        }

        vec![
            GeoRect::new(
                self.min,
                GeoPoint::new(self.max.latitude(), GeoPoint::MAX_LONGITUDE),
            ),
            GeoRect::new(
                GeoPoint::new(self.min.latitude(), GeoPoint::MIN_LONGITUDE),
                self.max,
            ),
        ]
    }

    /// Center of the rectangle, wrapping the longitude back into range.
    pub fn center(&self) -> GeoPoint {
        let lat = (self.min.latitude() + self.max.latitude()) / 2.0;
        let mut lon = self.min.longitude() + self.longitude_span() / 2.0;
        if lon > GeoPoint::MAX_LONGITUDE {
            lon -= 360.0;
        }
        GeoPoint::new(lat, lon)
    }
}
