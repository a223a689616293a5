use crate::bbox::GeoRect;
use crate::point::GeoPoint;
use serde::{Deserialize, Serialize};

/// A spherical cap: every point within `radius_meters` great-circle distance
/// of `center`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCircle {
    pub center: GeoPoint,
    pub radius_meters: f64,
}

impl GeoCircle {
    pub const fn new(center: GeoPoint, radius_meters: f64) -> Self {
        Self {
            center,
            radius_meters,
        }
    }
}

/// A query region understood by the covering generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Region {
    Circle(GeoCircle),
    Rectangle(GeoRect),
}

impl From<GeoCircle> for Region {
    fn from(circle: GeoCircle) -> Self {
        Region::Circle(circle)
    }
}

impl From<GeoRect> for Region {
    fn from(rect: GeoRect) -> Self {
        Region::Rectangle(rect)
    }
}
