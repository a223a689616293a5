//! Great-circle distance helpers.
//!
//! All distances are haversine distances on a sphere of the mean Earth
//! radius, the same model `geo::Haversine` uses, so covering decisions and
//! the final radius filter never disagree by more than floating-point noise.

use super::geohash::CellBounds;
use geo::{Distance, Haversine, Point};
use geokv_types::{GeoCircle, GeoPoint, GeoRect, Region};
use smallvec::{SmallVec, smallvec};
use std::f64::consts::PI;

/// Mean Earth radius (IUGG), the radius `geo::Haversine` measures with.
pub const EARTH_MEAN_RADIUS_METERS: f64 = 6_371_008.8;

/// Length of one degree of arc on a great circle.
pub const METERS_PER_DEGREE: f64 = EARTH_MEAN_RADIUS_METERS * PI / 180.0;

/// Tolerance added to radii when pruning, so points exactly on a circle's
/// boundary are never pruned by rounding.
pub(crate) const DISTANCE_SLACK_METERS: f64 = 0.001;

/// Region pieces that do not cross the antimeridian.
pub type RectPieces = SmallVec<[GeoRect; 2]>;

/// Haversine distance in meters.
#[inline]
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    Haversine.distance(a.to_geo(), b.to_geo())
}

#[inline]
fn distance_raw(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Haversine.distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}

/// Wrap a longitude difference into [-180, 180].
fn wrap_longitude(delta: f64) -> f64 {
    let wrapped = (delta + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && delta > 0.0 { 180.0 } else { wrapped }
}

/// The point diametrically opposite `point`.
pub fn antipode(point: &GeoPoint) -> GeoPoint {
    let lon = point.longitude();
    let opposite = if lon > 0.0 { lon - 180.0 } else { lon + 180.0 };
    GeoPoint::new(-point.latitude(), opposite)
}

/// Lat/lon rectangles bounding a circle, split at the antimeridian.
///
/// A cap that contains a pole is bounded by a full band of longitudes.
pub fn bounding_rects(circle: &GeoCircle) -> RectPieces {
    let lat = circle.center.latitude();
    let lon = circle.center.longitude();
    let angular = (circle.radius_meters + DISTANCE_SLACK_METERS) / EARTH_MEAN_RADIUS_METERS;
    let delta = angular.to_degrees();

    let min_lat = lat - delta;
    let max_lat = lat + delta;
    if min_lat <= GeoPoint::MIN_LATITUDE || max_lat >= GeoPoint::MAX_LATITUDE {
        return smallvec![GeoRect::new(
            GeoPoint::new(min_lat.max(GeoPoint::MIN_LATITUDE), GeoPoint::MIN_LONGITUDE),
            GeoPoint::new(max_lat.min(GeoPoint::MAX_LATITUDE), GeoPoint::MAX_LONGITUDE),
        )];
    }

    // No pole inside, so sin(delta) < cos(lat) and asin is defined.
    let half_width = (angular.sin() / lat.to_radians().cos()).asin().to_degrees();
    let west = lon - half_width;
    let east = lon + half_width;

    let band = |w: f64, e: f64| GeoRect::new(GeoPoint::new(min_lat, w), GeoPoint::new(max_lat, e));
    if west < GeoPoint::MIN_LONGITUDE {
        smallvec![
            band(west + 360.0, GeoPoint::MAX_LONGITUDE),
            band(GeoPoint::MIN_LONGITUDE, east),
        ]
    } else if east > GeoPoint::MAX_LONGITUDE {
        smallvec![
            band(west, GeoPoint::MAX_LONGITUDE),
            band(GeoPoint::MIN_LONGITUDE, east - 360.0),
        ]
    } else {
        smallvec![band(west, east)]
    }
}

/// Shortest great-circle distance from `point` to any point of `bounds`.
///
/// Zero when the point lies inside. Otherwise the minimum is on the box
/// boundary: a corner, the foot of the perpendicular onto a meridian edge,
/// or the point of a parallel edge at the same longitude.
pub fn min_distance_to_box(point: &GeoPoint, bounds: &CellBounds) -> f64 {
    if bounds.contains(point) {
        return 0.0;
    }

    let (lat_c, lon_c) = (point.latitude(), point.longitude());
    let mut best = f64::INFINITY;
    let mut consider = |lat: f64, lon: f64| {
        best = best.min(distance_raw(lat_c, lon_c, lat, lon));
    };

    for lat in [bounds.min_latitude, bounds.max_latitude] {
        for lon in [bounds.min_longitude, bounds.max_longitude] {
            consider(lat, lon);
        }
    }

    for edge_lon in [bounds.min_longitude, bounds.max_longitude] {
        let dlon = wrap_longitude(edge_lon - lon_c);
        let foot = if dlon.abs() < 90.0 {
            (lat_c.to_radians().tan() / dlon.to_radians().cos())
                .atan()
                .to_degrees()
        } else if lat_c >= 0.0 {
            GeoPoint::MAX_LATITUDE
        } else {
            GeoPoint::MIN_LATITUDE
        };
        consider(foot.clamp(bounds.min_latitude, bounds.max_latitude), edge_lon);
    }

    if (bounds.min_longitude..=bounds.max_longitude).contains(&lon_c) {
        consider(bounds.min_latitude, lon_c);
        consider(bounds.max_latitude, lon_c);
    }

    best
}

/// Longest great-circle distance from `point` to any point of `bounds`.
pub fn max_distance_to_box(point: &GeoPoint, bounds: &CellBounds) -> f64 {
    PI * EARTH_MEAN_RADIUS_METERS - min_distance_to_box(&antipode(point), bounds)
}

/// Characteristic size of a region in meters: a circle's diameter or a
/// rectangle's longer side (measured along its widest parallel).
pub fn extent_meters(region: &Region) -> f64 {
    match region {
        Region::Circle(circle) => 2.0 * circle.radius_meters,
        Region::Rectangle(rect) => {
            let lat_side = rect.latitude_span() * METERS_PER_DEGREE;
            let widest_cos = if rect.min_latitude() <= 0.0 && rect.max_latitude() >= 0.0 {
                1.0
            } else {
                rect.min_latitude()
                    .to_radians()
                    .cos()
                    .max(rect.max_latitude().to_radians().cos())
            };
            let lon_side = rect.longitude_span() * METERS_PER_DEGREE * widest_cos;
            lat_side.max(lon_side)
        }
    }
}

/// Latitude used when picking a resolution for `region`.
pub fn reference_latitude(region: &Region) -> f64 {
    match region {
        Region::Circle(circle) => circle.center.latitude(),
        Region::Rectangle(rect) => rect.center().latitude(),
    }
}
