//! Validation for coordinates and query regions.
//!
//! Every public entry point validates its input here before any store access.

use crate::error::{GeoError, Result};
use geokv_types::{GeoCircle, GeoPoint, GeoRect, Region};

/// Validates a point has a finite latitude in [-90, 90] and a finite
/// longitude in [-180, 180].
///
/// # Examples
///
/// ```
/// use geokv::compute::validation::validate_point;
/// use geokv::GeoPoint;
///
/// assert!(validate_point(&GeoPoint::new(47.61121, -122.31846)).is_ok());
///
/// // Invalid latitude
/// assert!(validate_point(&GeoPoint::new(91.0, 0.0)).is_err());
///
/// // Invalid longitude
/// assert!(validate_point(&GeoPoint::new(0.0, 180.5)).is_err());
/// ```
pub fn validate_point(point: &GeoPoint) -> Result<()> {
    let (lat, lon) = (point.latitude(), point.longitude());

    if !lat.is_finite() {
        return Err(GeoError::InvalidCoordinate(format!(
            "Latitude must be finite, got: {}",
            lat
        )));
    }

    if !lon.is_finite() {
        return Err(GeoError::InvalidCoordinate(format!(
            "Longitude must be finite, got: {}",
            lon
        )));
    }

    if !(GeoPoint::MIN_LATITUDE..=GeoPoint::MAX_LATITUDE).contains(&lat) {
        return Err(GeoError::InvalidCoordinate(format!(
            "Latitude out of range [-90.0, 90.0]: {}",
            lat
        )));
    }

    if !(GeoPoint::MIN_LONGITUDE..=GeoPoint::MAX_LONGITUDE).contains(&lon) {
        return Err(GeoError::InvalidCoordinate(format!(
            "Longitude out of range [-180.0, 180.0]: {}",
            lon
        )));
    }

    Ok(())
}

/// Validates multiple points, reporting the index of the first bad one.
pub fn validate_points(points: &[GeoPoint]) -> Result<()> {
    for (idx, point) in points.iter().enumerate() {
        validate_point(point).map_err(|e| {
            GeoError::InvalidCoordinate(format!("Point at index {}: {}", idx, e))
        })?;
    }
    Ok(())
}

/// Validates a circle: valid center and a finite, strictly positive radius.
pub fn validate_circle(circle: &GeoCircle) -> Result<()> {
    validate_point(&circle.center)?;

    let radius = circle.radius_meters;
    if !radius.is_finite() || radius <= 0.0 {
        return Err(GeoError::InvalidRegion(format!(
            "Radius must be finite and positive, got: {}",
            radius
        )));
    }

    Ok(())
}

/// Validates a rectangle: valid corners and `min_latitude <= max_latitude`.
///
/// `min_longitude > max_longitude` is allowed and means the rectangle
/// crosses the antimeridian.
///
/// # Examples
///
/// ```
/// use geokv::compute::validation::validate_rect;
/// use geokv::{GeoPoint, GeoRect};
///
/// let wrapping = GeoRect::new(GeoPoint::new(-1.0, 179.0), GeoPoint::new(1.0, -179.0));
/// assert!(validate_rect(&wrapping).is_ok());
///
/// let inverted = GeoRect::new(GeoPoint::new(10.0, 0.0), GeoPoint::new(5.0, 1.0));
/// assert!(validate_rect(&inverted).is_err());
/// ```
pub fn validate_rect(rect: &GeoRect) -> Result<()> {
    validate_point(&rect.min)
        .map_err(|e| GeoError::InvalidCoordinate(format!("South-west corner: {}", e)))?;
    validate_point(&rect.max)
        .map_err(|e| GeoError::InvalidCoordinate(format!("North-east corner: {}", e)))?;

    if rect.min_latitude() > rect.max_latitude() {
        return Err(GeoError::InvalidRegion(format!(
            "Minimum latitude {} is greater than maximum latitude {}",
            rect.min_latitude(),
            rect.max_latitude()
        )));
    }

    Ok(())
}

pub fn validate_region(region: &Region) -> Result<()> {
    match region {
        Region::Circle(circle) => validate_circle(circle),
        Region::Rectangle(rect) => validate_rect(rect),
    }
}
