//! Mapping between indexed points and store items.

use crate::compute::geohash::{GeohashValue, encode};
use crate::compute::partition::PartitionKeyMapper;
use crate::compute::validation::validate_point;
use crate::config::AttributeNames;
use crate::error::{GeoError, Result};
use crate::storage::{AttributeValue, Item};
use geojson::{Geometry, Value};
use geokv_types::GeoPoint;
use std::collections::BTreeMap;

/// A point as stored in the index: primary key, geohash, location and the
/// caller's payload attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedItem {
    pub partition_key: u64,
    pub range_key: String,
    pub geohash: GeohashValue,
    pub point: GeoPoint,
    /// Payload attributes; never contains the index's own attribute names.
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl IndexedItem {
    /// Hash `point` and derive its partition key.
    ///
    /// # Errors
    ///
    /// `InvalidCoordinate` for a bad point, `InvalidConfig` for an empty
    /// range key or a payload attribute named like an index attribute.
    pub fn new(
        point: GeoPoint,
        range_key: impl Into<String>,
        attributes: BTreeMap<String, AttributeValue>,
        mapper: &PartitionKeyMapper,
        names: &AttributeNames,
    ) -> Result<Self> {
        let range_key = range_key.into();
        if range_key.is_empty() {
            return Err(GeoError::InvalidConfig("range key must not be empty".into()));
        }
        if let Some(name) = attributes.keys().find(|name| names.is_reserved(name)) {
            return Err(GeoError::InvalidConfig(format!(
                "attribute '{}' is reserved by the index",
                name
            )));
        }

        let geohash = encode(&point)?;
        Ok(Self {
            partition_key: mapper.partition_key_of(geohash),
            range_key,
            geohash,
            point,
            attributes,
        })
    }

    pub fn geo_json(&self) -> Result<String> {
        point_to_geojson(&self.point)
    }

    /// Store representation: the four index attributes plus the payload.
    pub fn to_item(&self, names: &AttributeNames) -> Result<Item> {
        let mut item = self.attributes.clone();
        item.insert(
            names.hash_key.clone(),
            AttributeValue::UInt(self.partition_key),
        );
        item.insert(
            names.range_key.clone(),
            AttributeValue::String(self.range_key.clone()),
        );
        item.insert(
            names.geohash.clone(),
            AttributeValue::UInt(self.geohash.as_u64()),
        );
        item.insert(names.geo_json.clone(), AttributeValue::String(self.geo_json()?));
        Ok(item)
    }

    /// Parse a stored item.
    ///
    /// # Errors
    ///
    /// `MalformedItem` when an index attribute is missing, has the wrong
    /// type, or the geometry is not a valid GeoJSON point.
    pub fn from_item(mut item: Item, names: &AttributeNames) -> Result<Self> {
        let partition_key = take(&mut item, &names.hash_key)?
            .as_u64()
            .ok_or_else(|| wrong_type(&names.hash_key, "an unsigned number"))?;
        let range_key = match take(&mut item, &names.range_key)? {
            AttributeValue::String(s) => s,
            _ => return Err(wrong_type(&names.range_key, "a string")),
        };
        let geohash = take(&mut item, &names.geohash)?
            .as_u64()
            .map(GeohashValue::new)
            .ok_or_else(|| wrong_type(&names.geohash, "an unsigned number"))?;
        let point = match take(&mut item, &names.geo_json)? {
            AttributeValue::String(json) => point_from_geojson(&json)?,
            _ => return Err(wrong_type(&names.geo_json, "a GeoJSON string")),
        };

        Ok(Self {
            partition_key,
            range_key,
            geohash,
            point,
            attributes: item,
        })
    }
}

fn take(item: &mut Item, name: &str) -> Result<AttributeValue> {
    item.remove(name)
        .ok_or_else(|| GeoError::MalformedItem(format!("missing attribute '{}'", name)))
}

fn wrong_type(name: &str, expected: &str) -> GeoError {
    GeoError::MalformedItem(format!("attribute '{}' must be {}", name, expected))
}

/// GeoJSON `Point` geometry, coordinates in `[longitude, latitude]` order.
pub fn point_to_geojson(point: &GeoPoint) -> Result<String> {
    let geom = Geometry::new(Value::Point(vec![point.longitude(), point.latitude()]));
    Ok(serde_json::to_string(&geom)?)
}

/// Parse a GeoJSON `Point` geometry.
pub fn point_from_geojson(json: &str) -> Result<GeoPoint> {
    let geom: Geometry = serde_json::from_str(json)
        .map_err(|e| GeoError::MalformedItem(format!("failed to parse GeoJSON: {}", e)))?;

    match geom.value {
        Value::Point(coords) => {
            if coords.len() < 2 {
                return Err(GeoError::MalformedItem(
                    "Point must have at least 2 coordinates".to_string(),
                ));
            }
            let point = GeoPoint::new(coords[1], coords[0]);
            validate_point(&point).map_err(|e| GeoError::MalformedItem(e.to_string()))?;
            Ok(point)
        }
        _ => Err(GeoError::MalformedItem(
            "GeoJSON geometry is not a Point".to_string(),
        )),
    }
}
