//! # geokv-types
//!
//! Geographic value types shared by the geokv index layers.
//!
//! - **Points**: `GeoPoint`, an immutable latitude/longitude pair
//! - **Regions**: `GeoRect` (antimeridian-aware), `GeoCircle` and the `Region`
//!   union accepted by the covering generator
//!
//! All types are serializable with Serde and convert to and from the `geo`
//! crate's primitives.
//!
//! ## Examples
//!
//! ```rust
//! use geokv_types::{GeoCircle, GeoPoint, GeoRect};
//!
//! let seattle = GeoPoint::new(47.61121, -122.31846);
//! let downtown = GeoRect::new(GeoPoint::new(47.60, -122.34), GeoPoint::new(47.62, -122.30));
//! assert!(downtown.contains(&seattle));
//!
//! let nearby = GeoCircle::new(seattle, 5_000.0);
//! assert_eq!(nearby.center, seattle);
//! ```

pub mod bbox;
pub mod point;
pub mod region;

pub use bbox::GeoRect;
pub use point::GeoPoint;
pub use region::{GeoCircle, Region};
