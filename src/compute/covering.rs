//! Covering of query regions by geohash ranges.
//!
//! The generator walks the implicit quadtree of the 64-bit geohash from the
//! root, pruning nodes disjoint from the region, emitting nodes the region
//! contains, and refining nodes that only intersect it until the requested
//! bit length. Emitted ranges are split per partition and merged, giving the
//! minimal list of `(partition, BETWEEN)` scans the store has to run.
//!
//! The union of the cells always contains every point of the region whose
//! hash falls inside it; the exact shape test happens later, on the items
//! the scans return.

use super::geohash::{CellBounds, MAX_BITS, deinterleave, encode, interleave};
use super::partition::PartitionKeyMapper;
use super::spatial::{
    DISTANCE_SLACK_METERS, RectPieces, bounding_rects, max_distance_to_box, min_distance_to_box,
};
use super::validation::validate_region;
use crate::error::{GeoError, Result};
use geokv_types::{GeoCircle, GeoPoint, GeoRect, Region};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Upper bound on the cells one covering may produce.
pub const MAX_COVERING_CELLS: usize = 1 << 16;

/// Slack for rounding in coordinate quantization, far below the width of
/// the finest node.
const EDGE_TOLERANCE_DEGREES: f64 = 1e-12;

/// One scan unit: a partition key plus an inclusive geohash range inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub partition_key: u64,
    pub min_hash: u64,
    /// Inclusive upper bound.
    pub max_hash: u64,
}

impl Cell {
    pub const fn new(partition_key: u64, min_hash: u64, max_hash: u64) -> Self {
        Self {
            partition_key,
            min_hash,
            max_hash,
        }
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.min_hash <= hash && hash <= self.max_hash
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cell(partition {}, {:#018x}..={:#018x})",
            self.partition_key, self.min_hash, self.max_hash
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Disjoint,
    Intersects,
    Contains,
}

/// Quadtree node: `2^level` slices per axis, `x` along longitude.
#[derive(Debug, Clone, Copy)]
struct Node {
    level: u8,
    x: u64,
    y: u64,
}

impl Node {
    const ROOT: Node = Node {
        level: 0,
        x: 0,
        y: 0,
    };

    fn containing(hash: u64, level: u8) -> Self {
        if level == 0 {
            return Self::ROOT;
        }
        let (x, y) = deinterleave(hash);
        let shift = 32 - level as u32;
        Node {
            level,
            x: (x as u64) >> shift,
            y: (y as u64) >> shift,
        }
    }

    fn children(&self) -> [Node; 4] {
        let level = self.level + 1;
        let (x, y) = (self.x * 2, self.y * 2);
        [
            Node { level, x, y },
            Node { level, x: x + 1, y },
            Node { level, x, y: y + 1 },
            Node {
                level,
                x: x + 1,
                y: y + 1,
            },
        ]
    }

    fn bounds(&self) -> CellBounds {
        CellBounds::for_node(self.level, self.x, self.y)
    }

    /// Inclusive hash range of every point inside the node.
    fn hash_range(&self) -> (u64, u64) {
        if self.level == 0 {
            return (0, u64::MAX);
        }
        let used = 2 * self.level as u32;
        let min = interleave(self.x as u32, self.y as u32) << (64 - used);
        let max = min | u64::MAX.checked_shr(used).unwrap_or(0);
        (min, max)
    }
}

/// Region prepared for node tests.
enum Shape {
    Rect(RectPieces),
    Cap {
        circle: GeoCircle,
        pieces: RectPieces,
    },
}

impl Shape {
    fn new(region: &Region) -> Self {
        match region {
            Region::Rectangle(rect) => {
                Shape::Rect(rect.split_antimeridian().into_iter().collect())
            }
            Region::Circle(circle) => Shape::Cap {
                circle: *circle,
                pieces: bounding_rects(circle),
            },
        }
    }

    fn anchor(&self) -> GeoPoint {
        match self {
            Shape::Rect(pieces) => pieces[0].center(),
            Shape::Cap { circle, .. } => circle.center,
        }
    }

    fn relate(&self, bounds: &CellBounds) -> Relation {
        match self {
            Shape::Rect(pieces) => relate_pieces(pieces, bounds),
            Shape::Cap { circle, pieces } => {
                if relate_pieces(pieces, bounds) == Relation::Disjoint {
                    return Relation::Disjoint;
                }
                let radius = circle.radius_meters;
                if min_distance_to_box(&circle.center, bounds) > radius + DISTANCE_SLACK_METERS {
                    Relation::Disjoint
                } else if max_distance_to_box(&circle.center, bounds) <= radius {
                    Relation::Contains
                } else {
                    Relation::Intersects
                }
            }
        }
    }
}

/// Nodes own their lower edges: a point exactly on a node's upper edge
/// hashes into the next node, except on the 90°/180° edges of the world.
fn below(node_max: f64, piece_min: f64, world_max: f64) -> bool {
    node_max < piece_min - EDGE_TOLERANCE_DEGREES || (node_max == piece_min && node_max < world_max)
}

fn relate_rect(piece: &GeoRect, bounds: &CellBounds) -> Relation {
    if below(bounds.max_longitude, piece.min_longitude(), GeoPoint::MAX_LONGITUDE)
        || below(bounds.max_latitude, piece.min_latitude(), GeoPoint::MAX_LATITUDE)
        || bounds.min_longitude > piece.max_longitude() + EDGE_TOLERANCE_DEGREES
        || bounds.min_latitude > piece.max_latitude() + EDGE_TOLERANCE_DEGREES
    {
        return Relation::Disjoint;
    }
    if bounds.min_longitude >= piece.min_longitude()
        && bounds.max_longitude <= piece.max_longitude()
        && bounds.min_latitude >= piece.min_latitude()
        && bounds.max_latitude <= piece.max_latitude()
    {
        return Relation::Contains;
    }
    Relation::Intersects
}

fn relate_pieces(pieces: &[GeoRect], bounds: &CellBounds) -> Relation {
    let mut relation = Relation::Disjoint;
    for piece in pieces {
        match relate_rect(piece, bounds) {
            Relation::Contains => return Relation::Contains,
            Relation::Intersects => relation = Relation::Intersects,
            Relation::Disjoint => {}
        }
    }
    relation
}

/// Sort by `(partition, min)` and merge overlapping or adjacent ranges that
/// share a partition key.
fn merge_cells(mut cells: Vec<Cell>) -> Vec<Cell> {
    cells.sort_unstable_by_key(|c| (c.partition_key, c.min_hash));
    let mut merged: Vec<Cell> = Vec::with_capacity(cells.len());
    for cell in cells {
        if let Some(last) = merged.last_mut()
            && last.partition_key == cell.partition_key
            && cell.min_hash <= last.max_hash.saturating_add(1)
        {
            last.max_hash = last.max_hash.max(cell.max_hash);
            continue;
        }
        merged.push(cell);
    }
    merged
}

/// Computes coverings for one table's partitioning.
///
/// # Examples
///
/// ```
/// use geokv::compute::covering::CoveringGenerator;
/// use geokv::compute::partition::PartitionKeyMapper;
/// use geokv::{GeoCircle, GeoPoint, Region};
///
/// let generator = CoveringGenerator::new(PartitionKeyMapper::new(16).unwrap());
/// let region = Region::Circle(GeoCircle::new(GeoPoint::new(47.61121, -122.31846), 5_000.0));
/// let cells = generator.cover(&region, 26).unwrap();
/// assert!(!cells.is_empty());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CoveringGenerator {
    mapper: PartitionKeyMapper,
}

impl CoveringGenerator {
    pub fn new(mapper: PartitionKeyMapper) -> Self {
        Self { mapper }
    }

    pub fn mapper(&self) -> &PartitionKeyMapper {
        &self.mapper
    }

    /// Cells whose union contains `region`, refined to `bit_length` bits.
    ///
    /// The result is sorted by `(partition_key, min_hash)`, ranges within a
    /// partition never overlap or touch, and it is never empty for a valid
    /// region.
    ///
    /// # Errors
    ///
    /// - `InvalidCoordinate`/`InvalidRegion` for a malformed region
    /// - `InvalidConfig` when `bit_length` exceeds 64
    /// - `CoveringTooLarge` when the covering would need more than
    ///   [`MAX_COVERING_CELLS`] cells
    pub fn cover(&self, region: &Region, bit_length: u8) -> Result<Vec<Cell>> {
        validate_region(region)?;
        if bit_length > MAX_BITS {
            return Err(GeoError::InvalidConfig(format!(
                "bit length must be at most {}, got {}",
                MAX_BITS, bit_length
            )));
        }

        let max_level = bit_length.div_ceil(2);
        let shape = Shape::new(region);

        let mut ranges: SmallVec<[(u64, u64); 32]> = SmallVec::new();
        let mut pending = vec![Node::ROOT];
        while let Some(node) = pending.pop() {
            match shape.relate(&node.bounds()) {
                Relation::Disjoint => {}
                Relation::Intersects if node.level < max_level => {
                    pending.extend(node.children());
                }
                Relation::Intersects | Relation::Contains => {
                    ranges.push(node.hash_range());
                    if ranges.len() > MAX_COVERING_CELLS {
                        return Err(self.too_large());
                    }
                }
            }
        }

        if ranges.is_empty() {
            let anchor = encode(&shape.anchor())?;
            ranges.push(Node::containing(anchor.as_u64(), max_level).hash_range());
        }

        let mut cells = Vec::with_capacity(ranges.len());
        for (min, max) in ranges {
            let count = self.mapper.partition_count(min, max);
            if cells.len() as u64 + count > MAX_COVERING_CELLS as u64 {
                return Err(self.too_large());
            }
            cells.extend(self.mapper.split(min, max));
        }

        let cells = merge_cells(cells);
        log::trace!(
            "covered region with {} cell(s) at {} bits",
            cells.len(),
            bit_length
        );
        Ok(cells)
    }

    fn too_large(&self) -> GeoError {
        GeoError::CoveringTooLarge {
            limit: MAX_COVERING_CELLS,
            hash_key_length: self.mapper.hash_key_length(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::spatial::distance_meters;
    use rand::Rng;

    fn generator(hash_key_length: u8) -> CoveringGenerator {
        CoveringGenerator::new(PartitionKeyMapper::new(hash_key_length).unwrap())
    }

    fn covered(cells: &[Cell], point: &GeoPoint) -> bool {
        let hash = encode(point).unwrap().as_u64();
        cells.iter().any(|c| c.contains(hash))
    }

    fn assert_well_formed(cells: &[Cell], mapper: &PartitionKeyMapper) {
        assert!(!cells.is_empty());
        for cell in cells {
            assert!(cell.min_hash <= cell.max_hash);
            let (lo, hi) = mapper.partition_range(cell.partition_key);
            assert!(lo <= cell.min_hash && cell.max_hash <= hi, "{}", cell);
        }
        for pair in cells.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!((a.partition_key, a.min_hash) < (b.partition_key, b.min_hash));
            if a.partition_key == b.partition_key {
                assert!(a.max_hash.saturating_add(1) < b.min_hash);
            }
        }
    }

    #[test]
    fn test_node_hash_ranges() {
        assert_eq!(Node::ROOT.hash_range(), (0, u64::MAX));
        let [sw, se, nw, ne] = Node::ROOT.children();
        assert_eq!(sw.hash_range(), (0, (1 << 62) - 1));
        assert_eq!(nw.hash_range(), (1 << 62, (1 << 63) - 1));
        assert_eq!(se.hash_range(), (1 << 63, (1 << 63) + (1 << 62) - 1));
        assert_eq!(ne.hash_range(), (3 << 62, u64::MAX));

        let leaf = Node::containing(0xDEAD_BEEF_0000_0001, 32);
        assert_eq!(leaf.hash_range(), (0xDEAD_BEEF_0000_0001, 0xDEAD_BEEF_0000_0001));
    }

    #[test]
    fn test_merge_adjacent_and_overlapping() {
        let cells = vec![
            Cell::new(1, 10, 19),
            Cell::new(1, 0, 9),
            Cell::new(1, 15, 30),
            Cell::new(1, 40, 50),
            Cell::new(0, 5, 6),
        ];
        assert_eq!(
            merge_cells(cells),
            vec![Cell::new(0, 5, 6), Cell::new(1, 0, 30), Cell::new(1, 40, 50)]
        );
        assert_eq!(
            merge_cells(vec![Cell::new(0, 0, u64::MAX), Cell::new(0, u64::MAX, u64::MAX)]),
            vec![Cell::new(0, 0, u64::MAX)]
        );
    }

    #[test]
    fn test_circle_covering_contains_every_point() {
        let generator = generator(16);
        let center = GeoPoint::new(47.61121, -122.31846);
        let circle = GeoCircle::new(center, 5_000.0);
        let cells = generator.cover(&Region::Circle(circle), 28).unwrap();
        assert_well_formed(&cells, generator.mapper());

        let mut rng = rand::thread_rng();
        for _ in 0..2_000 {
            let p = GeoPoint::new(
                center.latitude() + rng.gen_range(-0.05..0.05),
                center.longitude() + rng.gen_range(-0.08..0.08),
            );
            if distance_meters(&center, &p) <= 5_000.0 {
                assert!(covered(&cells, &p), "{} not covered", p);
            }
        }
    }

    #[test]
    fn test_rect_covering_contains_corners() {
        let generator = generator(12);
        let rect = GeoRect::new(GeoPoint::new(40.0, -75.0), GeoPoint::new(41.0, -73.5));
        let cells = generator.cover(&Region::Rectangle(rect), 20).unwrap();
        assert_well_formed(&cells, generator.mapper());
        for p in [
            rect.min,
            rect.max,
            GeoPoint::new(40.0, -73.5),
            GeoPoint::new(41.0, -75.0),
            rect.center(),
        ] {
            assert!(covered(&cells, &p), "{} not covered", p);
        }
    }

    #[test]
    fn test_antimeridian_rect() {
        let generator = generator(16);
        let rect = GeoRect::new(GeoPoint::new(-1.0, 179.0), GeoPoint::new(1.0, -179.0));
        let cells = generator.cover(&Region::Rectangle(rect), 24).unwrap();
        assert_well_formed(&cells, generator.mapper());
        assert!(covered(&cells, &GeoPoint::new(0.0, 179.999)));
        assert!(covered(&cells, &GeoPoint::new(0.0, -179.999)));
        assert!(covered(&cells, &GeoPoint::new(0.0, 180.0)));
        assert!(covered(&cells, &GeoPoint::new(0.0, -180.0)));
        assert!(!covered(&cells, &GeoPoint::new(0.0, 0.0)));
    }

    #[test]
    fn test_polar_circle() {
        let generator = generator(8);
        let circle = GeoCircle::new(GeoPoint::new(89.95, 10.0), 20_000.0);
        let cells = generator.cover(&Region::Circle(circle), 20).unwrap();
        assert_well_formed(&cells, generator.mapper());
        // Across the pole, on the opposite meridian.
        assert!(covered(&cells, &GeoPoint::new(89.95, -170.0)));
        assert!(covered(&cells, &GeoPoint::new(90.0, 0.0)));
    }

    #[test]
    fn test_degenerate_regions_yield_cells() {
        let generator = generator(16);
        let p = GeoPoint::new(12.5, 34.25);
        let cells = generator
            .cover(&Region::Rectangle(GeoRect::new(p, p)), 64)
            .unwrap();
        assert!(!cells.is_empty());
        assert!(covered(&cells, &p));

        let tiny = GeoCircle::new(p, 0.0001);
        let cells = generator.cover(&Region::Circle(tiny), 64).unwrap();
        assert!(covered(&cells, &p));
    }

    #[test]
    fn test_contained_node_is_one_range() {
        // Exactly the north-east quadrant at level 1.
        let generator = generator(2);
        let rect = GeoRect::new(GeoPoint::new(0.0, 0.0), GeoPoint::new(90.0, 180.0));
        let cells = generator.cover(&Region::Rectangle(rect), 40).unwrap();
        assert!(cells.contains(&Cell::new(3, 3 << 62, u64::MAX)));
    }

    #[test]
    fn test_whole_world_at_fine_partitioning_is_rejected() {
        let generator = generator(32);
        let world = GeoRect::new(GeoPoint::new(-90.0, -180.0), GeoPoint::new(90.0, 180.0));
        let err = generator.cover(&Region::Rectangle(world), 32).unwrap_err();
        assert!(matches!(
            err,
            GeoError::CoveringTooLarge {
                limit: MAX_COVERING_CELLS,
                hash_key_length: 32
            }
        ));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_invalid_input() {
        let generator = generator(16);
        let bad = GeoCircle::new(GeoPoint::new(0.0, 0.0), -1.0);
        assert!(matches!(
            generator.cover(&Region::Circle(bad), 20),
            Err(GeoError::InvalidRegion(_))
        ));
        let ok = GeoCircle::new(GeoPoint::new(0.0, 0.0), 10.0);
        assert!(matches!(
            generator.cover(&Region::Circle(ok), 65),
            Err(GeoError::InvalidConfig(_))
        ));
    }
}
