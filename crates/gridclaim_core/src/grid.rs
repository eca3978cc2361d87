//! Grid model: continuous coordinates to discrete cell keys.
//!
//! # Responsibility
//! - Floor a coordinate onto the cell lattice for a given cell size.
//! - Expand a brush anchor into the square footprint it covers.
//!
//! # Invariants
//! - Two coordinates inside the same cell always map to the same key.
//! - A footprint of side `s` contains exactly `s * s` distinct keys.
//! - Footprints extend toward increasing `x` and `y` from the anchor cell.

use crate::model::input::InvalidInput;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Largest absolute cell index accepted. Keeps every index exactly
/// representable in `f64` and leaves headroom for footprint expansion.
pub const MAX_CELL_INDEX: i64 = 1 << 50;

/// A point on the continuous plane (`x` = longitude, `y` = latitude).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rejects coordinates that do not land on the addressable grid.
    pub fn validate(&self, cell_size: f64) -> Result<(), InvalidInput> {
        let limit = MAX_CELL_INDEX as f64;
        let in_range = |value: f64| value.is_finite() && (value / cell_size).abs() < limit;
        if in_range(self.x) && in_range(self.y) {
            Ok(())
        } else {
            Err(InvalidInput::Coordinate {
                x: self.x,
                y: self.y,
            })
        }
    }
}

/// Discrete cell identity: the floored lattice index on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub x: i64,
    pub y: i64,
}

impl CellKey {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Returns the lower-left corner of this cell on the continuous plane.
    pub fn origin(&self, cell_size: f64) -> Coordinate {
        Coordinate::new(self.x as f64 * cell_size, self.y as f64 * cell_size)
    }
}

impl Display for CellKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Validated footprint side length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FootprintSize(u8);

impl FootprintSize {
    pub const SINGLE: FootprintSize = FootprintSize(1);

    /// Accepts `1..=max`.
    pub fn new(side: u8, max: u8) -> Result<Self, InvalidInput> {
        if side == 0 || side > max {
            return Err(InvalidInput::FootprintSize { side, max });
        }
        Ok(Self(side))
    }

    pub fn side(self) -> u8 {
        self.0
    }

    /// Number of cells covered.
    pub fn area(self) -> u32 {
        u32::from(self.0) * u32::from(self.0)
    }
}

/// Inclusive rectangle of cell keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: CellKey,
    pub max: CellKey,
}

impl BoundingBox {
    /// Builds a box from two corner keys in any order.
    pub fn from_corners(a: CellKey, b: CellKey) -> Self {
        Self {
            min: CellKey::new(a.x.min(b.x), a.y.min(b.y)),
            max: CellKey::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Builds the box of every cell touched by the rectangle spanned by two
    /// coordinates.
    pub fn from_coordinates(
        a: Coordinate,
        b: Coordinate,
        cell_size: f64,
    ) -> Result<Self, InvalidInput> {
        a.validate(cell_size)?;
        b.validate(cell_size)?;
        Ok(Self::from_corners(
            cell_key_of(a, cell_size),
            cell_key_of(b, cell_size),
        ))
    }

    pub fn contains(&self, key: CellKey) -> bool {
        (self.min.x..=self.max.x).contains(&key.x) && (self.min.y..=self.max.y).contains(&key.y)
    }
}

/// Floors `coordinate` to the cell that contains it.
pub fn cell_key_of(coordinate: Coordinate, cell_size: f64) -> CellKey {
    CellKey::new(
        floor_index(coordinate.x, cell_size),
        floor_index(coordinate.y, cell_size),
    )
}

/// Returns the `size x size` block of keys anchored at the cell containing
/// `anchor`, sorted by `(x, y)`.
pub fn footprint_of(anchor: Coordinate, cell_size: f64, size: FootprintSize) -> Vec<CellKey> {
    let origin = cell_key_of(anchor, cell_size);
    let side = i64::from(size.side());
    let mut keys = Vec::with_capacity(size.area() as usize);
    for dx in 0..side {
        for dy in 0..side {
            keys.push(CellKey::new(origin.x + dx, origin.y + dy));
        }
    }
    keys
}

fn floor_index(value: f64, cell_size: f64) -> i64 {
    (value / cell_size).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::{cell_key_of, footprint_of, BoundingBox, CellKey, Coordinate, FootprintSize};
    use crate::model::input::InvalidInput;
    use std::collections::BTreeSet;

    const CELL: f64 = 0.0001;

    #[test]
    fn coordinates_in_one_cell_share_a_key() {
        let a = cell_key_of(Coordinate::new(139.65031, 35.67621), CELL);
        let b = cell_key_of(Coordinate::new(139.65039, 35.67629), CELL);
        assert_eq!(a, b);
    }

    #[test]
    fn negative_coordinates_floor_toward_negative_infinity() {
        let key = cell_key_of(Coordinate::new(-0.5, -0.25), 1.0);
        assert_eq!(key, CellKey::new(-1, -1));
        let key = cell_key_of(Coordinate::new(-1.0, 0.0), 1.0);
        assert_eq!(key, CellKey::new(-1, 0));
    }

    #[test]
    fn footprint_has_exactly_side_squared_distinct_keys() {
        for side in 1..=3 {
            let size = FootprintSize::new(side, 3).unwrap();
            let keys = footprint_of(Coordinate::new(10.2, -4.7), 1.0, size);
            let distinct: BTreeSet<_> = keys.iter().copied().collect();
            assert_eq!(keys.len(), usize::from(side) * usize::from(side));
            assert_eq!(distinct.len(), keys.len());
            assert_eq!(keys[0], CellKey::new(10, -5));
            assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn footprint_size_rejects_zero_and_above_max() {
        assert_eq!(
            FootprintSize::new(0, 3).unwrap_err(),
            InvalidInput::FootprintSize { side: 0, max: 3 }
        );
        assert!(FootprintSize::new(4, 3).is_err());
        assert_eq!(FootprintSize::new(3, 3).unwrap().area(), 9);
    }

    #[test]
    fn validate_rejects_non_finite_and_out_of_range() {
        assert!(Coordinate::new(f64::NAN, 0.0).validate(CELL).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).validate(CELL).is_err());
        assert!(Coordinate::new(1e300, 0.0).validate(CELL).is_err());
        assert!(Coordinate::new(139.65, 35.67).validate(CELL).is_ok());
    }

    #[test]
    fn bounding_box_normalizes_corners() {
        let bbox = BoundingBox::from_corners(CellKey::new(5, -1), CellKey::new(-2, 3));
        assert_eq!(bbox.min, CellKey::new(-2, -1));
        assert_eq!(bbox.max, CellKey::new(5, 3));
        assert!(bbox.contains(CellKey::new(0, 0)));
        assert!(bbox.contains(CellKey::new(5, 3)));
        assert!(!bbox.contains(CellKey::new(6, 0)));
    }
}
