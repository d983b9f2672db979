//! Point normalisation.
//!
//! Every coordinate that crosses a parse or dispatch boundary is turned into a
//! fully populated [`Point3`]. Callers may supply 2-component points; the
//! missing `z` is filled with `0.0`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in drawing space. Always fully populated.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "PointRepr", into = "[f64; 3]")]
pub struct Point3 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate (0.0 for planar input).
    pub z: f64,
}

impl Point3 {
    /// Creates a point from three components.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a planar point (`z = 0.0`).
    #[must_use]
    pub const fn xy(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Normalises a caller-supplied coordinate list to three dimensions.
    ///
    /// Two components get `z = 0.0` appended and three are kept as-is. Any
    /// other arity is corrected in place (missing components become `0.0`,
    /// extra components are dropped) and logged as a warning.
    #[must_use]
    pub fn normalize(coords: &[f64]) -> Self {
        match *coords {
            [x, y] => Self::xy(x, y),
            [x, y, z] => Self::new(x, y, z),
            _ => {
                tracing::warn!(
                    components = coords.len(),
                    "Point does not have 2 or 3 components, coercing"
                );
                let get = |i: usize| coords.get(i).copied().unwrap_or(0.0);
                Self::new(get(0), get(1), get(2))
            }
        }
    }

    /// Returns the components as an array.
    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Returns the midpoint between two points.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new(
            (self.x + other.x) / 2.0,
            (self.y + other.y) / 2.0,
            (self.z + other.z) / 2.0,
        )
    }

    /// Returns a copy translated by the given offsets.
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z)
    }
}

impl From<Point3> for [f64; 3] {
    fn from(p: Point3) -> Self {
        p.to_array()
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Wire forms accepted for a point: `[x, y]`, `[x, y, z]` or `{"x":..,"y":..,"z"?:..}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PointRepr {
    List(Vec<f64>),
    Object {
        x: f64,
        y: f64,
        #[serde(default)]
        z: f64,
    },
}

impl From<PointRepr> for Point3 {
    fn from(repr: PointRepr) -> Self {
        match repr {
            PointRepr::List(coords) => Self::normalize(&coords),
            PointRepr::Object { x, y, z } => Self::new(x, y, z),
        }
    }
}
