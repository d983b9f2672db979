//! Typed parameter records for each drawable shape.
//!
//! Angles are always in degrees at this level. Backends convert to radians
//! only where the underlying primitive expects them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::Point3;

/// Default text height in drawing units.
pub const DEFAULT_TEXT_HEIGHT: f64 = 2.5;

/// Default hatch pattern.
pub const DEFAULT_HATCH_PATTERN: &str = "ANSI31";

/// Default dimension text height.
pub const DEFAULT_DIMENSION_TEXT_HEIGHT: f64 = 5.0;

/// Vertical offset of an automatically placed dimension text.
pub const DIMENSION_TEXT_OFFSET: f64 = 5.0;

/// The drawable shape kinds recognised from free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    /// Straight line segment.
    Line,
    /// Full circle.
    Circle,
    /// Circular arc.
    Arc,
    /// Axis-aligned rectangle.
    Rectangle,
    /// Open or closed polyline.
    Polyline,
    /// Single-line text.
    Text,
    /// Pattern-filled region.
    Hatch,
    /// Aligned linear dimension.
    Dimension,
}

impl ShapeKind {
    /// Returns the lower-case shape name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Circle => "circle",
            Self::Arc => "arc",
            Self::Rectangle => "rectangle",
            Self::Polyline => "polyline",
            Self::Text => "text",
            Self::Hatch => "hatch",
            Self::Dimension => "dimension",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line from `start_point` to `end_point`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineParams {
    /// Start of the segment.
    pub start_point: Point3,
    /// End of the segment.
    pub end_point: Point3,
}

/// Circle by center and radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleParams {
    /// Circle center.
    pub center: Point3,
    /// Circle radius.
    pub radius: f64,
}

/// Counter-clockwise arc from `start_angle` to `end_angle` (degrees).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcParams {
    /// Arc center.
    pub center: Point3,
    /// Arc radius.
    pub radius: f64,
    /// Start angle in degrees.
    pub start_angle: f64,
    /// End angle in degrees.
    pub end_angle: f64,
}

/// Rectangle spanned by two opposite corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangleParams {
    /// First corner.
    pub corner1: Point3,
    /// Opposite corner.
    pub corner2: Point3,
}

impl RectangleParams {
    /// Returns the closed outline: four corners followed by the start corner.
    ///
    /// All corners take the `z` of `corner1`.
    #[must_use]
    pub fn outline(&self) -> [Point3; 5] {
        let Point3 { x: x1, y: y1, z } = self.corner1;
        let Point3 { x: x2, y: y2, .. } = self.corner2;
        [
            Point3::new(x1, y1, z),
            Point3::new(x2, y1, z),
            Point3::new(x2, y2, z),
            Point3::new(x1, y2, z),
            Point3::new(x1, y1, z),
        ]
    }
}

/// Polyline through `points`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolylineParams {
    /// Vertices in drawing order.
    pub points: Vec<Point3>,
    /// Whether the last vertex connects back to the first.
    #[serde(default)]
    pub closed: bool,
}

/// Single-line text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextParams {
    /// Insertion point.
    pub position: Point3,
    /// Text content.
    pub text: String,
    /// Text height.
    #[serde(default = "default_text_height")]
    pub height: f64,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
}

const fn default_text_height() -> f64 {
    DEFAULT_TEXT_HEIGHT
}

/// Hatch filling the region bounded by `points`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HatchParams {
    /// Outer boundary vertices (closed implicitly).
    #[serde(alias = "outer_loop_points")]
    pub points: Vec<Point3>,
    /// Hatch pattern name.
    #[serde(default = "default_pattern_name")]
    pub pattern_name: String,
    /// Pattern scale.
    #[serde(default = "default_pattern_scale")]
    pub scale: f64,
}

fn default_pattern_name() -> String {
    DEFAULT_HATCH_PATTERN.to_string()
}

const fn default_pattern_scale() -> f64 {
    1.0
}

impl HatchParams {
    /// Returns `true` for the solid-fill pattern.
    #[must_use]
    pub fn is_solid(&self) -> bool {
        self.pattern_name.eq_ignore_ascii_case("SOLID")
    }
}

/// Aligned dimension between `point1` and `point2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionParams {
    /// First measured point.
    pub point1: Point3,
    /// Second measured point.
    pub point2: Point3,
    /// Dimension text location; defaults to just above the midpoint.
    #[serde(default)]
    pub text_position: Option<Point3>,
    /// Dimension text height.
    #[serde(default)]
    pub text_height: Option<f64>,
}

impl DimensionParams {
    /// Returns the text position, computing the default when absent.
    #[must_use]
    pub fn resolved_text_position(&self) -> Point3 {
        self.text_position.unwrap_or_else(|| {
            self.point1
                .midpoint(self.point2)
                .offset(0.0, DIMENSION_TEXT_OFFSET)
        })
    }
}

/// Ellipse by center, axis lengths and rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EllipseParams {
    /// Ellipse center.
    pub center: Point3,
    /// Major axis length (from center).
    pub major_axis: f64,
    /// Minor axis length (from center).
    pub minor_axis: f64,
    /// Rotation of the major axis in degrees.
    #[serde(default)]
    pub rotation: f64,
}

impl EllipseParams {
    /// Returns the major axis end point relative to the center.
    #[must_use]
    pub fn major_axis_vector(&self) -> Point3 {
        let rad = self.rotation.to_radians();
        Point3::xy(self.major_axis * rad.cos(), self.major_axis * rad.sin())
    }

    /// Returns the minor/major axis ratio.
    #[must_use]
    pub fn axis_ratio(&self) -> f64 {
        self.minor_axis / self.major_axis
    }
}

/// Parameters for one of the free-text shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeParams {
    /// Line parameters.
    Line(LineParams),
    /// Circle parameters.
    Circle(CircleParams),
    /// Arc parameters.
    Arc(ArcParams),
    /// Rectangle parameters.
    Rectangle(RectangleParams),
    /// Polyline parameters.
    Polyline(PolylineParams),
    /// Text parameters.
    Text(TextParams),
    /// Hatch parameters.
    Hatch(HatchParams),
    /// Dimension parameters.
    Dimension(DimensionParams),
}

impl ShapeParams {
    /// Returns the shape kind these parameters describe.
    #[must_use]
    pub const fn kind(&self) -> ShapeKind {
        match self {
            Self::Line(_) => ShapeKind::Line,
            Self::Circle(_) => ShapeKind::Circle,
            Self::Arc(_) => ShapeKind::Arc,
            Self::Rectangle(_) => ShapeKind::Rectangle,
            Self::Polyline(_) => ShapeKind::Polyline,
            Self::Text(_) => ShapeKind::Text,
            Self::Hatch(_) => ShapeKind::Hatch,
            Self::Dimension(_) => ShapeKind::Dimension,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_outline_is_closed() {
        let rect = RectangleParams {
            corner1: Point3::xy(0.0, 0.0),
            corner2: Point3::xy(4.0, 2.0),
        };
        let outline = rect.outline();
        assert_eq!(outline[0], outline[4]);
        assert_eq!(outline[2], Point3::xy(4.0, 2.0));
        assert_eq!(outline[1], Point3::xy(4.0, 0.0));
    }

    #[test]
    fn dimension_default_text_position() {
        let dim = DimensionParams {
            point1: Point3::xy(0.0, 0.0),
            point2: Point3::xy(10.0, 0.0),
            text_position: None,
            text_height: None,
        };
        assert_eq!(dim.resolved_text_position(), Point3::xy(5.0, 5.0));
    }

    #[test]
    fn text_defaults_from_json() {
        let text: TextParams =
            serde_json::from_str(r#"{"position": [1, 2], "text": "hello"}"#).unwrap();
        assert!((text.height - DEFAULT_TEXT_HEIGHT).abs() < f64::EPSILON);
        assert!(text.rotation.abs() < f64::EPSILON);
        assert_eq!(text.position, Point3::xy(1.0, 2.0));
    }

    #[test]
    fn hatch_defaults_and_alias() {
        let hatch: HatchParams =
            serde_json::from_str(r#"{"outer_loop_points": [[0,0],[1,0],[1,1]]}"#).unwrap();
        assert_eq!(hatch.pattern_name, DEFAULT_HATCH_PATTERN);
        assert_eq!(hatch.points.len(), 3);
        assert!(!hatch.is_solid());
    }

    #[test]
    fn ellipse_axis_vector_follows_rotation() {
        let ellipse = EllipseParams {
            center: Point3::default(),
            major_axis: 10.0,
            minor_axis: 5.0,
            rotation: 90.0,
        };
        let v = ellipse.major_axis_vector();
        assert!(v.x.abs() < 1e-9);
        assert!((v.y - 10.0).abs() < 1e-9);
        assert!((ellipse.axis_ratio() - 0.5).abs() < f64::EPSILON);
    }
}
