//! In-memory DXF drawing document.
//!
//! Holds the layer table and model-space entities of the active drawing.
//! Handles are shared between layers and entities and are written as hex
//! strings.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::drawing::error::{DrawingError, DrawingResult};
use crate::geometry::Point3;

/// The layer every document starts with.
pub const DEFAULT_LAYER: &str = "0";

/// First handle handed out; lower values are reserved for table objects.
const FIRST_HANDLE: u32 = 0x20;

bitflags! {
    /// `LWPOLYLINE` flags (group 70).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PolylineFlags: i16 {
        /// Last vertex connects to the first.
        const CLOSED = 0x01;
    }
}

/// A layer table record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    /// Layer handle.
    pub handle: u32,
    /// Layer name (case-sensitive, unique).
    pub name: String,
    /// Layer colour index.
    pub color: i16,
}

/// Geometry of a model-space entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// `LINE`.
    Line {
        /// Start point.
        start: Point3,
        /// End point.
        end: Point3,
    },
    /// `CIRCLE`.
    Circle {
        /// Center.
        center: Point3,
        /// Radius.
        radius: f64,
    },
    /// `ARC`. DXF stores arc angles in degrees.
    Arc {
        /// Center.
        center: Point3,
        /// Radius.
        radius: f64,
        /// Start angle in degrees.
        start_angle: f64,
        /// End angle in degrees.
        end_angle: f64,
    },
    /// `LWPOLYLINE`. Vertex `z` values are flattened to the elevation.
    Polyline {
        /// Vertices.
        vertices: Vec<Point3>,
        /// Polyline flags.
        flags: PolylineFlags,
    },
    /// `TEXT`.
    Text {
        /// Insertion point.
        insert: Point3,
        /// Text height.
        height: f64,
        /// Rotation in degrees.
        rotation: f64,
        /// Text content.
        value: String,
    },
    /// `ELLIPSE`.
    Ellipse {
        /// Center.
        center: Point3,
        /// Major axis end point relative to the center.
        major_axis: Point3,
        /// Minor/major axis ratio.
        ratio: f64,
    },
    /// `HATCH` with one associative outer loop.
    Hatch {
        /// Pattern name.
        pattern: String,
        /// Pattern scale.
        scale: f64,
        /// Solid fill instead of a line pattern.
        solid: bool,
        /// Handle of the boundary polyline.
        boundary: u32,
        /// Boundary path, filled in by [`DxfDocument::evaluate_hatch`].
        path: Vec<Point3>,
    },
    /// Aligned `DIMENSION`.
    Dimension {
        /// First extension line origin.
        point1: Point3,
        /// Second extension line origin.
        point2: Point3,
        /// Text midpoint.
        text_position: Point3,
        /// Text height override.
        text_height: Option<f64>,
    },
}

impl Geometry {
    /// Returns the DXF entity type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Line { .. } => "LINE",
            Self::Circle { .. } => "CIRCLE",
            Self::Arc { .. } => "ARC",
            Self::Polyline { .. } => "LWPOLYLINE",
            Self::Text { .. } => "TEXT",
            Self::Ellipse { .. } => "ELLIPSE",
            Self::Hatch { .. } => "HATCH",
            Self::Dimension { .. } => "DIMENSION",
        }
    }

    /// Returns points that bound the geometry, for extents.
    fn extent_points(&self) -> Vec<Point3> {
        match self {
            Self::Line { start, end } => vec![*start, *end],
            Self::Circle { center, radius } | Self::Arc { center, radius, .. } => vec![
                center.offset(-radius, -radius),
                center.offset(*radius, *radius),
            ],
            Self::Polyline { vertices, .. } => vertices.clone(),
            Self::Hatch { path, .. } => path.clone(),
            Self::Text { insert, .. } => vec![*insert],
            Self::Ellipse {
                center, major_axis, ..
            } => {
                let r = major_axis.x.hypot(major_axis.y);
                vec![center.offset(-r, -r), center.offset(r, r)]
            }
            Self::Dimension {
                point1,
                point2,
                text_position,
                ..
            } => vec![*point1, *point2, *text_position],
        }
    }
}

/// A model-space entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Entity handle.
    pub handle: u32,
    /// Layer name.
    pub layer: String,
    /// Colour index; `None` is BYLAYER.
    pub color: Option<i16>,
    /// Lineweight; `None` is BYLAYER.
    pub lineweight: Option<i16>,
    /// Entity geometry.
    pub geometry: Geometry,
}

/// A DXF drawing held in memory.
#[derive(Debug, Clone)]
pub struct DxfDocument {
    layers: IndexMap<String, Layer>,
    active_layer: String,
    entities: Vec<Entity>,
    next_handle: u32,
    view_extents: Option<(Point3, Point3)>,
    created: DateTime<Utc>,
}

impl Default for DxfDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl DxfDocument {
    /// Creates an empty document with the default layer.
    #[must_use]
    pub fn new() -> Self {
        let mut doc = Self {
            layers: IndexMap::new(),
            active_layer: DEFAULT_LAYER.to_string(),
            entities: Vec::new(),
            next_handle: FIRST_HANDLE,
            view_extents: None,
            created: Utc::now(),
        };
        doc.insert_layer(DEFAULT_LAYER, 7);
        doc
    }

    fn allocate_handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn insert_layer(&mut self, name: &str, color: i16) {
        let handle = self.allocate_handle();
        self.layers.insert(
            name.to_string(),
            Layer {
                handle,
                name: name.to_string(),
                color,
            },
        );
    }

    /// Creates `name` if absent and makes it the active layer.
    ///
    /// Returns `true` if the layer was newly created. The colour only applies
    /// to new layers.
    pub fn ensure_layer(&mut self, name: &str, color: Option<i16>) -> bool {
        let created = if self.layers.contains_key(name) {
            false
        } else {
            self.insert_layer(name, color.unwrap_or(7));
            tracing::info!(layer = %name, "Created layer");
            true
        };
        self.active_layer = name.to_string();
        created
    }

    /// Returns `true` if the layer exists.
    #[must_use]
    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    /// Returns the layers in creation order.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    /// Returns the active layer name.
    #[must_use]
    pub fn active_layer(&self) -> &str {
        &self.active_layer
    }

    /// Adds an entity and returns its handle.
    pub fn add_entity(
        &mut self,
        geometry: Geometry,
        layer: Option<&str>,
        color: Option<i16>,
        lineweight: Option<i16>,
    ) -> u32 {
        let handle = self.allocate_handle();
        let layer = layer.unwrap_or(self.active_layer.as_str()).to_string();
        self.entities.push(Entity {
            handle,
            layer,
            color,
            lineweight,
            geometry,
        });
        handle
    }

    /// Returns the model-space entities in creation order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Looks up an entity by handle.
    #[must_use]
    pub fn entity(&self, handle: u32) -> Option<&Entity> {
        self.entities.iter().find(|e| e.handle == handle)
    }

    /// Resolves a hatch's boundary path from its boundary polyline.
    ///
    /// # Errors
    ///
    /// Returns an error if the hatch or its boundary polyline is missing, or
    /// the boundary has fewer than three vertices.
    pub fn evaluate_hatch(&mut self, hatch: u32) -> DrawingResult<()> {
        let boundary = match self.entity(hatch).map(|e| &e.geometry) {
            Some(Geometry::Hatch { boundary, .. }) => *boundary,
            _ => {
                return Err(DrawingError::operation(
                    "evaluate_hatch",
                    format!("entity {hatch:X} is not a hatch"),
                ))
            }
        };

        let vertices = match self.entity(boundary).map(|e| &e.geometry) {
            Some(Geometry::Polyline { vertices, .. }) if vertices.len() >= 3 => vertices.clone(),
            Some(Geometry::Polyline { .. }) => {
                return Err(DrawingError::invalid_geometry(
                    "hatch boundary has fewer than 3 vertices",
                ))
            }
            _ => {
                return Err(DrawingError::operation(
                    "evaluate_hatch",
                    format!("boundary {boundary:X} is not a polyline"),
                ))
            }
        };

        if let Some(Entity {
            geometry: Geometry::Hatch { path, .. },
            ..
        }) = self.entities.iter_mut().find(|e| e.handle == hatch)
        {
            *path = vertices;
        }
        Ok(())
    }

    /// Computes the bounding box of all entities.
    #[must_use]
    pub fn extents(&self) -> Option<(Point3, Point3)> {
        let mut points = self
            .entities
            .iter()
            .flat_map(|e| e.geometry.extent_points());
        let first = points.next()?;
        Some(points.fold((first, first), |(min, max), p| {
            (
                Point3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z)),
                Point3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z)),
            )
        }))
    }

    /// Records the current extents as the saved view.
    pub fn fit_view(&mut self) {
        self.view_extents = self.extents();
    }

    /// Returns the saved view extents.
    #[must_use]
    pub const fn view_extents(&self) -> Option<(Point3, Point3)> {
        self.view_extents
    }

    /// Returns the next unused handle.
    #[must_use]
    pub const fn handle_seed(&self) -> u32 {
        self.next_handle
    }

    /// Returns when the document was created.
    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_default_layer() {
        let doc = DxfDocument::new();
        assert!(doc.has_layer(DEFAULT_LAYER));
        assert_eq!(doc.active_layer(), DEFAULT_LAYER);
        assert!(doc.entities().is_empty());
    }

    #[test]
    fn ensure_layer_is_idempotent() {
        let mut doc = DxfDocument::new();
        assert!(doc.ensure_layer("walls", Some(1)));
        assert!(!doc.ensure_layer("walls", Some(3)));
        assert_eq!(doc.layers().filter(|l| l.name == "walls").count(), 1);
        let walls = doc.layers().find(|l| l.name == "walls").unwrap();
        assert_eq!(walls.color, 1);
        assert_eq!(doc.active_layer(), "walls");
    }

    #[test]
    fn layer_names_are_case_sensitive() {
        let mut doc = DxfDocument::new();
        doc.ensure_layer("Walls", None);
        doc.ensure_layer("walls", None);
        assert_eq!(doc.layers().count(), 3);
    }

    #[test]
    fn entities_default_to_active_layer() {
        let mut doc = DxfDocument::new();
        doc.ensure_layer("dims", None);
        let h = doc.add_entity(
            Geometry::Circle {
                center: Point3::default(),
                radius: 1.0,
            },
            None,
            None,
            None,
        );
        assert_eq!(doc.entity(h).unwrap().layer, "dims");
    }

    #[test]
    fn hatch_evaluation_copies_boundary() {
        let mut doc = DxfDocument::new();
        let vertices = vec![Point3::xy(0.0, 0.0), Point3::xy(1.0, 0.0), Point3::xy(1.0, 1.0)];
        let boundary = doc.add_entity(
            Geometry::Polyline {
                vertices: vertices.clone(),
                flags: PolylineFlags::CLOSED,
            },
            None,
            None,
            None,
        );
        let hatch = doc.add_entity(
            Geometry::Hatch {
                pattern: "ANSI31".to_string(),
                scale: 1.0,
                solid: false,
                boundary,
                path: Vec::new(),
            },
            None,
            None,
            None,
        );
        doc.evaluate_hatch(hatch).unwrap();
        match &doc.entity(hatch).unwrap().geometry {
            Geometry::Hatch { path, .. } => assert_eq!(path, &vertices),
            other => panic!("expected hatch, got {other:?}"),
        }
    }

    #[test]
    fn evaluate_non_hatch_fails() {
        let mut doc = DxfDocument::new();
        let h = doc.add_entity(
            Geometry::Line {
                start: Point3::default(),
                end: Point3::xy(1.0, 1.0),
            },
            None,
            None,
            None,
        );
        assert!(doc.evaluate_hatch(h).is_err());
    }

    #[test]
    fn extents_cover_all_entities() {
        let mut doc = DxfDocument::new();
        assert!(doc.extents().is_none());
        doc.add_entity(
            Geometry::Line {
                start: Point3::xy(-5.0, 0.0),
                end: Point3::xy(5.0, 2.0),
            },
            None,
            None,
            None,
        );
        doc.add_entity(
            Geometry::Circle {
                center: Point3::xy(0.0, 10.0),
                radius: 3.0,
            },
            None,
            None,
            None,
        );
        let (min, max) = doc.extents().unwrap();
        assert_eq!(min, Point3::xy(-5.0, 0.0));
        assert_eq!(max, Point3::xy(5.0, 13.0));
    }
}
