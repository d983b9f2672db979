//! Vector-library drawing backend.
//!
//! Draws into an in-memory [`DxfDocument`] and persists it as ASCII DXF. The
//! session is the document: starting a session creates a fresh, empty
//! drawing, closing it discards the drawing.

pub mod document;
mod writer;

use std::path::{Path, PathBuf};

pub use document::{DxfDocument, Entity, Geometry, Layer, PolylineFlags};
pub use writer::encode_document;

use super::error::{DrawingError, DrawingResult};
use super::{
    check_hatch_boundary, ensure_parent_dir, report, ArcParams, BackendKind, BackendSettings,
    CircleParams, DimensionParams, DrawingBackend, EllipseParams, EntityHandle, EntityStyle,
    HatchParams, LineParams, PolylineParams, RectangleParams, SessionState, TextParams,
};
use crate::geometry::Point3;

/// Extension written by this backend.
const DXF_EXTENSION: &str = "dxf";

/// Drawing backend backed by an in-memory DXF document.
#[derive(Debug)]
pub struct DxfBackend {
    settings: BackendSettings,
    state: SessionState,
    document: Option<DxfDocument>,
}

impl DxfBackend {
    /// Creates an unconnected backend.
    #[must_use]
    pub const fn new(settings: BackendSettings) -> Self {
        Self {
            settings,
            state: SessionState::Unconnected,
            document: None,
        }
    }

    /// Returns the active document, if a session is running.
    #[must_use]
    pub fn document(&self) -> Option<&DxfDocument> {
        self.document.as_ref().filter(|_| self.state == SessionState::Ready)
    }

    fn document_mut(&mut self) -> DrawingResult<&mut DxfDocument> {
        if self.state != SessionState::Ready {
            return Err(DrawingError::NotReady);
        }
        self.document.as_mut().ok_or(DrawingError::NotReady)
    }

    /// Adds an entity, creating its layer first when one is requested.
    fn place(
        &mut self,
        geometry: Geometry,
        style: &EntityStyle,
        stroke: bool,
    ) -> DrawingResult<EntityHandle> {
        let lineweight = if stroke {
            style.validated_lineweight()
        } else {
            None
        };
        let doc = self.document_mut()?;
        if let Some(layer) = style.layer_name() {
            doc.ensure_layer(layer, None);
        }
        let handle = doc.add_entity(geometry, style.layer_name(), style.color, lineweight);
        tracing::debug!(handle = format_args!("{handle:X}"), "Added entity");
        Ok(handle_of(handle))
    }

    fn polyline(
        &mut self,
        vertices: Vec<Point3>,
        closed: bool,
        style: &EntityStyle,
    ) -> DrawingResult<EntityHandle> {
        if vertices.len() < 2 {
            return Err(DrawingError::invalid_geometry(
                "polyline needs at least 2 points",
            ));
        }
        let flags = if closed && vertices.len() > 2 {
            PolylineFlags::CLOSED
        } else {
            PolylineFlags::empty()
        };
        self.place(Geometry::Polyline { vertices, flags }, style, true)
    }

    fn hatch(&mut self, params: &HatchParams, style: &EntityStyle) -> DrawingResult<EntityHandle> {
        check_hatch_boundary(params)?;

        let boundary_style = EntityStyle {
            layer: style.layer.clone(),
            ..EntityStyle::default()
        };
        let boundary = self.polyline(params.points.clone(), true, &boundary_style)?;
        let boundary = parse_handle(&boundary)?;

        let hatch = self.place(
            Geometry::Hatch {
                pattern: params.pattern_name.clone(),
                scale: params.scale,
                solid: params.is_solid(),
                boundary,
                path: Vec::new(),
            },
            style,
            false,
        )?;
        self.document_mut()?.evaluate_hatch(parse_handle(&hatch)?)?;
        Ok(hatch)
    }

    fn save(&mut self, path: Option<&Path>) -> DrawingResult<PathBuf> {
        let mut target = self.settings.save_target(path);
        if !target
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(DXF_EXTENSION))
        {
            tracing::info!(
                requested = %target.display(),
                "DXF backend writes DXF, adjusting file extension"
            );
            target.set_extension(DXF_EXTENSION);
        }

        let contents = encode_document(self.document_mut()?);
        ensure_parent_dir(&target)?;
        std::fs::write(&target, contents).map_err(|e| DrawingError::file_write(&target, e))?;

        let target = std::path::absolute(&target).unwrap_or(target);
        tracing::info!(path = %target.display(), "Drawing saved");
        Ok(target)
    }
}

fn handle_of(handle: u32) -> EntityHandle {
    EntityHandle::new(format!("{handle:X}"))
}

fn parse_handle(handle: &EntityHandle) -> DrawingResult<u32> {
    u32::from_str_radix(handle.as_str(), 16).map_err(|_| {
        DrawingError::operation("resolve_handle", format!("invalid handle {handle}"))
    })
}

impl DrawingBackend for DxfBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dxf
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn start_session(&mut self) -> bool {
        if self.state == SessionState::Ready {
            return true;
        }
        if !self.state.can_start() {
            tracing::warn!(state = ?self.state, "Cannot start a session in this state");
            return false;
        }
        self.state = SessionState::Connecting;
        self.document = Some(DxfDocument::new());
        self.state = SessionState::Ready;
        tracing::info!("New DXF drawing created");
        true
    }

    fn create_layer(&mut self, name: &str, color: Option<i16>) -> bool {
        let result = self.document_mut().and_then(|doc| {
            if name.is_empty() {
                return Err(DrawingError::operation("create_layer", "empty layer name"));
            }
            doc.ensure_layer(name, color);
            Ok(())
        });
        report("create_layer", result).is_some()
    }

    fn draw_line(&mut self, params: &LineParams, style: &EntityStyle) -> Option<EntityHandle> {
        let geometry = Geometry::Line {
            start: params.start_point,
            end: params.end_point,
        };
        report("draw_line", self.place(geometry, style, true))
    }

    fn draw_circle(
        &mut self,
        params: &CircleParams,
        style: &EntityStyle,
    ) -> Option<EntityHandle> {
        let geometry = Geometry::Circle {
            center: params.center,
            radius: params.radius,
        };
        report("draw_circle", self.place(geometry, style, true))
    }

    fn draw_arc(&mut self, params: &ArcParams, style: &EntityStyle) -> Option<EntityHandle> {
        let geometry = Geometry::Arc {
            center: params.center,
            radius: params.radius,
            start_angle: params.start_angle,
            end_angle: params.end_angle,
        };
        report("draw_arc", self.place(geometry, style, true))
    }

    fn draw_rectangle(
        &mut self,
        params: &RectangleParams,
        style: &EntityStyle,
    ) -> Option<EntityHandle> {
        let corners = params.outline()[..4].to_vec();
        report("draw_rectangle", self.polyline(corners, true, style))
    }

    fn draw_polyline(
        &mut self,
        params: &PolylineParams,
        style: &EntityStyle,
    ) -> Option<EntityHandle> {
        report(
            "draw_polyline",
            self.polyline(params.points.clone(), params.closed, style),
        )
    }

    fn draw_text(&mut self, params: &TextParams, style: &EntityStyle) -> Option<EntityHandle> {
        let geometry = Geometry::Text {
            insert: params.position,
            height: params.height,
            rotation: params.rotation,
            value: params.text.clone(),
        };
        report("draw_text", self.place(geometry, style, false))
    }

    fn draw_hatch(&mut self, params: &HatchParams, style: &EntityStyle) -> Option<EntityHandle> {
        report("draw_hatch", self.hatch(params, style))
    }

    fn add_dimension(
        &mut self,
        params: &DimensionParams,
        style: &EntityStyle,
    ) -> Option<EntityHandle> {
        let geometry = Geometry::Dimension {
            point1: params.point1,
            point2: params.point2,
            text_position: params.resolved_text_position(),
            text_height: params.text_height,
        };
        report("add_dimension", self.place(geometry, style, false))
    }

    fn draw_ellipse(
        &mut self,
        params: &EllipseParams,
        style: &EntityStyle,
    ) -> Option<EntityHandle> {
        let result = if params.major_axis <= 0.0 {
            Err(DrawingError::invalid_geometry("ellipse major axis must be positive"))
        } else {
            let geometry = Geometry::Ellipse {
                center: params.center,
                major_axis: params.major_axis_vector(),
                ratio: params.axis_ratio(),
            };
            self.place(geometry, style, true)
        };
        report("draw_ellipse", result)
    }

    fn zoom_extents(&mut self) -> bool {
        let result = self.document_mut().map(DxfDocument::fit_view);
        report("zoom_extents", result).is_some()
    }

    fn save_drawing(&mut self, path: Option<&Path>) -> Option<PathBuf> {
        report("save_drawing", self.save(path))
    }

    fn close(&mut self) {
        if self.document.take().is_some() {
            tracing::info!("DXF drawing closed");
        }
        self.state = SessionState::Closed;
    }
}
