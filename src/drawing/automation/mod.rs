//! Live-application drawing backend.
//!
//! Drives a running AutoCAD-compatible application through the object model
//! in [`api`]. Connecting attaches to a running instance first and launches a
//! fresh one only when none is found, waiting for it to finish starting up.
//!
//! Every operation regenerates the display and then pauses for the configured
//! command delay so the host can keep up.

pub mod api;
#[cfg(windows)]
mod com;

use std::fmt;
use std::path::{Path, PathBuf};

pub use api::{
    CadApplication, CadConnector, CadDocument, CadProduct, ObjectId, Property,
    PATTERN_TYPE_PREDEFINED,
};
#[cfg(windows)]
pub use com::ComConnector;

use super::error::{DrawingError, DrawingResult};
use super::params::DEFAULT_DIMENSION_TEXT_HEIGHT;
use super::{
    check_hatch_boundary, ensure_parent_dir, report, ArcParams, BackendKind, BackendSettings,
    CircleParams, DimensionParams, DrawingBackend, EllipseParams, EntityHandle, EntityStyle,
    HatchParams, LineParams, PolylineParams, RectangleParams, SessionState, TextParams,
};
use crate::geometry::Point3;

/// Drawing backend backed by a live CAD application.
pub struct AutomationBackend {
    connector: Box<dyn CadConnector>,
    settings: BackendSettings,
    state: SessionState,
    app: Option<Box<dyn CadApplication>>,
    doc: Option<Box<dyn CadDocument>>,
}

impl fmt::Debug for AutomationBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutomationBackend")
            .field("product", &self.settings.product)
            .field("state", &self.state)
            .field("attached", &self.doc.is_some())
            .finish_non_exhaustive()
    }
}

/// Flattens points into the `x, y, z, x, y, z, ...` layout polylines take.
fn flatten(points: &[Point3]) -> Vec<f64> {
    points.iter().flat_map(|p| p.to_array()).collect()
}

fn handle_of(id: ObjectId) -> EntityHandle {
    EntityHandle::new(id.0)
}

/// Opens the active document, or a new one if none is open.
fn open_document(app: &mut dyn CadApplication) -> DrawingResult<Box<dyn CadDocument>> {
    if app.document_count()? > 0 {
        if let Some(doc) = app.active_document()? {
            return Ok(doc);
        }
    }
    tracing::info!("No open drawing, creating a new one");
    app.add_document()
}

/// Creates `name` if it does not exist, then makes it current.
///
/// Returns `true` if the layer was created.
fn ensure_layer(doc: &mut dyn CadDocument, name: &str, color: Option<i16>) -> DrawingResult<bool> {
    let exists = doc.layer_names()?.iter().any(|n| n == name);
    if !exists {
        doc.add_layer(name)?;
        if let Some(color) = color {
            doc.set_layer_color(name, color)?;
        }
        tracing::info!(layer = %name, "Created layer");
    }
    doc.set_active_layer(name)?;
    Ok(!exists)
}

/// Applies layer, colour and (for stroke entities) lineweight to a new entity.
fn apply_style(
    doc: &mut dyn CadDocument,
    id: &ObjectId,
    style: &EntityStyle,
    stroke: bool,
) -> DrawingResult<()> {
    if let Some(layer) = style.layer_name() {
        ensure_layer(doc, layer, None)?;
        doc.set_property(id, Property::Layer(layer.to_string()))?;
    }
    if let Some(color) = style.color {
        doc.set_property(id, Property::Color(color))?;
    }
    if stroke {
        if let Some(lineweight) = style.validated_lineweight() {
            doc.set_property(id, Property::LineWeight(lineweight))?;
        }
    }
    Ok(())
}

fn add_polyline(
    doc: &mut dyn CadDocument,
    points: &[Point3],
    closed: bool,
) -> DrawingResult<ObjectId> {
    if points.len() < 2 {
        return Err(DrawingError::invalid_geometry(
            "polyline needs at least 2 points",
        ));
    }
    let id = doc.add_polyline(&flatten(points))?;
    if closed && points.len() > 2 {
        doc.set_property(&id, Property::Closed(true))?;
    }
    Ok(id)
}

fn add_hatch(
    doc: &mut dyn CadDocument,
    params: &HatchParams,
    style: &EntityStyle,
) -> DrawingResult<ObjectId> {
    check_hatch_boundary(params)?;

    let boundary = add_polyline(doc, &params.points, true)?;
    if let Some(layer) = style.layer_name() {
        ensure_layer(doc, layer, None)?;
        doc.set_property(&boundary, Property::Layer(layer.to_string()))?;
    }

    let hatch = doc.add_hatch(PATTERN_TYPE_PREDEFINED, &params.pattern_name, true)?;
    doc.append_outer_loop(&hatch, std::slice::from_ref(&boundary))?;
    if !params.is_solid() {
        doc.set_property(&hatch, Property::PatternScale(params.scale))?;
    }
    apply_style(doc, &hatch, style, false)?;
    doc.evaluate(&hatch)?;
    Ok(hatch)
}

impl AutomationBackend {
    /// Creates an unconnected backend that reaches the application through `connector`.
    #[must_use]
    pub fn new(connector: Box<dyn CadConnector>, settings: BackendSettings) -> Self {
        Self {
            connector,
            settings,
            state: SessionState::Unconnected,
            app: None,
            doc: None,
        }
    }

    /// Attaches to a running instance, or launches one.
    fn connect(&mut self) -> DrawingResult<()> {
        let product = self.settings.product;
        let prog_id = product.prog_id();

        let mut app = match self.connector.attach(prog_id) {
            Ok(app) => {
                tracing::info!(%product, "Attached to running instance");
                app
            }
            Err(e) => {
                tracing::info!(%product, reason = %e, "No running instance, launching");
                let app = self
                    .connector
                    .launch(prog_id)
                    .map_err(|e| DrawingError::connection(product.display_name(), e.to_string()))?;
                tracing::info!(
                    wait_secs = self.settings.startup_wait.as_secs_f64(),
                    "Waiting for application startup"
                );
                std::thread::sleep(self.settings.startup_wait);
                app
            }
        };
        app.set_visible(true)?;

        let doc = open_document(app.as_mut())?;
        let name = doc.name()?;
        tracing::info!(document = %name, "Drawing document ready");

        self.app = Some(app);
        self.doc = Some(doc);
        Ok(())
    }

    /// Attaches again after the document handle was lost.
    fn reattach(&mut self) -> DrawingResult<()> {
        tracing::info!("Re-attaching to the drawing host");
        let product = self.settings.product;
        let mut app = self
            .connector
            .attach(product.prog_id())
            .map_err(|e| DrawingError::connection(product.display_name(), e.to_string()))?;
        let doc = open_document(app.as_mut())?;
        doc.name()?;
        self.app = Some(app);
        self.doc = Some(doc);
        Ok(())
    }

    fn document(&mut self) -> DrawingResult<&mut dyn CadDocument> {
        if self.state != SessionState::Ready {
            return Err(DrawingError::NotReady);
        }
        if self.doc.is_none() {
            if let Err(e) = self.reattach() {
                self.state = SessionState::Unconnected;
                return Err(e);
            }
        }
        match self.doc.as_deref_mut() {
            Some(doc) => Ok(doc),
            None => Err(DrawingError::Disconnected),
        }
    }

    /// Runs one operation against the document, then refreshes the view.
    fn run<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut dyn CadDocument) -> DrawingResult<T>,
    ) -> Option<T> {
        let delay = self.settings.command_delay;
        let result = self.document().and_then(|doc| {
            let value = f(&mut *doc)?;
            doc.regen()?;
            Ok(value)
        });

        if result.as_ref().is_err_and(|e| e.is_disconnect()) {
            tracing::warn!(operation, "Lost the document handle");
            self.doc = None;
            self.app = None;
        }

        let value = report(operation, result);
        if value.is_some() && !delay.is_zero() {
            std::thread::sleep(delay);
        }
        value
    }

    fn draw(
        &mut self,
        operation: &'static str,
        style: &EntityStyle,
        stroke: bool,
        add: impl FnOnce(&mut dyn CadDocument) -> DrawingResult<ObjectId>,
    ) -> Option<EntityHandle> {
        self.run(operation, |doc| {
            let id = add(&mut *doc)?;
            apply_style(doc, &id, style, stroke)?;
            Ok(handle_of(id))
        })
    }
}

impl DrawingBackend for AutomationBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Automation
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
        match self.connect() {
            Ok(()) => {
                self.state = SessionState::Ready;
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to start drawing session");
                self.app = None;
                self.doc = None;
                self.state = SessionState::Unconnected;
                false
            }
        }
    }

    fn create_layer(&mut self, name: &str, color: Option<i16>) -> bool {
        self.run("create_layer", |doc| {
            if name.is_empty() {
                return Err(DrawingError::operation("create_layer", "empty layer name"));
            }
            ensure_layer(doc, name, color)
        })
        .is_some()
    }

    fn draw_line(&mut self, params: &LineParams, style: &EntityStyle) -> Option<EntityHandle> {
        self.draw("draw_line", style, true, |doc| {
            doc.add_line(params.start_point.to_array(), params.end_point.to_array())
        })
    }

    fn draw_circle(
        &mut self,
        params: &CircleParams,
        style: &EntityStyle,
    ) -> Option<EntityHandle> {
        self.draw("draw_circle", style, true, |doc| {
            doc.add_circle(params.center.to_array(), params.radius)
        })
    }

    fn draw_arc(&mut self, params: &ArcParams, style: &EntityStyle) -> Option<EntityHandle> {
        self.draw("draw_arc", style, true, |doc| {
            doc.add_arc(
                params.center.to_array(),
                params.radius,
                params.start_angle.to_radians(),
                params.end_angle.to_radians(),
            )
        })
    }

    fn draw_rectangle(
        &mut self,
        params: &RectangleParams,
        style: &EntityStyle,
    ) -> Option<EntityHandle> {
        self.draw("draw_rectangle", style, true, |doc| {
            let id = doc.add_polyline(&flatten(&params.outline()))?;
            doc.set_property(&id, Property::Closed(true))?;
            Ok(id)
        })
    }

    fn draw_polyline(
        &mut self,
        params: &PolylineParams,
        style: &EntityStyle,
    ) -> Option<EntityHandle> {
        self.draw("draw_polyline", style, true, |doc| {
            add_polyline(doc, &params.points, params.closed)
        })
    }

    fn draw_text(&mut self, params: &TextParams, style: &EntityStyle) -> Option<EntityHandle> {
        self.draw("draw_text", style, false, |doc| {
            let id = doc.add_text(&params.text, params.position.to_array(), params.height)?;
            if params.rotation != 0.0 {
                doc.set_property(&id, Property::Rotation(params.rotation.to_radians()))?;
            }
            Ok(id)
        })
    }

    fn draw_hatch(&mut self, params: &HatchParams, style: &EntityStyle) -> Option<EntityHandle> {
        self.run("draw_hatch", |doc| add_hatch(doc, params, style).map(handle_of))
    }

    fn add_dimension(
        &mut self,
        params: &DimensionParams,
        style: &EntityStyle,
    ) -> Option<EntityHandle> {
        self.draw("add_dimension", style, false, |doc| {
            let id = doc.add_dim_aligned(
                params.point1.to_array(),
                params.point2.to_array(),
                params.resolved_text_position().to_array(),
            )?;
            let height = params.text_height.unwrap_or(DEFAULT_DIMENSION_TEXT_HEIGHT);
            doc.set_property(&id, Property::TextHeight(height))?;
            Ok(id)
        })
    }

    fn draw_ellipse(
        &mut self,
        params: &EllipseParams,
        style: &EntityStyle,
    ) -> Option<EntityHandle> {
        self.draw("draw_ellipse", style, true, |doc| {
            if params.major_axis <= 0.0 {
                return Err(DrawingError::invalid_geometry(
                    "ellipse major axis must be positive",
                ));
            }
            doc.add_ellipse(
                params.center.to_array(),
                params.major_axis_vector().to_array(),
                params.axis_ratio(),
            )
        })
    }

    fn zoom_extents(&mut self) -> bool {
        self.run("zoom_extents", |doc| doc.zoom_extents()).is_some()
    }

    fn save_drawing(&mut self, path: Option<&Path>) -> Option<PathBuf> {
        let target = self.settings.save_target(path);
        self.run("save_drawing", |doc| {
            ensure_parent_dir(&target)?;
            let target = std::path::absolute(&target)
                .map_err(|e| DrawingError::file_write(&target, e))?;
            doc.save_as(&target)?;
            tracing::info!(path = %target.display(), "Drawing saved");
            Ok(target)
        })
    }

    fn close(&mut self) {
        if self.doc.take().is_some() {
            tracing::info!("Released the drawing document");
        }
        self.app = None;
        self.state = SessionState::Closed;
    }
}
