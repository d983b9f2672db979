//! Command dispatch.
//!
//! The [`Dispatcher`] is the single entry point that turns a parsed
//! free-text command or a structured [`Action`] into exactly one
//! [`DrawingBackend`] call, and the call's result into a uniform
//! [`Outcome`]. Parse failures and unknown commands are answered here
//! without touching the backend.

pub mod request;

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

pub use request::{
    Action, CommandRequest, LayerRequest, RequestError, SaveRequest, StyleRequest, Styled,
    ACTION_NAMES,
};

use crate::command::{parse_command, DrawCommand, ParsedCommand};
use crate::drawing::{
    ColorSpec, DrawingBackend, EntityHandle, EntityStyle, ShapeKind, ShapeParams,
    MIN_HATCH_POINTS,
};

/// Result of one dispatched operation, as reported to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Why it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Handle of the created entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<EntityHandle>,
    /// File written by a save.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Human-readable summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Outcome {
    /// A successful outcome.
    #[must_use]
    pub fn success() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    /// A failed outcome.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attaches an entity handle.
    #[must_use]
    pub fn with_handle(mut self, handle: EntityHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Attaches a written file.
    #[must_use]
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Attaches a summary message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Renders the outcome as JSON.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Checks that a parameter record has what its operation needs.
///
/// Guards against a record whose kind disagrees with the requested shape or
/// whose point lists are too short.
fn validate(shape: ShapeKind, params: &ShapeParams) -> Result<(), String> {
    if params.kind() != shape {
        return Err(format!(
            "Parameters for {} cannot draw a {shape}",
            params.kind()
        ));
    }
    match params {
        ShapeParams::Polyline(p) if p.points.len() < 2 => {
            Err("Polyline needs at least 2 points".to_string())
        }
        ShapeParams::Hatch(h) if h.points.len() < MIN_HATCH_POINTS => Err(format!(
            "Hatch boundary needs at least {MIN_HATCH_POINTS} points"
        )),
        ShapeParams::Text(t) if t.text.trim().is_empty() => {
            Err("Text content is empty".to_string())
        }
        _ => Ok(()),
    }
}

/// Routes commands and actions to one backend.
pub struct Dispatcher<'a> {
    backend: &'a mut dyn DrawingBackend,
}

impl<'a> Dispatcher<'a> {
    /// Creates a dispatcher over `backend`.
    pub fn new(backend: &'a mut dyn DrawingBackend) -> Self {
        Self { backend }
    }

    /// Parses and dispatches a free-text command.
    pub fn handle_text(&mut self, text: &str) -> Outcome {
        self.dispatch(&parse_command(text))
    }

    /// Decodes and executes a `{"action": ..., "params": ...}` request.
    pub fn handle_request(&mut self, request: &Value) -> Outcome {
        match Action::from_request(request) {
            Ok(action) => self.execute(&action),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected request");
                Outcome::failure(e.to_string())
            }
        }
    }

    /// Dispatches a parsed free-text command.
    pub fn dispatch(&mut self, command: &ParsedCommand) -> Outcome {
        match command {
            ParsedCommand::Unknown { original_text } => {
                Outcome::failure(format!("Could not understand command: {original_text}"))
            }
            ParsedCommand::Save { filename } => self.save(filename.as_deref().map(Path::new)),
            ParsedCommand::Draw(draw) => self.dispatch_draw(draw),
        }
    }

    fn dispatch_draw(&mut self, draw: &DrawCommand) -> Outcome {
        let params = match &draw.params {
            Ok(params) => params,
            Err(e) => return Outcome::failure(format!("Error parsing command: {e}")),
        };
        let style = EntityStyle {
            color: draw.color.as_ref().map(ColorSpec::index),
            layer: draw.layer.clone(),
            lineweight: None,
        };
        self.draw(draw.shape, params, &style)
    }

    /// Executes a structured action.
    pub fn execute(&mut self, action: &Action) -> Outcome {
        tracing::debug!(action = action.name(), "Executing action");
        match action {
            Action::DrawLine(r) => self.draw_styled(ShapeParams::Line(r.params.clone()), &r.style),
            Action::DrawCircle(r) => {
                self.draw_styled(ShapeParams::Circle(r.params.clone()), &r.style)
            }
            Action::DrawArc(r) => self.draw_styled(ShapeParams::Arc(r.params.clone()), &r.style),
            Action::DrawRectangle(r) => {
                self.draw_styled(ShapeParams::Rectangle(r.params.clone()), &r.style)
            }
            Action::DrawPolyline(r) => {
                self.draw_styled(ShapeParams::Polyline(r.params.clone()), &r.style)
            }
            Action::DrawText(r) => self.draw_styled(ShapeParams::Text(r.params.clone()), &r.style),
            Action::DrawHatch(r) => {
                self.draw_styled(ShapeParams::Hatch(r.params.clone()), &r.style)
            }
            Action::AddDimension(r) => {
                self.draw_styled(ShapeParams::Dimension(r.params.clone()), &r.style)
            }
            Action::DrawEllipse(r) => {
                let handle = self.backend.draw_ellipse(&r.params, &r.style.resolve());
                self.entity_outcome("draw_ellipse", handle)
            }
            Action::CreateLayer(r) => {
                let color = r.color.as_ref().map(ColorSpec::index);
                if self.backend.create_layer(&r.name, color) {
                    Outcome::success().with_message(format!("Layer '{}' is active", r.name))
                } else {
                    self.failed("create_layer")
                }
            }
            Action::ZoomExtents => {
                if self.backend.zoom_extents() {
                    Outcome::success()
                } else {
                    self.failed("zoom_extents")
                }
            }
            Action::SaveDrawing(r) => self.save(r.filename.as_deref().map(Path::new)),
            Action::ProcessCommand(r) => {
                let outcome = self.handle_text(&r.command);
                if outcome.ok && outcome.message.is_none() {
                    outcome.with_message(format!("Processed command: {}", r.command))
                } else {
                    outcome
                }
            }
        }
    }

    fn draw_styled(&mut self, params: ShapeParams, style: &StyleRequest) -> Outcome {
        self.draw(params.kind(), &params, &style.resolve())
    }

    fn draw(&mut self, shape: ShapeKind, params: &ShapeParams, style: &EntityStyle) -> Outcome {
        if let Err(e) = validate(shape, params) {
            tracing::warn!(%shape, error = %e, "Parameter validation failed");
            return Outcome::failure(e);
        }

        let backend = &mut *self.backend;
        let (operation, handle) = match params {
            ShapeParams::Line(p) => ("draw_line", backend.draw_line(p, style)),
            ShapeParams::Circle(p) => ("draw_circle", backend.draw_circle(p, style)),
            ShapeParams::Arc(p) => ("draw_arc", backend.draw_arc(p, style)),
            ShapeParams::Rectangle(p) => ("draw_rectangle", backend.draw_rectangle(p, style)),
            ShapeParams::Polyline(p) => ("draw_polyline", backend.draw_polyline(p, style)),
            ShapeParams::Text(p) => ("draw_text", backend.draw_text(p, style)),
            ShapeParams::Hatch(p) => ("draw_hatch", backend.draw_hatch(p, style)),
            ShapeParams::Dimension(p) => ("add_dimension", backend.add_dimension(p, style)),
        };
        self.entity_outcome(operation, handle)
    }

    fn save(&mut self, path: Option<&Path>) -> Outcome {
        match self.backend.save_drawing(path) {
            Some(written) => Outcome::success()
                .with_message(format!("Drawing saved to {}", written.display()))
                .with_path(written),
            None => self.failed("save_drawing"),
        }
    }

    fn entity_outcome(&self, operation: &str, handle: Option<EntityHandle>) -> Outcome {
        match handle {
            Some(handle) => Outcome::success().with_handle(handle),
            None => self.failed(operation),
        }
    }

    fn failed(&self, operation: &str) -> Outcome {
        if self.backend.is_running() {
            Outcome::failure(format!("{operation} failed"))
        } else {
            Outcome::failure(format!("{operation} failed: no active drawing session"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::dxf::DxfBackend;
    use crate::drawing::{BackendSettings, PolylineParams, TextParams};
    use crate::geometry::Point3;
    use serde_json::json;

    fn ready() -> DxfBackend {
        let mut backend = DxfBackend::new(BackendSettings::default());
        assert!(backend.start_session());
        backend
    }

    #[test]
    fn validation_rejects_mismatched_kind() {
        let params = ShapeParams::Polyline(PolylineParams {
            points: vec![Point3::default(), Point3::xy(1.0, 1.0)],
            closed: false,
        });
        assert!(validate(ShapeKind::Line, &params).is_err());
        assert!(validate(ShapeKind::Polyline, &params).is_ok());
    }

    #[test]
    fn validation_rejects_empty_text() {
        let params = ShapeParams::Text(TextParams {
            position: Point3::default(),
            text: "  ".to_string(),
            height: 2.5,
            rotation: 0.0,
        });
        assert_eq!(
            validate(ShapeKind::Text, &params),
            Err("Text content is empty".to_string())
        );
    }

    #[test]
    fn unknown_command_has_no_side_effects() {
        let mut backend = ready();
        let outcome = Dispatcher::new(&mut backend).handle_text("sing a song");
        assert!(!outcome.ok);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Could not understand command: sing a song")
        );
        assert!(backend.document().unwrap().entities().is_empty());
    }

    #[test]
    fn parse_error_short_circuits() {
        let mut backend = ready();
        let outcome = Dispatcher::new(&mut backend).handle_text("draw a line");
        assert_eq!(
            outcome.error.as_deref(),
            Some("Error parsing command: Insufficient coordinates for line")
        );
        assert!(backend.document().unwrap().entities().is_empty());
    }

    #[test]
    fn outcome_serialises_without_empty_fields() {
        assert_eq!(Outcome::success().to_value(), json!({"ok": true}));
        assert_eq!(
            Outcome::failure("nope").to_value(),
            json!({"ok": false, "error": "nope"})
        );
    }
}
