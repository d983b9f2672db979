//! Structured requests.
//!
//! A request is `{"action": <name>, "params": {...}}`. Action names map onto
//! the closed [`Action`] enum; anything else is rejected before any backend
//! call is made.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::drawing::{
    ArcParams, CircleParams, ColorSpec, DimensionParams, EllipseParams, EntityStyle,
    HatchParams, LineParams, PolylineParams, RectangleParams, TextParams,
};

/// Errors decoding a structured request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The action name is not one of the supported operations.
    #[error("Unsupported action: {action}")]
    UnsupportedAction {
        /// The name given by the caller.
        action: String,
    },

    /// The request has no `action` string.
    #[error("Missing 'action' in request")]
    MissingAction,

    /// The parameters do not match the action.
    #[error("Invalid parameters for {action}: {source}")]
    InvalidParams {
        /// The action being decoded.
        action: &'static str,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// Style fields accepted alongside any draw action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StyleRequest {
    /// Palette name or raw colour index.
    #[serde(default)]
    pub color: Option<ColorSpec>,
    /// Target layer.
    #[serde(default)]
    pub layer: Option<String>,
    /// Lineweight in hundredths of a millimetre.
    #[serde(default)]
    pub lineweight: Option<i32>,
}

impl StyleRequest {
    /// Resolves the colour and builds the style handed to a backend.
    #[must_use]
    pub fn resolve(&self) -> EntityStyle {
        EntityStyle {
            color: self.color.as_ref().map(ColorSpec::index),
            layer: self.layer.clone(),
            lineweight: self.lineweight,
        }
    }
}

/// Shape parameters together with their style.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Styled<P> {
    /// Geometry.
    #[serde(flatten)]
    pub params: P,
    /// Colour, layer and lineweight.
    #[serde(flatten)]
    pub style: StyleRequest,
}

/// Parameters of `create_layer`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayerRequest {
    /// Layer name.
    pub name: String,
    /// Colour applied when the layer is created.
    #[serde(default)]
    pub color: Option<ColorSpec>,
}

/// Parameters of `save_drawing`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SaveRequest {
    /// Target file; the configured default when absent.
    #[serde(default, alias = "path")]
    pub filename: Option<String>,
}

/// Parameters of `process_command`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandRequest {
    /// Free-text command.
    pub command: String,
}

/// Every operation a caller may request.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// `draw_line`.
    DrawLine(Styled<LineParams>),
    /// `draw_circle`.
    DrawCircle(Styled<CircleParams>),
    /// `draw_arc`.
    DrawArc(Styled<ArcParams>),
    /// `draw_rectangle`.
    DrawRectangle(Styled<RectangleParams>),
    /// `draw_polyline`.
    DrawPolyline(Styled<PolylineParams>),
    /// `draw_text`.
    DrawText(Styled<TextParams>),
    /// `draw_hatch`.
    DrawHatch(Styled<HatchParams>),
    /// `add_dimension`.
    AddDimension(Styled<DimensionParams>),
    /// `draw_ellipse`.
    DrawEllipse(Styled<EllipseParams>),
    /// `create_layer`.
    CreateLayer(LayerRequest),
    /// `zoom_extents`.
    ZoomExtents,
    /// `save_drawing`.
    SaveDrawing(SaveRequest),
    /// `process_command`.
    ProcessCommand(CommandRequest),
}

/// Names of all supported actions.
pub const ACTION_NAMES: &[&str] = &[
    "draw_line",
    "draw_circle",
    "draw_arc",
    "draw_rectangle",
    "draw_polyline",
    "draw_text",
    "draw_hatch",
    "add_dimension",
    "draw_ellipse",
    "create_layer",
    "zoom_extents",
    "save_drawing",
    "process_command",
];

fn decode<T: DeserializeOwned>(action: &'static str, params: Value) -> Result<T, RequestError> {
    // Absent params decode like an empty object.
    let params = if params.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        params
    };
    serde_json::from_value(params).map_err(|source| RequestError::InvalidParams { action, source })
}

impl Action {
    /// Builds an action from its name and parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::UnsupportedAction`] for unknown names and
    /// [`RequestError::InvalidParams`] when `params` does not fit the action.
    pub fn from_parts(action: &str, params: Value) -> Result<Self, RequestError> {
        let action = match action {
            "draw_line" => Self::DrawLine(decode("draw_line", params)?),
            "draw_circle" => Self::DrawCircle(decode("draw_circle", params)?),
            "draw_arc" => Self::DrawArc(decode("draw_arc", params)?),
            "draw_rectangle" => Self::DrawRectangle(decode("draw_rectangle", params)?),
            "draw_polyline" => Self::DrawPolyline(decode("draw_polyline", params)?),
            "draw_text" => Self::DrawText(decode("draw_text", params)?),
            "draw_hatch" => Self::DrawHatch(decode("draw_hatch", params)?),
            "add_dimension" => Self::AddDimension(decode("add_dimension", params)?),
            "draw_ellipse" => Self::DrawEllipse(decode("draw_ellipse", params)?),
            "create_layer" => Self::CreateLayer(decode("create_layer", params)?),
            "zoom_extents" => Self::ZoomExtents,
            "save_drawing" => Self::SaveDrawing(decode("save_drawing", params)?),
            "process_command" => Self::ProcessCommand(decode("process_command", params)?),
            other => {
                return Err(RequestError::UnsupportedAction {
                    action: other.to_string(),
                })
            }
        };
        Ok(action)
    }

    /// Builds an action from a `{"action": ..., "params": ...}` object.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::MissingAction`] if there is no action name,
    /// otherwise as [`Action::from_parts`].
    pub fn from_request(request: &Value) -> Result<Self, RequestError> {
        let action = request
            .get("action")
            .and_then(Value::as_str)
            .ok_or(RequestError::MissingAction)?;
        let params = request.get("params").cloned().unwrap_or(Value::Null);
        Self::from_parts(action, params)
    }

    /// Returns the action name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DrawLine(_) => "draw_line",
            Self::DrawCircle(_) => "draw_circle",
            Self::DrawArc(_) => "draw_arc",
            Self::DrawRectangle(_) => "draw_rectangle",
            Self::DrawPolyline(_) => "draw_polyline",
            Self::DrawText(_) => "draw_text",
            Self::DrawHatch(_) => "draw_hatch",
            Self::AddDimension(_) => "add_dimension",
            Self::DrawEllipse(_) => "draw_ellipse",
            Self::CreateLayer(_) => "create_layer",
            Self::ZoomExtents => "zoom_extents",
            Self::SaveDrawing(_) => "save_drawing",
            Self::ProcessCommand(_) => "process_command",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3;
    use serde_json::json;

    #[test]
    fn circle_request_decodes() {
        let action = Action::from_request(&json!({
            "action": "draw_circle",
            "params": {"center": [0, 0, 0], "radius": 5, "color": "red", "layer": "holes"}
        }))
        .unwrap();
        match action {
            Action::DrawCircle(Styled { params, style }) => {
                assert_eq!(params.center, Point3::default());
                assert!((params.radius - 5.0).abs() < f64::EPSILON);
                assert_eq!(style.resolve().color, Some(1));
                assert_eq!(style.layer.as_deref(), Some("holes"));
            }
            other => panic!("expected circle, got {other:?}"),
        }
    }

    #[test]
    fn two_component_points_are_normalised() {
        let action = Action::from_parts(
            "draw_line",
            json!({"start_point": [1, 2], "end_point": {"x": 3, "y": 4}}),
        )
        .unwrap();
        match action {
            Action::DrawLine(Styled { params, .. }) => {
                assert_eq!(params.start_point, Point3::xy(1.0, 2.0));
                assert_eq!(params.end_point, Point3::xy(3.0, 4.0));
            }
            other => panic!("expected line, got {other:?}"),
        }
    }

    #[test]
    fn unknown_action_rejected() {
        let err = Action::from_parts("delete_everything", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported action: delete_everything");
    }

    #[test]
    fn missing_action_rejected() {
        assert!(matches!(
            Action::from_request(&json!({"params": {}})),
            Err(RequestError::MissingAction)
        ));
    }

    #[test]
    fn bad_params_rejected() {
        let err = Action::from_parts("draw_circle", json!({"center": [0, 0]})).unwrap_err();
        assert!(matches!(
            err,
            RequestError::InvalidParams {
                action: "draw_circle",
                ..
            }
        ));
    }

    #[test]
    fn optional_params_may_be_absent() {
        assert_eq!(
            Action::from_request(&json!({"action": "save_drawing"})).unwrap(),
            Action::SaveDrawing(SaveRequest::default())
        );
        assert_eq!(
            Action::from_parts("zoom_extents", Value::Null).unwrap(),
            Action::ZoomExtents
        );
    }

    #[test]
    fn names_round_trip() {
        for &name in ACTION_NAMES {
            if let Ok(action) = Action::from_parts(name, json!({})) {
                assert_eq!(action.name(), name);
            }
        }
    }
}
