//! Free-text command interpretation.
//!
//! Turns a sentence such as `draw a red line from (0,0) to (10,10)` into a
//! [`ParsedCommand`]:
//!
//! ```text
//! raw text ─▶ lexer (numbers, pairs, keywords) ─▶ classify ─▶ shapes::parse_shape
//! ```
//!
//! Parsing never fails as a Rust error. A shape whose required values are
//! missing yields a [`DrawCommand`] whose `params` carries the reason.

pub mod classify;
pub mod lexer;
pub mod shapes;

use serde_json::{json, Map, Value};

pub use classify::{classify, CommandKind};
pub use lexer::Lexemes;

use crate::drawing::{ColorSpec, ShapeKind, ShapeParams};

/// A draw request extracted from text.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    /// Shape to draw.
    pub shape: ShapeKind,
    /// Palette colour named in the text.
    pub color: Option<ColorSpec>,
    /// Layer named in the text.
    pub layer: Option<String>,
    /// Parameters, or why they could not be extracted.
    pub params: Result<ShapeParams, String>,
}

/// The interpretation of one free-text command.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedCommand {
    /// No save or shape keyword matched.
    Unknown {
        /// The command as given.
        original_text: String,
    },
    /// Save the drawing, optionally under a file name.
    Save {
        /// File name given in the command.
        filename: Option<String>,
    },
    /// Draw one shape.
    Draw(DrawCommand),
}

/// Parses a free-text command.
#[must_use]
pub fn parse_command(text: &str) -> ParsedCommand {
    let command = match classify(text) {
        CommandKind::Unknown => ParsedCommand::Unknown {
            original_text: text.to_string(),
        },
        CommandKind::Save => ParsedCommand::Save {
            filename: lexer::save_filename(text).map(str::to_string),
        },
        CommandKind::Draw(shape) => {
            let lex = Lexemes::scan(text);
            ParsedCommand::Draw(DrawCommand {
                shape,
                color: lexer::color_name(text).map(ColorSpec::named),
                layer: lexer::layer(text).map(str::to_string),
                params: shapes::parse_shape(shape, &lex),
            })
        }
    };
    tracing::debug!(command = ?command, "Parsed command");
    command
}

impl ParsedCommand {
    /// Renders the command as a flat JSON object.
    ///
    /// Draw commands merge their parameter fields into the top level, e.g.
    /// `{"type": "draw", "shape": "line", "color": "red", "start_point": [0, 0, 0], ...}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Unknown { original_text } => json!({
                "type": "unknown",
                "original_text": original_text,
            }),
            Self::Save { filename } => {
                let mut object = Map::new();
                object.insert("type".into(), json!("save"));
                if let Some(filename) = filename {
                    object.insert("filename".into(), json!(filename));
                }
                Value::Object(object)
            }
            Self::Draw(draw) => {
                let mut object = Map::new();
                object.insert("type".into(), json!("draw"));
                object.insert("shape".into(), json!(draw.shape));
                if let Some(color) = &draw.color {
                    object.insert("color".into(), json!(color));
                }
                if let Some(layer) = &draw.layer {
                    object.insert("layer".into(), json!(layer));
                }
                match &draw.params {
                    Ok(params) => {
                        if let Value::Object(fields) = params_value(params) {
                            object.extend(fields);
                        }
                    }
                    Err(error) => {
                        object.insert("error".into(), json!(error));
                    }
                }
                Value::Object(object)
            }
        }
    }
}

fn params_value(params: &ShapeParams) -> Value {
    let value = match params {
        ShapeParams::Line(p) => serde_json::to_value(p),
        ShapeParams::Circle(p) => serde_json::to_value(p),
        ShapeParams::Arc(p) => serde_json::to_value(p),
        ShapeParams::Rectangle(p) => serde_json::to_value(p),
        ShapeParams::Polyline(p) => serde_json::to_value(p),
        ShapeParams::Text(p) => serde_json::to_value(p),
        ShapeParams::Hatch(p) => serde_json::to_value(p),
        ShapeParams::Dimension(p) => serde_json::to_value(p),
    };
    value.unwrap_or(Value::Null)
}
