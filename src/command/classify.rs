//! Keyword classification of free-text commands.

use crate::drawing::ShapeKind;

/// Words that make a command a save request.
pub const SAVE_KEYWORDS: &[&str] = &["save", "export", "write"];

/// Shape keyword sets in priority order.
///
/// The first set with a match wins, so `polyline` must precede `line`.
pub const SHAPE_KEYWORDS: &[(ShapeKind, &[&str])] = &[
    (ShapeKind::Polyline, &["polyline", "polygon", "path"]),
    (ShapeKind::Rectangle, &["rectangle", "rect", "box", "square"]),
    (ShapeKind::Dimension, &["dimension", "measure", "measurement"]),
    (ShapeKind::Hatch, &["hatch", "fill", "pattern"]),
    (ShapeKind::Circle, &["circle", "circles"]),
    (ShapeKind::Arc, &["arc", "arcs"]),
    (ShapeKind::Text, &["text", "label", "annotation"]),
    (ShapeKind::Line, &["line", "lines"]),
];

/// What a command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Persist the drawing.
    Save,
    /// Draw one shape.
    Draw(ShapeKind),
    /// Nothing recognised.
    Unknown,
}

/// Classifies a command by keyword containment.
///
/// Matching is substring containment on the lower-cased text, not word
/// matching: `"rectangles"` and `"subrectangle"` both contain `rectangle`.
#[must_use]
pub fn classify(text: &str) -> CommandKind {
    let lower = text.to_lowercase();

    if SAVE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return CommandKind::Save;
    }

    SHAPE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map_or(CommandKind::Unknown, |&(shape, _)| CommandKind::Draw(shape))
}
