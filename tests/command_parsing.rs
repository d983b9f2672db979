//! Integration tests for free-text command interpretation.
//!
//! Commands are parsed end to end and checked through the flat JSON rendering
//! that callers see, so classification, colour and layer extraction and the
//! shape parsers are exercised together.

use cad_drawing_mcp::command::{parse_command, DrawCommand, ParsedCommand};
use cad_drawing_mcp::drawing::{ColorSpec, ShapeKind, ShapeParams};
use cad_drawing_mcp::geometry::Point3;
use serde_json::{json, Value};

fn parsed(text: &str) -> Value {
    parse_command(text).to_value()
}

fn draw(text: &str) -> DrawCommand {
    match parse_command(text) {
        ParsedCommand::Draw(draw) => draw,
        other => panic!("expected a draw command for {text:?}, got {other:?}"),
    }
}

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn red_line_round_trip() {
    assert_eq!(
        parsed("draw a red line from (0,0) to (10,10)"),
        json!({
            "type": "draw",
            "shape": "line",
            "color": "red",
            "start_point": [0.0, 0.0, 0.0],
            "end_point": [10.0, 10.0, 0.0],
        })
    );
}

#[test]
fn blue_circle_round_trip() {
    assert_eq!(
        parsed("create a blue circle center (0,0) radius 7"),
        json!({
            "type": "draw",
            "shape": "circle",
            "color": "blue",
            "center": [0.0, 0.0, 0.0],
            "radius": 7.0,
        })
    );
}

#[test]
fn missing_coordinates_round_trip() {
    assert_eq!(
        parsed("draw a line"),
        json!({
            "type": "draw",
            "shape": "line",
            "error": "Insufficient coordinates for line",
        })
    );
}

#[test]
fn save_round_trip() {
    assert_eq!(
        parsed("save as output.dwg"),
        json!({ "type": "save", "filename": "output.dwg" })
    );
}

#[test]
fn unknown_command_keeps_text() {
    assert_eq!(
        parsed("make me a sandwich"),
        json!({ "type": "unknown", "original_text": "make me a sandwich" })
    );
}

// =============================================================================
// Classification and shared fields
// =============================================================================

#[test]
fn polyline_is_not_mistaken_for_line() {
    let command = draw("draw a closed polyline through (0,0) (5,0) (5,5)");
    assert_eq!(command.shape, ShapeKind::Polyline);
    match command.params {
        Ok(ShapeParams::Polyline(p)) => {
            assert_eq!(p.points.len(), 3);
            assert!(p.closed);
        }
        other => panic!("expected polyline params, got {other:?}"),
    }
}

#[test]
fn leftmost_colour_wins() {
    let command = draw("draw a green line over the red one from (0,0) to (1,1)");
    assert_eq!(command.color, Some(ColorSpec::named("green")));
}

#[test]
fn grey_is_a_palette_synonym() {
    let command = draw("draw a grey circle at (0,0) radius 2");
    let color = command.color.unwrap();
    assert_eq!(color.index(), ColorSpec::named("gray").index());
    assert_eq!(color.index(), 8);
}

#[test]
fn quoted_layer_name() {
    let command = draw(r#"draw a line from (0,0) to (5,5) on layer "Wall A""#);
    assert_eq!(command.layer.as_deref(), Some("Wall A"));
    assert!(command.params.is_ok());
}

#[test]
fn save_filename_variants() {
    assert_eq!(parsed("save the drawing"), json!({ "type": "save" }));
    assert_eq!(
        parsed("save the drawing as plan.dxf"),
        json!({ "type": "save", "filename": "plan.dxf" })
    );
    assert_eq!(
        parsed("export to 'plans/site.dxf'"),
        json!({ "type": "save", "filename": "plans/site.dxf" })
    );
}

// =============================================================================
// Shape parsers
// =============================================================================

#[test]
fn label_with_height() {
    let value = parsed(r#"add a label saying "Kitchen" at (2,3) height 4"#);
    assert_eq!(value["shape"], "text");
    assert_eq!(value["text"], "Kitchen");
    assert_eq!(value["position"], json!([2.0, 3.0, 0.0]));
    assert_eq!(value["height"], 4.0);
}

#[test]
fn arc_from_keywords() {
    let value = parsed("draw an arc center (0,0) radius 5 start angle 0 end angle 90");
    assert_eq!(value["shape"], "arc");
    assert_eq!(value["radius"], 5.0);
    assert_eq!(value["start_angle"], 0.0);
    assert_eq!(value["end_angle"], 90.0);
}

#[test]
fn dimension_from_flat_numbers() {
    let command = draw("add a dimension 0 0 10 0 5 5");
    match command.params {
        Ok(ShapeParams::Dimension(d)) => {
            assert_eq!(d.point1, Point3::xy(0.0, 0.0));
            assert_eq!(d.point2, Point3::xy(10.0, 0.0));
            assert_eq!(d.text_position, Some(Point3::xy(5.0, 5.0)));
        }
        other => panic!("expected dimension params, got {other:?}"),
    }
}

#[test]
fn hatch_with_named_pattern() {
    let value = parsed("hatch the region (0,0) (10,0) (10,10) with pattern ANSI37");
    assert_eq!(value["shape"], "hatch");
    assert_eq!(value["pattern_name"], "ANSI37");
    assert_eq!(value["points"].as_array().map(Vec::len), Some(3));
}

#[test]
fn parse_errors_are_reported_not_raised() {
    for (text, error) in [
        ("draw a circle", "Insufficient parameters for circle"),
        ("draw a rectangle from (1,1)", "Insufficient coordinates for rectangle"),
        ("add text 'Hi'", "No position specified for text"),
        ("hatch (0,0) (1,1)", "Insufficient points for hatch boundary"),
    ] {
        assert_eq!(parsed(text)["error"], error, "for {text:?}");
    }
}

#[test]
fn two_component_points_gain_zero_z() {
    for (x, y) in [(0.0, 0.0), (-3.5, 2.0), (1e6, -1e-3)] {
        assert_eq!(Point3::normalize(&[x, y]), Point3::new(x, y, 0.0));
        assert_eq!(Point3::normalize(&[x, y, 4.0]), Point3::new(x, y, 4.0));
    }
}
