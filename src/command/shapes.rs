//! Per-shape parameter parsers.
//!
//! Every parser prefers explicit coordinate pairs and falls back to reading
//! the flat number sequence positionally only when the pairs alone cannot
//! satisfy the shape. The two sources are never mixed, with two exceptions:
//! a circle takes its radius from the `radius` keyword or else the third
//! number, and text takes its position from the first pair or else the first
//! two numbers.

use super::lexer::{self, Keyword, Lexemes};
use crate::drawing::params::{
    ArcParams, CircleParams, DimensionParams, HatchParams, LineParams, PolylineParams,
    RectangleParams, ShapeKind, ShapeParams, TextParams, DEFAULT_HATCH_PATTERN,
    DEFAULT_TEXT_HEIGHT,
};
use crate::drawing::MIN_HATCH_POINTS;
use crate::geometry::Point3;

/// Parse result: parameters, or the reason they could not be extracted.
pub type ShapeResult = Result<ShapeParams, String>;

/// Parses the parameters of `shape` from scanned text.
///
/// # Errors
///
/// Returns a human-readable reason when required values are missing.
pub fn parse_shape(shape: ShapeKind, lex: &Lexemes<'_>) -> ShapeResult {
    match shape {
        ShapeKind::Line => line(lex),
        ShapeKind::Circle => circle(lex),
        ShapeKind::Arc => arc(lex),
        ShapeKind::Rectangle => rectangle(lex),
        ShapeKind::Polyline => polyline(lex),
        ShapeKind::Text => text(lex),
        ShapeKind::Hatch => hatch(lex),
        ShapeKind::Dimension => dimension(lex),
    }
}

/// Reads `(n[i], n[i + 1])` from the flat numbers.
fn number_point(numbers: &[f64], i: usize) -> Point3 {
    Point3::xy(numbers[i], numbers[i + 1])
}

/// Two points from pairs, else from the first four numbers.
fn two_points(lex: &Lexemes<'_>) -> Option<(Point3, Point3)> {
    if let [first, second, ..] = lex.points.as_slice() {
        Some((*first, *second))
    } else if lex.numbers.len() >= 4 {
        Some((number_point(&lex.numbers, 0), number_point(&lex.numbers, 2)))
    } else {
        None
    }
}

/// Point list from pairs, else from an even-length number sequence.
fn point_list(lex: &Lexemes<'_>, min_points: usize) -> Option<Vec<Point3>> {
    if lex.points.len() >= min_points {
        Some(lex.points.clone())
    } else if lex.numbers.len() >= min_points * 2 && lex.numbers.len() % 2 == 0 {
        Some(lex.number_pairs())
    } else {
        None
    }
}

fn line(lex: &Lexemes<'_>) -> ShapeResult {
    let (start_point, end_point) =
        two_points(lex).ok_or("Insufficient coordinates for line")?;
    Ok(ShapeParams::Line(LineParams {
        start_point,
        end_point,
    }))
}

fn circle(lex: &Lexemes<'_>) -> ShapeResult {
    let radius = lex
        .keyword(Keyword::Radius)
        .or_else(|| lex.numbers.get(2).copied());

    let (center, radius) = match (lex.points.first(), radius) {
        (Some(center), Some(radius)) => (*center, radius),
        (Some(_), None) => return Err("Missing radius for circle".to_string()),
        (None, Some(radius)) if lex.numbers.len() >= 3 => {
            (number_point(&lex.numbers, 0), radius)
        }
        (None, _) => return Err("Insufficient parameters for circle".to_string()),
    };
    Ok(ShapeParams::Circle(CircleParams { center, radius }))
}

fn arc(lex: &Lexemes<'_>) -> ShapeResult {
    let keywords = (
        lex.points.first(),
        lex.keyword(Keyword::Radius),
        lex.keyword(Keyword::StartAngle),
        lex.keyword(Keyword::EndAngle),
    );

    let params = match keywords {
        (Some(center), Some(radius), Some(start_angle), Some(end_angle)) => ArcParams {
            center: *center,
            radius,
            start_angle,
            end_angle,
        },
        _ if lex.numbers.len() >= 5 => ArcParams {
            center: number_point(&lex.numbers, 0),
            radius: lex.numbers[2],
            start_angle: lex.numbers[3],
            end_angle: lex.numbers[4],
        },
        _ => return Err("Insufficient parameters for arc".to_string()),
    };
    Ok(ShapeParams::Arc(params))
}

fn rectangle(lex: &Lexemes<'_>) -> ShapeResult {
    let (corner1, corner2) =
        two_points(lex).ok_or("Insufficient coordinates for rectangle")?;
    Ok(ShapeParams::Rectangle(RectangleParams { corner1, corner2 }))
}

fn polyline(lex: &Lexemes<'_>) -> ShapeResult {
    let points = point_list(lex, 2).ok_or("Insufficient points for polyline")?;
    Ok(ShapeParams::Polyline(PolylineParams {
        points,
        closed: lex.mentions("close"),
    }))
}

fn text(lex: &Lexemes<'_>) -> ShapeResult {
    let position = lex.points.first().copied().or_else(|| {
        (lex.numbers.len() >= 2).then(|| number_point(&lex.numbers, 0))
    });
    let position = position.ok_or("No position specified for text")?;
    let content = lexer::text_content(lex.text).ok_or("No text content found")?;

    Ok(ShapeParams::Text(TextParams {
        position,
        text: content.to_string(),
        height: lex.keyword(Keyword::Height).unwrap_or(DEFAULT_TEXT_HEIGHT),
        rotation: 0.0,
    }))
}

fn hatch(lex: &Lexemes<'_>) -> ShapeResult {
    let points =
        point_list(lex, MIN_HATCH_POINTS).ok_or("Insufficient points for hatch boundary")?;
    let pattern_name = lexer::pattern_name(lex.text).unwrap_or(DEFAULT_HATCH_PATTERN);

    Ok(ShapeParams::Hatch(HatchParams {
        points,
        pattern_name: pattern_name.to_string(),
        scale: 1.0,
    }))
}

fn dimension(lex: &Lexemes<'_>) -> ShapeResult {
    let params = if let [point1, point2, text_position, ..] = lex.points.as_slice() {
        DimensionParams {
            point1: *point1,
            point2: *point2,
            text_position: Some(*text_position),
            text_height: None,
        }
    } else if lex.numbers.len() >= 6 {
        DimensionParams {
            point1: number_point(&lex.numbers, 0),
            point2: number_point(&lex.numbers, 2),
            text_position: Some(number_point(&lex.numbers, 4)),
            text_height: None,
        }
    } else {
        return Err("Insufficient points for dimension".to_string());
    };
    Ok(ShapeParams::Dimension(params))
}
