//! Lexical extraction from free-text commands.
//!
//! Each extraction kind is an independent, single left-to-right pass over
//! the raw text. Numbers and coordinate pairs are scanned separately, so the
//! digits of `(3, 4)` appear both as one pair and as two flat numbers.

use std::sync::LazyLock;

use regex::Regex;

use crate::drawing::style::PALETTE;
use crate::geometry::Point3;

/// A signed decimal literal.
const NUMBER: &str = r"-?\d+\.?\d*";

#[allow(clippy::expect_used)] // Patterns are compile-time constants
fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("valid regex")
}

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| pattern(NUMBER));

static POINT_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(&format!(r"\(?({NUMBER})\s*,\s*({NUMBER})\)?")));

static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r#"["']([^"']+)["']"#));

static TEXT_AFTER_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(?:text|label)(?:\s+saying)?(.*?)(?:\bat\b|$)")
});

static LAYER_RE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r#"(?i)\b(?:on|in)\s+layer\s+(?:"([^"]+)"|'([^']+)'|([A-Za-z0-9_.\-]+))"#)
});

static PATTERN_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r#"(?i)\bpattern\s+(?:"([^"]+)"|'([^']+)'|([A-Za-z0-9_.\-]+))"#)
});

static SAVE_FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r#"(?i)(?:as|to|in)\s+["']?([^"']+\.(?:dwg|dxf))["']?"#)
});

static RADIUS_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(&format!(r"(?i)radius\s*(?:of|=|:)?\s*({NUMBER})")));

static HEIGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(&format!(r"(?i)height\s*(?:of|=|:)?\s*({NUMBER})")));

static START_ANGLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(&format!(r"(?i)(?:start|from)\s+angle?\s*(?:of|=|:)?\s*({NUMBER})"))
});

static END_ANGLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(&format!(r"(?i)(?:end|to)\s+angle?\s*(?:of|=|:)?\s*({NUMBER})"))
});

/// A keyword that anchors a single numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `radius 5`, `radius of 5`, `radius=5`.
    Radius,
    /// `height 3.5`.
    Height,
    /// `start angle 0`, `from angle 0`.
    StartAngle,
    /// `end angle 90`, `to angle 90`.
    EndAngle,
}

impl Keyword {
    fn regex(self) -> &'static Regex {
        match self {
            Self::Radius => &RADIUS_RE,
            Self::Height => &HEIGHT_RE,
            Self::StartAngle => &START_ANGLE_RE,
            Self::EndAngle => &END_ANGLE_RE,
        }
    }
}

fn parse_number(literal: &str) -> Option<f64> {
    literal.parse().ok()
}

/// Returns every numeric literal in textual order.
#[must_use]
pub fn numbers(text: &str) -> Vec<f64> {
    NUMBER_RE
        .find_iter(text)
        .filter_map(|m| parse_number(m.as_str()))
        .collect()
}

/// Returns every `x, y` coordinate pair in textual order, with `z = 0`.
#[must_use]
pub fn points(text: &str) -> Vec<Point3> {
    POINT_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let x = parse_number(caps.get(1)?.as_str())?;
            let y = parse_number(caps.get(2)?.as_str())?;
            Some(Point3::xy(x, y))
        })
        .collect()
}

/// Returns the first single- or double-quoted substring.
#[must_use]
pub fn quoted(text: &str) -> Option<&str> {
    QUOTED_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Returns the number following `keyword`, if present.
#[must_use]
pub fn keyword_number(text: &str, keyword: Keyword) -> Option<f64> {
    keyword
        .regex()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_number(m.as_str()))
}

/// Returns the first alternative group that matched.
fn first_group<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    let caps = re.captures(text)?;
    caps.iter().skip(1).flatten().next().map(|m| m.as_str())
}

/// Extracts the layer from `on layer <name>` or `in layer <name>`.
#[must_use]
pub fn layer(text: &str) -> Option<&str> {
    first_group(&LAYER_RE, text)
}

/// Extracts the hatch pattern from `pattern <name>`.
#[must_use]
pub fn pattern_name(text: &str) -> Option<&str> {
    first_group(&PATTERN_NAME_RE, text)
}

/// Extracts the content of a text command.
///
/// A quoted substring wins; otherwise whatever follows `text`/`label` (and an
/// optional `saying`) up to `at` or the end of the command.
#[must_use]
pub fn text_content(text: &str) -> Option<&str> {
    quoted(text)
        .or_else(|| {
            TEXT_AFTER_KEYWORD_RE
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Extracts a `.dwg`/`.dxf` file name from a save command.
#[must_use]
pub fn save_filename(text: &str) -> Option<&str> {
    SAVE_FILENAME_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Finds a palette colour name in the command.
///
/// Matching is substring containment on the lower-cased text. When several
/// names occur, the leftmost occurrence wins.
#[must_use]
pub fn color_name(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    PALETTE
        .iter()
        .filter_map(|&(name, _)| lower.find(name).map(|pos| (pos, name)))
        .min_by_key(|&(pos, _)| pos)
        .map(|(_, name)| name)
}

/// The lexical data shared by all shape parsers.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexemes<'t> {
    /// Raw command text.
    pub text: &'t str,
    /// Flat numeric literals.
    pub numbers: Vec<f64>,
    /// Coordinate pairs.
    pub points: Vec<Point3>,
}

impl<'t> Lexemes<'t> {
    /// Scans `text` once per extraction kind.
    #[must_use]
    pub fn scan(text: &'t str) -> Self {
        Self {
            text,
            numbers: numbers(text),
            points: points(text),
        }
    }

    /// Number following `keyword`.
    #[must_use]
    pub fn keyword(&self, keyword: Keyword) -> Option<f64> {
        keyword_number(self.text, keyword)
    }

    /// Returns `true` if the lower-cased text contains `needle`.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        self.text.to_lowercase().contains(needle)
    }

    /// Reads the flat numbers as consecutive `(x, y)` pairs.
    #[must_use]
    pub fn number_pairs(&self) -> Vec<Point3> {
        self.numbers
            .chunks_exact(2)
            .map(|pair| Point3::xy(pair[0], pair[1]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_in_order() {
        assert_eq!(
            numbers("from -1.5 to 2, then 3. and 40"),
            vec![-1.5, 2.0, 3.0, 40.0]
        );
        assert!(numbers("no digits here").is_empty());
    }

    #[test]
    fn points_with_and_without_parens() {
        assert_eq!(
            points("from (0,0) to 10, -10.5"),
            vec![Point3::xy(0.0, 0.0), Point3::xy(10.0, -10.5)]
        );
        assert_eq!(points("(1 , 2)"), vec![Point3::xy(1.0, 2.0)]);
    }

    #[test]
    fn quoted_either_kind() {
        assert_eq!(quoted(r#"add text "Hello World" at (0,0)"#), Some("Hello World"));
        assert_eq!(quoted("add text 'Hi' at (0,0)"), Some("Hi"));
        assert_eq!(quoted("add text Hi"), None);
    }

    #[test]
    fn keyword_values() {
        let text = "arc center (0,0) Radius 5 start angle 0 end angle 90";
        assert_eq!(keyword_number(text, Keyword::Radius), Some(5.0));
        assert_eq!(keyword_number(text, Keyword::StartAngle), Some(0.0));
        assert_eq!(keyword_number(text, Keyword::EndAngle), Some(90.0));
        assert_eq!(keyword_number("radius of 2.5", Keyword::Radius), Some(2.5));
        assert_eq!(keyword_number("text height 3", Keyword::Height), Some(3.0));
        assert_eq!(keyword_number("circle at 1,1", Keyword::Radius), None);
    }

    #[test]
    fn layer_token_or_quoted() {
        assert_eq!(layer("draw a line on layer walls from 0,0"), Some("walls"));
        assert_eq!(layer(r#"circle in layer "Site Plan" at 0,0"#), Some("Site Plan"));
        assert_eq!(layer("draw a line"), None);
    }

    #[test]
    fn pattern_names() {
        assert_eq!(pattern_name("hatch with pattern ANSI37"), Some("ANSI37"));
        assert_eq!(pattern_name("hatch with pattern 'SOLID'"), Some("SOLID"));
    }

    #[test]
    fn text_content_sources() {
        assert_eq!(text_content(r#"text "Door" at (1,1)"#), Some("Door"));
        assert_eq!(text_content("add label saying Exit at (2,2)"), Some("Exit"));
        assert_eq!(text_content("add text Kitchen"), Some("Kitchen"));
        assert_eq!(text_content("add text at (1,1)"), None);
    }

    #[test]
    fn save_filenames() {
        assert_eq!(save_filename("save as output.dwg"), Some("output.dwg"));
        assert_eq!(save_filename("export to 'plans/site.dxf'"), Some("plans/site.dxf"));
        assert_eq!(save_filename("save the drawing"), None);
    }

    #[test]
    fn leftmost_color_wins() {
        assert_eq!(color_name("a BLUE line then red"), Some("blue"));
        assert_eq!(color_name("red and blue"), Some("red"));
        assert_eq!(color_name("a grey box"), Some("grey"));
        assert_eq!(color_name("a plain line"), None);
    }

    #[test]
    fn number_pairs_drop_odd_tail() {
        let lex = Lexemes::scan("1 2 3 4 5");
        assert_eq!(
            lex.number_pairs(),
            vec![Point3::xy(1.0, 2.0), Point3::xy(3.0, 4.0)]
        );
    }
}
