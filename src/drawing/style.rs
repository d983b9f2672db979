//! Entity styling: colour palette and lineweights.
//!
//! Colours are expressed either as a palette name or a raw ACI (AutoCAD Color
//! Index) value. Both backends only ever see the resolved integer index.

use std::fmt;

use serde::{Deserialize, Serialize};

/// ACI index used when a colour name is not in the palette.
pub const DEFAULT_COLOR_INDEX: i16 = 7;

/// The fixed palette of colour names, in lookup order.
pub const PALETTE: &[(&str, i16)] = &[
    ("red", 1),
    ("yellow", 2),
    ("green", 3),
    ("cyan", 4),
    ("blue", 5),
    ("magenta", 6),
    ("white", 7),
    ("gray", 8),
    ("grey", 8),
    ("black", 0),
];

/// Looks up a palette name (case-insensitive).
#[must_use]
pub fn palette_index(name: &str) -> Option<i16> {
    let name = name.trim();
    PALETTE
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, index)| index)
}

/// A caller-supplied colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    /// Raw backend-native colour index, passed through unchanged.
    Index(i16),
    /// A palette name such as `"red"`.
    Name(String),
}

impl ColorSpec {
    /// Creates a named colour.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Resolves the colour to a backend index.
    ///
    /// Unknown names resolve to white ([`DEFAULT_COLOR_INDEX`]).
    #[must_use]
    pub fn index(&self) -> i16 {
        match self {
            Self::Index(index) => *index,
            Self::Name(name) => palette_index(name).unwrap_or_else(|| {
                tracing::warn!(color = %name, "Unknown colour name, using white");
                DEFAULT_COLOR_INDEX
            }),
        }
    }
}

impl fmt::Display for ColorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Lineweights accepted by both backends, in hundredths of a millimetre.
pub const VALID_LINEWEIGHTS: &[i16] = &[
    0, 5, 9, 13, 15, 18, 20, 25, 30, 35, 40, 50, 53, 60, 70, 80, 90, 100, 106, 120, 140, 158, 200,
    211,
];

/// Validates a lineweight.
///
/// Values outside [`VALID_LINEWEIGHTS`] are coerced to `0` with a warning.
#[must_use]
pub fn validate_lineweight(lineweight: i32) -> i16 {
    match i16::try_from(lineweight) {
        Ok(value) if VALID_LINEWEIGHTS.contains(&value) => value,
        _ => {
            tracing::warn!(lineweight, "Invalid lineweight, using 0");
            0
        }
    }
}

/// Resolved style applied to a newly created entity.
///
/// `None` fields leave the backend default in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityStyle {
    /// Resolved colour index.
    pub color: Option<i16>,
    /// Layer the entity is placed on (created if absent).
    pub layer: Option<String>,
    /// Requested lineweight, validated by the backend before use.
    pub lineweight: Option<i32>,
}

impl EntityStyle {
    /// Creates a style with only a layer set.
    #[must_use]
    pub fn on_layer(layer: impl Into<String>) -> Self {
        Self {
            layer: Some(layer.into()),
            ..Self::default()
        }
    }

    /// Sets the colour index.
    #[must_use]
    pub const fn with_color(mut self, color: i16) -> Self {
        self.color = Some(color);
        self
    }

    /// Sets the lineweight.
    #[must_use]
    pub const fn with_lineweight(mut self, lineweight: i32) -> Self {
        self.lineweight = Some(lineweight);
        self
    }

    /// Returns the layer name if one was requested and it is non-empty.
    #[must_use]
    pub fn layer_name(&self) -> Option<&str> {
        self.layer.as_deref().filter(|l| !l.is_empty())
    }

    /// Returns the validated lineweight, if any.
    #[must_use]
    pub fn validated_lineweight(&self) -> Option<i16> {
        self.lineweight.map(validate_lineweight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_names_resolve() {
        assert_eq!(ColorSpec::named("red").index(), 1);
        assert_eq!(ColorSpec::named("Blue").index(), 5);
        assert_eq!(ColorSpec::named("grey").index(), 8);
        assert_eq!(ColorSpec::named("black").index(), 0);
    }

    #[test]
    fn unknown_name_is_white() {
        assert_eq!(ColorSpec::named("chartreuse").index(), DEFAULT_COLOR_INDEX);
    }

    #[test]
    fn raw_index_passes_through() {
        assert_eq!(ColorSpec::Index(42).index(), 42);
    }

    #[test]
    fn deserialise_name_or_index() {
        let c: ColorSpec = serde_json::from_str("\"green\"").unwrap();
        assert_eq!(c, ColorSpec::named("green"));
        let c: ColorSpec = serde_json::from_str("3").unwrap();
        assert_eq!(c, ColorSpec::Index(3));
    }

    #[test]
    fn valid_lineweights_pass_through() {
        for &lw in VALID_LINEWEIGHTS {
            assert_eq!(validate_lineweight(i32::from(lw)), lw);
        }
    }

    #[test]
    fn invalid_lineweights_become_zero() {
        for lw in [-1, 1, 7, 14, 99, 212, 1000, i32::MAX] {
            assert_eq!(validate_lineweight(lw), 0, "lineweight {lw}");
        }
    }

    #[test]
    fn empty_layer_name_is_ignored() {
        assert_eq!(EntityStyle::on_layer("").layer_name(), None);
        assert_eq!(EntityStyle::on_layer("walls").layer_name(), Some("walls"));
    }
}
