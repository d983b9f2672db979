//! Object model of a live CAD application.
//!
//! These traits mirror the slice of the AutoCAD-compatible automation object
//! model that the drawing backend needs: the application object, its active
//! document and the document's model space. A platform bridge implements
//! them; the backend only ever talks to the traits.
//!
//! Coordinates cross this boundary as flat `[x, y, z]` arrays and angles as
//! radians, which is what the host primitives expect.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::drawing::error::DrawingResult;

/// Live CAD products that expose the automation object model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum CadProduct {
    /// Autodesk AutoCAD.
    #[default]
    #[serde(rename = "AutoCAD", alias = "autocad")]
    AutoCad,
    /// GstarCAD.
    #[serde(rename = "GstarCAD", alias = "GCAD", alias = "gstarcad", alias = "gcad")]
    GstarCad,
    /// ZWCAD.
    #[serde(rename = "ZWCAD", alias = "zwcad")]
    ZwCad,
}

impl CadProduct {
    /// Returns the automation program id used to attach to or launch the product.
    #[must_use]
    pub const fn prog_id(self) -> &'static str {
        match self {
            Self::AutoCad => "AutoCAD.Application",
            Self::GstarCad => "GCAD.Application",
            Self::ZwCad => "ZWCAD.Application",
        }
    }

    /// Returns the product's display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::AutoCad => "AutoCAD",
            Self::GstarCad => "GstarCAD",
            Self::ZwCad => "ZWCAD",
        }
    }
}

impl fmt::Display for CadProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Identifier of an object inside the host document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(pub String);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hatch pattern type for patterns shipped with the host (`acHatchPatternTypePreDefined`).
pub const PATTERN_TYPE_PREDEFINED: i32 = 1;

/// An entity property that can be set after creation.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// `Layer`.
    Layer(String),
    /// `Color` as an ACI index.
    Color(i16),
    /// `Lineweight` in hundredths of a millimetre.
    LineWeight(i16),
    /// `Closed` on polylines.
    Closed(bool),
    /// `Rotation` in radians.
    Rotation(f64),
    /// `PatternScale` on hatches.
    PatternScale(f64),
    /// `TextHeight` on dimensions.
    TextHeight(f64),
}

impl Property {
    /// Returns the host property name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Layer(_) => "Layer",
            Self::Color(_) => "Color",
            Self::LineWeight(_) => "Lineweight",
            Self::Closed(_) => "Closed",
            Self::Rotation(_) => "Rotation",
            Self::PatternScale(_) => "PatternScale",
            Self::TextHeight(_) => "TextHeight",
        }
    }
}

/// Bridge that locates or starts a live application.
pub trait CadConnector {
    /// Whether a product is registered under `prog_id` on this machine.
    fn is_installed(&self, prog_id: &str) -> bool;

    /// Attaches to an already running instance.
    ///
    /// # Errors
    ///
    /// Fails if no instance registered under `prog_id` is running.
    fn attach(&self, prog_id: &str) -> DrawingResult<Box<dyn CadApplication>>;

    /// Starts a fresh instance.
    ///
    /// # Errors
    ///
    /// Fails if the product is not installed or refuses to start.
    fn launch(&self, prog_id: &str) -> DrawingResult<Box<dyn CadApplication>>;
}

/// The application object.
pub trait CadApplication {
    /// Shows or hides the main window.
    fn set_visible(&mut self, visible: bool) -> DrawingResult<()>;

    /// Number of open documents.
    fn document_count(&self) -> DrawingResult<usize>;

    /// The active document, if one is open.
    fn active_document(&mut self) -> DrawingResult<Option<Box<dyn CadDocument>>>;

    /// Opens a new, empty document and makes it active.
    fn add_document(&mut self) -> DrawingResult<Box<dyn CadDocument>>;
}

/// A drawing document and its model space.
///
/// Any method may return [`DrawingError::Disconnected`](crate::drawing::DrawingError::Disconnected)
/// when the host has gone away.
pub trait CadDocument {
    /// Document name; reading it validates the handle.
    fn name(&self) -> DrawingResult<String>;

    /// Names of all layers in the document.
    fn layer_names(&self) -> DrawingResult<Vec<String>>;

    /// Adds a layer.
    fn add_layer(&mut self, name: &str) -> DrawingResult<()>;

    /// Sets a layer's colour.
    fn set_layer_color(&mut self, name: &str, color: i16) -> DrawingResult<()>;

    /// Makes a layer current.
    fn set_active_layer(&mut self, name: &str) -> DrawingResult<()>;

    /// `ModelSpace.AddLine`.
    fn add_line(&mut self, start: [f64; 3], end: [f64; 3]) -> DrawingResult<ObjectId>;

    /// `ModelSpace.AddCircle`.
    fn add_circle(&mut self, center: [f64; 3], radius: f64) -> DrawingResult<ObjectId>;

    /// `ModelSpace.AddArc`; angles in radians.
    fn add_arc(
        &mut self,
        center: [f64; 3],
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    ) -> DrawingResult<ObjectId>;

    /// `ModelSpace.AddEllipse`; `major_axis` is relative to the center.
    fn add_ellipse(
        &mut self,
        center: [f64; 3],
        major_axis: [f64; 3],
        ratio: f64,
    ) -> DrawingResult<ObjectId>;

    /// `ModelSpace.AddPolyline`; `vertices` is a flat `x, y, z` sequence.
    fn add_polyline(&mut self, vertices: &[f64]) -> DrawingResult<ObjectId>;

    /// `ModelSpace.AddText`.
    fn add_text(&mut self, text: &str, insertion: [f64; 3], height: f64)
        -> DrawingResult<ObjectId>;

    /// `ModelSpace.AddHatch`.
    fn add_hatch(
        &mut self,
        pattern_type: i32,
        pattern_name: &str,
        associative: bool,
    ) -> DrawingResult<ObjectId>;

    /// `ModelSpace.AddDimAligned`.
    fn add_dim_aligned(
        &mut self,
        point1: [f64; 3],
        point2: [f64; 3],
        text_position: [f64; 3],
    ) -> DrawingResult<ObjectId>;

    /// Sets a property on an entity.
    fn set_property(&mut self, object: &ObjectId, property: Property) -> DrawingResult<()>;

    /// `Hatch.AppendOuterLoop`.
    fn append_outer_loop(&mut self, hatch: &ObjectId, boundary: &[ObjectId])
        -> DrawingResult<()>;

    /// `Hatch.Evaluate`.
    fn evaluate(&mut self, hatch: &ObjectId) -> DrawingResult<()>;

    /// Regenerates the display.
    fn regen(&mut self) -> DrawingResult<()>;

    /// `Application.ZoomExtents`.
    fn zoom_extents(&mut self) -> DrawingResult<()>;

    /// `Document.SaveAs`.
    fn save_as(&mut self, path: &Path) -> DrawingResult<()>;
}
