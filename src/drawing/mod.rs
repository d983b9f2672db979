//! Drawing backends.
//!
//! A [`DrawingBackend`] performs the actual draw, layer and save operations
//! against one drawing engine. Two variants implement the same interface:
//!
//! - [`dxf::DxfBackend`]: an in-process vector document persisted as DXF
//! - [`automation::AutomationBackend`]: a live CAD application driven through
//!   its automation object model
//!
//! # Session Lifecycle
//!
//! ```text
//! Unconnected ──start_session──▶ Connecting ──ok──▶ Ready ──close──▶ Closed
//!                                    │                                  │
//!                                    └──fail──▶ Unconnected ◀───────────┘ (restartable)
//! ```
//!
//! Draw and save calls are only accepted in `Ready`. Outside it they return
//! `None`/`false`; they never start a session implicitly.
//!
//! # Failure Model
//!
//! All operations are best-effort. Faults inside a backend are logged and
//! surfaced as `None`/`false` for that call only; the session stays usable.

pub mod automation;
pub mod dxf;
pub mod error;
pub mod params;
pub mod style;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use error::{DrawingError, DrawingResult};
pub use params::{
    ArcParams, CircleParams, DimensionParams, EllipseParams, HatchParams, LineParams,
    PolylineParams, RectangleParams, ShapeKind, ShapeParams, TextParams,
};
pub use style::{ColorSpec, EntityStyle};

use automation::{AutomationBackend, CadConnector, CadProduct};
use dxf::DxfBackend;

/// Minimum number of boundary points for a hatch.
pub const MIN_HATCH_POINTS: usize = 3;

/// Session state of a backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session has been started.
    Unconnected,
    /// A session is being established.
    Connecting,
    /// Draw and save operations are accepted.
    Ready,
    /// The session was closed explicitly.
    Closed,
}

impl SessionState {
    /// Returns `true` if a new session may be started from this state.
    #[must_use]
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Unconnected | Self::Closed)
    }
}

/// Which backend variant an instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process DXF document.
    Dxf,
    /// Live CAD application.
    Automation,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dxf => f.write_str("dxf"),
            Self::Automation => f.write_str("automation"),
        }
    }
}

/// Backend selection hint from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendChoice {
    /// Live application when a connector is available, otherwise DXF.
    #[default]
    Auto,
    /// Always use the DXF backend.
    Dxf,
    /// Always use the live application.
    Automation,
}

/// Opaque reference to an entity created by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EntityHandle(String);

impl EntityHandle {
    /// Wraps a backend-specific identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settings consumed read-only when a backend is constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSettings {
    /// Live application product to attach to or launch.
    pub product: CadProduct,
    /// How long to wait after launching a fresh application instance.
    pub startup_wait: Duration,
    /// Pause after each live-application command.
    pub command_delay: Duration,
    /// Directory used when `save_drawing` gets no path.
    pub output_directory: PathBuf,
    /// File name used when `save_drawing` gets no path.
    pub default_filename: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            product: CadProduct::default(),
            startup_wait: Duration::from_secs(20),
            command_delay: Duration::from_millis(500),
            output_directory: PathBuf::from("./output"),
            default_filename: "cad_drawing.dxf".to_string(),
        }
    }
}

impl BackendSettings {
    /// Resolves the target of a save: the given path, or the configured default.
    #[must_use]
    pub fn save_target(&self, path: Option<&Path>) -> PathBuf {
        path.map_or_else(
            || self.output_directory.join(&self.default_filename),
            Path::to_path_buf,
        )
    }
}

/// The capability interface shared by every drawing backend.
///
/// All methods are synchronous and may block for as long as the underlying
/// engine takes to respond. Callers serialise access to one instance.
pub trait DrawingBackend {
    /// Returns which variant this backend is.
    fn kind(&self) -> BackendKind;

    /// Returns the current session state.
    fn state(&self) -> SessionState;

    /// Returns `true` if draw and save calls are currently accepted.
    fn is_running(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Establishes the session. Returns `true` once the backend is `Ready`.
    fn start_session(&mut self) -> bool;

    /// Creates a layer, or activates it if it already exists.
    fn create_layer(&mut self, name: &str, color: Option<i16>) -> bool;

    /// Draws a line.
    fn draw_line(&mut self, params: &LineParams, style: &EntityStyle) -> Option<EntityHandle>;

    /// Draws a circle.
    fn draw_circle(&mut self, params: &CircleParams, style: &EntityStyle)
        -> Option<EntityHandle>;

    /// Draws an arc. Angles in `params` are degrees.
    fn draw_arc(&mut self, params: &ArcParams, style: &EntityStyle) -> Option<EntityHandle>;

    /// Draws a rectangle as a closed polyline.
    fn draw_rectangle(
        &mut self,
        params: &RectangleParams,
        style: &EntityStyle,
    ) -> Option<EntityHandle>;

    /// Draws a polyline.
    fn draw_polyline(
        &mut self,
        params: &PolylineParams,
        style: &EntityStyle,
    ) -> Option<EntityHandle>;

    /// Adds single-line text.
    fn draw_text(&mut self, params: &TextParams, style: &EntityStyle) -> Option<EntityHandle>;

    /// Creates a hatch: boundary polyline, then the hatch referencing it, then
    /// evaluation of the pattern.
    fn draw_hatch(&mut self, params: &HatchParams, style: &EntityStyle) -> Option<EntityHandle>;

    /// Adds an aligned dimension.
    fn add_dimension(
        &mut self,
        params: &DimensionParams,
        style: &EntityStyle,
    ) -> Option<EntityHandle>;

    /// Draws an ellipse.
    fn draw_ellipse(
        &mut self,
        params: &EllipseParams,
        style: &EntityStyle,
    ) -> Option<EntityHandle>;

    /// Fits the view to all entities.
    fn zoom_extents(&mut self) -> bool;

    /// Saves the drawing and returns the path actually written.
    ///
    /// Without a path, the configured output directory and default file name
    /// are used. Parent directories are created as needed.
    fn save_drawing(&mut self, path: Option<&Path>) -> Option<PathBuf>;

    /// Tears the session down.
    fn close(&mut self);
}

/// Logs a failed backend operation and converts it to `None`.
pub(crate) fn report<T>(operation: &'static str, result: DrawingResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(DrawingError::NotReady) => {
            tracing::warn!(operation, "Drawing session is not ready, operation rejected");
            None
        }
        Err(e) => {
            tracing::error!(operation, error = %e, "Drawing operation failed");
            None
        }
    }
}

/// Checks the point count of a hatch boundary.
pub(crate) fn check_hatch_boundary(params: &HatchParams) -> DrawingResult<()> {
    if params.points.len() < MIN_HATCH_POINTS {
        return Err(DrawingError::invalid_geometry(format!(
            "hatch boundary needs at least {MIN_HATCH_POINTS} points, got {}",
            params.points.len()
        )));
    }
    Ok(())
}

/// Creates the parent directory of `path` if it does not exist.
pub(crate) fn ensure_parent_dir(path: &Path) -> DrawingResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DrawingError::file_write(parent, e))?;
    }
    Ok(())
}

/// Constructs the backend selected by `choice`.
///
/// `connector` is the bridge to a live CAD application, if this platform has
/// one. `auto` picks the live application only when the configured product is
/// installed and falls back to DXF otherwise.
///
/// # Errors
///
/// Returns [`DrawingError::Unavailable`] when the live application is
/// requested but no connector is available.
pub fn open_backend(
    choice: BackendChoice,
    settings: BackendSettings,
    connector: Option<Box<dyn CadConnector>>,
) -> DrawingResult<Box<dyn DrawingBackend>> {
    let product = settings.product;
    let connector = match (choice, connector) {
        (BackendChoice::Dxf, _) => None,
        (BackendChoice::Automation, None) => {
            return Err(DrawingError::unavailable(
                "no automation connector is available for the live application backend",
            ));
        }
        (BackendChoice::Automation, Some(connector)) => Some(connector),
        (BackendChoice::Auto, Some(connector)) if connector.is_installed(product.prog_id()) => {
            Some(connector)
        }
        (BackendChoice::Auto, Some(_)) => {
            tracing::info!(%product, prog_id = product.prog_id(), "Product not registered");
            None
        }
        (BackendChoice::Auto, None) => None,
    };

    if let Some(connector) = connector {
        tracing::info!(%product, "Using live application backend");
        Ok(Box::new(AutomationBackend::new(connector, settings)))
    } else {
        tracing::info!("Using DXF backend");
        Ok(Box::new(DxfBackend::new(settings)))
    }
}
