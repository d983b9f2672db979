//! Error types for drawing backend operations.
//!
//! These errors never cross the [`DrawingBackend`](super::DrawingBackend)
//! interface except [`DrawingError::Unavailable`], which is returned when a
//! backend is constructed. Everything else is logged and reported as a failed
//! operation.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for drawing operations.
pub type DrawingResult<T> = Result<T, DrawingError>;

/// Errors that can occur inside a drawing backend.
#[derive(Debug, Error)]
pub enum DrawingError {
    /// No supported drawing engine is available.
    #[error("Drawing backend unavailable: {message}")]
    Unavailable {
        /// Why the backend cannot be used.
        message: String,
    },

    /// The session could not be established.
    #[error("Failed to connect to {application}: {message}")]
    Connection {
        /// Application or engine being connected to.
        application: String,
        /// Description of what went wrong.
        message: String,
    },

    /// An operation was attempted outside the `Ready` state.
    #[error("No active drawing session")]
    NotReady,

    /// The live document handle was lost.
    #[error("Connection to the drawing host was lost")]
    Disconnected,

    /// A single draw, layer or save call failed.
    #[error("{operation} failed: {message}")]
    Operation {
        /// The operation that failed.
        operation: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// Geometry that the backend cannot represent.
    #[error("Invalid geometry: {message}")]
    InvalidGeometry {
        /// Description of what's wrong.
        message: String,
    },

    /// Failed to write the drawing file.
    #[error("Failed to write file: {path}")]
    FileWrite {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl DrawingError {
    /// Creates an unavailable-backend error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    pub fn connection(application: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            application: application.into(),
            message: message.into(),
        }
    }

    /// Creates an operation error.
    pub fn operation(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Operation {
            operation,
            message: message.into(),
        }
    }

    /// Creates an invalid geometry error.
    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }

    /// Creates a file write error.
    pub fn file_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the error means the host connection is gone.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}
