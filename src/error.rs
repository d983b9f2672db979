//! Error types for cad-drawing-mcp.
//!
//! Drawing and request errors live next to the code that raises them
//! ([`crate::drawing::DrawingError`], [`crate::dispatch::RequestError`]).
//! This module holds the errors of loading the server configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Why the server configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but reading it failed.
    #[error("cannot read config file {path}")]
    ReadError {
        /// File that was being read.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON.
    #[error("cannot parse config file {path}")]
    ParseError {
        /// File that was being parsed.
        path: PathBuf,
        /// JSON failure, including unknown fields.
        #[source]
        source: serde_json::Error,
    },

    /// A config file named on the command line does not exist.
    #[error("config file not found: {path}")]
    NotFound {
        /// The missing file.
        path: PathBuf,
    },

    /// A field holds an out-of-range value.
    #[error("invalid configuration: {message}")]
    ValidationError {
        /// Which field and why.
        message: String,
    },
}
