//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::drawing::automation::CadProduct;
use crate::drawing::{BackendChoice, BackendSettings};
use crate::error::ConfigError;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Drawing engine settings.
    #[serde(default)]
    pub cad: CadConfig,

    /// Where drawings are saved.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("cad.startup_wait_secs", self.cad.startup_wait_secs),
            ("cad.command_delay_secs", self.cad.command_delay_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::ValidationError {
                    message: format!("{name} must be a non-negative number, got {value}"),
                });
            }
        }

        if self.output.default_filename.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "output.default_filename must not be empty".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            });
        }
        Ok(())
    }

    /// Builds the settings handed to a drawing backend.
    #[must_use]
    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            product: self.cad.application,
            startup_wait: seconds(self.cad.startup_wait_secs),
            command_delay: seconds(self.cad.command_delay_secs),
            output_directory: self.output.directory.clone(),
            default_filename: self.output.default_filename.clone(),
        }
    }
}

/// Converts validated seconds to a duration; invalid values become zero.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

/// Drawing engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CadConfig {
    /// Which backend to use: "auto", "dxf" or "automation".
    /// Default: "auto"
    #[serde(default)]
    pub backend: BackendChoice,

    /// Live application to drive: "AutoCAD", "GstarCAD" or "ZWCAD".
    #[serde(default)]
    pub application: CadProduct,

    /// Seconds to wait after launching the live application.
    #[serde(default = "default_startup_wait")]
    pub startup_wait_secs: f64,

    /// Seconds to pause after each live-application command.
    #[serde(default = "default_command_delay")]
    pub command_delay_secs: f64,
}

impl Default for CadConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::default(),
            application: CadProduct::default(),
            startup_wait_secs: default_startup_wait(),
            command_delay_secs: default_command_delay(),
        }
    }
}

const fn default_startup_wait() -> f64 {
    20.0
}

const fn default_command_delay() -> f64 {
    0.5
}

/// Output configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory for drawings saved without an explicit path.
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    /// File name for drawings saved without an explicit path.
    #[serde(default = "default_filename")]
    pub default_filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            default_filename: default_filename(),
        }
    }
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("./output")
}

fn default_filename() -> String {
    "cad_drawing.dxf".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
