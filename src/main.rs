//! cad-drawing-mcp: MCP server for natural-language and structured 2D drafting.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use cad_drawing_mcp::config;
use cad_drawing_mcp::drawing::automation::CadConnector;
use cad_drawing_mcp::drawing::{open_backend, BackendChoice};
use cad_drawing_mcp::mcp::server::McpServer;

/// MCP server for 2D drafting.
///
/// Accepts drawing commands in plain language or as structured tool calls and
/// draws them into a DXF file or a running CAD application.
#[derive(Parser, Debug)]
#[command(name = "cad-drawing-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Drawing backend, overriding the configuration file
    #[arg(short, long, value_enum)]
    backend: Option<BackendArg>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    /// Live application if available, otherwise DXF
    Auto,
    /// DXF file output
    Dxf,
    /// Live CAD application
    Automation,
}

impl From<BackendArg> for BackendChoice {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => Self::Auto,
            BackendArg::Dxf => Self::Dxf,
            BackendArg::Automation => Self::Automation,
        }
    }
}

/// Returns the bridge to a live CAD application on this platform.
#[cfg(windows)]
fn platform_connector(choice: BackendChoice) -> Option<Box<dyn CadConnector>> {
    use cad_drawing_mcp::drawing::automation::ComConnector;

    if choice == BackendChoice::Dxf {
        return None;
    }
    match ComConnector::new() {
        Ok(connector) => Some(Box::new(connector)),
        Err(e) => {
            tracing::warn!(error = %e, "Live application backend disabled");
            None
        }
    }
}

#[cfg(not(windows))]
const fn platform_connector(_choice: BackendChoice) -> Option<Box<dyn CadConnector>> {
    None
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber. Logs go to stderr; stdout carries
/// protocol messages only.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nConfig location: {}", default_path.display());
                    eprintln!("Create one based on config/example-config.json");
                }
            }
            return ExitCode::FAILURE;
        }
    };

    init_tracing(get_log_level(args.verbose, args.quiet, &cfg.logging.level));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting cad-drawing-mcp server"
    );

    let choice = args.backend.map_or(cfg.cad.backend, BackendChoice::from);
    let settings = cfg.backend_settings();
    info!(
        backend = ?choice,
        application = %settings.product,
        output = %settings.output_directory.display(),
        "Drawing settings"
    );

    let backend = match open_backend(choice, settings, platform_connector(choice)) {
        Ok(backend) => backend,
        Err(e) => {
            error!(error = %e, "No drawing backend available");
            eprintln!("Backend error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut server = McpServer::new(backend);

    info!("MCP server ready, waiting for client connection...");

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(server.run()) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn backend_flag_parses() {
        let args = Args::parse_from(["cad-drawing-mcp", "--backend", "dxf", "-vv"]);
        assert!(matches!(args.backend, Some(BackendArg::Dxf)));
        assert_eq!(args.verbose, 2);
        assert_eq!(
            BackendChoice::from(BackendArg::Automation),
            BackendChoice::Automation
        );
    }

    #[test]
    fn quiet_wins_over_config() {
        assert_eq!(get_log_level(0, true, "debug"), Level::ERROR);
        assert_eq!(get_log_level(0, false, "INFO"), Level::INFO);
        assert_eq!(get_log_level(3, false, "warn"), Level::TRACE);
    }
}
