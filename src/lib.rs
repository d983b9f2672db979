//! cad-drawing-mcp: drafting commands for CAD drawings over MCP
//!
//! Turns natural-language commands ("draw a red line from (0,0) to (10,10)")
//! and structured requests into drawing operations, and runs them against one
//! of two interchangeable backends:
//!
//! - **DXF**: an in-process vector document saved as an ASCII DXF file
//! - **Automation**: a live CAD application driven through its object model
//!
//! # Modules
//!
//! - [`geometry`]: point normalisation
//! - [`command`]: free-text lexing, classification and shape parsing
//! - [`drawing`]: shape records, styles and the backends
//! - [`dispatch`]: routing parsed commands and actions to a backend
//! - [`config`]: configuration loading and validation
//! - [`error`]: configuration errors
//! - [`mcp`]: MCP stdio server

pub mod command;
pub mod config;
pub mod dispatch;
pub mod drawing;
pub mod error;
pub mod geometry;
pub mod mcp;
