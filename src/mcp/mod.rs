//! Model Context Protocol (MCP) server.
//!
//! Exposes the drafting operations as MCP tools over stdio using
//! newline-delimited JSON-RPC 2.0 messages.
//!
//! ```text
//!   stdin ──▶ Transport ──▶ McpServer ──▶ Dispatcher ──▶ DrawingBackend
//!   stdout ◀──────────────────┘
//! ```
//!
//! Targets MCP protocol version 2024-11-05.

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::McpServer;
pub use transport::{StdioTransport, Transport};
