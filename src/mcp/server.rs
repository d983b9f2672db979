//! MCP server exposing the drafting operations as tools.
//!
//! Lifecycle:
//!
//! 1. **Initialisation**: `initialize` request, then the `notifications/initialized`
//!    notification
//! 2. **Operation**: `tools/list`, `tools/call` and `ping`
//! 3. **Shutdown**: end of input or a termination signal; the drawing session
//!    is closed on the way out
//!
//! Each tool name is a structured action and its arguments are that action's
//! parameters. The server owns the one backend instance and starts its
//! session lazily before the first tool call.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::command::parse_command;
use crate::dispatch::{Action, Dispatcher, RequestError};
use crate::drawing::DrawingBackend;
use crate::mcp::protocol::{
    parse_message, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::transport::{StdioTransport, Transport};

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// Capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool capabilities; the tool list is fixed.
    pub tools: ToolCapabilities,
}

/// Tool capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Server information for the initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: &'static str,
    /// Server version.
    pub version: &'static str,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters of the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by the client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// A tool definition for the tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Tool name; also the structured action name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// JSON Schema for the tool's arguments.
    pub input_schema: Value,
}

/// Parameters of a tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call failed.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(message)
        }
    }
}

/// A reply to one request.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// Success.
    Response(JsonRpcResponse),
    /// Failure.
    Error(JsonRpcError),
}

impl From<Result<JsonRpcResponse, JsonRpcError>> for Reply {
    fn from(result: Result<JsonRpcResponse, JsonRpcError>) -> Self {
        match result {
            Ok(response) => Self::Response(response),
            Err(error) => Self::Error(error),
        }
    }
}

/// The MCP server for drafting operations.
pub struct McpServer {
    /// Current server state.
    state: ServerState,
    /// The drawing backend every tool call goes to.
    backend: Box<dyn DrawingBackend>,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
}

impl McpServer {
    /// Creates a server around `backend`. The backend's session is not
    /// started until the first tool call.
    #[must_use]
    pub fn new(backend: Box<dyn DrawingBackend>) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            backend,
            protocol_version: None,
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Returns the drawing backend.
    #[must_use]
    pub fn backend(&self) -> &dyn DrawingBackend {
        self.backend.as_ref()
    }

    /// Runs the server on stdio until end of input or a termination signal.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> io::Result<()> {
        let mut transport = StdioTransport::stdio();
        let result = self.run_with_shutdown(&mut transport).await;
        self.shutdown();
        result
    }

    /// Serves `transport` until the client closes its end.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn serve<R, W>(&mut self, transport: &mut Transport<R, W>) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let line = transport.read_line().await;
            if self.handle_transport_result(transport, line).await? {
                break;
            }
        }
        self.shutdown();
        Ok(())
    }

    /// Runs the main loop and handles shutdown.
    #[cfg(unix)]
    async fn run_with_shutdown(&mut self, transport: &mut StdioTransport) -> io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(io::Error::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(io::Error::other)?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    return Ok(());
                }

                line = transport.read_line() => {
                    if self.handle_transport_result(transport, line).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Runs the main loop and handles shutdown.
    #[cfg(windows)]
    async fn run_with_shutdown(&mut self, transport: &mut StdioTransport) -> io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                    return Ok(());
                }

                line = transport.read_line() => {
                    if self.handle_transport_result(transport, line).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Answers one transport read. Returns `true` when the loop should stop.
    async fn handle_transport_result<R, W>(
        &mut self,
        transport: &mut Transport<R, W>,
        line: io::Result<Option<String>>,
    ) -> io::Result<bool>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Some(line) = line? else {
            tracing::info!("Client closed the connection");
            return Ok(true);
        };

        if let Some(reply) = self.handle_line(&line) {
            transport.send(&reply).await?;
        }

        Ok(self.state == ServerState::ShuttingDown)
    }

    /// Closes the drawing session and marks the server as shutting down.
    fn shutdown(&mut self) {
        self.state = ServerState::ShuttingDown;
        if self.backend.is_running() {
            tracing::info!(backend = %self.backend.kind(), "Closing drawing session");
            self.backend.close();
        }
    }

    /// Handles one line of input and returns the reply, if any.
    ///
    /// Blank lines and notifications produce no reply.
    pub fn handle_line(&mut self, line: &str) -> Option<Reply> {
        if line.trim().is_empty() {
            return None;
        }

        match parse_message(line) {
            Ok(IncomingMessage::Request(req)) => Some(self.handle_request(&req)),
            Ok(IncomingMessage::Notification(notif)) => {
                self.handle_notification(&notif);
                None
            }
            Err(error) => {
                tracing::warn!(code = error.error.code, "Rejected malformed message");
                Some(Reply::Error(error))
            }
        }
    }

    /// Handles an incoming request.
    fn handle_request(&mut self, req: &JsonRpcRequest) -> Reply {
        tracing::debug!(id = %req.id, method = %req.method, "Handling request");
        let result = match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "tools/list" => self.handle_tools_list(req),
            "tools/call" => self.handle_tools_call(req),
            "ping" => Ok(JsonRpcResponse::success(req.id.clone(), json!({}))),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        };
        Reply::from(result)
    }

    /// Handles an incoming notification.
    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        if notif.method == "notifications/initialized" && self.state == ServerState::Initialising {
            tracing::info!("Client initialised");
            self.state = ServerState::Running;
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::rejected(
                req.id.clone(),
                "Server already initialised",
            ));
        }

        let params: InitializeParams = req.decode_params("initialize")?;
        tracing::info!(
            client = params.client_info.as_ref().map_or("unknown", |c| c.name.as_str()),
            requested_version = %params.protocol_version,
            "Initialising"
        );

        self.protocol_version = Some(MCP_PROTOCOL_VERSION.to_string());
        self.state = ServerState::Initialising;

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": ServerCapabilities {
                    tools: ToolCapabilities::default(),
                },
                "serverInfo": ServerInfo::default(),
            }),
        ))
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "tools": tool_definitions() }),
        ))
    }

    /// Handles the tools/call request.
    fn handle_tools_call(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let params: ToolCallParams = req.decode_params("tool call")?;
        let result = self.call_tool(&params.name, params.arguments);

        let value = serde_json::to_value(&result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(
                req.id.clone(),
                "Internal error: failed to serialise result",
            )
        })?;
        Ok(JsonRpcResponse::success(req.id.clone(), value))
    }

    /// Ensures the server is in the Running state.
    fn require_running(&self, id: &RequestId) -> Result<(), JsonRpcError> {
        if self.state != ServerState::Running {
            return Err(JsonRpcError::rejected(id.clone(), "Server not initialised"));
        }
        Ok(())
    }

    /// Starts the backend session if it is not running yet.
    fn ensure_session(&mut self) -> bool {
        if self.backend.is_running() {
            return true;
        }
        tracing::info!(backend = %self.backend.kind(), "Starting drawing session");
        self.backend.start_session()
    }

    /// Decodes and executes one tool call.
    fn call_tool(&mut self, name: &str, arguments: Value) -> ToolCallResult {
        let action = match Action::from_parts(name, arguments) {
            Ok(action) => action,
            Err(RequestError::UnsupportedAction { .. }) => {
                return ToolCallResult::error(format!("Unknown tool: {name}"));
            }
            Err(e) => return ToolCallResult::error(e.to_string()),
        };

        if !self.ensure_session() {
            return ToolCallResult::error(format!(
                "Could not start the {} drawing session",
                self.backend.kind()
            ));
        }

        let outcome = Dispatcher::new(self.backend.as_mut()).execute(&action);
        let mut body = outcome.to_value();
        if let Action::ProcessCommand(request) = &action {
            body["parsed"] = parse_command(&request.command).to_value();
        }

        let text = serde_json::to_string_pretty(&body).unwrap_or_default();
        if outcome.ok {
            ToolCallResult::text(text)
        } else {
            ToolCallResult::error(text)
        }
    }
}

/// Schema of a 2D or 3D point.
fn point(description: &str) -> Value {
    json!({
        "type": "array",
        "items": { "type": "number" },
        "minItems": 2,
        "maxItems": 3,
        "description": description,
    })
}

fn number(description: &str) -> Value {
    json!({ "type": "number", "description": description })
}

fn color() -> Value {
    json!({
        "type": ["string", "integer"],
        "description": "Palette name (red, yellow, green, cyan, blue, magenta, white, \
                        black, gray) or a raw colour index",
    })
}

/// Object schema with `properties`, plus the shared style fields.
fn styled(mut properties: Value, required: &[&str]) -> Value {
    if let Some(map) = properties.as_object_mut() {
        map.insert("color".to_string(), color());
        map.insert(
            "layer".to_string(),
            json!({ "type": "string", "description": "Layer to draw on" }),
        );
        map.insert(
            "lineweight".to_string(),
            json!({
                "type": "integer",
                "description": "Lineweight in hundredths of a millimetre; \
                                unsupported values fall back to 0",
            }),
        );
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Returns the tool list.
#[allow(clippy::too_many_lines)]
fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "draw_line",
            description: "Draw a straight line between two points.",
            input_schema: styled(
                json!({
                    "start_point": point("Start point [x, y] or [x, y, z]"),
                    "end_point": point("End point [x, y] or [x, y, z]"),
                }),
                &["start_point", "end_point"],
            ),
        },
        ToolDefinition {
            name: "draw_circle",
            description: "Draw a circle from its center and radius.",
            input_schema: styled(
                json!({
                    "center": point("Center point"),
                    "radius": number("Radius"),
                }),
                &["center", "radius"],
            ),
        },
        ToolDefinition {
            name: "draw_arc",
            description: "Draw a circular arc. Angles are in degrees, counter-clockwise \
                          from the positive x axis.",
            input_schema: styled(
                json!({
                    "center": point("Center point"),
                    "radius": number("Radius"),
                    "start_angle": number("Start angle in degrees"),
                    "end_angle": number("End angle in degrees"),
                }),
                &["center", "radius", "start_angle", "end_angle"],
            ),
        },
        ToolDefinition {
            name: "draw_rectangle",
            description: "Draw an axis-aligned rectangle as a closed polyline from two \
                          opposite corners.",
            input_schema: styled(
                json!({
                    "corner1": point("First corner"),
                    "corner2": point("Opposite corner"),
                }),
                &["corner1", "corner2"],
            ),
        },
        ToolDefinition {
            name: "draw_polyline",
            description: "Draw a polyline through at least two points. It is only closed \
                          when it has more than two points.",
            input_schema: styled(
                json!({
                    "points": {
                        "type": "array",
                        "items": point("Vertex"),
                        "minItems": 2,
                    },
                    "closed": {
                        "type": "boolean",
                        "description": "Join the last point back to the first",
                        "default": false,
                    },
                }),
                &["points"],
            ),
        },
        ToolDefinition {
            name: "draw_text",
            description: "Place single-line text.",
            input_schema: styled(
                json!({
                    "position": point("Insertion point"),
                    "text": { "type": "string", "description": "Text content" },
                    "height": {
                        "type": "number",
                        "description": "Text height",
                        "default": 2.5,
                    },
                    "rotation": {
                        "type": "number",
                        "description": "Rotation in degrees",
                        "default": 0,
                    },
                }),
                &["position", "text"],
            ),
        },
        ToolDefinition {
            name: "draw_hatch",
            description: "Fill a closed boundary with a hatch pattern. The boundary is \
                          drawn as a closed polyline first.",
            input_schema: styled(
                json!({
                    "points": {
                        "type": "array",
                        "items": point("Boundary vertex"),
                        "minItems": 3,
                    },
                    "pattern_name": {
                        "type": "string",
                        "description": "Predefined pattern name; SOLID fills solid",
                        "default": "ANSI31",
                    },
                    "scale": {
                        "type": "number",
                        "description": "Pattern scale",
                        "default": 1.0,
                    },
                }),
                &["points"],
            ),
        },
        ToolDefinition {
            name: "add_dimension",
            description: "Add an aligned dimension measuring the distance between two \
                          points. Without a text position the text is placed 5 units above \
                          the midpoint.",
            input_schema: styled(
                json!({
                    "point1": point("First measured point"),
                    "point2": point("Second measured point"),
                    "text_position": point("Dimension text location"),
                    "text_height": number("Dimension text height"),
                }),
                &["point1", "point2"],
            ),
        },
        ToolDefinition {
            name: "draw_ellipse",
            description: "Draw an ellipse from its center, axis lengths and rotation.",
            input_schema: styled(
                json!({
                    "center": point("Center point"),
                    "major_axis": number("Major axis length"),
                    "minor_axis": number("Minor axis length"),
                    "rotation": {
                        "type": "number",
                        "description": "Rotation of the major axis in degrees",
                        "default": 0,
                    },
                }),
                &["center", "major_axis", "minor_axis"],
            ),
        },
        ToolDefinition {
            name: "create_layer",
            description: "Create a layer, or activate it if it already exists. The colour \
                          is only applied when the layer is created.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Layer name" },
                    "color": color(),
                },
                "required": ["name"],
            }),
        },
        ToolDefinition {
            name: "zoom_extents",
            description: "Fit the view to all entities in the drawing.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDefinition {
            name: "save_drawing",
            description: "Save the drawing. Without a filename the configured output \
                          directory and default file name are used. The DXF backend always \
                          writes .dxf files.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "filename": {
                        "type": "string",
                        "description": "Target file path",
                    },
                },
            }),
        },
        ToolDefinition {
            name: "process_command",
            description: "Interpret a natural-language drawing command such as \
                          'draw a red circle at (0,0) with radius 5' or 'save as plan.dxf' \
                          and execute it.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The command text" },
                },
                "required": ["command"],
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ACTION_NAMES;
    use crate::drawing::dxf::DxfBackend;
    use crate::drawing::{BackendSettings, SessionState};

    fn server() -> McpServer {
        McpServer::new(Box::new(DxfBackend::new(BackendSettings::default())))
    }

    fn running() -> McpServer {
        let mut server = server();
        server.handle_line(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
        );
        server.handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);
        server
    }

    fn call(server: &mut McpServer, name: &str, arguments: Value) -> Value {
        let line = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments},
        })
        .to_string();
        serde_json::to_value(server.handle_line(&line).unwrap()).unwrap()
    }

    #[test]
    fn server_initial_state() {
        let server = server();
        assert_eq!(server.state(), ServerState::AwaitingInit);
        assert_eq!(server.backend().state(), SessionState::Unconnected);
    }

    #[test]
    fn one_tool_per_action() {
        let tools = tool_definitions();
        let names: Vec<&str> = tools.iter().map(|t| t.name).collect();
        assert_eq!(names, ACTION_NAMES);
        for tool in &tools {
            assert!(tool.input_schema.is_object());
            assert!(!tool.description.is_empty());
        }
    }

    #[test]
    fn tool_call_result_error() {
        let result = ToolCallResult::error("Something went wrong");
        assert!(result.is_error);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0]["type"], "text");
    }

    #[test]
    fn success_omits_is_error() {
        let value = serde_json::to_value(ToolCallResult::text("ok")).unwrap();
        assert!(value.get("isError").is_none());
    }

    #[test]
    fn tools_rejected_before_initialisation() {
        let mut server = server();
        let reply = call(&mut server, "zoom_extents", json!({}));
        assert_eq!(reply["error"]["code"], -32600);
    }

    #[test]
    fn first_tool_call_starts_session() {
        let mut server = running();
        let reply = call(
            &mut server,
            "draw_circle",
            json!({"center": [0, 0], "radius": 5}),
        );
        assert!(reply["result"].get("isError").is_none());
        assert_eq!(server.backend().state(), SessionState::Ready);
    }

    #[test]
    fn unknown_tool_is_tool_error() {
        let mut server = running();
        let reply = call(&mut server, "explode", json!({}));
        assert_eq!(reply["result"]["isError"], true);
        assert_eq!(reply["result"]["content"][0]["text"], "Unknown tool: explode");
        assert_eq!(server.backend().state(), SessionState::Unconnected);
    }

    #[test]
    fn process_command_reports_parse() {
        let mut server = running();
        let reply = call(
            &mut server,
            "process_command",
            json!({"command": "draw a blue circle at (1,1) radius 2"}),
        );
        let text = reply["result"]["content"][0]["text"].as_str().unwrap();
        let body: Value = serde_json::from_str(text).unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["parsed"]["shape"], "circle");
        assert_eq!(body["parsed"]["color"], "blue");
    }

    #[test]
    fn shutdown_closes_session() {
        let mut server = running();
        call(&mut server, "zoom_extents", json!({}));
        server.shutdown();
        assert_eq!(server.state(), ServerState::ShuttingDown);
        assert_eq!(server.backend().state(), SessionState::Closed);
    }
}
