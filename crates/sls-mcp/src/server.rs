// crates/sls-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: MCP server implementations for stdio and HTTP transports.
// Purpose: Expose SLS tools via JSON-RPC 2.0.
// Dependencies: axum, tokio, sls-config
// ============================================================================

//! ## Overview
//! The MCP server exposes SLS tools using JSON-RPC 2.0 over stdio
//! (`Content-Length` framing) or HTTP (`POST /rpc`). Every call is routed
//! through [`crate::tools::ToolRouter`]. Security posture: inputs are
//! untrusted; request bodies are size-capped before parsing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use sls_config::ServerTransport;
use sls_config::SlsConfig;

use crate::catalog::ToolDefinition;
use crate::tools::ToolError;
use crate::tools::ToolOutput;
use crate::tools::ToolRouter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// MCP protocol revision reported by `initialize`.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name reported by `initialize`.
const SERVER_NAME: &str = "sls-mcp";

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Server configuration.
    config: SlsConfig,
    /// Tool router for request dispatch.
    router: ToolRouter,
}

impl McpServer {
    /// Builds a new MCP server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when initialization fails.
    pub fn from_config(config: SlsConfig) -> Result<Self, McpServerError> {
        config.validate().map_err(|err| McpServerError::Config(err.to_string()))?;
        let router = ToolRouter::from_config(config.clone())
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        Ok(Self {
            config,
            router,
        })
    }

    /// Serves requests using the configured transport.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the server fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        let max_body_bytes = self.config.server.max_body_bytes;
        match self.config.server.transport {
            ServerTransport::Stdio => serve_stdio(&self.router, max_body_bytes),
            ServerTransport::Http => serve_http(self.config, self.router).await,
        }
    }
}

// ============================================================================
// SECTION: Stdio Transport
// ============================================================================

/// Serves JSON-RPC requests over stdin/stdout until stdin closes.
fn serve_stdio(router: &ToolRouter, max_body_bytes: usize) -> Result<(), McpServerError> {
    let mut reader = BufReader::new(std::io::stdin());
    let mut writer = std::io::stdout();
    while let Some(bytes) = read_framed(&mut reader, max_body_bytes)? {
        if is_notification(&bytes) {
            continue;
        }
        let (_, response) = parse_request(router, max_body_bytes, &bytes);
        let payload = serde_json::to_vec(&response)
            .map_err(|_| McpServerError::Transport("json-rpc serialization failed".to_string()))?;
        write_framed(&mut writer, &payload)?;
    }
    Ok(())
}

/// Returns true for JSON-RPC notifications, which get no reply.
fn is_notification(bytes: &[u8]) -> bool {
    serde_json::from_slice::<Value>(bytes).is_ok_and(|value| {
        value.get("id").is_none_or(Value::is_null)
            && value
                .get("method")
                .and_then(Value::as_str)
                .is_some_and(|method| method.starts_with("notifications/"))
    })
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Shared server state for HTTP handlers.
#[derive(Clone)]
struct ServerState {
    /// Tool router for request dispatch.
    router: ToolRouter,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
}

/// Serves JSON-RPC requests over HTTP.
async fn serve_http(config: SlsConfig, router: ToolRouter) -> Result<(), McpServerError> {
    let addr = config.server.bind_addr().map_err(|err| McpServerError::Config(err.to_string()))?;
    let state = Arc::new(ServerState {
        router,
        max_body_bytes: config.server.max_body_bytes,
    });
    let app = Router::new().route("/rpc", post(handle_http)).with_state(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|_| McpServerError::Transport("http bind failed".to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|_| McpServerError::Transport("http server failed".to_string()))
}

/// Handles HTTP JSON-RPC requests.
async fn handle_http(State(state): State<Arc<ServerState>>, bytes: Bytes) -> impl IntoResponse {
    let (status, response) = parse_request(&state.router, state.max_body_bytes, bytes.as_ref());
    (status, axum::Json(response))
}

// ============================================================================
// SECTION: JSON-RPC Handling
// ============================================================================

/// Incoming JSON-RPC request payload.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier; null for notifications.
    #[serde(default)]
    id: Value,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
}

/// Tool call parameters for JSON-RPC requests.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    arguments: Value,
}

/// Tool list response payload.
#[derive(Debug, Serialize)]
struct ToolListResult {
    /// Registered tool definitions.
    tools: Vec<ToolDefinition>,
}

/// Tool call response payload.
#[derive(Debug, Serialize)]
struct ToolCallResult {
    /// Tool output content.
    content: Vec<ToolContent>,
    /// Set when the log service answered with a failure.
    #[serde(rename = "isError")]
    is_error: bool,
}

/// Tool output payloads for JSON-RPC responses.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolContent {
    /// JSON tool output.
    Json {
        /// JSON payload.
        json: Value,
    },
}

impl JsonRpcResponse {
    /// Builds a result envelope.
    const fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }
}

/// Rejected request with its HTTP status and JSON-RPC code.
#[derive(Debug)]
struct RpcFailure {
    /// HTTP status for the HTTP transport.
    status: StatusCode,
    /// JSON-RPC error code.
    code: i64,
    /// Error message.
    message: String,
}

impl RpcFailure {
    /// Builds a failure with an explicit status and code.
    fn new(status: StatusCode, code: i64, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// Renders the failure as a response for `id`.
    fn respond(self, id: Value) -> (StatusCode, JsonRpcResponse) {
        let response = JsonRpcResponse {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code: self.code,
                message: self.message,
            }),
        };
        (self.status, response)
    }
}

impl From<ToolError> for RpcFailure {
    fn from(error: ToolError) -> Self {
        match error {
            ToolError::UnknownTool => Self::new(StatusCode::BAD_REQUEST, -32601, "unknown tool"),
            ToolError::InvalidParams(message) => {
                Self::new(StatusCode::BAD_REQUEST, -32602, message)
            }
            ToolError::Config(message) => Self::new(StatusCode::OK, -32010, message),
            ToolError::Client(message) => Self::new(StatusCode::OK, -32020, message),
            ToolError::Internal(message) => Self::new(StatusCode::OK, -32050, message),
            ToolError::Serialization => Self::new(StatusCode::OK, -32060, "serialization failed"),
        }
    }
}

/// Parses and validates a JSON-RPC request payload.
fn parse_request(
    router: &ToolRouter,
    max_body_bytes: usize,
    bytes: &[u8],
) -> (StatusCode, JsonRpcResponse) {
    if bytes.len() > max_body_bytes {
        return RpcFailure::new(StatusCode::PAYLOAD_TOO_LARGE, -32070, "request body too large")
            .respond(Value::Null);
    }
    match serde_json::from_slice::<JsonRpcRequest>(bytes) {
        Ok(request) => handle_request(router, request),
        Err(_) => RpcFailure::new(StatusCode::BAD_REQUEST, -32600, "invalid json-rpc request")
            .respond(Value::Null),
    }
}

/// Dispatches a JSON-RPC request by method.
fn handle_request(router: &ToolRouter, request: JsonRpcRequest) -> (StatusCode, JsonRpcResponse) {
    if request.jsonrpc != "2.0" {
        return RpcFailure::new(StatusCode::BAD_REQUEST, -32600, "invalid json-rpc version")
            .respond(request.id);
    }
    let outcome = match request.method.as_str() {
        "initialize" => Ok(initialize_result()),
        "tools/list" => list_tools_result(router),
        "tools/call" => call_tool_result(router, request.params),
        _ => Err(RpcFailure::new(StatusCode::BAD_REQUEST, -32601, "method not found")),
    };
    match outcome {
        Ok(result) => (StatusCode::OK, JsonRpcResponse::result(request.id, result)),
        Err(failure) => failure.respond(request.id),
    }
}

/// Server identity and capabilities for `initialize`.
fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
        "capabilities": { "tools": { "listChanged": false } },
    })
}

/// Tool catalog for `tools/list`.
fn list_tools_result(router: &ToolRouter) -> Result<Value, RpcFailure> {
    serde_json::to_value(ToolListResult {
        tools: router.list_tools(),
    })
    .map_err(|_| RpcFailure::from(ToolError::Serialization))
}

/// Runs one tool for `tools/call`.
fn call_tool_result(router: &ToolRouter, params: Option<Value>) -> Result<Value, RpcFailure> {
    let call = serde_json::from_value::<ToolCallParams>(params.unwrap_or(Value::Null))
        .map_err(|_| RpcFailure::new(StatusCode::BAD_REQUEST, -32602, "invalid tool params"))?;
    let output = call_tool_with_blocking(router, &call.name, call.arguments)?;
    serde_json::to_value(ToolCallResult {
        content: vec![ToolContent::Json {
            json: output.value,
        }],
        is_error: output.is_error,
    })
    .map_err(|_| RpcFailure::from(ToolError::Serialization))
}

/// Executes a tool call, shifting to a blocking context when available.
fn call_tool_with_blocking(
    router: &ToolRouter,
    name: &str,
    arguments: Value,
) -> Result<ToolOutput, ToolError> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| router.invoke(name, arguments))
        }
        _ => router.invoke(name, arguments),
    }
}

// ============================================================================
// SECTION: Framing Helpers
// ============================================================================

/// Reads a framed stdio payload using MCP Content-Length headers.
///
/// Returns `None` when the stream ends before a new frame starts.
fn read_framed(
    reader: &mut BufReader<impl Read>,
    max_body_bytes: usize,
) -> Result<Option<Vec<u8>>, McpServerError> {
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader
            .read_line(&mut line)
            .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
        if bytes == 0 {
            if saw_header {
                return Err(McpServerError::Transport("stdio closed mid-frame".to_string()));
            }
            return Ok(None);
        }
        if line.trim().is_empty() {
            if saw_header {
                break;
            }
            continue;
        }
        saw_header = true;
        if let Some(value) = line.strip_prefix("Content-Length:") {
            let parsed = value
                .trim()
                .parse::<usize>()
                .map_err(|_| McpServerError::Transport("invalid content length".to_string()))?;
            content_length = Some(parsed);
        }
    }
    let len = content_length
        .ok_or_else(|| McpServerError::Transport("missing content length".to_string()))?;
    if len > max_body_bytes {
        return Err(McpServerError::Transport("payload too large".to_string()));
    }
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
    Ok(Some(buf))
}

/// Writes a framed stdio payload using MCP Content-Length headers.
fn write_framed(writer: &mut impl Write, payload: &[u8]) -> Result<(), McpServerError> {
    let header = format!("Content-Length: {}\r\n\r\n", payload.len());
    writer
        .write_all(header.as_bytes())
        .map_err(|_| McpServerError::Transport("stdio write failed".to_string()))?;
    writer
        .write_all(payload)
        .map_err(|_| McpServerError::Transport("stdio write failed".to_string()))?;
    writer.flush().map_err(|_| McpServerError::Transport("stdio write failed".to_string()))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only framing and dispatch assertions."
    )]

    use std::collections::BTreeMap;
    use std::io::BufReader;
    use std::io::Cursor;

    use sls_client::OutboundRequest;
    use sls_client::ResponseEnvelope;
    use sls_client::Transport;

    use super::*;
    use crate::audit::NoopServiceLogSink;

    /// Transport that always answers with one status and body.
    struct FixedTransport {
        status: u16,
        body: &'static str,
    }

    impl Transport for FixedTransport {
        fn send(&self, _request: &OutboundRequest) -> ResponseEnvelope {
            ResponseEnvelope::received(self.status, self.body, BTreeMap::new())
        }
    }

    fn router() -> ToolRouter {
        router_with(FixedTransport {
            status: 200,
            body: "{}",
        })
    }

    fn router_with(transport: FixedTransport) -> ToolRouter {
        let config = SlsConfig::from_toml(
            r#"
[credentials]
access_key_id = "AKID"
access_key_secret = "secret"

[[systems]]
name = "ads"
endpoint = "log.example.com"
project = "proj1"
"#,
        )
        .unwrap();
        ToolRouter::new(config, Arc::new(transport), Arc::new(NoopServiceLogSink))
    }

    fn rpc(payload: &str) -> (StatusCode, Value) {
        let (status, response) = parse_request(&router(), 1024 * 1024, payload.as_bytes());
        (status, serde_json::to_value(response).unwrap())
    }

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut bytes = format!("Content-Length: {}\r\n\r\n", payload.len()).into_bytes();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn read_framed_rejects_payload_over_limit() {
        let payload = br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let mut reader = BufReader::new(Cursor::new(framed(payload)));
        let result = read_framed(&mut reader, payload.len() - 1);
        assert!(result.is_err());
    }

    #[test]
    fn read_framed_accepts_payload_at_limit() {
        let payload = br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let mut reader = BufReader::new(Cursor::new(framed(payload)));
        let bytes = read_framed(&mut reader, payload.len()).unwrap().unwrap();
        assert_eq!(bytes, payload);
        assert!(read_framed(&mut reader, payload.len()).unwrap().is_none());
    }

    #[test]
    fn read_framed_rejects_truncated_headers() {
        let mut reader = BufReader::new(Cursor::new(b"Content-Length: 10\r\n".to_vec()));
        assert!(read_framed(&mut reader, 1024).is_err());
    }

    #[test]
    fn write_framed_prefixes_length() {
        let mut out = Vec::new();
        write_framed(&mut out, b"{}").unwrap();
        assert_eq!(out, b"Content-Length: 2\r\n\r\n{}");
    }

    #[test]
    fn notifications_are_detected() {
        assert!(is_notification(br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#));
        assert!(!is_notification(br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#));
    }

    #[test]
    fn initialize_reports_server_info() {
        let (status, value) = rpc(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["result"]["serverInfo"]["name"], "sls-mcp");
        assert_eq!(value["result"]["protocolVersion"], PROTOCOL_VERSION);
    }

    #[test]
    fn tools_list_includes_every_tool() {
        let (_, value) = rpc(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#);
        let tools = value["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), crate::catalog::ToolName::all().len());
    }

    #[test]
    fn tools_call_wraps_json_content() {
        let (status, value) = rpc(
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call",
                "params":{"name":"get_project","arguments":{"systemName":"ads"}}}"#,
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["id"], 3);
        assert_eq!(value["result"]["content"][0]["type"], "json");
        assert_eq!(value["result"]["content"][0]["json"], json!({}));
        assert_eq!(value["result"]["isError"], false);
    }

    #[test]
    fn tools_call_flags_service_failures() {
        let router = router_with(FixedTransport {
            status: 403,
            body: "denied",
        });
        let payload = br#"{"jsonrpc":"2.0","id":4,"method":"tools/call",
            "params":{"name":"get_project","arguments":{"systemName":"ads"}}}"#;
        let (status, response) = parse_request(&router, 1024 * 1024, payload);
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["result"]["isError"], true);
        assert_eq!(value["result"]["content"][0]["json"], json!({"error": "denied"}));
    }

    #[test]
    fn error_codes_follow_failure_class() {
        let cases = [
            (r#"{"jsonrpc":"1.0","id":1,"method":"tools/list"}"#, -32600),
            (r#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}"#, -32601),
            (r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"nope"}}"#, -32601),
            (r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{}}"#, -32602),
            (
                r#"{"jsonrpc":"2.0","id":1,"method":"tools/call",
                    "params":{"name":"get_project","arguments":{"systemName":"x"}}}"#,
                -32010,
            ),
            (
                r#"{"jsonrpc":"2.0","id":1,"method":"tools/call",
                    "params":{"name":"get_index","arguments":{"systemName":"ads","logstore":"a/b"}}}"#,
                -32020,
            ),
            ("not json", -32600),
        ];
        for (payload, code) in cases {
            let (_, value) = rpc(payload);
            assert_eq!(value["error"]["code"], code, "{payload}");
        }
    }

    #[test]
    fn oversized_body_is_rejected_before_parsing() {
        let (status, response) = parse_request(&router(), 4, b"{\"jsonrpc\":\"2.0\"}");
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["error"]["code"], -32070);
    }
}
