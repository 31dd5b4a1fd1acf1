//! JSON-RPC 2.0 endpoint for MCP clients
//!
//! `POST /mcp` answers `initialize`, `ping`, `tools/list` and `tools/call`.
//! A failing tool is still a successful JSON-RPC response: its result carries
//! `isError: true` and the normalized `Failed to ...` text. JSON-RPC errors are
//! reserved for requests the host cannot dispatch.

use connector::Connector;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Dispatch one JSON-RPC message. Notifications (no `id`) get no response.
pub async fn handle(connector: &Connector, body: &[u8]) -> Option<JsonRpcResponse> {
    let raw: Value = match serde_json::from_slice(body) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "unparsable JSON-RPC message");
            return Some(JsonRpcResponse::error(
                Value::Null,
                PARSE_ERROR,
                format!("parse error: {e}"),
            ));
        }
    };
    let id_hint = raw.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(raw) {
        Ok(request) => request,
        Err(e) => {
            return Some(JsonRpcResponse::error(
                id_hint,
                INVALID_REQUEST,
                format!("invalid request: {e}"),
            ));
        }
    };
    if request.jsonrpc != JSONRPC_VERSION {
        return Some(JsonRpcResponse::error(
            id_hint,
            INVALID_REQUEST,
            "invalid request: jsonrpc must be \"2.0\"",
        ));
    }

    let Some(id) = request.id else {
        debug!(method = %request.method, "ignoring notification");
        return None;
    };

    let result = match request.method.as_str() {
        "initialize" => Ok(initialize(connector)),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": connector.tools() })),
        "tools/call" => call_tool(connector, request.params).await,
        other => Err((METHOD_NOT_FOUND, format!("method not found: {other}"))),
    };

    Some(match result {
        Ok(value) => JsonRpcResponse::result(id, value),
        Err((code, message)) => JsonRpcResponse::error(id, code, message),
    })
}

fn initialize(connector: &Connector) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": {
            "name": connector.id(),
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

async fn call_tool(connector: &Connector, params: Option<Value>) -> Result<Value, (i32, String)> {
    let params = params.ok_or((INVALID_PARAMS, "missing params".to_owned()))?;
    let params: ToolCallParams = serde_json::from_value(params)
        .map_err(|e| (INVALID_PARAMS, format!("invalid params: {e}")))?;

    let outcome = connector.call_tool(&params.name, params.arguments).await;
    serde_json::to_value(outcome.to_call_result())
        .map_err(|e| (INTERNAL_ERROR, format!("serializing tool result: {e}")))
}
