//! JSON-RPC 2.0 message shapes used by the MCP streamable HTTP transport.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::GatewayError;

pub const PROTOCOL_VERSION: &str = "2025-03-26";
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    /// `None` for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn call(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self { jsonrpc: "2.0", id: Some(id), method: method.into(), params }
    }

    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self { jsonrpc: "2.0", id: None, method: method.into(), params }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn matches(&self, request_id: u64) -> bool {
        self.id.as_ref().and_then(Value::as_u64) == Some(request_id)
    }

    pub fn into_result(self) -> Result<Value, GatewayError> {
        if let Some(error) = self.error {
            return Err(GatewayError::Protocol(format!(
                "server returned error {}: {}",
                error.code, error.message
            )));
        }
        self.result.ok_or_else(|| GatewayError::Protocol("response carried no result".to_owned()))
    }
}

pub fn initialize_params(client_name: &str, client_version: &str) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": client_name,
            "version": client_version,
        },
    })
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RemoteToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<RemoteToolSpec>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
    #[serde(rename = "structuredContent", default)]
    pub structured_content: Option<Value>,
}

impl CallToolResult {
    /// Text blocks joined by newlines; non-text blocks are skipped.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Unsupported => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Decodes an HTTP response body into the JSON-RPC reply for `request_id`.
///
/// The streamable HTTP transport may answer with a plain JSON body or with a
/// server-sent event stream; in the latter case the first `data:` frame whose
/// id matches the request wins.
pub fn decode_body(
    content_type: Option<&str>,
    body: &str,
    request_id: u64,
) -> Result<JsonRpcResponse, GatewayError> {
    let is_event_stream =
        content_type.map(|value| value.starts_with("text/event-stream")).unwrap_or(false);

    if !is_event_stream {
        return serde_json::from_str::<JsonRpcResponse>(body.trim())
            .map_err(|error| GatewayError::Protocol(format!("malformed JSON-RPC body: {error}")));
    }

    sse_data_frames(body)
        .into_iter()
        .filter_map(|frame| serde_json::from_str::<JsonRpcResponse>(&frame).ok())
        .find(|response| response.matches(request_id))
        .ok_or_else(|| {
            GatewayError::Protocol(format!("event stream carried no reply for request {request_id}"))
        })
}

fn sse_data_frames(body: &str) -> Vec<String> {
    let mut frames = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if !current.is_empty() {
                frames.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        if let Some(data) = line.strip_prefix("data:") {
            current.push(data.strip_prefix(' ').unwrap_or(data));
        }
    }
    if !current.is_empty() {
        frames.push(current.join("\n"));
    }

    frames
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{decode_body, CallToolResult, JsonRpcRequest, ListToolsResult};
    use crate::GatewayError;

    #[test]
    fn notifications_omit_id() {
        let encoded =
            serde_json::to_value(JsonRpcRequest::notification("notifications/initialized", json!({})))
                .expect("serializes");
        assert!(encoded.get("id").is_none());
        assert_eq!(encoded["jsonrpc"], "2.0");
    }

    #[test]
    fn decodes_plain_json_reply() {
        let body = r#"{"jsonrpc":"2.0","id":3,"result":{"tools":[]}}"#;
        let response = decode_body(Some("application/json"), body, 3).expect("decodes");
        assert!(response.matches(3));
        assert_eq!(response.into_result().expect("result"), json!({ "tools": [] }));
    }

    #[test]
    fn picks_matching_frame_from_event_stream() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\",\"params\":{}}\n\n\
                    event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":7,\"result\":{\"ok\":true}}\n\n";
        let response = decode_body(Some("text/event-stream"), body, 7).expect("decodes");
        assert_eq!(response.into_result().expect("result"), json!({ "ok": true }));
    }

    #[test]
    fn event_stream_without_matching_reply_is_protocol_error() {
        let body = "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n";
        let error = decode_body(Some("text/event-stream; charset=utf-8"), body, 2)
            .expect_err("no matching frame");
        assert!(matches!(error, GatewayError::Protocol(_)));
    }

    #[test]
    fn rpc_error_surfaces_code_and_message() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#;
        let error = decode_body(None, body, 1).expect("decodes").into_result().expect_err("error");
        assert_eq!(
            error,
            GatewayError::Protocol("server returned error -32601: Method not found".to_owned())
        );
    }

    #[test]
    fn catalog_entries_tolerate_missing_fields() {
        let parsed: ListToolsResult = serde_json::from_value(json!({
            "tools": [
                { "name": "users.search", "description": "Find people", "inputSchema": { "type": "object" } },
                { "name": "calendar.get_availability" }
            ]
        }))
        .expect("parses");

        assert_eq!(parsed.tools.len(), 2);
        assert_eq!(parsed.tools[1].description, None);
        assert_eq!(parsed.tools[1].input_schema, None);
    }

    #[test]
    fn call_result_joins_text_blocks_and_skips_others() {
        let parsed: CallToolResult = serde_json::from_value(json!({
            "content": [
                { "type": "text", "text": "Event created" },
                { "type": "image", "data": "...", "mimeType": "image/png" },
                { "type": "text", "text": "id=evt_1" }
            ],
            "isError": false
        }))
        .expect("parses");

        assert_eq!(parsed.text(), "Event created\nid=evt_1");
        assert!(!parsed.is_error);
    }
}
