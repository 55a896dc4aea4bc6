//! JSON-RPC 2.0 message shapes for the MCP stdio transport.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol versions this client can speak, newest last.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

/// Version offered in our `initialize` request.
pub const PREFERRED_PROTOCOL_VERSION: &str = "2025-06-18";

/// JSON-RPC "method not found".
pub const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, Serialize)]
pub struct OutgoingRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct OutgoingNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct OutgoingResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

/// Structured JSON-RPC error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// What a response carried.
pub type Reply = Result<Value, RpcErrorObject>;

/// A decoded inbound line.
#[derive(Debug)]
pub enum Incoming {
    Response { id: Value, reply: Reply },
    Request { id: Value, method: String, params: Option<Value> },
    Notification { method: String, params: Option<Value> },
}

/// Why an inbound line could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not a JSON-RPC message: {0}")]
    Shape(&'static str),
}

impl Incoming {
    /// Classify one line. Anything that isn't a well-formed request,
    /// notification or response is a `DecodeError`.
    pub fn decode(line: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(line)?;
        let Value::Object(mut obj) = value else {
            return Err(DecodeError::Shape("message is not an object"));
        };

        let id = obj.remove("id").filter(|id| !id.is_null());
        let method = match obj.remove("method") {
            Some(Value::String(method)) => Some(method),
            Some(_) => return Err(DecodeError::Shape("method is not a string")),
            None => None,
        };

        match (id, method) {
            (Some(id), Some(method)) => Ok(Self::Request {
                id,
                method,
                params: obj.remove("params"),
            }),
            (None, Some(method)) => Ok(Self::Notification {
                method,
                params: obj.remove("params"),
            }),
            (Some(id), None) => Ok(Self::Response {
                id,
                reply: decode_reply(obj)?,
            }),
            (None, None) => Err(DecodeError::Shape("neither id nor method")),
        }
    }
}

fn decode_reply(mut obj: Map<String, Value>) -> Result<Reply, DecodeError> {
    if let Some(error) = obj.remove("error") {
        let error: RpcErrorObject = serde_json::from_value(error)?;
        return Ok(Err(error));
    }
    obj.remove("result")
        .map(Ok)
        .ok_or(DecodeError::Shape("response without result or error"))
}

/// Our ids are unsigned integers; accept their string form too.
pub fn correlation_of(id: &Value) -> Option<u64> {
    match id {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// `initialize` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// One page of `tools/list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsPage {
    pub tools: Vec<WireTool>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
}

/// One page of `resources/list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesPage {
    pub resources: Vec<WireResource>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResource {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// `resources/read` result.
#[derive(Debug, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<toolmux_core::ResourceContent>,
}

/// Text of the first text content item of a `tools/call` result.
pub fn first_text(result: &Value) -> Option<&str> {
    result
        .get("content")?
        .as_array()?
        .iter()
        .find_map(|item| item.get("text").and_then(Value::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization_omits_missing_params() {
        let request = OutgoingRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "tools/list",
            params: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"tools/list\""));
        assert!(!json.contains("params"));
    }

    #[test]
    fn test_decode_success_response() {
        let msg = Incoming::decode(br#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#).unwrap();
        let Incoming::Response { id, reply } = msg else {
            panic!("expected response");
        };
        assert_eq!(correlation_of(&id), Some(1));
        assert_eq!(reply.unwrap(), json!({ "tools": [] }));
    }

    #[test]
    fn test_decode_error_response() {
        let msg = Incoming::decode(
            br#"{"jsonrpc":"2.0","id":"7","error":{"code":-32600,"message":"Invalid Request"}}"#,
        )
        .unwrap();
        let Incoming::Response { id, reply } = msg else {
            panic!("expected response");
        };
        assert_eq!(correlation_of(&id), Some(7));
        assert_eq!(reply.unwrap_err().code, -32600);
    }

    #[test]
    fn test_decode_null_result_is_a_response() {
        let msg = Incoming::decode(br#"{"jsonrpc":"2.0","id":3,"result":null}"#).unwrap();
        assert!(matches!(msg, Incoming::Response { reply: Ok(Value::Null), .. }));
    }

    #[test]
    fn test_decode_request_and_notification() {
        assert!(matches!(
            Incoming::decode(br#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#).unwrap(),
            Incoming::Request { .. }
        ));
        assert!(matches!(
            Incoming::decode(br#"{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}"#).unwrap(),
            Incoming::Notification { .. }
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(Incoming::decode(b"not json"), Err(DecodeError::Json(_))));
        assert!(matches!(Incoming::decode(b"[1,2]"), Err(DecodeError::Shape(_))));
        assert!(matches!(Incoming::decode(br#"{"id":1}"#), Err(DecodeError::Shape(_))));
    }

    #[test]
    fn test_first_text() {
        let result = json!({ "content": [{ "type": "image" }, { "type": "text", "text": "hi" }] });
        assert_eq!(first_text(&result), Some("hi"));
        assert_eq!(first_text(&json!({})), None);
    }
}
