//! Stdio protocol loop shared by the bundled tool servers.
//!
//! A bundled server only describes its tools and evaluates calls; framing,
//! the handshake and error replies live here. Nothing but protocol messages
//! is ever written to the output stream.

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::client::{METHOD_NOT_FOUND, PREFERRED_PROTOCOL_VERSION};

pub const INVALID_PARAMS: i64 = -32602;
pub const PARSE_ERROR: i64 = -32700;

/// Successful result of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub structured: Value,
}

/// A bundled tool server.
pub trait ToolHandler {
    /// Name reported in `serverInfo`.
    fn server_name(&self) -> &'static str;

    /// The advertised tool list, as a JSON array.
    fn tool_list(&self) -> Value;

    /// Evaluate one tool. `Err` is a tool-level failure, reported with `isError`.
    fn call(&self, tool: &str, args: &Value) -> Result<ToolOutput, String>;
}

fn call_result(handler: &impl ToolHandler, params: &Value) -> Result<Value, (i64, String)> {
    let tool = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| (INVALID_PARAMS, "missing tool name".to_string()))?;
    if !handler
        .tool_list()
        .as_array()
        .is_some_and(|tools| tools.iter().any(|t| t["name"] == tool))
    {
        return Err((INVALID_PARAMS, format!("unknown tool: {tool}")));
    }
    let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    Ok(match handler.call(tool, &args) {
        Ok(output) => json!({
            "content": [{ "type": "text", "text": output.text }],
            "structuredContent": output.structured
        }),
        Err(message) => json!({
            "content": [{ "type": "text", "text": message }],
            "isError": true
        }),
    })
}

/// Handle one inbound line. Returns the reply, if the message needs one.
pub fn handle_line(handler: &impl ToolHandler, line: &str) -> Option<Value> {
    let message: Value = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            return Some(json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": { "code": PARSE_ERROR, "message": format!("parse error: {e}") }
            }));
        }
    };
    // Notifications need no reply.
    let id = message.get("id")?.clone();
    let method = message.get("method").and_then(Value::as_str).unwrap_or_default();
    let params = message.get("params").cloned().unwrap_or(Value::Null);

    let outcome = match method {
        "initialize" => Ok(json!({
            "protocolVersion": PREFERRED_PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": { "name": handler.server_name(), "version": env!("CARGO_PKG_VERSION") }
        })),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": handler.tool_list() })),
        "tools/call" => call_result(handler, &params),
        other => Err((METHOD_NOT_FOUND, format!("Method not found: {other}"))),
    };

    Some(match outcome {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err((code, message)) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message }
        }),
    })
}

/// Serve `handler` until `reader` reaches EOF.
pub async fn serve<H, R, W>(handler: &H, reader: R, mut writer: W) -> std::io::Result<()>
where
    H: ToolHandler,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(reply) = handle_line(handler, &line) {
            let mut out = reply.to_string();
            out.push('\n');
            writer.write_all(out.as_bytes()).await?;
            writer.flush().await?;
        }
    }
    Ok(())
}
