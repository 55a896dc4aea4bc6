//! Built-in calculator tool server.
//!
//! Speaks newline-delimited JSON-RPC on any reader/writer pair; the
//! `toolmux-calculator` binary wires it to stdio.

use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::builtin::{self, ToolHandler, ToolOutput};

fn binary_schema(a: &str, b: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": { "type": "number", "description": a },
            "b": { "type": "number", "description": b }
        },
        "required": ["a", "b"],
        "additionalProperties": false
    })
}

/// The advertised tool list.
pub fn tool_list() -> Value {
    json!([
        { "name": "add", "description": "Add two numbers", "inputSchema": binary_schema("First number", "Second number") },
        { "name": "subtract", "description": "Subtract b from a", "inputSchema": binary_schema("Minuend", "Subtrahend") },
        { "name": "multiply", "description": "Multiply two numbers", "inputSchema": binary_schema("First factor", "Second factor") },
        { "name": "divide", "description": "Divide a by b", "inputSchema": binary_schema("Dividend", "Divisor") },
        { "name": "power", "description": "Raise a to the power b", "inputSchema": binary_schema("Base", "Exponent") },
        {
            "name": "sqrt",
            "description": "Square root of x",
            "inputSchema": {
                "type": "object",
                "properties": { "x": { "type": "number", "description": "Non-negative number" } },
                "required": ["x"],
                "additionalProperties": false
            }
        }
    ])
}

fn number(args: &Value, field: &str) -> Result<f64, String> {
    args.get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| format!("argument '{field}' must be a number"))
}

/// Evaluate one tool. `Err` is a tool-level failure, reported with `isError`.
pub fn evaluate(tool: &str, args: &Value) -> Result<f64, String> {
    let binary = |op: fn(f64, f64) -> Result<f64, String>| op(number(args, "a")?, number(args, "b")?);
    let value = match tool {
        "add" => binary(|a, b| Ok(a + b))?,
        "subtract" => binary(|a, b| Ok(a - b))?,
        "multiply" => binary(|a, b| Ok(a * b))?,
        "divide" => binary(|a, b| if b == 0.0 { Err("division by zero".to_string()) } else { Ok(a / b) })?,
        "power" => binary(|a, b| Ok(a.powf(b)))?,
        "sqrt" => {
            let x = number(args, "x")?;
            if x < 0.0 {
                return Err("cannot take the square root of a negative number".to_string());
            }
            x.sqrt()
        }
        other => return Err(format!("unknown tool: {other}")),
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err("result is not a finite number".to_string())
    }
}

/// Render whole numbers without a trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// The calculator tool server.
#[derive(Debug, Clone, Copy, Default)]
pub struct Calculator;

impl ToolHandler for Calculator {
    fn server_name(&self) -> &'static str {
        "toolmux-calculator"
    }

    fn tool_list(&self) -> Value {
        tool_list()
    }

    fn call(&self, tool: &str, args: &Value) -> Result<ToolOutput, String> {
        let value = evaluate(tool, args)?;
        Ok(ToolOutput {
            text: format_number(value),
            structured: json!({ "result": value }),
        })
    }
}

/// Handle one inbound line. Returns the reply line, if the message needs one.
pub fn handle_line(line: &str) -> Option<Value> {
    builtin::handle_line(&Calculator, line)
}

/// Serve until `reader` reaches EOF.
pub async fn serve<R, W>(reader: R, writer: W) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    builtin::serve(&Calculator, reader, writer).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[test]
    fn test_arithmetic() {
        assert_eq!(evaluate("add", &json!({ "a": 2, "b": 3 })), Ok(5.0));
        assert_eq!(evaluate("subtract", &json!({ "a": 2, "b": 3 })), Ok(-1.0));
        assert_eq!(evaluate("multiply", &json!({ "a": 2.5, "b": 4 })), Ok(10.0));
        assert_eq!(evaluate("power", &json!({ "a": 2, "b": 10 })), Ok(1024.0));
        assert_eq!(evaluate("sqrt", &json!({ "x": 81 })), Ok(9.0));
    }

    #[test]
    fn test_domain_errors() {
        assert_eq!(
            evaluate("divide", &json!({ "a": 1, "b": 0 })),
            Err("division by zero".to_string())
        );
        assert!(evaluate("sqrt", &json!({ "x": -4 })).is_err());
        assert!(evaluate("add", &json!({ "a": "one", "b": 2 })).is_err());
    }

    #[test]
    fn test_tools_call_reports_tool_errors_in_result() {
        let reply = handle_line(
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"divide","arguments":{"a":1,"b":0}}}"#,
        )
        .unwrap();
        assert_eq!(reply["id"], 4);
        assert_eq!(reply["result"]["isError"], true);
        assert_eq!(reply["result"]["content"][0]["text"], "division by zero");
    }

    #[test]
    fn test_whole_results_render_without_fraction() {
        let reply = handle_line(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"add","arguments":{"a":2,"b":3}}}"#,
        )
        .unwrap();
        assert_eq!(reply["result"]["content"][0]["text"], "5");
        assert_eq!(format_number(0.5), "0.5");
    }

    #[test]
    fn test_initialize_names_the_calculator() {
        let reply = handle_line(r#"{"jsonrpc":"2.0","id":0,"method":"initialize","params":{}}"#).unwrap();
        assert_eq!(reply["result"]["serverInfo"]["name"], "toolmux-calculator");
        assert_eq!(reply["result"]["capabilities"]["tools"], json!({}));
    }

    #[tokio::test]
    async fn test_serve_over_duplex() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let task = tokio::spawn(serve(server_read, server_write));

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n\n")
            .await
            .unwrap();
        let mut lines = BufReader::new(client_read).lines();
        let reply: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(reply["result"]["tools"].as_array().unwrap().len(), 6);

        drop(client_write);
        drop(lines);
        task.await.unwrap().unwrap();
    }
}
