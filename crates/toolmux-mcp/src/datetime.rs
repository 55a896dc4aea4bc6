//! Built-in date and time tool server.
//!
//! Runs behind the `toolmux-datetime` binary. Timezones are IANA names;
//! formats are `strftime` patterns.

use std::fmt::Write as _;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::builtin::{self, ToolHandler, ToolOutput};

pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The advertised tool list.
pub fn tool_list() -> Value {
    let timezone = json!({ "type": "string", "description": "IANA timezone name, default UTC" });
    let format = json!({ "type": "string", "description": "strftime pattern, default %Y-%m-%d %H:%M:%S" });
    json!([
        {
            "name": "current_time",
            "description": "Current date and time in a timezone",
            "inputSchema": {
                "type": "object",
                "properties": { "timezone": timezone, "format": format },
                "additionalProperties": false
            }
        },
        {
            "name": "timestamp",
            "description": "Current Unix timestamp in seconds",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        },
        {
            "name": "format_date",
            "description": "Format a Unix timestamp",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "timestamp": { "type": "integer", "description": "Seconds since the Unix epoch" },
                    "timezone": timezone,
                    "format": format
                },
                "required": ["timestamp"],
                "additionalProperties": false
            }
        }
    ])
}

fn optional_str<'a>(args: &'a Value, field: &str, default: &'a str) -> Result<&'a str, String> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_str()
            .ok_or_else(|| format!("argument '{field}' must be a string")),
    }
}

fn parse_timezone(name: &str) -> Result<Tz, String> {
    name.parse::<Tz>().map_err(|_| format!("unknown timezone: {name}"))
}

/// Render `instant` in `timezone` with `format`. Bad patterns are errors, not panics.
fn render(instant: DateTime<Utc>, timezone: &str, format: &str) -> Result<String, String> {
    let tz = parse_timezone(timezone)?;
    let local = tz.from_utc_datetime(&instant.naive_utc());
    let mut out = String::new();
    write!(out, "{}", local.format(format)).map_err(|_| format!("invalid format: {format}"))?;
    Ok(out)
}

/// Evaluate one tool at `now`.
pub fn evaluate(tool: &str, args: &Value, now: DateTime<Utc>) -> Result<ToolOutput, String> {
    match tool {
        "current_time" => {
            let timezone = optional_str(args, "timezone", DEFAULT_TIMEZONE)?;
            let format = optional_str(args, "format", DEFAULT_FORMAT)?;
            let text = render(now, timezone, format)?;
            Ok(ToolOutput {
                structured: json!({ "time": text, "timezone": timezone, "timestamp": now.timestamp() }),
                text,
            })
        }
        "timestamp" => Ok(ToolOutput {
            text: now.timestamp().to_string(),
            structured: json!({ "timestamp": now.timestamp() }),
        }),
        "format_date" => {
            let seconds = args
                .get("timestamp")
                .and_then(Value::as_i64)
                .ok_or_else(|| "argument 'timestamp' must be an integer".to_string())?;
            let instant =
                DateTime::from_timestamp(seconds, 0).ok_or_else(|| format!("timestamp out of range: {seconds}"))?;
            let timezone = optional_str(args, "timezone", DEFAULT_TIMEZONE)?;
            let format = optional_str(args, "format", DEFAULT_FORMAT)?;
            let text = render(instant, timezone, format)?;
            Ok(ToolOutput {
                structured: json!({ "formatted": text, "timezone": timezone }),
                text,
            })
        }
        other => Err(format!("unknown tool: {other}")),
    }
}

/// The date and time tool server.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeServer;

impl ToolHandler for DateTimeServer {
    fn server_name(&self) -> &'static str {
        "toolmux-datetime"
    }

    fn tool_list(&self) -> Value {
        tool_list()
    }

    fn call(&self, tool: &str, args: &Value) -> Result<ToolOutput, String> {
        evaluate(tool, args, Utc::now())
    }
}

/// Serve until `reader` reaches EOF.
pub async fn serve<R, W>(reader: R, writer: W) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    builtin::serve(&DateTimeServer, reader, writer).await
}
