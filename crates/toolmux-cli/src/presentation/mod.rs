//! Plain-text and JSON output helpers.

mod tables;

pub use tables::{format_optional, print_separator, truncate_string};

use serde_json::Value;

/// Print `value` as pretty JSON on stdout.
pub fn print_json(value: &Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()));
}

/// Text blocks of a tool result, falling back to the raw payload.
pub fn payload_text(payload: &Value) -> String {
    let texts: Vec<&str> = payload
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if texts.is_empty() {
        payload.to_string()
    } else {
        texts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_text_joins_text_blocks() {
        let payload = json!({
            "content": [
                { "type": "text", "text": "first" },
                { "type": "image", "data": "..." },
                { "type": "text", "text": "second" }
            ]
        });
        assert_eq!(payload_text(&payload), "first\nsecond");
    }

    #[test]
    fn test_payload_text_falls_back_to_json() {
        assert_eq!(payload_text(&json!({ "value": 3 })), r#"{"value":3}"#);
    }
}
