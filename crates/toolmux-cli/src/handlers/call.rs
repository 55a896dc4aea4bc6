//! Call command handler.

use std::time::Duration;

use anyhow::Result;
use serde_json::{Value, json};
use toolmux_core::{InvocationOutcome, InvocationRequest};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::connect_servers;
use crate::presentation::{payload_text, print_json};

/// Split `server/tool` into its parts; a bare name has no server.
pub fn split_target(target: &str) -> (Option<&str>, &str) {
    match target.split_once('/') {
        Some((server, tool)) if !server.is_empty() && !tool.is_empty() => (Some(server), tool),
        _ => (None, target),
    }
}

pub fn parse_arguments(raw: &str) -> Result<Value, CliError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| CliError::Arguments(format!("arguments are not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(CliError::Arguments("arguments must be a JSON object".to_string()));
    }
    Ok(value)
}

pub async fn execute(
    ctx: &CliContext,
    target: &str,
    raw_args: &str,
    timeout_ms: Option<u64>,
    as_json: bool,
) -> Result<()> {
    let arguments = parse_arguments(raw_args)?;
    let (server, tool) = split_target(target);
    connect_servers(ctx, server).await?;

    let result = match server {
        Some(server) => {
            let mut request = InvocationRequest::new(server, tool, arguments);
            if let Some(ms) = timeout_ms {
                request = request.with_timeout(Duration::from_millis(ms));
            }
            ctx.runtime.invoke(request).await
        }
        None => {
            let timeout = timeout_ms.map(Duration::from_millis);
            ctx.runtime
                .dispatcher()
                .invoke_by_name(tool, arguments, timeout)
                .await
                .map_err(Into::into)
        }
    }
    .map_err(CliError::from)?;

    if as_json {
        print_json(&json!(result));
    }

    match result.outcome {
        InvocationOutcome::Success { payload } => {
            if !as_json {
                println!("{}", payload_text(&payload));
            }
            Ok(())
        }
        InvocationOutcome::ToolError { message, .. } => Err(CliError::Call(message).into()),
        InvocationOutcome::TransportError { kind } => Err(CliError::Call(kind.to_string()).into()),
        InvocationOutcome::TimedOut { after_ms } => Err(CliError::Call(format!("timed out after {after_ms}ms")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("calc/add"), (Some("calc"), "add"));
        assert_eq!(split_target("add"), (None, "add"));
        assert_eq!(split_target("/add"), (None, "/add"));
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments(r#"{"a": 1}"#).unwrap(), json!({ "a": 1 }));
        assert!(matches!(parse_arguments("[1, 2]"), Err(CliError::Arguments(_))));
        assert!(matches!(parse_arguments("{"), Err(CliError::Arguments(_))));
    }
}
