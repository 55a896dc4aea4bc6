//! Error taxonomy shared by every runtime component.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad class of a failure.
///
/// Configuration and validation errors are never retried automatically.
/// Transport errors drive reconnection. Protocol errors stay isolated to
/// the offending message or connection. Tool errors pass through verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Transport,
    Protocol,
    Validation,
    Tool,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Validation => "validation",
            Self::Tool => "tool",
        };
        f.write_str(label)
    }
}

/// User-safe error payload for `RuntimeEvent::ServerError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub server: String,
    pub message: String,
    pub category: ErrorCategory,
}

impl ErrorInfo {
    pub fn new(category: ErrorCategory, server: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            message: message.into(),
            category,
        }
    }

    pub fn configuration(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Configuration, server, message)
    }

    pub fn transport(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Transport, server, message)
    }

    pub fn protocol(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Protocol, server, message)
    }

    pub fn tool(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Tool, server, message)
    }
}
