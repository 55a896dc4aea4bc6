//! Runtime events.
//!
//! Emitted through the `EventEmitter` port so front ends can follow
//! registry, install and connection activity without polling.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "connection_state_changed", "server": "git", "from": "connecting", "to": "handshaking" }
//! ```

mod summary;

use serde::{Deserialize, Serialize};

use crate::domain::{ConnectionState, InstallStatus};
use crate::ports::ErrorInfo;

pub use summary::ServerSummary;

/// Severity of a server log notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Map a protocol level name (`notice`, `critical`, ...) onto the four levels we keep.
    pub fn from_protocol(level: &str) -> Self {
        match level {
            "debug" => Self::Debug,
            "info" | "notice" => Self::Info,
            "warning" => Self::Warning,
            "error" | "critical" | "alert" | "emergency" => Self::Error,
            _ => Self::Info,
        }
    }
}

/// Canonical event type for the tool server runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    // ========== Registry Events ==========
    /// A definition was added to the registry.
    ServerRegistered { server: ServerSummary },

    /// A definition was removed from the registry.
    ServerRemoved { server: String },

    // ========== Install Events ==========
    /// An installation job moved to a new status.
    InstallStatusChanged {
        server: String,
        job_id: uuid::Uuid,
        status: InstallStatus,
        message: String,
    },

    // ========== Connection Events ==========
    /// A connection changed state.
    ConnectionStateChanged {
        server: String,
        from: ConnectionState,
        to: ConnectionState,
    },

    /// A reconnect attempt is scheduled after `delay_ms`.
    ReconnectScheduled {
        server: String,
        attempt: u32,
        delay_ms: u64,
    },

    /// The catalog slice for a server was replaced.
    ToolsUpdated { server: String, tool_count: usize },

    /// A server sent a log notification.
    ServerNotification {
        server: String,
        level: LogLevel,
        message: String,
    },

    /// Something failed for a server.
    ServerError { error: ErrorInfo },
}

impl RuntimeEvent {
    pub const fn server_registered(server: ServerSummary) -> Self {
        Self::ServerRegistered { server }
    }

    pub fn server_removed(server: impl Into<String>) -> Self {
        Self::ServerRemoved {
            server: server.into(),
        }
    }

    pub fn state_changed(server: impl Into<String>, from: ConnectionState, to: ConnectionState) -> Self {
        Self::ConnectionStateChanged {
            server: server.into(),
            from,
            to,
        }
    }

    pub fn tools_updated(server: impl Into<String>, tool_count: usize) -> Self {
        Self::ToolsUpdated {
            server: server.into(),
            tool_count,
        }
    }

    pub const fn server_error(error: ErrorInfo) -> Self {
        Self::ServerError { error }
    }

    /// Server the event concerns.
    pub fn server(&self) -> &str {
        match self {
            Self::ServerRegistered { server } => &server.name,
            Self::ServerRemoved { server }
            | Self::InstallStatusChanged { server, .. }
            | Self::ConnectionStateChanged { server, .. }
            | Self::ReconnectScheduled { server, .. }
            | Self::ToolsUpdated { server, .. }
            | Self::ServerNotification { server, .. } => server,
            Self::ServerError { error } => &error.server,
        }
    }
}
