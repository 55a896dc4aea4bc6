//! Connection lifecycle state and read-only snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle state of one server connection.
///
/// ```text
/// Disconnected → Connecting → Handshaking → Connected
/// Connected → Disconnected | Reconnecting | Error
/// Reconnecting → Connecting (after backoff) | Error (retries exhausted)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Handshaking,
    Connected,
    Reconnecting,
    Error,
}

impl ConnectionState {
    /// Whether the state machine permits `self → next`.
    ///
    /// Every state may move to `Disconnected` (operator disconnect). A failed
    /// attempt made while reconnecting goes back to `Reconnecting`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::{Connected, Connecting, Disconnected, Error, Handshaking, Reconnecting};
        matches!(
            (self, next),
            (_, Disconnected)
                | (Disconnected | Reconnecting | Error, Connecting)
                | (Connecting, Handshaking | Error | Reconnecting)
                | (Handshaking, Connected | Error | Reconnecting)
                | (Connected, Reconnecting | Error)
                | (Reconnecting, Error)
        )
    }

    /// A process exists or is being brought up.
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Handshaking | Self::Connected | Self::Reconnecting
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// What the server advertised during the handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerIdentity {
    pub protocol_version: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Read-only copy of a connection's bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub server: String,
    pub state: ConnectionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Attempts made since the last successful handshake.
    pub reconnect_attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ServerIdentity>,
}

impl ConnectionSnapshot {
    pub fn disconnected(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            state: ConnectionState::Disconnected,
            pid: None,
            last_error: None,
            reconnect_attempt: 0,
            next_retry_delay_ms: None,
            last_activity: None,
            identity: None,
        }
    }
}

/// Per-server status row combining registry, connection and catalog data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub installed: bool,
    pub tool_count: usize,
    pub connection: ConnectionSnapshot,
}
