//! Connection manager errors.

use thiserror::Error;
use toolmux_core::{ConnectionState, ErrorCategory};

use super::launcher::LaunchError;
use crate::client::ProtocolError;

#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    #[error("Server not found: {0}")]
    UnknownServer(String),

    #[error("Server '{server}' is already {state}")]
    AlreadyConnected { server: String, state: ConnectionState },

    #[error("Server '{0}' requires installation before it can connect")]
    NotInstalled(String),

    #[error("Too many live server connections (limit {limit})")]
    TooManyConnections { limit: usize },

    #[error("Server '{server}' needs credential '{key}', which is not set")]
    MissingCredential { server: String, key: String },

    #[error("Server '{server}': {source}")]
    Launch {
        server: String,
        #[source]
        source: LaunchError,
    },

    #[error("Server '{server}' did not complete the handshake within {after_ms}ms")]
    HandshakeTimeout { server: String, after_ms: u64 },

    #[error("Server '{server}' speaks protocol version '{offered}', which is not supported")]
    IncompatibleVersion { server: String, offered: String },

    #[error("Server '{server}' protocol error: {message}")]
    Protocol { server: String, message: String },

    #[error("Server '{server}' exited: {detail}")]
    ProcessExited { server: String, detail: String },

    #[error("Server '{server}' sent {count} undecodable messages in a row")]
    AnomalyLimit { server: String, count: u32 },
}

impl ConnectionError {
    pub(crate) fn from_protocol(server: &str, error: ProtocolError) -> Self {
        match error {
            ProtocolError::IncompatibleVersion { offered } => Self::IncompatibleVersion {
                server: server.to_string(),
                offered,
            },
            ProtocolError::ConnectionClosed => Self::ProcessExited {
                server: server.to_string(),
                detail: "stdout closed during handshake".to_string(),
            },
            other => Self::Protocol {
                server: server.to_string(),
                message: other.to_string(),
            },
        }
    }

    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownServer(_)
            | Self::AlreadyConnected { .. }
            | Self::NotInstalled(_)
            | Self::MissingCredential { .. }
            | Self::TooManyConnections { .. } => ErrorCategory::Configuration,
            Self::Launch { source, .. } if source.is_configuration() => ErrorCategory::Configuration,
            Self::Launch { .. } | Self::HandshakeTimeout { .. } | Self::ProcessExited { .. } => {
                ErrorCategory::Transport
            }
            Self::IncompatibleVersion { .. } | Self::Protocol { .. } | Self::AnomalyLimit { .. } => {
                ErrorCategory::Protocol
            }
        }
    }

    /// Whether trying again (later, or by the reconnect loop) can succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::TooManyConnections { .. }
            | Self::HandshakeTimeout { .. }
            | Self::Protocol { .. }
            | Self::ProcessExited { .. } => true,
            Self::Launch { source, .. } => !source.is_configuration(),
            Self::UnknownServer(_)
            | Self::AlreadyConnected { .. }
            | Self::NotInstalled(_)
            | Self::MissingCredential { .. }
            | Self::IncompatibleVersion { .. }
            | Self::AnomalyLimit { .. } => false,
        }
    }
}
