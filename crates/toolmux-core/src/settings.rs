//! Runtime settings and validation.
//!
//! Pure configuration types. Loading from disk is the adapter's job; every
//! field has a default so a partial or missing settings file is fine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Fixed ceiling for the initialize + tools/list exchange.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 30_000;

/// Used when a caller does not pass its own invocation timeout.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 60_000;

/// Upper bound on live server processes.
pub const DEFAULT_MAX_LIVE_CONNECTIONS: usize = 64;

/// Reconnection backoff parameters.
///
/// Delays grow as `initial_delay_ms * multiplier^(attempt - 1)`, capped at
/// `max_delay_ms`. After `max_retries` failed attempts the connection
/// settles in `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: u32,
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2,
            max_retries: 5,
        }
    }
}

/// Settings for the tool server runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Ceiling for the handshake; exceeding it moves the connection to `Error`.
    pub handshake_timeout_ms: u64,

    /// Invocation timeout when the caller passes none.
    pub default_call_timeout_ms: u64,

    /// Time between SIGTERM and SIGKILL on disconnect.
    pub shutdown_grace_ms: u64,

    /// Upper bound for a single package-manager command.
    pub install_timeout_ms: u64,

    /// Concurrency ceiling for spawned server processes.
    pub max_live_connections: usize,

    /// Consecutive undecodable messages tolerated before a connection errors out.
    pub max_consecutive_anomalies: u32,

    pub backoff: BackoffPolicy,

    /// Root directory for npm prefixes. `None` installs globally.
    pub install_root: Option<PathBuf>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            default_call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            shutdown_grace_ms: 5_000,
            install_timeout_ms: 300_000,
            max_live_connections: DEFAULT_MAX_LIVE_CONNECTIONS,
            max_consecutive_anomalies: 16,
            backoff: BackoffPolicy::default(),
            install_root: None,
        }
    }
}

impl RuntimeSettings {
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub const fn default_call_timeout(&self) -> Duration {
        Duration::from_millis(self.default_call_timeout_ms)
    }

    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub const fn install_timeout(&self) -> Duration {
        Duration::from_millis(self.install_timeout_ms)
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("Handshake timeout must be between 100ms and 10 minutes, got {0}ms")]
    InvalidHandshakeTimeout(u64),

    #[error("Max live connections must be between 1 and 4096, got {0}")]
    InvalidConnectionLimit(usize),

    #[error("Backoff max delay ({max_ms}ms) is below the initial delay ({initial_ms}ms)")]
    InvalidBackoffRange { initial_ms: u64, max_ms: u64 },

    #[error("Backoff multiplier must be at least 1, got {0}")]
    InvalidBackoffMultiplier(u32),

    #[error("Install root cannot be empty")]
    EmptyInstallRoot,
}

/// Validate settings values.
pub fn validate_settings(settings: &RuntimeSettings) -> Result<(), SettingsError> {
    if !(100..=600_000).contains(&settings.handshake_timeout_ms) {
        return Err(SettingsError::InvalidHandshakeTimeout(settings.handshake_timeout_ms));
    }

    for (field, value) in [
        ("default_call_timeout_ms", settings.default_call_timeout_ms),
        ("install_timeout_ms", settings.install_timeout_ms),
        ("backoff.initial_delay_ms", settings.backoff.initial_delay_ms),
    ] {
        if value == 0 {
            return Err(SettingsError::ZeroValue { field });
        }
    }
    if settings.max_consecutive_anomalies == 0 {
        return Err(SettingsError::ZeroValue {
            field: "max_consecutive_anomalies",
        });
    }

    if !(1..=4096).contains(&settings.max_live_connections) {
        return Err(SettingsError::InvalidConnectionLimit(settings.max_live_connections));
    }

    let backoff = &settings.backoff;
    if backoff.max_delay_ms < backoff.initial_delay_ms {
        return Err(SettingsError::InvalidBackoffRange {
            initial_ms: backoff.initial_delay_ms,
            max_ms: backoff.max_delay_ms,
        });
    }
    if backoff.multiplier == 0 {
        return Err(SettingsError::InvalidBackoffMultiplier(backoff.multiplier));
    }

    if settings
        .install_root
        .as_ref()
        .is_some_and(|p| p.as_os_str().is_empty())
    {
        return Err(SettingsError::EmptyInstallRoot);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = RuntimeSettings::default();
        assert!(validate_settings(&settings).is_ok());
        assert_eq!(settings.handshake_timeout(), Duration::from_secs(30));
        assert_eq!(settings.backoff.max_retries, 5);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: RuntimeSettings =
            serde_json::from_str(r#"{ "max_live_connections": 8, "backoff": { "max_retries": 2 } }"#)
                .unwrap();
        assert_eq!(settings.max_live_connections, 8);
        assert_eq!(settings.backoff.max_retries, 2);
        assert_eq!(settings.backoff.initial_delay_ms, 500);
        assert_eq!(settings.default_call_timeout_ms, DEFAULT_CALL_TIMEOUT_MS);
    }

    #[test]
    fn test_invalid_handshake_timeout() {
        let settings = RuntimeSettings {
            handshake_timeout_ms: 10,
            ..RuntimeSettings::default()
        };
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::InvalidHandshakeTimeout(10))
        );
    }

    #[test]
    fn test_zero_connection_limit() {
        let settings = RuntimeSettings {
            max_live_connections: 0,
            ..RuntimeSettings::default()
        };
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidConnectionLimit(0))
        ));
    }

    #[test]
    fn test_inverted_backoff_range() {
        let mut settings = RuntimeSettings::default();
        settings.backoff.initial_delay_ms = 10_000;
        settings.backoff.max_delay_ms = 1_000;
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidBackoffRange { .. })
        ));
    }

    #[test]
    fn test_zero_call_timeout() {
        let settings = RuntimeSettings {
            default_call_timeout_ms: 0,
            ..RuntimeSettings::default()
        };
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::ZeroValue {
                field: "default_call_timeout_ms"
            })
        );
    }
}
