//! CLI-specific error types and exit-code mapping.

use thiserror::Error;
use toolmux_core::ErrorCategory;
use toolmux_mcp::RuntimeError;

#[derive(Debug, Error)]
pub enum CliError {
    /// Runtime failure (registry, connection or dispatch).
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("Invalid arguments: {0}")]
    Arguments(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Installation of '{server}' failed: {reason}")]
    Install { server: String, reason: String },

    /// The tool ran but did not succeed.
    #[error("Tool call failed: {0}")]
    Call(String),
}

impl CliError {
    /// Map error to an exit code.
    ///
    /// Follows sysexits.h where a category fits:
    /// - 2: invalid arguments
    /// - 65: validation (EX_DATAERR)
    /// - 69: server unavailable (EX_UNAVAILABLE)
    /// - 76: protocol (EX_PROTOCOL)
    /// - 78: configuration (EX_CONFIG)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Arguments(_) => 2,
            Self::Config(_) => 78,
            Self::Install { .. } | Self::Call(_) => 1,
            Self::Runtime(e) => match e.category() {
                ErrorCategory::Configuration => 78,
                ErrorCategory::Validation => 65,
                ErrorCategory::Transport => 69,
                ErrorCategory::Protocol => 76,
                ErrorCategory::Tool => 1,
            },
        }
    }
}

/// Exit code for any error that reached `main`.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<CliError>().map_or(1, CliError::exit_code)
}
