//! Credential store port.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid credential key: '{0}'")]
    InvalidKey(String),
}

/// Secret lookup by key (usually an environment variable name).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when the key is simply not set.
    async fn get(&self, key: &str) -> Result<Option<String>, CredentialError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CredentialError>;
}
