//! Credential store adapters.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use toolmux_core::{CredentialError, CredentialStore};

fn check_key(key: &str) -> Result<(), CredentialError> {
    if key.is_empty() || key.contains(['=', '\0']) {
        return Err(CredentialError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Reads secrets from the process environment.
///
/// `set` records the value for this process only; the real environment is
/// never mutated.
#[derive(Debug, Default)]
pub struct EnvCredentialStore {
    overrides: RwLock<HashMap<String, String>>,
}

impl EnvCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        check_key(key)?;
        if let Some(value) = self
            .overrides
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Ok(Some(value.clone()));
        }
        Ok(std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        check_key(key)?;
        self.overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        check_key(key)?;
        Ok(self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        check_key(key)?;
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
