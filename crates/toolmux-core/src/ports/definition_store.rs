//! Persistence port for server definitions and their install state.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ServerDefinition;

/// Storage failure. Details of the backend stay inside the message.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Stored definitions are corrupt: {0}")]
    Corrupt(String),
}

/// Load/save the full definition list.
///
/// The registry owns ordering and uniqueness; the store persists whatever
/// slice it is given, in order.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Load all definitions. A store that has never been written returns an empty list.
    async fn load(&self) -> Result<Vec<ServerDefinition>, StoreError>;

    /// Replace the stored list with `definitions`.
    async fn save(&self, definitions: &[ServerDefinition]) -> Result<(), StoreError>;

    /// Names of servers whose installation completed, in any order.
    /// Never holds credential values.
    async fn load_installed(&self) -> Result<Vec<String>, StoreError>;

    /// Replace the recorded set of installed servers.
    async fn save_installed(&self, names: &[String]) -> Result<(), StoreError>;
}
