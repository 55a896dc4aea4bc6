//! Server registry.
//!
//! Durable, insertion-ordered list of known server definitions. Every
//! mutation is written through the `DefinitionStore` port before it becomes
//! visible; a failed save leaves the registry unchanged.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use toolmux_core::{
    DefinitionStore, ErrorCategory, EventEmitter, RuntimeEvent, ServerDefinition, ServerSummary,
    StoreError, find_template,
};
use tracing::{debug, info};

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("A server named '{0}' is already registered")]
    DuplicateName(String),

    #[error("Server not found: {0}")]
    NotFound(String),

    #[error("Server '{0}' has a live connection; disconnect it first")]
    InUse(String),

    #[error("Invalid server definition: {0}")]
    Invalid(String),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RegistryError {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Invalid(_) => ErrorCategory::Validation,
            _ => ErrorCategory::Configuration,
        }
    }

    /// Only storage failures can succeed on a plain retry.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Io(_)))
    }
}

#[derive(Default)]
struct State {
    definitions: Vec<ServerDefinition>,
    /// Servers with a live or pending connection.
    leases: HashSet<String>,
}

/// Registry of server definitions.
pub struct ServerRegistry {
    store: Arc<dyn DefinitionStore>,
    state: RwLock<State>,
    emitter: Arc<dyn EventEmitter>,
}

impl ServerRegistry {
    /// Create an empty registry backed by `store`. Call [`load`](Self::load) to read it.
    pub fn new(store: Arc<dyn DefinitionStore>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            store,
            state: RwLock::new(State::default()),
            emitter,
        }
    }

    /// Replace the in-memory list with what the store holds.
    ///
    /// Duplicate names in the stored list keep their first occurrence.
    pub async fn load(&self) -> Result<usize, RegistryError> {
        let stored = self.store.load().await?;
        let mut seen = HashSet::new();
        let definitions: Vec<_> = stored
            .into_iter()
            .filter(|d| seen.insert(d.name.clone()))
            .collect();

        let count = definitions.len();
        self.state.write().await.definitions = definitions;
        debug!(count, "Loaded server definitions");
        Ok(count)
    }

    /// Register a new definition.
    pub async fn register(&self, definition: ServerDefinition) -> Result<ServerDefinition, RegistryError> {
        definition.validate().map_err(RegistryError::Invalid)?;

        let mut state = self.state.write().await;
        if state.definitions.iter().any(|d| d.name == definition.name) {
            return Err(RegistryError::DuplicateName(definition.name));
        }

        state.definitions.push(definition.clone());
        if let Err(e) = self.store.save(&state.definitions).await {
            state.definitions.pop();
            return Err(e.into());
        }
        drop(state);

        info!(server = %definition.name, transport = %definition.transport, "Registered server");
        self.emitter
            .emit(RuntimeEvent::server_registered(ServerSummary::from(&definition)));
        Ok(definition)
    }

    /// Instantiate a built-in template and register it under `name` (or the template's own name).
    pub async fn register_template(&self, template: &str, name: Option<&str>) -> Result<ServerDefinition, RegistryError> {
        let template = find_template(template).ok_or_else(|| RegistryError::UnknownTemplate(template.to_string()))?;
        self.register(template.instantiate(name)).await
    }

    /// Remove a definition. Fails while a connection holds a lease on it.
    pub async fn remove(&self, name: &str) -> Result<ServerDefinition, RegistryError> {
        let mut state = self.state.write().await;
        let index = state
            .definitions
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        if state.leases.contains(name) {
            return Err(RegistryError::InUse(name.to_string()));
        }

        let removed = state.definitions.remove(index);
        if let Err(e) = self.store.save(&state.definitions).await {
            state.definitions.insert(index, removed);
            return Err(e.into());
        }
        drop(state);

        info!(server = %name, "Removed server");
        self.emitter.emit(RuntimeEvent::server_removed(name));
        Ok(removed)
    }

    /// Definitions in insertion order, optionally restricted to one category.
    pub async fn list(&self, category: Option<&str>) -> Vec<ServerDefinition> {
        self.state
            .read()
            .await
            .definitions
            .iter()
            .filter(|d| category.is_none_or(|c| d.category.eq_ignore_ascii_case(c)))
            .cloned()
            .collect()
    }

    pub async fn get(&self, name: &str) -> Result<ServerDefinition, RegistryError> {
        self.state
            .read()
            .await
            .definitions
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.state.read().await.definitions.iter().any(|d| d.name == name)
    }

    /// Mark `name` as having a live connection and return its definition.
    pub async fn acquire_lease(&self, name: &str) -> Result<ServerDefinition, RegistryError> {
        let mut state = self.state.write().await;
        let definition = state
            .definitions
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        state.leases.insert(name.to_string());
        Ok(definition)
    }

    pub async fn release_lease(&self, name: &str) {
        self.state.write().await.leases.remove(name);
    }

    pub async fn is_leased(&self, name: &str) -> bool {
        self.state.read().await.leases.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use toolmux_core::{ChannelEmitter, NoopEmitter};

    fn registry() -> (ServerRegistry, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ServerRegistry::new(store.clone(), Arc::new(NoopEmitter::new())), store)
    }

    fn calc(name: &str) -> ServerDefinition {
        ServerDefinition::custom(name, "/usr/bin/calc", vec![]).with_category("math")
    }

    #[tokio::test]
    async fn test_register_persists_and_lists_in_order() {
        let (registry, store) = registry();
        registry.register(calc("b")).await.unwrap();
        registry.register(calc("a").with_category("other")).await.unwrap();

        let names: Vec<_> = registry.list(None).await.into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(store.snapshot().len(), 2);
        assert_eq!(registry.list(Some("MATH")).await.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let (registry, _) = registry();
        registry.register(calc("calc")).await.unwrap();
        let err = registry.register(calc("calc")).await.unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(ref n) if n == "calc"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_remove_respects_leases() {
        let (registry, _) = registry();
        registry.register(calc("calc")).await.unwrap();

        registry.acquire_lease("calc").await.unwrap();
        assert!(matches!(registry.remove("calc").await, Err(RegistryError::InUse(_))));

        registry.release_lease("calc").await;
        registry.remove("calc").await.unwrap();
        assert!(matches!(registry.remove("calc").await, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back() {
        let (registry, store) = registry();
        registry.register(calc("keep")).await.unwrap();

        store.fail_saves(true);
        assert!(matches!(registry.register(calc("new")).await, Err(RegistryError::Store(_))));
        assert!(matches!(registry.remove("keep").await, Err(RegistryError::Store(_))));

        let names: Vec<_> = registry.list(None).await.into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["keep"]);
    }

    #[tokio::test]
    async fn test_load_restores_previous_session() {
        let store = Arc::new(MemoryStore::with_definitions(vec![calc("x"), calc("y"), calc("x")]));
        let registry = ServerRegistry::new(store, Arc::new(NoopEmitter::new()));
        assert_eq!(registry.load().await.unwrap(), 2);
        assert!(registry.contains("y").await);
    }

    #[tokio::test]
    async fn test_register_template_emits_event() {
        let emitter = ChannelEmitter::with_defaults();
        let mut events = emitter.subscribe();
        let registry = ServerRegistry::new(Arc::new(MemoryStore::new()), Arc::new(emitter));

        let def = registry.register_template("git", Some("my-git")).await.unwrap();
        assert_eq!(def.name, "my-git");
        assert!(def.install_required);

        let RuntimeEvent::ServerRegistered { server } = events.recv().await.unwrap() else {
            panic!("expected ServerRegistered");
        };
        assert_eq!(server.name, "my-git");

        assert!(matches!(
            registry.register_template("nope", None).await,
            Err(RegistryError::UnknownTemplate(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_definition_is_rejected() {
        let (registry, _) = registry();
        let err = registry
            .register(ServerDefinition::custom("bad name", "calc", vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }
}
