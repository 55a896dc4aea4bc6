//! Lifecycle-scoped runtime facade.
//!
//! `ToolRuntime` owns the registry, installer, connection manager, catalog
//! and dispatcher, wired from injected ports. Front ends hold one of these
//! and call [`start`](ToolRuntime::start) and [`shutdown`](ToolRuntime::shutdown)
//! explicitly.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use toolmux_core::{
    ConnectionSnapshot, CredentialStore, DefinitionStore, ErrorCategory, EventEmitter, InstallationJob,
    InvocationRequest, InvocationResult, PackageRunner, ResourceContent, ResourceDescriptor, RuntimeSettings,
    ServerDefinition, ServerStatus, SettingsError, validate_settings,
};
use tracing::{debug, info};

use crate::catalog::{CatalogEntry, ToolCatalog};
use crate::connection::{ConnectionError, ConnectionManager, ServerLauncher};
use crate::dispatcher::{DispatchError, InvocationDispatcher, ToolInfo};
use crate::installer::Installer;
use crate::registry::{RegistryError, ServerRegistry};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl RuntimeError {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Settings(_) => ErrorCategory::Configuration,
            Self::Registry(e) => e.category(),
            Self::Connection(e) => e.category(),
            Self::Dispatch(e) => e.category(),
        }
    }

    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Settings(_) => false,
            Self::Registry(e) => e.is_retryable(),
            Self::Connection(e) => e.is_retryable(),
            Self::Dispatch(e) => e.is_retryable(),
        }
    }
}

/// External collaborators the runtime is built from.
pub struct RuntimeDeps {
    pub store: Arc<dyn DefinitionStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub runner: Arc<dyn PackageRunner>,
    pub launcher: Arc<dyn ServerLauncher>,
    pub emitter: Arc<dyn EventEmitter>,
}

pub struct ToolRuntime {
    registry: Arc<ServerRegistry>,
    installer: Arc<Installer>,
    catalog: Arc<ToolCatalog>,
    connections: Arc<ConnectionManager>,
    dispatcher: InvocationDispatcher,
}

impl ToolRuntime {
    /// Wire the components. Initialization order: registry, connection manager, catalog.
    pub fn new(deps: RuntimeDeps, settings: RuntimeSettings) -> Result<Self, RuntimeError> {
        validate_settings(&settings)?;

        let registry = Arc::new(ServerRegistry::new(Arc::clone(&deps.store), Arc::clone(&deps.emitter)));
        let installer = Arc::new(Installer::new(
            Arc::clone(&registry),
            deps.store,
            deps.runner,
            Arc::clone(&deps.credentials),
            Arc::clone(&deps.emitter),
            &settings,
        ));
        let catalog = Arc::new(ToolCatalog::new());
        let default_timeout = settings.default_call_timeout();
        let connections = Arc::new(ConnectionManager::new(
            Arc::clone(&registry),
            Arc::clone(&installer),
            deps.credentials,
            deps.launcher,
            Arc::clone(&catalog),
            deps.emitter,
            settings,
        ));
        let dispatcher = InvocationDispatcher::new(Arc::clone(&catalog), Arc::clone(&connections), default_timeout);

        Ok(Self {
            registry,
            installer,
            catalog,
            connections,
            dispatcher,
        })
    }

    /// Load persisted definitions and install state. Returns how many
    /// definitions were loaded.
    pub async fn start(&self) -> Result<usize, RuntimeError> {
        let count = self.registry.load().await?;
        let installed = self.installer.restore().await.map_err(RegistryError::from)?;
        info!(servers = count, installed, "Tool runtime started");
        Ok(count)
    }

    /// Disconnect everything. The catalog is empty afterwards.
    pub async fn shutdown(&self) {
        self.connections.disconnect_all().await;
        debug!(remaining_tools = self.catalog.len(), "Tool runtime stopped");
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub const fn dispatcher(&self) -> &InvocationDispatcher {
        &self.dispatcher
    }

    // ========== Registry ==========

    pub async fn add_server(&self, definition: ServerDefinition) -> Result<ServerDefinition, RuntimeError> {
        Ok(self.registry.register(definition).await?)
    }

    pub async fn add_template(&self, template: &str, name: Option<&str>) -> Result<ServerDefinition, RuntimeError> {
        Ok(self.registry.register_template(template, name).await?)
    }

    /// Remove a server. Fails with `InUse` while it has a live connection.
    pub async fn remove_server(&self, name: &str) -> Result<ServerDefinition, RuntimeError> {
        let removed = self.registry.remove(name).await?;
        self.connections.forget(name);
        self.installer.forget(name).await;
        Ok(removed)
    }

    pub async fn list_servers(&self, category: Option<&str>) -> Vec<ServerDefinition> {
        self.registry.list(category).await
    }

    // ========== Lifecycle ==========

    pub async fn install(&self, name: &str) -> InstallationJob {
        self.installer.install(name).await
    }

    pub async fn connect(&self, name: &str) -> Result<ConnectionSnapshot, RuntimeError> {
        Ok(self.connections.connect(name).await?)
    }

    pub async fn disconnect(&self, name: &str) -> Result<(), RuntimeError> {
        Ok(self.connections.disconnect(name).await?)
    }

    /// One row per registered server, in registration order.
    pub async fn status(&self) -> Vec<ServerStatus> {
        let definitions = self.registry.list(None).await;
        let mut rows = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let connection = self
                .connections
                .snapshot(&definition.name)
                .await
                .unwrap_or_else(|| ConnectionSnapshot::disconnected(&definition.name));
            rows.push(ServerStatus {
                installed: !definition.install_required || self.installer.is_installed(&definition.name),
                tool_count: self.catalog.tool_count(&definition.name),
                name: definition.name,
                category: definition.category,
                description: definition.description,
                connection,
            });
        }
        rows
    }

    // ========== Tools ==========

    pub fn tools(&self) -> Vec<CatalogEntry> {
        self.catalog.entries()
    }

    pub fn search_tools(&self, query: &str) -> Vec<CatalogEntry> {
        self.catalog.search(query)
    }

    pub fn tool_info(&self, server: &str, tool: &str) -> Option<ToolInfo> {
        self.dispatcher.tool_info(server, tool)
    }

    pub fn resources(&self) -> Vec<ResourceDescriptor> {
        self.catalog.resources()
    }

    /// Read a resource; with no `server`, the one connected server listing `uri` is used.
    pub async fn read_resource(&self, server: Option<&str>, uri: &str) -> Result<Vec<ResourceContent>, RuntimeError> {
        Ok(self.dispatcher.read_resource(server, uri, None).await?)
    }

    pub async fn invoke(&self, request: InvocationRequest) -> Result<InvocationResult, RuntimeError> {
        Ok(self.dispatcher.invoke_request(request).await?)
    }

    /// Call a tool by name alone, resolving the server through the catalog.
    pub async fn invoke_by_name(&self, tool: &str, arguments: Value) -> Result<InvocationResult, RuntimeError> {
        Ok(self.dispatcher.invoke_by_name(tool, arguments, None).await?)
    }
}
