#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod adapters;
pub mod builtin;
pub mod calculator;
pub mod catalog;
pub mod client;
pub mod connection;
pub mod datetime;
pub mod dispatcher;
pub mod installer;
pub(crate) mod path;
pub mod registry;
pub mod resolver;
pub mod service;

// Re-export domain types from core for convenience
pub use toolmux_core::{
    ConnectionSnapshot, ConnectionState, InstallationJob, InvocationOutcome, InvocationRequest,
    InvocationResult, RuntimeEvent, RuntimeSettings, ServerDefinition, ServerStatus, ToolDescriptor,
};

// Re-export this crate's public types
pub use catalog::{CatalogEntry, CatalogError, ToolCatalog};
pub use client::{ClientEvent, ProtocolError, RpcClient};
pub use connection::{ConnectionError, ConnectionManager, ProcessLauncher, ServerLauncher};
pub use dispatcher::{DispatchError, InvocationDispatcher, ToolInfo};
pub use installer::Installer;
pub use registry::{RegistryError, ServerRegistry};
pub use service::{RuntimeDeps, RuntimeError, ToolRuntime};
