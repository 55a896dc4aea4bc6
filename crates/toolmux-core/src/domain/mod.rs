//! Tool server domain types.
//!
//! These types describe tool servers independent of any infrastructure
//! concern (process spawning, pipes, persistence format).
//!
//! # Design
//!
//! - `ServerDefinition` - A registered server (immutable once registered)
//! - `ToolDescriptor` / `InputSchema` - A discovered tool and its argument schema
//! - `ResourceDescriptor` / `ResourceContent` - A listed resource and what reading it returns
//! - `InstallationJob` - One install request with a forward-only status
//! - `ConnectionState` / `ConnectionSnapshot` - Connection lifecycle
//! - `InvocationRequest` / `InvocationResult` - One tool call

mod connection;
mod install;
mod invocation;
mod resource;
mod server;
mod tool;

pub use connection::{ConnectionSnapshot, ConnectionState, ServerIdentity, ServerStatus};
pub use install::{
    CommandFailure, InstallFailure, InstallStatus, InstallStep, InstallationJob, InvalidTransition,
};
pub use invocation::{
    CorrelationId, InvocationOutcome, InvocationRequest, InvocationResult, TransportErrorKind,
};
pub use resource::{ResourceContent, ResourceDescriptor};
pub use server::{
    EnvEntry, InstallCommand, InstallMethod, InstallSpec, LaunchSpec, ServerDefinition, TransportKind,
};
pub use tool::{FieldSpec, FieldType, InputSchema, SchemaViolation, ToolDescriptor};
