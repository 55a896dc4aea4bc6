//! Port definitions (trait abstractions) for external collaborators.
//!
//! # Design Rules
//!
//! - Only domain types in signatures
//! - No process/filesystem implementation details
//! - Intent-based methods for the package runner

pub mod credential_store;
pub mod definition_store;
pub mod error;
pub mod event_emitter;
pub mod package_runner;

pub use credential_store::{CredentialError, CredentialStore};
pub use definition_store::{DefinitionStore, StoreError};
pub use error::{ErrorCategory, ErrorInfo};
pub use event_emitter::{ChannelEmitter, EventEmitter, NoopEmitter};
pub use package_runner::{CommandOutput, PackageRunner};
