//! Concrete implementations of the core ports.

mod credentials;
mod runner;
mod store;

pub use credentials::{EnvCredentialStore, MemoryCredentialStore};
pub use runner::CommandPackageRunner;
pub use store::{JsonFileStore, MemoryStore};
