//! Package-manager command runner port.
//!
//! Intent-based: the installer asks "is this program present?" and "run this
//! install command", never how processes are spawned.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{CommandFailure, InstallCommand};

/// Output kept from a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Last few lines of stdout, for the job log.
    pub stdout_tail: String,
}

#[async_trait]
pub trait PackageRunner: Send + Sync {
    /// Resolve `program` to an executable, or `None` when it is not installed.
    async fn probe(&self, program: &str) -> Option<PathBuf>;

    /// Run `command` to completion. Non-zero exit, spawn failure and timeout
    /// all map to `CommandFailure`.
    async fn run(&self, command: &InstallCommand, timeout: Duration) -> Result<CommandOutput, CommandFailure>;
}
