//! Package-manager runner backed by real child processes.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use toolmux_core::{CommandFailure, CommandOutput, InstallCommand, PackageRunner};
use tracing::debug;

use crate::path::build_effective_path;
use crate::resolver::resolve_executable;

/// Lines of stdout/stderr kept for the job log.
const TAIL_LINES: usize = 20;

/// Runs install commands with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct CommandPackageRunner {
    search_paths: Vec<String>,
}

impl CommandPackageRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extra directories to search when resolving programs.
    #[must_use]
    pub fn with_search_paths(mut self, paths: Vec<String>) -> Self {
        self.search_paths = paths;
        self
    }
}

fn tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(TAIL_LINES)..].join("\n")
}

#[async_trait]
impl PackageRunner for CommandPackageRunner {
    async fn probe(&self, program: &str) -> Option<PathBuf> {
        match resolve_executable(program, &self.search_paths) {
            Ok(result) => Some(result.resolved_path),
            Err(e) => {
                debug!(program, error = %e, "program not found");
                None
            }
        }
    }

    async fn run(&self, command: &InstallCommand, timeout: Duration) -> Result<CommandOutput, CommandFailure> {
        let exe = resolve_executable(&command.program, &self.search_paths)
            .map_err(|e| CommandFailure::Spawn { reason: e.to_string() })?
            .resolved_path;

        let inherited = std::env::var("PATH").ok();
        let child = Command::new(&exe)
            .args(&command.args)
            .env("PATH", build_effective_path(&exe, inherited.as_deref(), None))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandFailure::Spawn { reason: e.to_string() })?;

        debug!(command = %command, pid = ?child.id(), "install command started");

        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(CommandFailure::Spawn { reason: e.to_string() }),
            Err(_) => return Err(CommandFailure::timed_out(timeout)),
        };

        if output.status.success() {
            Ok(CommandOutput {
                stdout_tail: tail(&output.stdout),
            })
        } else {
            Err(CommandFailure::ExitCode {
                code: output.status.code(),
                stderr_tail: tail(&output.stderr),
            })
        }
    }
}
