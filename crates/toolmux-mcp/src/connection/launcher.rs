//! Spawning server processes.
//!
//! The connection manager only sees byte streams and a `ServerProcess`
//! handle, so tests can substitute in-process servers for real children.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use toolmux_core::ServerDefinition;
use tracing::{debug, warn};

use super::shutdown::terminate_child;
use crate::path::{build_effective_path, validate_working_dir};
use crate::resolver::{ResolveError, resolve_executable, split_path_list};

#[derive(Debug, Clone, Error)]
pub enum LaunchError {
    #[error("{0}")]
    NotFound(#[from] ResolveError),

    #[error("{0}")]
    InvalidWorkingDir(String),

    #[error("Failed to spawn process: {0}")]
    Spawn(String),
}

impl LaunchError {
    /// Problems with the definition or host setup rather than the process.
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidWorkingDir(_))
    }
}

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A handle to a running server.
#[async_trait]
pub trait ServerProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Wait for the process to exit and describe how it ended. Cancel-safe.
    async fn wait(&mut self) -> String;

    /// Terminate the process, escalating after `grace`, and reap it.
    async fn shutdown(&mut self, grace: Duration);
}

/// A freshly started server: its stdio and process handle.
pub struct LaunchedServer {
    pub stdin: BoxedWriter,
    pub stdout: BoxedReader,
    pub stderr: Option<BoxedReader>,
    pub process: Box<dyn ServerProcess>,
}

#[async_trait]
pub trait ServerLauncher: Send + Sync {
    /// Start `definition` with `env` added to the inherited environment.
    async fn launch(&self, definition: &ServerDefinition, env: &[(String, String)]) -> Result<LaunchedServer, LaunchError>;
}

/// Launches servers as OS child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

struct ChildProcess {
    child: Child,
}

#[async_trait]
impl ServerProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> String {
        match self.child.wait().await {
            Ok(status) => status.to_string(),
            Err(e) => format!("wait failed: {e}"),
        }
    }

    async fn shutdown(&mut self, grace: Duration) {
        if let Err(e) = terminate_child(&mut self.child, grace).await {
            warn!(pid = ?self.child.id(), error = %e, "failed to terminate server process");
        }
    }
}

#[async_trait]
impl ServerLauncher for ProcessLauncher {
    async fn launch(&self, definition: &ServerDefinition, env: &[(String, String)]) -> Result<LaunchedServer, LaunchError> {
        let launch = &definition.launch;
        let user_paths: Vec<String> = launch
            .path_extra
            .as_deref()
            .map(|extra| split_path_list(extra).map(String::from).collect())
            .unwrap_or_default();

        let resolved = resolve_executable(&launch.command, &user_paths)?;
        for warning in &resolved.warnings {
            warn!(server = %definition.name, "{warning}");
        }
        let exe = resolved.resolved_path;

        let mut cmd = Command::new(&exe);
        cmd.args(&launch.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = launch.working_dir.as_deref().filter(|c| !c.is_empty()) {
            validate_working_dir(cwd).map_err(LaunchError::InvalidWorkingDir)?;
            cmd.current_dir(cwd);
        }

        let inherited = std::env::var("PATH").ok();
        cmd.env("PATH", build_effective_path(&exe, inherited.as_deref(), launch.path_extra.as_deref()));
        for (key, value) in env {
            cmd.env(key, value);
        }

        debug!(
            server = %definition.name,
            exe = %exe.display(),
            args = ?launch.args,
            env_keys = ?env.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            "Spawning server process"
        );

        let mut child = cmd.spawn().map_err(|e| LaunchError::Spawn(e.to_string()))?;
        let stdin = child.stdin.take().ok_or_else(|| LaunchError::Spawn("stdin was not captured".to_string()))?;
        let stdout = child.stdout.take().ok_or_else(|| LaunchError::Spawn("stdout was not captured".to_string()))?;
        let stderr = child.stderr.take().map(|s| Box::new(s) as BoxedReader);

        Ok(LaunchedServer {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr,
            process: Box::new(ChildProcess { child }),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn test_launch_wires_stdio_and_env() {
        let def = ServerDefinition::custom("echo", "sh", vec!["-c".into(), "read line; echo \"$GREETING $line\"".into()]);
        let mut server = ProcessLauncher
            .launch(&def, &[("GREETING".into(), "hello".into())])
            .await
            .unwrap();

        server.stdin.write_all(b"world\n").await.unwrap();
        server.stdin.flush().await.unwrap();
        let mut line = String::new();
        BufReader::new(server.stdout).read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "hello world");

        let status = server.process.wait().await;
        assert!(status.contains('0'), "unexpected status: {status}");
    }

    #[tokio::test]
    async fn test_missing_command_is_configuration_error() {
        let def = ServerDefinition::custom("ghost", "toolmux-no-such-server", vec![]);
        let err = ProcessLauncher.launch(&def, &[]).await.err().unwrap();
        assert!(matches!(err, LaunchError::NotFound(_)));
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_bad_working_dir_is_rejected() {
        let def = ServerDefinition::custom("cat", "cat", vec![]).with_working_dir("/nonexistent/toolmux");
        let err = ProcessLauncher.launch(&def, &[]).await.err().unwrap();
        assert!(matches!(err, LaunchError::InvalidWorkingDir(_)));
    }

    #[tokio::test]
    async fn test_shutdown_reaps_process() {
        let def = ServerDefinition::custom("cat", "cat", vec![]);
        let mut server = ProcessLauncher.launch(&def, &[]).await.unwrap();
        assert!(server.process.id().is_some());
        server.process.shutdown(Duration::from_secs(2)).await;
        assert!(server.process.id().is_none());
    }
}
