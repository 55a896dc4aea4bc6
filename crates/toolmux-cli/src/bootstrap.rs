//! CLI bootstrap, the composition root.
//!
//! The only place concrete adapters are chosen:
//! - `servers.json` and `installed.json` in the data directory via `JsonFileStore`
//! - process environment (plus `.env`) via `EnvCredentialStore`
//! - real package managers via `CommandPackageRunner`
//! - child processes via `ProcessLauncher`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use toolmux_core::{ChannelEmitter, RuntimeSettings};
use toolmux_mcp::adapters::{CommandPackageRunner, EnvCredentialStore, JsonFileStore};
use toolmux_mcp::{ProcessLauncher, RuntimeDeps, ToolRuntime};
use tracing::debug;

use crate::error::CliError;

const SERVERS_FILE: &str = "servers.json";
const SETTINGS_FILE: &str = "settings.json";

/// Resolved CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub settings: RuntimeSettings,
}

impl CliConfig {
    /// Use `data_dir` if given, otherwise `<platform data dir>/toolmux`, and
    /// read `settings.json` from it.
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self, CliError> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        let settings = load_settings(&data_dir.join(SETTINGS_FILE))?;
        Ok(Self { data_dir, settings })
    }

    pub fn servers_path(&self) -> PathBuf {
        self.data_dir.join(SERVERS_FILE)
    }
}

fn default_data_dir() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("toolmux"))
        .ok_or_else(|| CliError::Config("could not determine a data directory; pass --data-dir".to_string()))
}

/// Missing file means defaults; any other read or parse failure is an error.
fn load_settings(path: &Path) -> Result<RuntimeSettings, CliError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map_err(|e| CliError::Config(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
            Ok(RuntimeSettings::default())
        }
        Err(e) => Err(CliError::Config(format!("{}: {e}", path.display()))),
    }
}

/// Composed runtime for one CLI invocation.
pub struct CliContext {
    pub runtime: ToolRuntime,
    pub config: CliConfig,
}

/// Wire adapters into a started `ToolRuntime`.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let deps = RuntimeDeps {
        store: Arc::new(JsonFileStore::new(config.servers_path())),
        credentials: Arc::new(EnvCredentialStore::new()),
        runner: Arc::new(CommandPackageRunner::new()),
        launcher: Arc::new(ProcessLauncher),
        emitter: Arc::new(ChannelEmitter::new(256)),
    };
    let runtime = ToolRuntime::new(deps, config.settings.clone())?;
    let loaded = runtime.start().await?;
    debug!(servers = loaded, path = %config.servers_path().display(), "registry loaded");
    Ok(CliContext { runtime, config })
}
