//! Definition store adapters.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use toolmux_core::{DefinitionStore, ServerDefinition, StoreError};

const FORMAT_VERSION: u32 = 1;
const INSTALLED_FILE: &str = "installed.json";

/// On-disk layout of `servers.json`.
#[derive(Debug, Serialize, Deserialize)]
struct StoredDefinitions {
    version: u32,
    servers: Vec<ServerDefinition>,
}

/// On-disk layout of `installed.json`.
#[derive(Debug, Serialize, Deserialize)]
struct StoredInstalls {
    version: u32,
    installed: Vec<String>,
}

/// JSON file store.
///
/// Definitions live in the given file; the installed set lives in
/// `installed.json` next to it.
///
/// # Atomicity
/// 1. Write to `<file>.tmp`
/// 2. Rename over `<file>` (atomic on Unix/macOS)
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn installed_path(&self) -> PathBuf {
        self.path.with_file_name(INSTALLED_FILE)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path, e: &io::Error) -> StoreError {
    StoreError::Io(format!("{}: {e}", path.display()))
}

fn corrupt(path: &Path, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{}: {detail}", path.display()))
}

/// File contents, or `None` when it has never been written.
async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path, &e)),
    }
}

async fn write_atomic(path: &Path, contents: Vec<u8>) -> Result<(), StoreError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await.map_err(|e| io_error(dir, &e))?;
    }
    let temp = temp_path(path);
    tokio::fs::write(&temp, contents)
        .await
        .map_err(|e| io_error(&temp, &e))?;
    tokio::fs::rename(&temp, path).await.map_err(|e| io_error(path, &e))
}

fn check_version(path: &Path, version: u32) -> Result<(), StoreError> {
    if version > FORMAT_VERSION {
        return Err(corrupt(path, format!("unsupported format version {version}")));
    }
    Ok(())
}

#[async_trait]
impl DefinitionStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<ServerDefinition>, StoreError> {
        let Some(bytes) = read_optional(&self.path).await? else {
            return Ok(Vec::new());
        };
        let stored: StoredDefinitions = serde_json::from_slice(&bytes).map_err(|e| corrupt(&self.path, e))?;
        check_version(&self.path, stored.version)?;
        Ok(stored.servers)
    }

    async fn save(&self, definitions: &[ServerDefinition]) -> Result<(), StoreError> {
        let contents = serde_json::to_vec_pretty(&StoredDefinitions {
            version: FORMAT_VERSION,
            servers: definitions.to_vec(),
        })
        .map_err(|e| StoreError::Io(e.to_string()))?;
        write_atomic(&self.path, contents).await
    }

    async fn load_installed(&self) -> Result<Vec<String>, StoreError> {
        let path = self.installed_path();
        let Some(bytes) = read_optional(&path).await? else {
            return Ok(Vec::new());
        };
        let stored: StoredInstalls = serde_json::from_slice(&bytes).map_err(|e| corrupt(&path, e))?;
        check_version(&path, stored.version)?;
        Ok(stored.installed)
    }

    async fn save_installed(&self, names: &[String]) -> Result<(), StoreError> {
        let contents = serde_json::to_vec_pretty(&StoredInstalls {
            version: FORMAT_VERSION,
            installed: names.to_vec(),
        })
        .map_err(|e| StoreError::Io(e.to_string()))?;
        write_atomic(&self.installed_path(), contents).await
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    definitions: Mutex<Vec<ServerDefinition>>,
    installed: Mutex<Vec<String>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_definitions(definitions: Vec<ServerDefinition>) -> Self {
        Self {
            definitions: Mutex::new(definitions),
            ..Self::default()
        }
    }

    /// Make every subsequent save fail with an I/O error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// What was last saved.
    pub fn snapshot(&self) -> Vec<ServerDefinition> {
        self.definitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The installed set as last saved.
    pub fn installed(&self) -> Vec<String> {
        self.installed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DefinitionStore for MemoryStore {
    async fn load(&self) -> Result<Vec<ServerDefinition>, StoreError> {
        Ok(self.snapshot())
    }

    async fn save(&self, definitions: &[ServerDefinition]) -> Result<(), StoreError> {
        self.check_writable()?;
        *self.definitions.lock().unwrap_or_else(PoisonError::into_inner) = definitions.to_vec();
        Ok(())
    }

    async fn load_installed(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.installed())
    }

    async fn save_installed(&self, names: &[String]) -> Result<(), StoreError> {
        self.check_writable()?;
        *self.installed.lock().unwrap_or_else(PoisonError::into_inner) = names.to_vec();
        Ok(())
    }
}
