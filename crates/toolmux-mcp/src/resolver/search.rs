//! Candidate directories, grouped into ordered search stages.

use std::path::{Path, PathBuf};

use super::probe::{EnvProvider, FsProvider, home_dir};

/// Where a candidate directory came from, in search order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStage {
    /// Entries of `$PATH`.
    Path,
    /// `/etc/paths` and `/etc/paths.d/*` (macOS).
    EtcPaths,
    /// Well-known system and Homebrew directories.
    PlatformDefaults,
    /// asdf, volta and nvm shims for node tooling.
    NodeManagers,
    /// pyenv shims and pip/pipx user directories for python tooling.
    PythonManagers,
    /// Extra directories from the server's `path_extra`.
    UserPaths,
}

impl SearchStage {
    pub const ALL: [Self; 6] = [
        Self::Path,
        Self::EtcPaths,
        Self::PlatformDefaults,
        Self::NodeManagers,
        Self::PythonManagers,
        Self::UserPaths,
    ];
}

#[cfg(unix)]
pub const PATH_SEPARATOR: char = ':';
#[cfg(windows)]
pub const PATH_SEPARATOR: char = ';';

const NODE_TOOLS: &[&str] = &["node", "npm", "npx"];
const PYTHON_TOOLS: &[&str] = &["python", "python3", "pip", "pip3", "uv", "uvx", "pipx"];

/// Split a PATH-style list, skipping empty entries.
pub fn split_path_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(PATH_SEPARATOR).filter(|s| !s.is_empty())
}

/// Directories to check for `command` in `stage`.
pub fn candidate_dirs(
    stage: SearchStage,
    command: &str,
    user_paths: &[String],
    env: &dyn EnvProvider,
    fs: &dyn FsProvider,
) -> Vec<PathBuf> {
    match stage {
        SearchStage::Path => env
            .get("PATH")
            .and_then(|p| p.into_string().ok())
            .map(|p| split_path_list(&p).map(PathBuf::from).collect())
            .unwrap_or_default(),
        SearchStage::EtcPaths => etc_paths(fs),
        SearchStage::PlatformDefaults => platform_default_dirs().iter().map(PathBuf::from).collect(),
        SearchStage::NodeManagers if NODE_TOOLS.contains(&command) => home_dir(env)
            .map(|home| node_manager_dirs(&home, fs))
            .unwrap_or_default(),
        SearchStage::PythonManagers if PYTHON_TOOLS.contains(&command) => home_dir(env)
            .map(|home| python_manager_dirs(&home, env))
            .unwrap_or_default(),
        SearchStage::NodeManagers | SearchStage::PythonManagers => Vec::new(),
        SearchStage::UserPaths => user_paths
            .iter()
            .flat_map(|p| split_path_list(p))
            .map(PathBuf::from)
            .collect(),
    }
}

/// File names to try for `command` inside a directory.
pub fn file_names(command: &str, env: &dyn EnvProvider) -> Vec<String> {
    #[cfg(windows)]
    {
        let exts = env
            .get("PATHEXT")
            .and_then(|p| p.into_string().ok())
            .unwrap_or_else(|| ".COM;.EXE;.BAT;.CMD".to_string());
        std::iter::once(command.to_string())
            .chain(exts.split(';').filter(|e| !e.is_empty()).map(|e| format!("{command}{}", e.to_lowercase())))
            .collect()
    }
    #[cfg(not(windows))]
    {
        let _ = env;
        vec![command.to_string()]
    }
}

#[cfg(target_os = "macos")]
fn etc_paths(fs: &dyn FsProvider) -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from("/etc/paths")];
    let mut extra = fs.list_dir(Path::new("/etc/paths.d"));
    extra.sort();
    files.extend(extra.into_iter().map(|name| Path::new("/etc/paths.d").join(name)));

    files
        .iter()
        .filter_map(|f| fs.read_to_string(f))
        .flat_map(|contents| {
            contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(PathBuf::from)
                .collect::<Vec<_>>()
        })
        .collect()
}

#[cfg(not(target_os = "macos"))]
fn etc_paths(_fs: &dyn FsProvider) -> Vec<PathBuf> {
    Vec::new()
}

const fn platform_default_dirs() -> &'static [&'static str] {
    #[cfg(target_os = "macos")]
    {
        &["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin", "/bin"]
    }
    #[cfg(target_os = "windows")]
    {
        &[]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        &["/usr/local/bin", "/usr/bin", "/bin", "/snap/bin"]
    }
}

/// asdf shim, volta, then nvm (default alias first, newest version after).
fn node_manager_dirs(home: &Path, fs: &dyn FsProvider) -> Vec<PathBuf> {
    let mut dirs = vec![home.join(".asdf/shims"), home.join(".volta/bin")];

    let nvm = home.join(".nvm");
    let versions_dir = nvm.join("versions/node");
    if let Some(alias) = fs.read_to_string(&nvm.join("alias/default")) {
        let alias = alias.trim();
        if !alias.is_empty() {
            let version = if alias.starts_with('v') {
                alias.to_string()
            } else {
                format!("v{alias}")
            };
            dirs.push(versions_dir.join(version).join("bin"));
        }
    }

    let mut versions = fs.list_dir(&versions_dir);
    versions.sort_by_key(|v| version_key(v));
    dirs.extend(
        versions
            .iter()
            .rev()
            .map(|v| versions_dir.join(v).join("bin")),
    );
    dirs
}

fn python_manager_dirs(home: &Path, env: &dyn EnvProvider) -> Vec<PathBuf> {
    let pyenv_root = env
        .get("PYENV_ROOT")
        .filter(|r| !r.is_empty())
        .map_or_else(|| home.join(".pyenv"), PathBuf::from);
    vec![
        pyenv_root.join("shims"),
        home.join(".asdf/shims"),
        home.join(".local/bin"),
        home.join(".cargo/bin"),
    ]
}

/// `v20.11.0` → `[20, 11, 0]`, so `v9` sorts before `v10`.
fn version_key(version: &str) -> Vec<u64> {
    version
        .trim_start_matches('v')
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}
