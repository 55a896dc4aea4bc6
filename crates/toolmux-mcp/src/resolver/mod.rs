//! Executable resolution for launch commands and install probes.
//!
//! Bundled and service contexts often run with a minimal `PATH`, so a bare
//! `npx` or `python3` has to be looked up in the places version managers
//! and package managers actually put it.
//!
//! ## Search order
//!
//! 1. An absolute command is checked as-is; on failure its basename is searched
//! 2. `$PATH`
//! 3. `/etc/paths` and `/etc/paths.d/*` (macOS)
//! 4. Platform default directories
//! 5. Node version managers (asdf, volta, nvm) for node tooling
//! 6. pyenv, asdf and user-local directories for python tooling
//! 7. The server's `path_extra` entries
//!
//! Every candidate checked is recorded in the result for diagnostics.

mod probe;
mod search;

use std::fmt;
use std::path::{Path, PathBuf};

pub use probe::{EnvProvider, FsProvider, SystemEnv, SystemFs};
pub use search::{PATH_SEPARATOR, SearchStage, split_path_list};

#[cfg(test)]
pub use probe::{MockEnv, MockFs};

/// A successful resolution.
#[derive(Debug, Clone)]
pub struct ResolveResult {
    pub resolved_path: PathBuf,
    pub stage: Option<SearchStage>,
    pub attempts: Vec<Attempt>,
    pub warnings: Vec<String>,
}

/// One candidate that was checked.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub candidate: PathBuf,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Ok,
    NotFound,
    NotAFile,
    NotExecutable,
    PermissionDenied,
    IoError(String),
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::NotFound => f.write_str("not found"),
            Self::NotAFile => f.write_str("not a file"),
            Self::NotExecutable => f.write_str("not executable"),
            Self::PermissionDenied => f.write_str("permission denied"),
            Self::IoError(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("Command is empty")]
    EmptyCommand,

    #[error("Could not resolve '{command}' to an executable ({checked} locations checked)")]
    NotResolved { command: String, checked: usize },
}

/// Resolve against the real environment and filesystem.
pub fn resolve_executable(command: &str, user_paths: &[String]) -> Result<ResolveResult, ResolveError> {
    resolve_executable_with(command, user_paths, &SystemEnv, &SystemFs)
}

/// Resolve with injected environment and filesystem.
pub fn resolve_executable_with(
    command: &str,
    user_paths: &[String],
    env: &dyn EnvProvider,
    fs: &dyn FsProvider,
) -> Result<ResolveResult, ResolveError> {
    let command = command.trim();
    if command.is_empty() {
        return Err(ResolveError::EmptyCommand);
    }

    let mut attempts = Vec::new();
    let mut warnings = Vec::new();

    let path = Path::new(command);
    let name = if path.is_absolute() {
        let outcome = fs.check_executable(path);
        let ok = outcome == AttemptOutcome::Ok;
        attempts.push(Attempt {
            candidate: path.to_path_buf(),
            outcome: outcome.clone(),
        });
        if ok {
            return Ok(ResolveResult {
                resolved_path: path.to_path_buf(),
                stage: None,
                attempts,
                warnings,
            });
        }

        let Some(basename) = path.file_name().and_then(|n| n.to_str()) else {
            return Err(ResolveError::NotResolved {
                command: command.to_string(),
                checked: attempts.len(),
            });
        };
        warnings.push(format!("'{command}' is unusable ({outcome}); searching for '{basename}' instead"));
        basename
    } else if path.components().count() > 1 {
        // Relative paths with separators are not searched.
        return Err(ResolveError::NotResolved {
            command: command.to_string(),
            checked: 0,
        });
    } else {
        command
    };

    let names = search::file_names(name, env);
    for stage in SearchStage::ALL {
        for dir in search::candidate_dirs(stage, name, user_paths, env, fs) {
            for file in &names {
                let candidate = dir.join(file);
                let outcome = fs.check_executable(&candidate);
                let ok = outcome == AttemptOutcome::Ok;
                attempts.push(Attempt {
                    candidate: candidate.clone(),
                    outcome,
                });
                if ok {
                    return Ok(ResolveResult {
                        resolved_path: candidate,
                        stage: Some(stage),
                        attempts,
                        warnings,
                    });
                }
            }
        }
    }

    Err(ResolveError::NotResolved {
        command: command.to_string(),
        checked: attempts.len(),
    })
}
