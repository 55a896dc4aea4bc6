//! Child-process PATH and working-directory checks.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::Path;

use crate::resolver::{PATH_SEPARATOR, split_path_list};

/// Extra directories for bundled contexts on macOS, where `PATH` is often minimal.
#[cfg(target_os = "macos")]
const PLATFORM_EXTRA: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin", "/bin", "/usr/sbin", "/sbin"];
#[cfg(not(target_os = "macos"))]
const PLATFORM_EXTRA: &[&str] = &[];

/// Check that `cwd` is an existing directory.
pub fn validate_working_dir(cwd: &str) -> Result<(), String> {
    let path = Path::new(cwd);
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(format!("Working directory is not a directory: {cwd}")),
        Err(_) => Err(format!("Working directory does not exist: {cwd}")),
    }
}

/// PATH for a server process.
///
/// The resolved executable's directory comes first so launcher scripts
/// (`npx`, shims) find their interpreter, then the inherited PATH, platform
/// extras and finally `path_extra`. Duplicates keep their first position.
pub fn build_effective_path(exe: &Path, inherited: Option<&str>, path_extra: Option<&str>) -> OsString {
    let exe_dir = exe
        .parent()
        .and_then(Path::to_str)
        .filter(|d| !d.is_empty());

    let mut seen = HashSet::new();
    let entries: Vec<&str> = exe_dir
        .into_iter()
        .chain(inherited.into_iter().flat_map(split_path_list))
        .chain(PLATFORM_EXTRA.iter().copied())
        .chain(path_extra.into_iter().flat_map(split_path_list))
        .filter(|entry| seen.insert(*entry))
        .collect();

    OsString::from(entries.join(&PATH_SEPARATOR.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(path: &OsString) -> Vec<String> {
        path.to_string_lossy()
            .split(PATH_SEPARATOR)
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_exe_dir_comes_first() {
        let path = build_effective_path(Path::new("/home/u/.volta/bin/npx"), Some("/usr/bin"), None);
        assert_eq!(entries(&path)[0], "/home/u/.volta/bin");
    }

    #[test]
    fn test_entries_are_deduplicated_in_order() {
        let path = build_effective_path(
            Path::new("/usr/bin/node"),
            Some("/usr/bin:/bin"),
            Some("/custom:/usr/bin"),
        );
        let entries = entries(&path);
        assert_eq!(entries.iter().filter(|e| *e == "/usr/bin").count(), 1);
        assert_eq!(entries.last().map(String::as_str), Some("/custom"));
    }

    #[test]
    fn test_working_dir_checks() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_working_dir(dir.path().to_str().unwrap()).is_ok());

        let file = dir.path().join("f");
        std::fs::write(&file, "").unwrap();
        assert!(validate_working_dir(file.to_str().unwrap()).unwrap_err().contains("not a directory"));
        assert!(validate_working_dir("/nonexistent/dir").unwrap_err().contains("does not exist"));
    }
}
