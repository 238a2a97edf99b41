use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::RegistryError;

/// Overrides the default state file location when set and non-empty.
pub const STATE_FILE_ENV: &str = "IDB_STATE_FILE";

pub const STATE_FILE_NAME: &str = "companions.json";

pub fn idb_root(home: &Path) -> PathBuf {
    home.join(".idb")
}

/// `<home>/.idb/companions.json` — pure, no I/O.
pub fn state_file_path_at(home: &Path) -> PathBuf {
    idb_root(home).join(STATE_FILE_NAME)
}

/// Resolve the state file: `$IDB_STATE_FILE`, else `~/.idb/companions.json`.
pub fn state_file_path() -> Result<PathBuf, RegistryError> {
    resolve_state_file_path(std::env::var_os(STATE_FILE_ENV), dirs::home_dir())
}

fn resolve_state_file_path(
    override_path: Option<OsString>,
    home: Option<PathBuf>,
) -> Result<PathBuf, RegistryError> {
    match override_path.filter(|p| !p.is_empty()) {
        Some(path) => Ok(PathBuf::from(path)),
        None => home
            .map(|home| state_file_path_at(&home))
            .ok_or(RegistryError::HomeNotFound),
    }
}

/// `<state_file>.tmp` — written then renamed over the state file.
pub(crate) fn tmp_path(state_file: &Path) -> PathBuf {
    with_suffix(state_file, ".tmp")
}

/// `<state_file>.lock` — advisory lock target shared by every process.
pub(crate) fn lock_path(state_file: &Path) -> PathBuf {
    with_suffix(state_file, ".lock")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_file_is_under_dot_idb() {
        let path = state_file_path_at(Path::new("/home/dev"));
        assert_eq!(path, PathBuf::from("/home/dev/.idb/companions.json"));
    }

    #[test]
    fn override_wins_over_home() {
        let path = resolve_state_file_path(
            Some(OsString::from("/tmp/idb/state")),
            Some(PathBuf::from("/home/dev")),
        )
        .expect("resolve");
        assert_eq!(path, PathBuf::from("/tmp/idb/state"));
    }

    #[test]
    fn empty_override_falls_back_to_home() {
        let path = resolve_state_file_path(Some(OsString::new()), Some(PathBuf::from("/home/dev")))
            .expect("resolve");
        assert_eq!(path, PathBuf::from("/home/dev/.idb/companions.json"));
    }

    #[test]
    fn no_override_and_no_home_is_an_error() {
        let err = resolve_state_file_path(None, None).unwrap_err();
        assert!(matches!(err, RegistryError::HomeNotFound));
        assert!(err.to_string().contains("home directory"));
    }

    #[test]
    fn sibling_paths_keep_full_file_name() {
        let state = Path::new("/tmp/idb/companions.json");
        assert_eq!(tmp_path(state), PathBuf::from("/tmp/idb/companions.json.tmp"));
        assert_eq!(lock_path(state), PathBuf::from("/tmp/idb/companions.json.lock"));
    }
}
