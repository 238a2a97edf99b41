//! File-persisted companion registry.
//!
//! # Storage layout
//!
//! ```text
//! <state_file>        JSON array of {"host", "udid", "port", "is_local"} (mode 0600)
//! <state_file>.tmp    transient; renamed over <state_file> on every write
//! <state_file>.lock   advisory lock target, held for each mutation; never removed
//! ```
//!
//! An absent (or empty) state file reads as `[]`. Every mutation is a
//! load → mutate → store cycle performed while holding both the per-instance
//! mutex and the cross-process file lock, so concurrent callers never lose
//! updates. Reads only take the mutex: writes are atomic renames, so a reader
//! sees either the old list or the new one. A mutation that changes nothing
//! (a removal matching no entry) skips the write.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use idb_core::format::{companions_from_slice, companions_to_json};
use idb_core::types::{Address, CompanionInfo};

use crate::error::{io_err, RegistryError};
use crate::lock::StateFileLock;
use crate::paths::{lock_path, state_file_path, tmp_path};

/// Key accepted by [`CompanionRegistry::remove_companion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanionIdentifier {
    Address(Address),
    Udid(String),
}

impl CompanionIdentifier {
    fn matches(&self, companion: &CompanionInfo) -> bool {
        match self {
            CompanionIdentifier::Address(address) => companion.matches_address(address),
            CompanionIdentifier::Udid(udid) => companion.udid == *udid,
        }
    }
}

impl std::fmt::Display for CompanionIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompanionIdentifier::Address(address) => write!(f, "{address}"),
            CompanionIdentifier::Udid(udid) => f.write_str(udid),
        }
    }
}

impl From<Address> for CompanionIdentifier {
    fn from(address: Address) -> Self {
        Self::Address(address)
    }
}

impl From<String> for CompanionIdentifier {
    fn from(udid: String) -> Self {
        Self::Udid(udid)
    }
}

impl From<&str> for CompanionIdentifier {
    fn from(udid: &str) -> Self {
        Self::Udid(udid.to_owned())
    }
}

/// Both locks for one mutation; released together on drop.
struct Exclusive<'a> {
    _file: StateFileLock,
    _task: MutexGuard<'a, ()>,
}

/// Async-safe store of companion descriptors backed by one JSON file.
#[derive(Debug)]
pub struct CompanionRegistry {
    state_file: PathBuf,
    lock: Mutex<()>,
}

impl CompanionRegistry {
    pub fn new(state_file: impl Into<PathBuf>) -> Self {
        Self {
            state_file: state_file.into(),
            lock: Mutex::new(()),
        }
    }

    /// Registry at `$IDB_STATE_FILE` or `~/.idb/companions.json`.
    pub fn from_env() -> Result<Self, RegistryError> {
        Ok(Self::new(state_file_path()?))
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    pub async fn get_companions(&self) -> Result<Vec<CompanionInfo>, RegistryError> {
        let _task = self.lock.lock().await;
        self.load().await
    }

    /// Store `companion`, replacing any entry with the same host and port.
    pub async fn add_companion(&self, companion: CompanionInfo) -> Result<(), RegistryError> {
        let address = companion.address();
        self.update(|companions| {
            let before = companions.len();
            companions.retain(|c| !c.matches_address(&address));
            info!(
                udid = %companion.udid,
                address = %address,
                replaced = before - companions.len(),
                "adding companion"
            );
            companions.push(companion);
            true
        })
        .await
    }

    /// Drop every entry matching `identifier`. Matching nothing is not an error.
    pub async fn remove_companion(
        &self,
        identifier: impl Into<CompanionIdentifier>,
    ) -> Result<(), RegistryError> {
        let identifier = identifier.into();
        self.update(|companions| {
            let before = companions.len();
            companions.retain(|c| !identifier.matches(c));
            let removed = before - companions.len();
            if removed == 0 {
                warn!(identifier = %identifier, "no companion matched for removal");
            } else {
                info!(identifier = %identifier, removed, "removed companion");
            }
            removed > 0
        })
        .await
    }

    /// Replace the stored list with `[]`, creating the file if absent.
    pub async fn clear(&self) -> Result<(), RegistryError> {
        let _held = self.exclusive().await?;
        self.store(&[]).await?;
        info!(path = %self.state_file.display(), "cleared companions");
        Ok(())
    }

    /// Select a companion for a target.
    ///
    /// With a udid, the entry registered for it. Without one, the only entry,
    /// failing when there are none or several to choose from.
    pub async fn get_companion_info(
        &self,
        target_udid: Option<&str>,
    ) -> Result<CompanionInfo, RegistryError> {
        let companions = self.get_companions().await?;
        select_companion(companions, target_udid)
    }

    // -----------------------------------------------------------------------
    // Critical section
    // -----------------------------------------------------------------------

    async fn exclusive(&self) -> Result<Exclusive<'_>, RegistryError> {
        // Task mutex first: a cancelled waiter has touched nothing.
        let task = self.lock.lock().await;
        let file = StateFileLock::acquire(lock_path(&self.state_file)).await?;
        Ok(Exclusive {
            _file: file,
            _task: task,
        })
    }

    /// `mutate` reports whether it changed the list; unchanged lists are not written.
    async fn update(
        &self,
        mutate: impl FnOnce(&mut Vec<CompanionInfo>) -> bool,
    ) -> Result<(), RegistryError> {
        let _held = self.exclusive().await?;
        let mut companions = self.load().await?;
        if mutate(&mut companions) {
            self.store(&companions).await?;
        }
        Ok(())
    }

    async fn load(&self) -> Result<Vec<CompanionInfo>, RegistryError> {
        let path = &self.state_file;
        let contents = match tokio::fs::read(path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "state file absent, treating as empty");
                return Ok(vec![]);
            }
            Err(err) => return Err(io_err(path, err)),
        };
        if contents.iter().all(u8::is_ascii_whitespace) {
            return Ok(vec![]);
        }
        // Bytes, not text: non-UTF-8 content is corrupt data, not an I/O failure.
        let companions = companions_from_slice(&contents).map_err(|source| RegistryError::Decode {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), count = companions.len(), "loaded companions");
        Ok(companions)
    }

    /// Write flow: serialize → `.tmp` sibling → `chmod 0600` → `rename`.
    /// The caller holds the file lock, which already created the directory.
    async fn store(&self, companions: &[CompanionInfo]) -> Result<(), RegistryError> {
        let path = &self.state_file;
        let tmp = tmp_path(path);

        let json = companions_to_json(companions)?;
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| io_err(&tmp, e))?;
        set_file_permissions(&tmp).await?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| io_err(path, e))?;
        debug!(path = %path.display(), count = companions.len(), "stored companions");
        Ok(())
    }
}

fn select_companion(
    companions: Vec<CompanionInfo>,
    target_udid: Option<&str>,
) -> Result<CompanionInfo, RegistryError> {
    match target_udid {
        Some(udid) => companions
            .into_iter()
            .find(|c| c.udid == udid)
            .ok_or_else(|| RegistryError::CompanionNotFound {
                udid: udid.to_owned(),
            }),
        None => {
            let count = companions.len();
            let mut companions = companions.into_iter();
            match (companions.next(), count) {
                (Some(only), 1) => Ok(only),
                (None, _) => Err(RegistryError::NoCompanions),
                _ => Err(RegistryError::AmbiguousCompanion { count }),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Create `dir` (mode `0700`) if it does not yet exist.
pub(crate) fn ensure_state_dir(dir: &Path) -> Result<(), RegistryError> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    set_dir_permissions(dir)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

#[cfg(unix)]
async fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
async fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn companion(udid: &str, port: u16) -> CompanionInfo {
        CompanionInfo {
            host: "foohost".to_string(),
            udid: udid.to_string(),
            port,
            is_local: false,
        }
    }

    #[test]
    fn identifier_from_str_is_udid() {
        assert_eq!(
            CompanionIdentifier::from("u1"),
            CompanionIdentifier::Udid("u1".to_string())
        );
    }

    #[test]
    fn identifier_matching() {
        let c = companion("u1", 123);
        assert!(CompanionIdentifier::from("u1").matches(&c));
        assert!(!CompanionIdentifier::from("u2").matches(&c));
        assert!(CompanionIdentifier::from(c.address()).matches(&c));
        assert!(!CompanionIdentifier::from(companion("u1", 124).address()).matches(&c));
    }

    #[test]
    fn select_by_udid() {
        let selected = select_companion(vec![companion("u1", 1), companion("u2", 2)], Some("u2"))
            .expect("select");
        assert_eq!(selected.port, 2);
    }

    #[test]
    fn select_unknown_udid_is_not_found() {
        let err = select_companion(vec![companion("u1", 1)], Some("u9")).unwrap_err();
        assert!(matches!(err, RegistryError::CompanionNotFound { ref udid } if udid == "u9"));
    }

    #[test]
    fn select_without_udid() {
        assert!(matches!(
            select_companion(vec![], None).unwrap_err(),
            RegistryError::NoCompanions
        ));
        assert_eq!(
            select_companion(vec![companion("u1", 1)], None).expect("single").udid,
            "u1"
        );
        assert!(matches!(
            select_companion(vec![companion("u1", 1), companion("u2", 2)], None).unwrap_err(),
            RegistryError::AmbiguousCompanion { count: 2 }
        ));
    }

    #[tokio::test]
    async fn store_cleans_up_tmp_and_sets_mode() {
        let tmp = TempDir::new().expect("tempdir");
        let state = tmp.path().join("companions.json");
        let registry = CompanionRegistry::new(&state);

        registry.add_companion(companion("u1", 1)).await.expect("add");

        assert!(state.exists());
        assert!(!tmp_path(&state).exists(), ".tmp must be gone after store");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&state).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[tokio::test]
    async fn missing_parent_directory_is_created_with_perms() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join(".idb");
        let registry = CompanionRegistry::new(dir.join("companions.json"));

        registry.clear().await.expect("clear");

        assert!(dir.is_dir());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700);
        }
    }
}
