use std::path::PathBuf;

use thiserror::Error;

use idb_core::FormatError;

/// Error surface for the companion registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Filesystem failure on read, write, rename or directory creation.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but does not hold a companion list.
    #[error("failed to decode companion state at {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error("failed to encode companion state: {0}")]
    Encode(#[from] FormatError),

    /// `dirs::home_dir()` returned `None` and no override was set.
    #[error("cannot determine home directory; set $HOME or IDB_STATE_FILE")]
    HomeNotFound,

    #[error("no companion registered for target {udid}")]
    CompanionNotFound { udid: String },

    #[error("no target udid given and no companions are registered")]
    NoCompanions,

    #[error("no target udid given and {count} companions are registered")]
    AmbiguousCompanion { count: usize },

    /// The blocking task holding the cross-process lock panicked or was cancelled.
    #[error("state file lock task failed: {0}")]
    LockTask(#[from] tokio::task::JoinError),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.into(),
        source,
    }
}
