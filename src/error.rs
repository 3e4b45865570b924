use std::io;
use std::path::PathBuf;

use serde::Serialize;

/// Settings input that must never reach disk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("interval must be between {min} and {max} seconds, got {value}")]
    IntervalOutOfRange { value: u32, min: u32, max: u32 },
    #[error("date line must be HH:MM, got '{0}'")]
    MalformedDateLine(String),
    #[error("watch folder must not be empty")]
    EmptyWatchFolder,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("log database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl PersistenceError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure returned by `SettingsStore::save`.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Why a single file could not be placed into its date folder.
#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },
    #[error("no free name for '{name}' after {attempts} attempts")]
    CollisionUnresolved { name: String, attempts: u32 },
    #[error("cannot create folder {}: {source}", path.display())]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read {}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("move to {} failed: {source}", dest.display())]
    Io {
        dest: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("file has no name: {}", path.display())]
    NoFileName { path: PathBuf },
}

impl MoveError {
    /// Maps a failed filesystem call on `path`, singling out permission errors.
    pub(crate) fn from_io(path: PathBuf, dest: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path }
        } else {
            Self::Io { dest, source }
        }
    }
}

/// Whole-run failure. Reported as zero success / zero fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RunError {
    #[error("watch folder unavailable: {} ({reason})", path.display())]
    FolderUnavailable { path: PathBuf, reason: String },
    #[error("invalid settings: {reason}")]
    InvalidSettings { reason: String },
}
