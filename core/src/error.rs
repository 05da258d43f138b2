use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error at {path}: {source}")]
    PathIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot not found: {id}")]
    SnapshotNotFound { id: String },

    #[error("Snapshot {id} is corrupt: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("Invalid snapshot identifier: {id}")]
    InvalidSnapshotId { id: String },

    #[error("Path cannot be stored in a snapshot: {path}")]
    InvalidPath { path: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn io_at(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::PathIo {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn corrupt(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SnapshotNotFound { .. })
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::CorruptRecord { .. })
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        let path = err
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());

        if let Some(ancestor) = err.loop_ancestor() {
            return Self::PathIo {
                path,
                source: std::io::Error::other(format!(
                    "symlink loop back to {}",
                    ancestor.display()
                )),
            };
        }

        match err.into_io_error() {
            Some(source) => Self::PathIo { path, source },
            None => Self::Other(format!("Directory walk failed at {}", path)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
