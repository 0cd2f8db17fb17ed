use sstable::SSTableError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`crate::Engine`].
#[derive(Debug, Error)]
pub enum Error {
    /// The record would not fit in a run even as its only entry.
    #[error("value for key {key} needs {needed} bytes but a run holds at most {limit}")]
    ValueTooLarge { key: u64, needed: u64, limit: u64 },

    /// The value equals the on-disk tombstone marker.
    #[error("value for key {key} is the reserved tombstone marker")]
    ReservedValue { key: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Run(#[from] SSTableError),

    /// The level structure broke one of its invariants.
    #[error("level {level} invariant violated: {reason}")]
    Invariant { level: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
