use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while writing, opening or reading a sorted run.
#[derive(Debug, Error)]
pub enum SSTableError {
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt run {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("refusing to write a run with no entries")]
    EmptyRun,

    #[error("run input not strictly ascending: key {key} follows {previous}")]
    UnsortedInput { previous: u64, key: u64 },

    #[error("run of {bytes} bytes exceeds 32-bit value offsets")]
    RunTooLarge { bytes: u64 },

    #[error("scan start {key} is beyond the last key {max_key} of {}", .path.display())]
    ScanStartBeyondRun {
        path: PathBuf,
        key: u64,
        max_key: u64,
    },

    #[error("merge input {input} went backwards: key {key} after {previous}")]
    MisorderedInput {
        input: usize,
        previous: u64,
        key: u64,
    },
}

impl SSTableError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SSTableError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SSTableError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
