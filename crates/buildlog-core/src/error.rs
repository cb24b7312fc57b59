//! Error types for event handling.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("console write failed: {0}")]
    Console(#[source] std::io::Error),

    #[error("output of job {job} is not valid {encoding}: {source}")]
    Decode {
        job: String,
        encoding: &'static str,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("job id {0:?} is not usable as a log directory name")]
    InvalidJobId(String),

    #[error("event {kind} cannot be described: {reason}")]
    Undescribable { kind: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OutputError {
    /// Attach the offending path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OutputError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for event handling operations
pub type Result<T> = std::result::Result<T, OutputError>;
