//! Error types for the processor module

use crate::crawler::StorageError;
use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for processor operations
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Output tree could not be listed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// File could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid text-normalization pattern
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Chunking error
    #[error("Chunking error: {0}")]
    Chunking(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<ProcessError> for CrateError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Io(e) => CrateError::Io(e),
            ProcessError::Storage(e) => e.into(),
            _ => CrateError::Process(err.to_string()),
        }
    }
}
