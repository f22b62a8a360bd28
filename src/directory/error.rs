//! Error types for the directory module

use crate::crawler::storage::StorageError;
use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for directory scraping
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Navigation did not settle within the allotted time
    #[error("Navigation to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// Invalid CSS locator in the locale table
    #[error("Invalid selector {selector}: {message}")]
    Selector { selector: String, message: String },

    /// The listing page yielded no service ids
    #[error("No services found on {0}")]
    EmptyListing(String),

    /// Output tree error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Debug artifact error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while dumping the cache
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<DirectoryError> for CrateError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Http(e) => CrateError::Http(e),
            DirectoryError::Io(e) => CrateError::Io(e),
            DirectoryError::Json(e) => CrateError::Json(e),
            DirectoryError::Storage(e) => e.into(),
            _ => CrateError::Directory(err.to_string()),
        }
    }
}
