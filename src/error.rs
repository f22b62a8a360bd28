//! Error types for the gouvcrawl crate

use thiserror::Error;

/// Result type for gouvcrawl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for gouvcrawl operations
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Site catalog could not be loaded or is inconsistent
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Web crawling error
    #[error("Crawl error: {0}")]
    Crawl(String),

    /// Directory scraping error
    #[error("Directory error: {0}")]
    Directory(String),

    /// Output tree error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Content processing error
    #[error("Process error: {0}")]
    Process(String),

    /// Vector index error
    #[error("Index error: {0}")]
    Index(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}
