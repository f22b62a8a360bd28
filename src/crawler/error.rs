//! Error types for the crawler module

use crate::crawler::storage::StorageError;
use crate::directory::DirectoryError;
use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Request did not complete in time
    #[error("Timed out fetching {0}")]
    Timeout(String),

    /// HTML parsing error
    #[error("HTML parsing error: {0}")]
    HtmlParse(String),

    /// Sitemap could not be read or parsed
    #[error("Sitemap error: {0}")]
    Sitemap(String),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Output tree error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Directory scrape failed as a whole
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<CrawlError> for CrateError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::Http(e) => CrateError::Http(e),
            CrawlError::Io(e) => CrateError::Io(e),
            CrawlError::Storage(e) => e.into(),
            CrawlError::Directory(e) => e.into(),
            CrawlError::UrlParse(e) => CrateError::Other(format!("URL parse error: {}", e)),
            _ => CrateError::Crawl(err.to_string()),
        }
    }
}
