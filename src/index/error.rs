//! Error types for the index module

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for index operations
#[derive(Debug, Error)]
pub enum IndexError {
    /// The backend asked us to slow down
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Embedding request failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector store request failed
    #[error("Backend error: {0}")]
    Backend(String),

    /// Invalid publisher settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Export file error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IndexError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, IndexError::RateLimited(_))
    }
}

impl From<IndexError> for CrateError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Io(e) => CrateError::Io(e),
            IndexError::Json(e) => CrateError::Json(e),
            _ => CrateError::Index(err.to_string()),
        }
    }
}
