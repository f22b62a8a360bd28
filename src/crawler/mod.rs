//! Website crawler
//!
//! Loads the site's sitemaps, classifies their URLs and writes one sanitized
//! document per URL into a namespace-partitioned output tree. Directory URLs
//! are delegated to [`crate::directory`].

mod config;
mod error;
pub mod fetch;
pub mod orchestrator;
pub mod sanitizer;
pub mod sitemap;
pub mod storage;

pub use config::{CrawlerConfig, CrawlerConfigBuilder};
pub use error::CrawlError;
pub use orchestrator::{CrawlReport, Crawler, UrlOutcome};
pub use sanitizer::{MinimalDocument, Sanitizer, SanitizerConfig};
pub use sitemap::load_urls_from_sitemaps;
pub use storage::{Storage, StorageConfig, StorageError, TreeStats};
