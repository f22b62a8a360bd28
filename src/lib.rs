//! # gouvcrawl - Government services site to RAG corpus
//!
//! This crate crawls a government services website, reduces every page to its
//! main content, files it under a topical namespace and turns the result into
//! chunks ready for a vector index.
//!
//! ## Features
//!
//! - Sitemap loading from remote or local sources
//! - URL classification against a versioned site catalog
//! - Ordered HTML sanitization passes producing minimal documents
//! - Bilingual scrape of the directory of government services, with French as
//!   the reference language
//! - Enriched-text conversion and recursive chunking
//! - Namespace publishing to a vector index with batching and rate limiting
//! - Progress events for job runners
//!
//! ## Example
//!
//! ```rust,no_run
//! use gouvcrawl::catalog::SiteCatalog;
//! use gouvcrawl::index::JsonExport;
//! use gouvcrawl::pipeline::{PipelineConfig, run_pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gouvcrawl::Error> {
//!     let config = PipelineConfig::builder()
//!         .sitemaps(["https://monservicepublic.gouv.mc/sitemap.xml"])
//!         .output_root("output")
//!         .workers(4)
//!         .build();
//!
//!     let summary = run_pipeline(config, SiteCatalog::default(), &JsonExport::new("chunks.json")).await?;
//!     println!("{} chunks in {:.2?}", summary.chunks, summary.elapsed);
//!     Ok(())
//! }
//! ```

mod error;

pub mod catalog;
pub mod classifier;
pub mod crawler;
pub mod directory;
pub mod events;
pub mod index;
pub mod pipeline;
pub mod processor;

pub use error::Error;

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::error::Error;
    pub use crate::error::Result;
}
