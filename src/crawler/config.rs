//! # Crawler Configuration Module
//!
//! Options for the crawl stage: worker pool size, HTTP behaviour, output file
//! naming and the sanitizer's heuristic tables. Built through
//! `CrawlerConfig::builder()`.

use std::time::Duration;

use crate::crawler::sanitizer::SanitizerConfig;

/// Configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Number of pages fetched and sanitized concurrently
    pub workers: usize,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// User agent to use for requests
    pub user_agent: String,

    /// Skip TLS certificate validation (the target serves a legacy chain)
    pub accept_invalid_certs: bool,

    /// Extension of the files written to the output tree
    pub extension: String,

    /// Sanitizer heuristics
    pub sanitizer: SanitizerConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            request_timeout_secs: 60,
            user_agent: format!("gouvcrawl/{}", env!("CARGO_PKG_VERSION")),
            accept_invalid_certs: true,
            extension: "txt".to_string(),
            sanitizer: SanitizerConfig::default(),
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the worker pool size (at least one)
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers.max(1);
        self
    }

    /// Set the per-request timeout in seconds
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set whether invalid TLS certificates are accepted
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.accept_invalid_certs = accept;
        self
    }

    /// Set the output file extension (without the dot)
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.config.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Replace the sanitizer tables
    pub fn sanitizer(mut self, sanitizer: SanitizerConfig) -> Self {
        self.config.sanitizer = sanitizer;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// Get the request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
