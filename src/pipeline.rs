//! Full pipeline: crawl, load, publish
//!
//! This is the surface a job runner drives. It offers the whole run with
//! independent skip flags, the sitemap URL loading on its own (to size a
//! progress display up front) and the processing of a single URL. Progress
//! is reported through [`CrawlEvent`]s rather than by wrapping these calls.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{info, instrument};

use crate::catalog::SiteCatalog;
use crate::classifier::classify;
use crate::crawler::{CrawlReport, Crawler, CrawlerConfig, Storage, StorageConfig, UrlOutcome};
use crate::directory::{HttpPageSession, PageSession, ReconcileConfig};
use crate::error::Result;
use crate::events::{CrawlEvent, EventSender, Phase, emit};
use crate::index::{ChunkSink, PublishReport};
use crate::processor::{ChunkedDocument, DocumentLoader, LoaderConfig};

/// Topic given to documents no table assigns one to
pub const DEFAULT_TOPIC: &str = "monservicepublic";

/// Configuration of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sitemap URLs or local paths
    pub sitemaps: Vec<String>,

    /// Root of the output tree, recreated by every crawl
    pub output_root: PathBuf,

    pub default_topic: String,

    /// Reuse the existing output tree
    pub skip_crawl: bool,

    /// Stop after the crawl
    pub skip_index: bool,

    pub crawler: CrawlerConfig,
    pub reconcile: ReconcileConfig,
    pub loader: LoaderConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sitemaps: Vec::new(),
            output_root: PathBuf::from("output"),
            default_topic: DEFAULT_TOPIC.to_string(),
            skip_crawl: false,
            skip_index: false,
            crawler: CrawlerConfig::default(),
            reconcile: ReconcileConfig::default(),
            loader: LoaderConfig::default(),
        }
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sitemaps<I, T>(mut self, sitemaps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.config.sitemaps = sitemaps.into_iter().map(Into::into).collect();
        self
    }

    pub fn output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.config.output_root = output_root.into();
        self
    }

    pub fn default_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.default_topic = topic.into();
        self
    }

    /// Size of the page worker pool
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.crawler.workers = workers.max(1);
        self
    }

    pub fn skip_crawl(mut self, skip: bool) -> Self {
        self.config.skip_crawl = skip;
        self
    }

    pub fn skip_index(mut self, skip: bool) -> Self {
        self.config.skip_index = skip;
        self
    }

    pub fn crawler(mut self, crawler: CrawlerConfig) -> Self {
        self.config.crawler = crawler;
        self
    }

    pub fn reconcile(mut self, reconcile: ReconcileConfig) -> Self {
        self.config.reconcile = reconcile;
        self
    }

    pub fn loader(mut self, loader: LoaderConfig) -> Self {
        self.config.loader = loader;
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    fn storage(&self) -> Storage {
        Storage::with_config(StorageConfig {
            base_path: self.output_root.clone(),
            extension: self.crawler.extension.clone(),
        })
    }

    fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            extension: self.crawler.extension.clone(),
            ..self.reconcile.clone()
        }
    }
}

/// Outcome of a pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    /// `None` when the crawl was skipped
    pub crawl: Option<CrawlReport>,
    /// Chunks loaded from the output tree
    pub chunks: usize,
    /// `None` when indexing was skipped
    pub publish: Option<PublishReport>,
    pub elapsed: Duration,
}

/// Crawl, load and publish with one configuration
pub struct Pipeline<S = HttpPageSession> {
    config: PipelineConfig,
    crawler: Crawler<S>,
    loader: DocumentLoader,
    events: Option<EventSender>,
}

impl Pipeline<HttpPageSession> {
    pub fn new(config: PipelineConfig, catalog: SiteCatalog) -> Result<Self> {
        let crawler = Crawler::new(
            config.crawler.clone(),
            catalog,
            config.storage(),
            config.reconcile_config(),
        )?;
        Self::with_crawler(config, crawler)
    }
}

impl<S: PageSession> Pipeline<S> {
    /// Pipeline around an already configured crawler
    pub fn with_crawler(config: PipelineConfig, crawler: Crawler<S>) -> Result<Self> {
        let loader = DocumentLoader::new(crawler.catalog().clone(), config.loader.clone())?;
        Ok(Self {
            config,
            crawler,
            loader,
            events: None,
        })
    }

    /// Report progress on a new channel; returns the receiving half
    pub fn subscribe(mut self, buffer: usize) -> (Self, mpsc::Receiver<CrawlEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        self.crawler = self.crawler.with_events(tx.clone());
        self.events = Some(tx);
        (self, rx)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Distinct URLs of the configured sitemaps
    pub async fn load_urls(&self) -> Vec<String> {
        self.crawler.load_urls(&self.config.sitemaps).await
    }

    /// Classify and process one URL; `None` when no rule matches it
    pub async fn process_url(&self, url: &str) -> Result<Option<UrlOutcome>> {
        let Some(namespace) = classify(self.crawler.catalog(), url) else {
            info!("Skipping unclassified URL {}", url);
            return Ok(None);
        };
        Ok(Some(self.crawler.process_url(url, &namespace).await?))
    }

    /// Chunk the current output tree
    pub async fn load_chunks(&self) -> Result<Vec<ChunkedDocument>> {
        let root = self.crawler.storage().root();
        Ok(self.loader.load_all(root, &self.config.default_topic).await?)
    }

    /// Run the enabled stages and publish the chunks to `sink`
    #[instrument(skip(self, sink))]
    pub async fn run<K: ChunkSink>(&self, sink: &K) -> Result<RunSummary> {
        let started = Instant::now();
        let events = self.events.as_ref();
        let mut summary = RunSummary {
            started_at: Utc::now(),
            ..RunSummary::default()
        };

        if self.config.skip_crawl {
            info!("Crawl skipped, reusing {}", self.crawler.storage().root().display());
        } else {
            summary.crawl = Some(self.crawler.run(&self.config.sitemaps).await?);
        }

        if self.config.skip_index {
            info!("Indexing skipped");
        } else {
            emit(events, CrawlEvent::PhaseStarted { phase: Phase::Load });
            let chunks = self.load_chunks().await?;
            summary.chunks = chunks.len();

            emit(events, CrawlEvent::PhaseStarted { phase: Phase::Index });
            summary.publish = Some(sink.publish(chunks, events).await?);
        }

        summary.elapsed = started.elapsed();
        info!("Pipeline finished in {:.2?}", summary.elapsed);
        Ok(summary)
    }
}

/// Build a pipeline for `config` and run it once
pub async fn run_pipeline<K: ChunkSink>(
    config: PipelineConfig,
    catalog: SiteCatalog,
    sink: &K,
) -> Result<RunSummary> {
    Pipeline::new(config, catalog)?.run(sink).await
}
