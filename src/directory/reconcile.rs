//! Bilingual reconciliation of the directory
//!
//! Four phases, run in order:
//!
//! 1. French (reference): discover ids on the listing, extract them in
//!    batches, retry failures one by one with a longer timeout, build the
//!    [`ReconciliationCache`] from every id that succeeded.
//! 2. English: extract exactly the cached ids with the same protocol.
//! 3. Output: one file per French record, and one per English record whose id
//!    is also French, carrying the French acronym.
//! 4. Cleanup: remove the cache dump and the listing render artifacts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::error::DirectoryError;
use super::extractor::{DirectoryExtractor, PageSession};
use super::render::{markdown_to_html, record_file_name, render_listing_markdown, render_record_html};
use super::{Language, ServiceRecord};
use crate::crawler::storage::Storage;
use crate::events::{CrawlEvent, EventSender, emit};

const CACHE_FILE: &str = "reconciliation_cache.json";

/// Batch and retry settings of the directory scrape
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Entities extracted concurrently per batch
    pub batch_size: usize,

    /// Timeout of the listing load and of batch extractions
    pub navigation_timeout: Duration,

    /// Timeout of an individual retry
    pub retry_timeout: Duration,

    /// Pause before each individual retry
    pub retry_delay: Duration,

    /// Where the cache dump and listing renders are written during a run
    pub work_dir: PathBuf,

    /// Extension of the per-record files
    pub extension: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            navigation_timeout: Duration::from_secs(60),
            retry_timeout: Duration::from_secs(120),
            retry_delay: Duration::from_secs(2),
            work_dir: PathBuf::from(".gouvcrawl"),
            extension: "txt".to_string(),
        }
    }
}

/// Reference-language facts kept for one id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub reference_name: String,
    pub acronym: String,
    pub processed: bool,
}

/// Service id -> reference facts. Built fresh each run from the French pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl ReconciliationCache {
    /// Cache of every successfully extracted reference record
    pub fn from_records(records: &BTreeMap<String, ServiceRecord>) -> Self {
        let entries = records
            .iter()
            .map(|(id, record)| {
                (
                    id.clone(),
                    CacheEntry {
                        reference_name: record.name.clone(),
                        acronym: record.acronym.clone(),
                        processed: true,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn get(&self, service_id: &str) -> Option<&CacheEntry> {
        self.entries.get(service_id)
    }

    /// Authoritative acronym of an id
    pub fn acronym(&self, service_id: &str) -> Option<&str> {
        self.entries.get(service_id).map(|e| e.acronym.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of a directory run
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub fr_services: usize,
    pub en_services: usize,
    pub files_written: usize,
    /// French ids with no English record
    pub missing_en: Vec<String>,
    /// Ids that failed even after retry and were written as placeholders
    pub failed_fr: Vec<String>,
    pub failed_en: Vec<String>,
    pub elapsed: Duration,
}

struct PassResult {
    records: BTreeMap<String, ServiceRecord>,
    failed: Vec<(String, String)>,
}

/// Drives the bilingual scrape and writes the per-record files
pub struct Reconciler<S> {
    extractor: DirectoryExtractor<S>,
    config: ReconcileConfig,
}

impl<S: PageSession> Reconciler<S> {
    pub fn new(extractor: DirectoryExtractor<S>, config: ReconcileConfig) -> Self {
        Self { extractor, config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Run every phase and write records under `namespace` in `storage`
    #[instrument(skip(self, storage, events))]
    pub async fn run(
        &self,
        storage: &Storage,
        namespace: &str,
        events: Option<&EventSender>,
    ) -> Result<ReconcileReport, DirectoryError> {
        let started = Instant::now();
        tokio::fs::create_dir_all(&self.config.work_dir).await?;

        info!("Directory phase FR: discovering services");
        let ids = self
            .extractor
            .discover_service_ids(Language::Fr, self.config.navigation_timeout)
            .await?;
        let fr = self.extract_pass(&ids, Language::Fr, events).await;
        let cache = ReconciliationCache::from_records(&fr.records);
        self.write_cache(&cache).await?;
        self.write_listing_artifacts(&fr.records, Language::Fr).await?;
        log_failures(&fr.failed, Language::Fr, &cache);

        info!("Directory phase EN: {} services from the FR cache", cache.len());
        let en = self.extract_pass(&cache.ids(), Language::En, events).await;
        self.write_listing_artifacts(&en.records, Language::En).await?;
        log_failures(&en.failed, Language::En, &cache);

        let mut report = self.write_records(storage, namespace, &fr.records, &en.records, &cache).await?;
        report.failed_fr = fr.failed.into_iter().map(|(id, _)| id).collect();
        report.failed_en = en.failed.into_iter().map(|(id, _)| id).collect();

        self.cleanup().await;
        report.elapsed = started.elapsed();
        info!(
            "Directory done in {:.2?}: {} FR, {} EN, {} files",
            report.elapsed, report.fr_services, report.en_services, report.files_written
        );
        Ok(report)
    }

    /// Batches with a barrier, then individual retries for the failures.
    ///
    /// Every id ends up with a record: ids failing their retry get the
    /// placeholder record.
    async fn extract_pass(
        &self,
        ids: &[String],
        language: Language,
        events: Option<&EventSender>,
    ) -> PassResult {
        let listing = self.extractor.listing_url(language);
        let total = ids.len();
        let mut records = BTreeMap::new();
        let mut retry = Vec::new();
        let mut done = 0;

        for batch in ids.chunks(self.config.batch_size.max(1)) {
            let tasks = batch.iter().map(|id| {
                let listing = listing.as_str();
                async move {
                    let result = self
                        .extractor
                        .try_extract_entity(id, listing, language, self.config.navigation_timeout)
                        .await;
                    (id.clone(), result)
                }
            });

            for (id, result) in join_all(tasks).await {
                match result {
                    Ok(record) => {
                        records.insert(id, record);
                    }
                    Err(e) => {
                        debug!("Service {} [{}] queued for retry: {}", id, language, e);
                        retry.push(id);
                    }
                }
            }

            done += batch.len();
            info!("Services {} processed: {}/{}", language, done, total);
            emit(events, CrawlEvent::DirectoryProgress { language, done, total });
        }

        let mut failed = Vec::new();
        for (attempt, id) in retry.into_iter().enumerate() {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay).await;
            }
            match self
                .extractor
                .try_extract_entity(&id, &listing, language, self.config.retry_timeout)
                .await
            {
                Ok(record) => {
                    debug!("Service {} [{}] recovered on retry", id, language);
                    records.insert(id, record);
                }
                Err(e) => {
                    records.insert(id.clone(), ServiceRecord::failed(&id, language));
                    failed.push((id, e.to_string()));
                }
            }
        }

        PassResult { records, failed }
    }

    async fn write_records(
        &self,
        storage: &Storage,
        namespace: &str,
        fr: &BTreeMap<String, ServiceRecord>,
        en: &BTreeMap<String, ServiceRecord>,
        cache: &ReconciliationCache,
    ) -> Result<ReconcileReport, DirectoryError> {
        let fr_listing = self.extractor.listing_url(Language::Fr);
        let en_listing = self.extractor.listing_url(Language::En);
        let mut report = ReconcileReport {
            fr_services: fr.len(),
            ..Default::default()
        };

        for (id, record) in fr {
            validate(record);
            let html = render_record_html(record, &record.acronym, &fr_listing);
            let filename = record_file_name(record, &record.acronym, &self.config.extension);
            storage.write(namespace, &filename, &html).await?;
            report.files_written += 1;

            let (Some(en_record), Some(acronym)) = (en.get(id), cache.acronym(id)) else {
                warn!("Service {} ({}): no EN version, EN file skipped", id, record.name);
                report.missing_en.push(id.clone());
                continue;
            };
            validate(en_record);
            let html = render_record_html(en_record, acronym, &en_listing);
            let filename = record_file_name(en_record, acronym, &self.config.extension);
            storage.write(namespace, &filename, &html).await?;
            report.files_written += 1;
            report.en_services += 1;
        }

        Ok(report)
    }

    fn artifact_paths(&self, language: Language) -> (PathBuf, PathBuf) {
        let suffix = match language {
            Language::Fr => "",
            Language::En => "_en",
        };
        let dir = &self.config.work_dir;
        (
            dir.join(format!("directory_listing{}.md", suffix)),
            dir.join(format!("directory_listing{}.html", suffix)),
        )
    }

    async fn write_cache(&self, cache: &ReconciliationCache) -> Result<(), DirectoryError> {
        let path = self.config.work_dir.join(CACHE_FILE);
        tokio::fs::write(&path, serde_json::to_string_pretty(cache)?).await?;
        debug!("Cache written to {}", path.display());
        Ok(())
    }

    async fn write_listing_artifacts(
        &self,
        records: &BTreeMap<String, ServiceRecord>,
        language: Language,
    ) -> Result<(), DirectoryError> {
        let records: Vec<ServiceRecord> = records.values().cloned().collect();
        let markdown = render_listing_markdown(&records, language);
        let html = markdown_to_html(&markdown, &self.extractor.listing_url(language));
        let (md_path, html_path) = self.artifact_paths(language);
        tokio::fs::write(md_path, markdown).await?;
        tokio::fs::write(html_path, html).await?;
        Ok(())
    }

    /// Remove the cache dump and listing renders
    async fn cleanup(&self) {
        let (fr_md, fr_html) = self.artifact_paths(Language::Fr);
        let (en_md, en_html) = self.artifact_paths(Language::En);
        let cache = self.config.work_dir.join(CACHE_FILE);
        for path in [cache, fr_md, fr_html, en_md, en_html] {
            remove_if_present(&path).await;
        }
    }
}

async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}

fn validate(record: &ServiceRecord) {
    for field in record.missing_fields() {
        warn!(
            "Service {} [{}]: field '{}' unavailable",
            record.service_id, record.language, field
        );
    }
}

fn log_failures(failed: &[(String, String)], language: Language, cache: &ReconciliationCache) {
    if failed.is_empty() {
        return;
    }
    warn!("{} services {} failed after retry, kept as placeholders", failed.len(), language);
    for (id, error) in failed.iter().take(5) {
        match cache.get(id) {
            Some(entry) => warn!("  - {} ({}): {}", id, entry.reference_name, error),
            None => warn!("  - {}: {}", id, error),
        }
    }
    if failed.len() > 5 {
        warn!("  ... and {} more", failed.len() - 5);
    }
}
