//! Crawl orchestration
//!
//! A run loads the sitemaps, classifies every URL, recreates the output tree
//! and dispatches the work:
//!
//! - content pages go through a bounded pool of tasks that fetch, sanitize
//!   and write one file per URL
//! - directory URLs are handed to the bilingual [`Reconciler`] once per run,
//!   alongside the pool
//!
//! A failing URL is logged and counted; it never stops the run.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::future::join_all;
use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::SiteCatalog;
use crate::classifier::{ClassifiedUrl, Namespace, classify_all};
use crate::crawler::config::CrawlerConfig;
use crate::crawler::error::CrawlError;
use crate::crawler::fetch::{build_client, fetch_page};
use crate::crawler::sanitizer::Sanitizer;
use crate::crawler::sitemap::load_urls_from_sitemaps;
use crate::crawler::storage::{Storage, TreeStats};
use crate::directory::{
    DirectoryExtractor, HttpPageSession, PageSession, ReconcileConfig, ReconcileReport, Reconciler,
};
use crate::events::{CrawlEvent, EventSender, Phase, emit};

/// Result of processing one URL
#[derive(Debug, Clone)]
pub enum UrlOutcome {
    /// A sanitized page was written to this path
    Page(PathBuf),
    /// The directory was scraped and reconciled
    Directory(ReconcileReport),
}

/// Summary of a crawl run
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Distinct URLs found in the sitemaps
    pub total_urls: usize,
    /// URLs handled successfully
    pub processed: usize,
    /// URLs that failed (logged, not retried)
    pub failed: Vec<String>,
    /// URLs no rule classified
    pub skipped: Vec<String>,
    pub directory: Option<ReconcileReport>,
    pub stats: TreeStats,
    pub elapsed: Duration,
}

/// Shared state of the page pool
#[derive(Debug)]
struct PageWorker {
    client: Client,
    sanitizer: Sanitizer,
    storage: Storage,
}

impl PageWorker {
    async fn process(&self, url: &str, namespace: &str) -> Result<PathBuf, CrawlError> {
        let page = fetch_page(&self.client, url).await?;
        let document = self.sanitizer.sanitize(&page.html, &page.url);
        let path = self.storage.write_url(namespace, url, &document.to_html()).await?;
        Ok(path)
    }
}

struct Progress {
    completed: AtomicUsize,
    total: usize,
}

impl Progress {
    fn finish(&self, url: &str, ok: bool, events: Option<&EventSender>) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if completed % 25 == 0 || completed == self.total {
            info!("Progress: {}/{}", completed, self.total);
        }
        emit(
            events,
            CrawlEvent::UrlFinished {
                url: url.to_string(),
                ok,
                completed,
                total: self.total,
            },
        );
    }
}

/// Crawls one site into a namespace-partitioned output tree
pub struct Crawler<S = HttpPageSession> {
    config: CrawlerConfig,
    catalog: SiteCatalog,
    pages: Arc<PageWorker>,
    directory: Reconciler<S>,
    events: Option<EventSender>,
}

impl Crawler<HttpPageSession> {
    /// Crawler whose directory pages are loaded over plain HTTP
    pub fn new(
        config: CrawlerConfig,
        catalog: SiteCatalog,
        storage: Storage,
        reconcile: ReconcileConfig,
    ) -> Result<Self, CrawlError> {
        let session = HttpPageSession::new(build_client(&config)?);
        Self::with_session(config, catalog, storage, reconcile, session)
    }
}

impl<S: PageSession> Crawler<S> {
    /// Crawler using `session` for the directory pages
    pub fn with_session(
        config: CrawlerConfig,
        catalog: SiteCatalog,
        storage: Storage,
        reconcile: ReconcileConfig,
        session: S,
    ) -> Result<Self, CrawlError> {
        let extractor = DirectoryExtractor::new(session, &catalog.base_domain)?;
        let pages = PageWorker {
            client: build_client(&config)?,
            sanitizer: Sanitizer::new(config.sanitizer.clone())?,
            storage,
        };
        Ok(Self {
            directory: Reconciler::new(extractor, reconcile),
            pages: Arc::new(pages),
            config,
            catalog,
            events: None,
        })
    }

    /// Send progress events to `events`
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.pages.storage
    }

    pub fn catalog(&self) -> &SiteCatalog {
        &self.catalog
    }

    /// Distinct URLs of every sitemap source
    pub async fn load_urls(&self, sources: &[String]) -> Vec<String> {
        load_urls_from_sitemaps(&self.pages.client, sources).await
    }

    /// Process one classified URL
    #[instrument(skip(self))]
    pub async fn process_url(&self, url: &str, namespace: &Namespace) -> Result<UrlOutcome, CrawlError> {
        match namespace {
            Namespace::Directory => {
                let report = self
                    .directory
                    .run(self.storage(), namespace.as_str(), self.events.as_ref())
                    .await?;
                Ok(UrlOutcome::Directory(report))
            }
            _ => {
                let path = self.pages.process(url, namespace.as_str()).await?;
                Ok(UrlOutcome::Page(path))
            }
        }
    }

    /// Crawl every URL of `sources` into a freshly recreated output tree
    #[instrument(skip(self))]
    pub async fn run(&self, sources: &[String]) -> Result<CrawlReport, CrawlError> {
        let started = Instant::now();
        let events = self.events.as_ref();
        emit(events, CrawlEvent::PhaseStarted { phase: Phase::Crawl });

        let urls = self.load_urls(sources).await;
        let total_urls = urls.len();
        emit(events, CrawlEvent::UrlsLoaded { total: total_urls });

        let (classified, skipped) = classify_all(&self.catalog, urls);
        for url in &skipped {
            info!("Skipping unclassified URL {}", url);
            emit(events, CrawlEvent::UrlSkipped { url: url.clone() });
        }

        let storage = self.storage();
        storage.recreate_root().await?;
        let namespaces: BTreeSet<&str> = classified.iter().map(|c| c.namespace.as_str()).collect();
        for namespace in &namespaces {
            storage.ensure_namespace(namespace).await?;
        }
        info!(
            "{} URLs to process in {} namespaces, {} skipped",
            classified.len(),
            namespaces.len(),
            skipped.len()
        );

        let (directory_urls, page_urls): (Vec<ClassifiedUrl>, Vec<ClassifiedUrl>) = classified
            .into_iter()
            .partition(|c| c.namespace == Namespace::Directory);

        let progress = Arc::new(Progress {
            completed: AtomicUsize::new(0),
            total: directory_urls.len() + page_urls.len(),
        });

        let (failed_pages, (directory, failed_directory)) = tokio::join!(
            self.crawl_pages(page_urls, progress.clone()),
            self.crawl_directory(&directory_urls, &progress),
        );

        let mut failed = failed_pages;
        failed.extend(failed_directory);
        failed.sort();

        let stats = storage.stats().await?;
        let report = CrawlReport {
            total_urls,
            processed: progress.total - failed.len(),
            failed,
            skipped,
            directory,
            stats,
            elapsed: started.elapsed(),
        };
        info!(
            "Crawl complete in {:.2?}: {} directories, {} files, {} failed, {} skipped",
            report.elapsed,
            report.stats.directories,
            report.stats.files,
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Fetch and sanitize pages on the worker pool; returns the failed URLs
    async fn crawl_pages(&self, urls: Vec<ClassifiedUrl>, progress: Arc<Progress>) -> Vec<String> {
        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut handles = Vec::with_capacity(urls.len());

        for ClassifiedUrl { url, namespace } in urls {
            let semaphore = semaphore.clone();
            let worker = self.pages.clone();
            let progress = progress.clone();
            let events = self.events.clone();

            handles.push(tokio::spawn(async move {
                let ok = match semaphore.acquire_owned().await {
                    Ok(_permit) => match worker.process(&url, namespace.as_str()).await {
                        Ok(path) => {
                            debug!("Saved {} to {}", url, path.display());
                            true
                        }
                        Err(e) => {
                            error!("Failed to process {}: {}", url, e);
                            false
                        }
                    },
                    Err(e) => {
                        error!("Worker pool closed before {}: {}", url, e);
                        false
                    }
                };
                progress.finish(&url, ok, events.as_ref());
                (url, ok)
            }));
        }

        let mut failed = Vec::new();
        for result in join_all(handles).await {
            match result {
                Ok((_, true)) => {}
                Ok((url, false)) => failed.push(url),
                Err(e) => error!("Crawl task panicked: {}", e),
            }
        }
        failed
    }

    /// Reconcile the directory once for all directory URLs of the run.
    ///
    /// When the scrape itself fails, each directory URL is fetched and
    /// sanitized like a content page instead. Returns the failed URLs.
    async fn crawl_directory(
        &self,
        urls: &[ClassifiedUrl],
        progress: &Progress,
    ) -> (Option<ReconcileReport>, Vec<String>) {
        let Some(first) = urls.first() else {
            return (None, Vec::new());
        };
        if urls.len() > 1 {
            debug!("{} directory URLs share one directory scrape", urls.len());
        }
        emit(self.events.as_ref(), CrawlEvent::PhaseStarted { phase: Phase::Directory });

        let result = self
            .directory
            .run(self.storage(), first.namespace.as_str(), self.events.as_ref())
            .await;
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                warn!("Directory scrape failed, falling back to page fetch: {}", e);
                let mut failed = Vec::new();
                for ClassifiedUrl { url, namespace } in urls {
                    let ok = match self.pages.process(url, namespace.as_str()).await {
                        Ok(path) => {
                            debug!("Saved {} to {}", url, path.display());
                            true
                        }
                        Err(e) => {
                            error!("Failed to process {}: {}", url, e);
                            failed.push(url.clone());
                            false
                        }
                    };
                    progress.finish(url, ok, self.events.as_ref());
                }
                return (None, failed);
            }
        };
        for url in urls {
            progress.finish(&url.url, true, self.events.as_ref());
        }
        (Some(report), Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::storage::StorageConfig;
    use crate::directory::extractor::tests::{FakeSession, entity_html, listing_html};

    fn page(body: &str) -> String {
        format!(
            "<html><head><script>x()</script></head><body><nav><a href=\"/\">Accueil</a></nav><main><h1>{}</h1><p>Texte <a href=\"/autre\">lien</a></p></main></body></html>",
            body
        )
    }

    fn sitemap(urls: &[String]) -> String {
        let locs: String = urls.iter().map(|u| format!("<url><loc>{}</loc></url>", u)).collect();
        format!(r#"<?xml version="1.0"?><urlset>{}</urlset>"#, locs)
    }

    fn crawler<S: PageSession>(server: &str, out: PathBuf, work: PathBuf, session: S) -> Crawler<S> {
        let config = CrawlerConfig::builder().workers(2).request_timeout_secs(5).build();
        let storage = Storage::with_config(StorageConfig {
            base_path: out,
            ..Default::default()
        });
        let reconcile = ReconcileConfig {
            retry_delay: Duration::from_millis(1),
            work_dir: work,
            ..Default::default()
        };
        Crawler::with_session(config, SiteCatalog::for_base(server), storage, reconcile, session).unwrap()
    }

    #[tokio::test]
    async fn test_run_writes_pages_and_reports_failures() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let urls = vec![
            format!("{}/thematiques/logement/aides", base),
            format!("{}/a-propos", base),
            format!("{}/thematiques/logement/absente", base),
            format!("{}/inconnue", base),
        ];
        server
            .mock("GET", "/sitemap.xml")
            .with_body(sitemap(&urls))
            .create_async()
            .await;
        server
            .mock("GET", "/thematiques/logement/aides")
            .with_body(page("Aides"))
            .create_async()
            .await;
        server
            .mock("GET", "/a-propos")
            .with_body(page("A propos"))
            .create_async()
            .await;
        server
            .mock("GET", "/thematiques/logement/absente")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let crawler = crawler(&base, dir.path().join("out"), dir.path().join("work"), FakeSession::default())
            .with_events(tx);
        let report = crawler.run(&[format!("{}/sitemap.xml", base)]).await.unwrap();
        drop(crawler);

        assert_eq!(report.total_urls, 4);
        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, vec![urls[2].clone()]);
        assert_eq!(report.skipped, vec![urls[3].clone()]);
        assert!(report.directory.is_none());
        assert_eq!(report.stats, TreeStats { directories: 2, files: 2 });

        let stored = tokio::fs::read_to_string(
            dir.path()
                .join("out/general")
                .join(Storage::new().url_to_filename(&urls[1])),
        )
        .await
        .unwrap();
        assert!(stored.starts_with("<!DOCTYPE html>"));
        assert!(stored.contains(&format!("<title>{}</title>", urls[1])));
        assert!(!stored.contains("<script"));
        assert!(!stored.contains("<nav"));
        assert!(stored.contains(&format!("href=\"{}/autre\"", base)));

        let mut finished = 0;
        let mut skipped = 0;
        while let Some(event) = rx.recv().await {
            match event {
                CrawlEvent::UrlFinished { total, .. } => {
                    assert_eq!(total, 3);
                    finished += 1;
                }
                CrawlEvent::UrlSkipped { .. } => skipped += 1,
                _ => {}
            }
        }
        assert_eq!(finished, 3);
        assert_eq!(skipped, 1);
    }

    #[tokio::test]
    async fn test_run_reconciles_directory_once() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let fr_listing = format!("{}/annuaire-des-services-administratifs", base);
        let en_listing = format!("{}/en/directory-of-government-services", base);
        let urls = vec![fr_listing.clone(), format!("{}?entity=1", fr_listing)];
        server
            .mock("GET", "/sitemap.xml")
            .with_body(sitemap(&urls))
            .create_async()
            .await;

        let session = FakeSession::default()
            .with_page(fr_listing.clone(), listing_html(&["1"]))
            .with_page(
                format!("{}?entity=1", fr_listing),
                entity_html("Mairie de Monaco", "Nous écrire", ""),
            )
            .with_page(
                format!("{}?entity=1", en_listing),
                entity_html("Town Hall", "Contact us", ""),
            );

        let dir = tempfile::tempdir().unwrap();
        let crawler = crawler(&base, dir.path().join("out"), dir.path().join("work"), session);
        let report = crawler.run(&[format!("{}/sitemap.xml", base)]).await.unwrap();

        let directory = report.directory.unwrap();
        assert_eq!(directory.fr_services, 1);
        assert_eq!(directory.en_services, 1);
        assert_eq!(report.processed, 2);
        assert!(report.failed.is_empty());
        assert_eq!(report.stats, TreeStats { directories: 1, files: 2 });
        assert!(dir
            .path()
            .join("out/annuaire/MM_Town_Hall_EN_annuaire-services.txt")
            .exists());
    }
    #[tokio::test]
    async fn test_failed_directory_scrape_falls_back_to_page_fetch() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let fr_listing = format!("{}/annuaire-des-services-administratifs", base);
        server
            .mock("GET", "/sitemap.xml")
            .with_body(sitemap(&[fr_listing.clone()]))
            .create_async()
            .await;
        server
            .mock("GET", "/annuaire-des-services-administratifs")
            .with_body(page("Annuaire"))
            .create_async()
            .await;

        // a listing without any service id
        let session = FakeSession::default().with_page(fr_listing.clone(), listing_html(&[]));

        let dir = tempfile::tempdir().unwrap();
        let crawler = crawler(&base, dir.path().join("out"), dir.path().join("work"), session);
        let report = crawler.run(&[format!("{}/sitemap.xml", base)]).await.unwrap();

        assert!(report.directory.is_none());
        assert!(report.failed.is_empty());
        assert_eq!(report.processed, 1);
        assert_eq!(report.stats, TreeStats { directories: 1, files: 1 });

        let stored = tokio::fs::read_to_string(
            dir.path()
                .join("out/annuaire")
                .join(Storage::new().url_to_filename(&fr_listing)),
        )
        .await
        .unwrap();
        assert!(stored.contains("<h1>Annuaire</h1>"));
    }
}
