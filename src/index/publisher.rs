//! Namespace publisher
//!
//! For each namespace: clear the vectors it already holds (rate-limited
//! delete batches), then embed the chunks in small batches and upsert the
//! vectors in larger ones. Rate-limit answers pause the publisher instead of
//! failing it.

use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::{Instrument, debug, debug_span, error, info, instrument, warn};
use uuid::Uuid;

use super::{
    ChunkSink, Embedder, IndexError, PublishReport, Vector, VectorIndex, group_by_namespace,
};
use crate::events::{CrawlEvent, EventSender, emit};
use crate::processor::ChunkedDocument;

/// Consecutive rate-limited deletes tolerated before giving up on a namespace
const MAX_DELETE_RETRIES: usize = 5;

/// Batching and pacing of the publisher
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Clear a namespace before writing it
    pub clean_existing: bool,
    /// Ids deleted per request
    pub delete_batch_size: usize,
    /// Minimum time between delete requests
    pub delete_interval: Duration,
    /// Texts embedded per request
    pub embed_batch_size: usize,
    /// Minimum time between embedding requests
    pub embed_interval: Duration,
    /// Vectors written per upsert
    pub upsert_batch_size: usize,
    /// Wait before retrying a rate-limited upsert
    pub upsert_retry_pause: Duration,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            clean_existing: true,
            delete_batch_size: 1000,
            delete_interval: Duration::from_millis(1500),
            embed_batch_size: 20,
            embed_interval: Duration::from_millis(500),
            upsert_batch_size: 200,
            upsert_retry_pause: Duration::from_secs(10),
        }
    }
}

fn limiter(period: Duration, what: &str) -> Result<DefaultDirectRateLimiter, IndexError> {
    let quota = Quota::with_period(period)
        .ok_or_else(|| IndexError::Config(format!("{} interval must be positive", what)))?;
    Ok(RateLimiter::direct(quota))
}

/// Writes chunk vectors into a [`VectorIndex`]
pub struct Publisher<I, E> {
    index: I,
    embedder: E,
    options: PublishOptions,
    delete_limiter: DefaultDirectRateLimiter,
    embed_limiter: DefaultDirectRateLimiter,
}

impl<I: VectorIndex, E: Embedder> Publisher<I, E> {
    pub fn new(index: I, embedder: E, options: PublishOptions) -> Result<Self, IndexError> {
        if options.delete_batch_size == 0 || options.embed_batch_size == 0 || options.upsert_batch_size == 0 {
            return Err(IndexError::Config("batch sizes must be positive".to_string()));
        }
        Ok(Self {
            delete_limiter: limiter(options.delete_interval, "delete")?,
            embed_limiter: limiter(options.embed_interval, "embed")?,
            index,
            embedder,
            options,
        })
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Delete every vector of `namespace`; returns how many were removed
    #[instrument(skip(self))]
    pub async fn clear_namespace(&self, namespace: &str) -> Result<usize, IndexError> {
        let count = self.index.vector_count(namespace).await?;
        if count == 0 {
            debug!("Namespace '{}' is empty", namespace);
            return Ok(0);
        }
        info!("Deleting {} vectors from '{}'", count, namespace);

        let mut deleted = 0;
        let mut retries = 0;
        while deleted < count {
            let limit = self.options.delete_batch_size.min(count - deleted);
            let ids = self.index.list_ids(namespace, limit).await?;
            if ids.is_empty() {
                break;
            }

            self.delete_limiter
                .until_ready()
                .instrument(debug_span!("delete_limiter"))
                .await;
            match self.index.delete(namespace, &ids).await {
                Ok(()) => {
                    deleted += ids.len();
                    retries = 0;
                    info!("Deleted {}/{} vectors from '{}'", deleted, count, namespace);
                }
                Err(e) if e.is_rate_limited() && retries < MAX_DELETE_RETRIES => {
                    retries += 1;
                    let pause = self.options.delete_interval * 2;
                    warn!("Rate limited while deleting, pausing {:?}", pause);
                    tokio::time::sleep(pause).await;
                }
                Err(e) => {
                    error!("Deletion in '{}' stopped: {}", namespace, e);
                    break;
                }
            }
        }
        Ok(deleted)
    }

    /// Embed a batch and attach ids and metadata
    async fn vectors(&self, chunks: &[ChunkedDocument]) -> Result<Vec<Vector>, IndexError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        self.embed_limiter
            .until_ready()
            .instrument(debug_span!("embed_limiter"))
            .await;
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(IndexError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| -> Result<Vector, IndexError> {
                let mut metadata = match serde_json::to_value(&chunk.metadata)? {
                    serde_json::Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                };
                metadata.insert("text".to_string(), chunk.text.clone().into());
                Ok(Vector {
                    id: Uuid::new_v4().to_string(),
                    values,
                    metadata,
                })
            })
            .collect()
    }

    /// Upsert in batches; a rate-limited batch is retried once after a pause.
    /// Returns (written, failed).
    async fn upsert(&self, namespace: &str, vectors: &[Vector]) -> (usize, usize) {
        let mut written = 0;
        let mut failed = 0;
        for batch in vectors.chunks(self.options.upsert_batch_size) {
            let mut result = self.index.upsert(namespace, batch).await;
            if let Err(e) = &result {
                if e.is_rate_limited() {
                    warn!(
                        "Rate limited while upserting, pausing {:?}",
                        self.options.upsert_retry_pause
                    );
                    tokio::time::sleep(self.options.upsert_retry_pause).await;
                    result = self.index.upsert(namespace, batch).await;
                }
            }
            match result {
                Ok(()) => {
                    written += batch.len();
                    debug!("Upserted {} vectors into '{}'", batch.len(), namespace);
                }
                Err(e) => {
                    error!("Failed to upsert {} vectors into '{}': {}", batch.len(), namespace, e);
                    failed += batch.len();
                }
            }
        }
        (written, failed)
    }
}

impl<I: VectorIndex, E: Embedder> ChunkSink for Publisher<I, E> {
    #[instrument(skip(self, chunks, events), fields(chunks = chunks.len()))]
    async fn publish(
        &self,
        chunks: Vec<ChunkedDocument>,
        events: Option<&EventSender>,
    ) -> Result<PublishReport, IndexError> {
        let mut report = PublishReport::default();

        for (namespace, documents) in group_by_namespace(chunks) {
            info!("Publishing {} chunks to '{}'", documents.len(), namespace);
            if self.options.clean_existing {
                report.deleted += self.clear_namespace(&namespace).await?;
            }

            let mut written = 0;
            for batch in documents.chunks(self.options.embed_batch_size) {
                let vectors = self.vectors(batch).await?;
                let (ok, failed) = self.upsert(&namespace, &vectors).await;
                written += ok;
                report.failed += failed;
                info!("Progress: {}/{} chunks in '{}'", written, documents.len(), namespace);
            }

            emit(
                events,
                CrawlEvent::NamespacePublished {
                    namespace: namespace.clone(),
                    vectors: written,
                },
            );
            report.namespaces.insert(namespace, written);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::chunk;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory store; the first `rate_limits` write calls are refused
    #[derive(Default)]
    struct MemoryIndex {
        data: Mutex<BTreeMap<String, Vec<Vector>>>,
        rate_limits: AtomicUsize,
        upserts: AtomicUsize,
    }

    impl MemoryIndex {
        fn refuse(&self) -> Result<(), IndexError> {
            let left = self.rate_limits.load(Ordering::SeqCst);
            if left > 0 {
                self.rate_limits.store(left - 1, Ordering::SeqCst);
                return Err(IndexError::RateLimited("429".to_string()));
            }
            Ok(())
        }

        fn seed(&self, namespace: &str, count: usize) {
            let vectors = (0..count)
                .map(|i| Vector {
                    id: format!("old-{}", i),
                    values: vec![0.0],
                    metadata: serde_json::Map::new(),
                })
                .collect();
            self.data.lock().unwrap().insert(namespace.to_string(), vectors);
        }

        fn get(&self, namespace: &str) -> Vec<Vector> {
            self.data.lock().unwrap().get(namespace).cloned().unwrap_or_default()
        }
    }

    impl VectorIndex for MemoryIndex {
        async fn vector_count(&self, namespace: &str) -> Result<usize, IndexError> {
            Ok(self.get(namespace).len())
        }

        async fn list_ids(&self, namespace: &str, limit: usize) -> Result<Vec<String>, IndexError> {
            Ok(self.get(namespace).into_iter().take(limit).map(|v| v.id).collect())
        }

        async fn delete(&self, namespace: &str, ids: &[String]) -> Result<(), IndexError> {
            self.refuse()?;
            if let Some(vectors) = self.data.lock().unwrap().get_mut(namespace) {
                vectors.retain(|v| !ids.contains(&v.id));
            }
            Ok(())
        }

        async fn upsert(&self, namespace: &str, vectors: &[Vector]) -> Result<(), IndexError> {
            self.refuse()?;
            self.upserts.fetch_add(1, Ordering::SeqCst);
            self.data
                .lock()
                .unwrap()
                .entry(namespace.to_string())
                .or_default()
                .extend(vectors.iter().cloned());
            Ok(())
        }
    }

    struct LengthEmbedder;

    impl Embedder for LengthEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    fn fast_options() -> PublishOptions {
        PublishOptions {
            delete_batch_size: 2,
            delete_interval: Duration::from_millis(1),
            embed_batch_size: 2,
            embed_interval: Duration::from_millis(1),
            upsert_batch_size: 3,
            upsert_retry_pause: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_publish_replaces_namespace_contents() {
        let index = MemoryIndex::default();
        index.seed("child", 5);
        let publisher = Publisher::new(index, LengthEmbedder, fast_options()).unwrap();

        let chunks: Vec<_> = (0..4)
            .map(|i| chunk("child", i))
            .chain([chunk("general", 0)])
            .collect();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let report = publisher.publish(chunks, Some(&tx)).await.unwrap();
        drop(tx);

        assert_eq!(report.deleted, 5);
        assert_eq!(report.failed, 0);
        assert_eq!(report.namespaces["child"], 4);
        assert_eq!(report.namespaces["general"], 1);

        let child = publisher.index().get("child");
        assert_eq!(child.len(), 4);
        assert!(child.iter().all(|v| !v.id.starts_with("old-")));
        assert!(Uuid::parse_str(&child[0].id).is_ok());
        assert_eq!(child[0].metadata["text"], "texte child 0");
        assert_eq!(child[0].metadata["chunk_index"], 0);
        assert_eq!(child[0].metadata["namespace"], "child");

        let mut published = Vec::new();
        while let Some(event) = rx.recv().await {
            if let CrawlEvent::NamespacePublished { namespace, vectors } = event {
                published.push((namespace, vectors));
            }
        }
        assert_eq!(
            published,
            vec![("child".to_string(), 4), ("general".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_rate_limited_writes_are_retried() {
        let index = MemoryIndex::default();
        index.seed("general", 1);
        index.rate_limits.store(2, Ordering::SeqCst);
        let publisher = Publisher::new(index, LengthEmbedder, fast_options()).unwrap();

        let report = publisher.publish(vec![chunk("general", 0)], None).await.unwrap();

        // two refused deletes, then the delete and the upsert go through
        assert_eq!(report.deleted, 1);
        assert_eq!(report.namespaces["general"], 1);
        assert_eq!(publisher.index().get("general").len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_batches() {
        let options = PublishOptions {
            clean_existing: false,
            embed_batch_size: 20,
            ..fast_options()
        };
        let publisher = Publisher::new(MemoryIndex::default(), LengthEmbedder, options).unwrap();
        let chunks: Vec<_> = (0..7).map(|i| chunk("child", i)).collect();

        let report = publisher.publish(chunks, None).await.unwrap();
        assert_eq!(report.namespaces["child"], 7);
        assert_eq!(publisher.index().upserts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_zero_batch_rejected() {
        let options = PublishOptions {
            upsert_batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            Publisher::new(MemoryIndex::default(), LengthEmbedder, options),
            Err(IndexError::Config(_))
        ));
    }
}
