//! Vector index hand-off
//!
//! The vector store and the embedding model are external collaborators,
//! reached through the [`VectorIndex`] and [`Embedder`] traits. The
//! [`Publisher`] drives them: it groups chunks by namespace, clears what a
//! namespace already holds and inserts the new vectors in batches.
//!
//! Anything that accepts chunks implements [`ChunkSink`]; [`JsonExport`]
//! writes them to a file for an indexer running elsewhere.

pub mod error;
mod publisher;

pub use error::IndexError;
pub use publisher::{PublishOptions, Publisher};

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::events::{CrawlEvent, EventSender, emit};
use crate::processor::ChunkedDocument;

/// A vector ready for upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub id: String,
    pub values: Vec<f32>,
    /// Chunk metadata plus the chunk text under `text`
    pub metadata: Map<String, Value>,
}

/// Embedding model
pub trait Embedder: Send + Sync {
    /// One embedding per text, in order
    fn embed(&self, texts: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>, IndexError>> + Send;
}

/// Namespaced vector store
pub trait VectorIndex: Send + Sync {
    /// Number of vectors held by `namespace` (0 if it does not exist)
    fn vector_count(&self, namespace: &str) -> impl Future<Output = Result<usize, IndexError>> + Send;

    /// Up to `limit` ids of `namespace`
    fn list_ids(
        &self,
        namespace: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<String>, IndexError>> + Send;

    fn delete(&self, namespace: &str, ids: &[String]) -> impl Future<Output = Result<(), IndexError>> + Send;

    fn upsert(&self, namespace: &str, vectors: &[Vector]) -> impl Future<Output = Result<(), IndexError>> + Send;
}

/// Outcome of publishing a set of chunks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Vectors (or chunks) written per namespace
    pub namespaces: BTreeMap<String, usize>,
    /// Vectors removed while clearing namespaces
    pub deleted: usize,
    /// Vectors that could not be written
    pub failed: usize,
}

impl PublishReport {
    pub fn published(&self) -> usize {
        self.namespaces.values().sum()
    }
}

/// Destination of the chunked corpus
pub trait ChunkSink: Send + Sync {
    fn publish(
        &self,
        chunks: Vec<ChunkedDocument>,
        events: Option<&EventSender>,
    ) -> impl Future<Output = Result<PublishReport, IndexError>> + Send;
}

/// Chunks grouped by namespace, in chunk order
pub fn group_by_namespace(chunks: Vec<ChunkedDocument>) -> BTreeMap<String, Vec<ChunkedDocument>> {
    let mut groups: BTreeMap<String, Vec<ChunkedDocument>> = BTreeMap::new();
    for chunk in chunks {
        groups
            .entry(chunk.metadata.namespace.clone())
            .or_default()
            .push(chunk);
    }
    groups
}

/// Writes the chunks to a JSON file
#[derive(Debug, Clone)]
pub struct JsonExport {
    path: PathBuf,
}

impl JsonExport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl ChunkSink for JsonExport {
    #[instrument(skip(self, chunks, events), fields(path = %self.path.display()))]
    async fn publish(
        &self,
        chunks: Vec<ChunkedDocument>,
        events: Option<&EventSender>,
    ) -> Result<PublishReport, IndexError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(&chunks)?).await?;

        let mut report = PublishReport::default();
        for (namespace, group) in group_by_namespace(chunks) {
            emit(
                events,
                CrawlEvent::NamespacePublished {
                    namespace: namespace.clone(),
                    vectors: group.len(),
                },
            );
            report.namespaces.insert(namespace, group.len());
        }
        info!("Exported {} chunks to {}", report.published(), self.path.display());
        Ok(report)
    }
}
