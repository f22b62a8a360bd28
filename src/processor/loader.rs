//! Loads the output tree into chunked documents

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::catalog::{CHILD_NAMESPACE, DIRECTORY_TOPIC, GENERAL_NAMESPACE, SiteCatalog};
use crate::crawler::{Storage, StorageConfig};
use crate::processor::chunking::chunk_text;
use crate::processor::config::LoaderConfig;
use crate::processor::error::ProcessError;
use crate::processor::text::TextRenderer;
use crate::processor::{ChunkMetadata, ChunkedDocument, ENRICHED_TEXT_FORMAT};

/// Turns persisted documents into metadata-tagged chunks
#[derive(Debug)]
pub struct DocumentLoader {
    catalog: SiteCatalog,
    config: LoaderConfig,
    renderer: TextRenderer,
}

impl DocumentLoader {
    pub fn new(catalog: SiteCatalog, config: LoaderConfig) -> Result<Self, ProcessError> {
        Ok(Self {
            catalog,
            config,
            renderer: TextRenderer::new()?,
        })
    }

    /// Index namespace of a file from its parent folder
    pub fn namespace_for(&self, folder: Option<&str>) -> String {
        match folder {
            None | Some(GENERAL_NAMESPACE) => GENERAL_NAMESPACE.to_string(),
            Some(folder) if self.config.preserve_topic_namespaces => folder.to_string(),
            Some(_) => CHILD_NAMESPACE.to_string(),
        }
    }

    /// Topic metadata of a source URL
    pub fn topic_for(&self, url: &str, default_topic: &str) -> String {
        if self.catalog.is_directory_url(url) {
            return DIRECTORY_TOPIC.to_string();
        }
        self.catalog
            .fixed_topic(url)
            .unwrap_or(default_topic)
            .to_string()
    }

    /// Chunk one persisted document
    pub fn load_document(
        &self,
        html: &str,
        filename: &str,
        folder: Option<&str>,
        default_topic: &str,
    ) -> Result<Vec<ChunkedDocument>, ProcessError> {
        let url = self.renderer.title(html).unwrap_or_else(|| "unknown".to_string());
        let text = self.renderer.render(html, &url);
        let namespace = self.namespace_for(folder);
        let topic = self.topic_for(&url, default_topic);

        let chunks = chunk_text(&text, &self.config.chunk_options)?;
        Ok(chunks
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| ChunkedDocument {
                text,
                metadata: ChunkMetadata {
                    filename: filename.to_string(),
                    url: url.clone(),
                    namespace: namespace.clone(),
                    topic: topic.clone(),
                    chunk_index,
                    format: ENRICHED_TEXT_FORMAT.to_string(),
                },
            })
            .collect())
    }

    /// Chunk every file of the output tree at `root`
    #[instrument(skip(self))]
    pub async fn load_all(
        &self,
        root: &Path,
        default_topic: &str,
    ) -> Result<Vec<ChunkedDocument>, ProcessError> {
        let storage = Storage::with_config(StorageConfig {
            base_path: root.to_path_buf(),
            ..Default::default()
        });
        let files = storage.list_files().await?;
        info!("Found {} files under {}", files.len(), root.display());

        let mut documents = Vec::new();
        for file in files {
            let html = match tokio::fs::read_to_string(&file.path).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Skipping unreadable file {}: {}", file.path.display(), e);
                    continue;
                }
            };
            let filename = file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            let chunks = self.load_document(&html, &filename, file.namespace.as_deref(), default_topic)?;
            if documents.is_empty() {
                if let Some(first) = chunks.first() {
                    let sample: String = first.text.chars().take(500).collect();
                    debug!("Enriched text sample: {}...", sample);
                }
            }
            documents.extend(chunks);
        }

        info!("{} chunks generated", documents.len());
        Ok(documents)
    }
}
