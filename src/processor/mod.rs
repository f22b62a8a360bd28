//! Content processor module
//!
//! Reads the crawl output back, converts each persisted document to enriched
//! text and splits it into overlapping chunks tagged with the metadata the
//! index needs.

mod chunking;
mod config;
mod error;
mod loader;
mod text;

pub use chunking::{chunk_spans, chunk_text};
pub use config::{ChunkOptions, DEFAULT_SEPARATORS, LoaderConfig, LoaderConfigBuilder};
pub use error::ProcessError;
pub use loader::DocumentLoader;
pub use text::TextRenderer;

use serde::{Deserialize, Serialize};

/// Value of [`ChunkMetadata::format`] for text produced by [`TextRenderer`]
pub const ENRICHED_TEXT_FORMAT: &str = "enriched_text";

/// Metadata attached to every chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// File name within the output tree, without its folder
    pub filename: String,

    /// Source URL recovered from the document title
    pub url: String,

    /// Index namespace
    pub namespace: String,

    pub topic: String,

    /// 0-based position of the chunk within its document
    pub chunk_index: usize,

    pub format: String,
}

/// A chunk of a document, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkedDocument {
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_serializes_flat_metadata() {
        let chunk = ChunkedDocument {
            text: "Texte".to_string(),
            metadata: ChunkMetadata {
                filename: "a.txt".to_string(),
                url: "https://monservicepublic.gouv.mc/a".to_string(),
                namespace: "child".to_string(),
                topic: "Logement".to_string(),
                chunk_index: 2,
                format: ENRICHED_TEXT_FORMAT.to_string(),
            },
        };

        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["metadata"]["chunk_index"], 2);
        assert_eq!(json["metadata"]["format"], "enriched_text");
        assert_eq!(json["text"], "Texte");
    }
}
