//! # Processor Configuration Module
//!
//! Options for turning the output tree back into indexable chunks.
//!
//! - `ChunkOptions`: target chunk size and overlap, in characters
//! - `LoaderConfig`: chunking plus the folder-to-namespace policy, built
//!   through `LoaderConfig::builder()`
//!
//! Administrative pages are long and read best in large pieces, hence the
//! large defaults.

/// Separators tried in order when splitting text
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Configuration for chunking text
#[derive(Debug, Clone)]
pub struct ChunkOptions {
    /// Target size of each chunk in characters
    pub target_chunk_size: usize,

    /// Characters shared by consecutive chunks
    pub overlap_size: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            target_chunk_size: 20_000,
            overlap_size: 5_000,
        }
    }
}

/// Configuration for the document loader
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Options for chunking
    pub chunk_options: ChunkOptions,

    /// Keep one namespace per output folder instead of collapsing every
    /// non-general folder into the child namespace
    pub preserve_topic_namespaces: bool,
}

/// Builder for LoaderConfig
#[derive(Debug, Default)]
pub struct LoaderConfigBuilder {
    config: LoaderConfig,
}

impl LoaderConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LoaderConfig::default(),
        }
    }

    /// Set the target chunk size
    pub fn target_chunk_size(mut self, target_chunk_size: usize) -> Self {
        self.config.chunk_options.target_chunk_size = target_chunk_size;
        self
    }

    /// Set the overlap size
    pub fn overlap_size(mut self, overlap_size: usize) -> Self {
        self.config.chunk_options.overlap_size = overlap_size;
        self
    }

    /// Keep per-folder namespaces
    pub fn preserve_topic_namespaces(mut self, preserve: bool) -> Self {
        self.config.preserve_topic_namespaces = preserve;
        self
    }

    /// Build the configuration
    pub fn build(self) -> LoaderConfig {
        self.config
    }
}

impl LoaderConfig {
    /// Create a new builder
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder::new()
    }
}
