//! Configuration for the context manager and retriever.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use longctx_index::IndexConfig;
use longctx_text::{ChunkerConfig, SummarizerConfig};

use crate::error::Result;

/// Configuration for the context manager.
///
/// Every field is optional in a TOML file; missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Directory holding `documents.json` and the index files.
    pub storage_dir: PathBuf,

    /// Token budget for the active context text.
    pub max_context_tokens: usize,

    /// Number of previous active contexts kept.
    pub history_size: usize,

    /// Summarize multi-chunk retrievals when the active context changes.
    pub auto_summarize: bool,

    /// Deadline for each embedding or generation call.
    pub provider_timeout_ms: Option<u64>,

    pub index: IndexConfig,

    pub chunker: ChunkerConfig,

    pub summarizer: SummarizerConfig,

    pub retriever: RetrieverConfig,
}

impl ManagerConfig {
    /// Create a configuration storing its files under `storage_dir`.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            max_context_tokens: 4000,
            history_size: 10,
            auto_summarize: true,
            provider_timeout_ms: None,
            index: IndexConfig::default(),
            chunker: ChunkerConfig::default(),
            summarizer: SummarizerConfig::default(),
            retriever: RetrieverConfig::default(),
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_toml_str(&std::fs::read_to_string(path)?)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn with_index(mut self, index: IndexConfig) -> Self {
        self.index = index;
        self
    }

    pub fn with_chunker(mut self, chunker: ChunkerConfig) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_summarizer(mut self, summarizer: SummarizerConfig) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_retriever(mut self, retriever: RetrieverConfig) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_max_context_tokens(mut self, tokens: usize) -> Self {
        self.max_context_tokens = tokens;
        self
    }

    pub fn with_history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }

    pub fn with_auto_summarize(mut self, enabled: bool) -> Self {
        self.auto_summarize = enabled;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn provider_timeout(&self) -> Option<Duration> {
        self.provider_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new(dirs::data_dir().unwrap_or_default().join("longctx"))
    }
}

/// Configuration for query-time retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Chunks returned when the caller does not say.
    pub default_k: usize,

    /// Minimum vector score (higher is better) a chunk needs.
    pub min_score: f32,

    /// Weight of the keyword component in hybrid retrieval, in `[0, 1]`.
    pub keyword_weight: f32,

    /// Drop repeated chunks when merging multi-query results.
    pub deduplicate: bool,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            min_score: 0.0,
            keyword_weight: 0.3,
            deduplicate: true,
        }
    }
}
