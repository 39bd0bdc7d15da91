//! Error types for retrieval and context management.

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur while retrieving or managing context.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Vector index error.
    #[error("index error: {0}")]
    Index(#[from] longctx_index::IndexError),

    /// Chunking, generation or summarization error.
    #[error("text error: {0}")]
    Text(#[from] longctx_text::TextError),

    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] longctx_embeddings::EmbeddingError),

    /// A caller-supplied parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
