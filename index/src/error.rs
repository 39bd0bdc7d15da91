//! Error types for the vector index.

use thiserror::Error;

use longctx_embeddings::EmbeddingError;

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur in the vector index.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Text search needs an embedding provider and none was configured.
    #[error("no embedding provider configured for text search")]
    ProviderNotConfigured,

    /// A vector does not match the index dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding provider error.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Metadata (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary (de)serialization error.
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
