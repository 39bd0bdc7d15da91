//! Error types for chunking, generation and summarization.

use thiserror::Error;

use longctx_embeddings::EmbeddingError;

/// Result type alias for text operations.
pub type Result<T> = std::result::Result<T, TextError>;

/// Errors that can occur while chunking, generating or summarizing.
#[derive(Error, Debug)]
pub enum TextError {
    /// The generation provider has no credentials.
    #[error("generation provider not configured")]
    ProviderNotConfigured,

    /// The generation API rejected the request.
    #[error("generation request failed: {0}")]
    ApiRequest(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The generation API answered with something unusable.
    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    /// A generation call outlived its deadline.
    #[error("generation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Chunker or summarizer parameters are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Embedding a chunk failed.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
