//! # Embeddings
//!
//! Embedding port and helpers for the long-context subsystem.
//!
//! Nothing in this crate computes embeddings itself. It defines the narrow
//! [`EmbeddingProvider`] port every embedding call goes through, a
//! deadline-aware [`Embedder`] handle the rest of the workspace holds, an
//! OpenAI-compatible HTTP adapter, a cache, and the similarity math shared by
//! the vector backends.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings                                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedder ──► Embedding                   │
//! │       │                   │             │                       │
//! │       ▼                   ▼             ▼                       │
//! │  OpenAIProvider     EmbeddingCache  similarity                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod embedder;
pub mod error;
pub mod provider;
pub mod similarity;

pub use cache::EmbeddingCache;
pub use embedder::Embedder;
pub use error::{EmbeddingError, Result};
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider};
pub use similarity::{cosine_similarity, squared_euclidean_distance};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings (varies by model).
pub const DEFAULT_DIMENSION: usize = 1536; // OpenAI text-embedding-3-small
