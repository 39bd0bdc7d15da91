//! # Retrieval and Context Management
//!
//! Query-time access to indexed documents for prompt construction:
//!
//! - **Results**: [`RetrievalResult`] keys scores by global chunk id and
//!   offers score, predicate and token-budget views
//! - **Retriever**: [`Retriever`] runs vector, keyword, hybrid and
//!   multi-query retrieval over a shared [`VectorIndex`]
//! - **Context Manager**: [`ContextManager`] registers documents, keeps the
//!   active context and its history, and augments prompts
//! - **Configuration**: [`ManagerConfig`] loads from TOML with every field
//!   optional
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        ContextManager                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  add_document ──► Chunker ──► Embedder ──► VectorIndex          │
//! │                                                 ▲               │
//! │  retrieve_context ──► Retriever ────────────────┘               │
//! │         │                                                       │
//! │         ▼                                                       │
//! │  active context ──► Summarizer        history (bounded FIFO)    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use longctx_retrieval::{ContextManager, ContextOptions, ManagerConfig};
//!
//! let manager = ContextManager::builder()
//!     .with_config(ManagerConfig::from_toml_file("longctx.toml")?)
//!     .with_embedding_provider(Arc::new(OpenAIProvider::new()))
//!     .with_generation_provider(Arc::new(OpenAIChatProvider::new()))
//!     .build()?;
//!
//! manager.add_document("handbook", &text, Metadata::new(), true).await?;
//! let prompt = manager.augment_prompt("How do refunds work?", &Default::default()).await?;
//! ```
//!
//! [`VectorIndex`]: longctx_index::VectorIndex

pub mod config;
pub mod error;
pub mod manager;
pub mod result;
pub mod retriever;

pub use config::{ManagerConfig, RetrieverConfig};
pub use error::{Result, RetrievalError};
pub use manager::{
    ActiveContext, AugmentOptions, ContextManager, ContextManagerBuilder, ContextOptions,
    ContextPosition, ContextTextOptions, DocumentRecord, ManagerStats, RetrievalStrategy,
};
pub use result::{RetrievalResult, RetrievedChunk};
pub use retriever::{ChunkFilter, NoopReranker, Reranker, RetrieveOptions, Retriever};

// Re-export from dependencies for convenience
pub use longctx_embeddings::{EmbeddingProvider, OpenAIProvider};
pub use longctx_index::{BackendKind, ChunkId, Metadata, TextChunk};
pub use longctx_text::{GenerationProvider, OpenAIChatProvider, Summary, SummaryOptions};
