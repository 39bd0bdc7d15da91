//! # Vector Index
//!
//! Chunk storage and similarity search for the long-context subsystem.
//!
//! - **Chunks**: [`TextChunk`] is the immutable unit produced by the chunker
//! - **Backends**: [`VectorBackend`] hides exact, approximate and naive
//!   search behind one similarity-returning interface
//! - **Index**: [`VectorIndex`] assigns global chunk ids, keeps the
//!   document → chunk map in lockstep with the backend, and persists both
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         VectorIndex                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  chunks: ChunkId ──► TextChunk     documents: id ──► [ChunkId]  │
//! │                         │                                       │
//! │                         ▼                                       │
//! │        VectorBackend (Flat | Tree | Memory)                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! `flat` and `tree` are on by default. Asking for a backend that is
//! compiled out logs a warning and selects [`BackendKind::Memory`]. The
//! fallback tests only build without the defaults:
//!
//! ```text
//! cargo test -p longctx-index --no-default-features
//! ```

pub mod backend;
pub mod chunk;
pub mod error;
pub mod index;

pub use backend::{BackendKind, TreeConfig, VectorBackend, create_backend};
pub use chunk::{ChunkId, Metadata, TextChunk};
pub use error::{IndexError, Result};
pub use index::{IndexConfig, IndexMetadata, SearchHit, VectorIndex};
