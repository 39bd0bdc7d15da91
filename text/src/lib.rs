//! # Text Processing
//!
//! Turns long documents into retrievable pieces and condenses text through a
//! language model:
//!
//! - **Segmentation**: [`Segmenter`] isolates paragraph and sentence
//!   detection; [`RegexSegmenter`] is the heuristic default
//! - **Chunking**: [`Chunker`] packs segments into bounded [`TextChunk`]s
//!   under a [`ChunkingStrategy`], embedding them when configured
//! - **Generation**: [`GenerationProvider`] is the port to a language model,
//!   reached through the deadline-aware [`Generator`]
//! - **Summarization**: [`Summarizer`] runs single-pass or map-reduce
//!   summaries over a [`Generator`]
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Text Processing                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  text ──► Segmenter ──► Chunker ──► [TextChunk] ──► Embedder    │
//! │                │                                                │
//! │                ▼                                                │
//! │           Summarizer ──► Generator ──► GenerationProvider       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`TextChunk`]: longctx_index::TextChunk

pub mod chunker;
pub mod error;
pub mod llm;
pub mod segmenter;
pub mod summarizer;

pub use chunker::{Chunker, ChunkerConfig, ChunkingStrategy};
pub use error::{Result, TextError};
pub use llm::{GenerationProvider, Generator, OpenAIChatProvider};
pub use segmenter::{RegexSegmenter, Segmenter};
pub use summarizer::{Summarizer, SummarizerConfig, Summary, SummaryOptions, SummaryStyle};
