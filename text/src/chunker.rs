//! Document chunking.
//!
//! Splits raw text into bounded [`TextChunk`]s. Every strategy except
//! fixed-size works on natural boundaries (paragraphs, sentences) and then
//! merges undersized pieces into their neighbours, so chunk sizes stay
//! between `min_chunk_size` and `max_chunk_size` wherever the text allows.
//! Sizes are byte lengths; cuts always land on char boundaries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use longctx_embeddings::Embedder;
use longctx_index::chunk::{CHUNK_COUNT_KEY, CHUNK_INDEX_KEY};
use longctx_index::{Metadata, TextChunk};

use crate::error::{Result, TextError};
use crate::segmenter::{RegexSegmenter, Segmenter, ceil_char_boundary, floor_char_boundary};

const PARAGRAPH_JOINER: &str = "\n\n";
const SENTENCE_JOINER: &str = " ";

/// How text is cut into chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Sliding window of `chunk_size` with `chunk_overlap`, nudged to the
    /// next break within `boundary_lookahead`.
    FixedSize,
    /// Whole paragraphs accumulated up to `max_chunk_size`.
    Paragraph,
    /// Whole sentences accumulated up to `max_chunk_size`.
    Sentence,
    /// Reserved for embedding-driven boundaries. Currently chunks like
    /// [`Hybrid`](Self::Hybrid).
    Semantic,
    /// Paragraphs, with paragraphs over `chunk_size` broken into sentences.
    #[default]
    Hybrid,
}

/// Configuration for the chunker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    pub strategy: ChunkingStrategy,

    /// Target chunk size in bytes.
    pub chunk_size: usize,

    /// Bytes shared by consecutive fixed-size windows.
    pub chunk_overlap: usize,

    /// Chunks below this size are merged into a neighbour when possible.
    pub min_chunk_size: usize,

    /// Hard upper bound for any chunk.
    pub max_chunk_size: usize,

    /// How far past `chunk_size` a fixed-size window may stretch to reach a
    /// paragraph or sentence break.
    pub boundary_lookahead: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Hybrid,
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_size: 100,
            max_chunk_size: 1500,
            boundary_lookahead: 100,
        }
    }
}

impl ChunkerConfig {
    pub fn with_strategy(mut self, strategy: ChunkingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_sizes(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    /// Reject configurations that cannot produce bounded chunks.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(TextError::InvalidConfig("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(TextError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.chunk_size > self.max_chunk_size {
            return Err(TextError::InvalidConfig(format!(
                "chunk_size ({}) exceeds max_chunk_size ({})",
                self.chunk_size, self.max_chunk_size
            )));
        }
        if self.min_chunk_size > self.max_chunk_size {
            return Err(TextError::InvalidConfig(format!(
                "min_chunk_size ({}) exceeds max_chunk_size ({})",
                self.min_chunk_size, self.max_chunk_size
            )));
        }
        Ok(())
    }
}

/// A unit of text plus the separator placed before it when it is appended
/// to a non-empty chunk.
#[derive(Debug)]
struct Piece {
    text: String,
    joiner: &'static str,
}

impl Piece {
    fn new(text: impl Into<String>, joiner: &'static str) -> Self {
        Self {
            text: text.into(),
            joiner,
        }
    }

    fn joined_len(&self, next: &Piece) -> usize {
        self.text.len() + next.joiner.len() + next.text.len()
    }

    fn append(&mut self, next: Piece) {
        self.text.push_str(next.joiner);
        self.text.push_str(&next.text);
    }
}

/// Splits documents into [`TextChunk`]s and optionally embeds them.
pub struct Chunker {
    config: ChunkerConfig,
    segmenter: Arc<dyn Segmenter>,
    embedder: Option<Embedder>,
}

impl Chunker {
    /// Create a chunker using the regex segmenter.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            segmenter: Arc::new(RegexSegmenter::new()?),
            embedder: None,
        })
    }

    pub fn with_segmenter(mut self, segmenter: Arc<dyn Segmenter>) -> Self {
        self.segmenter = segmenter;
        self
    }

    /// Embed every produced chunk with `embedder`.
    pub fn with_embedder(mut self, embedder: Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk `text` into [`TextChunk`]s carrying `metadata`.
    ///
    /// Each chunk also records its position and the batch size under
    /// `chunk_index` / `chunk_count`. With an embedder attached, chunks are
    /// embedded one call at a time, in order; the first provider error
    /// aborts the batch.
    pub async fn chunk_text(&self, text: &str, metadata: &Metadata) -> Result<Vec<TextChunk>> {
        let pieces = self.split_text(text);
        let count = pieces.len();

        let mut chunks = Vec::with_capacity(count);
        for (index, piece) in pieces.into_iter().enumerate() {
            let mut chunk_metadata = metadata.clone();
            chunk_metadata.insert(CHUNK_INDEX_KEY.to_string(), index.to_string());
            chunk_metadata.insert(CHUNK_COUNT_KEY.to_string(), count.to_string());

            let mut chunk = TextChunk::new(piece, index).with_metadata(chunk_metadata);
            if let Some(embedder) = &self.embedder {
                let embedding = embedder.embed(&chunk.text).await?;
                chunk = chunk.with_embedding(embedding);
            }
            chunks.push(chunk);
        }

        debug!(
            "Chunked {} bytes into {count} chunks ({:?}, embedded: {})",
            text.len(),
            self.config.strategy,
            self.embedder.is_some()
        );
        Ok(chunks)
    }

    /// Split `text` into chunk strings without embedding.
    ///
    /// Deterministic: the same text and configuration always produce the
    /// same boundaries.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let pieces = match self.config.strategy {
            ChunkingStrategy::FixedSize => {
                return self.fixed_size(text);
            }
            ChunkingStrategy::Paragraph => self.paragraph_pieces(text),
            ChunkingStrategy::Sentence => self.sentence_pieces(text, SENTENCE_JOINER),
            ChunkingStrategy::Semantic => {
                if self.embedder.is_none() {
                    warn!("Semantic chunking needs an embedding provider, using hybrid");
                }
                self.hybrid_pieces(text)
            }
            ChunkingStrategy::Hybrid => self.hybrid_pieces(text),
        };

        let chunks = self.merge_small(self.accumulate(pieces));
        chunks.into_iter().map(|piece| piece.text).collect()
    }

    fn paragraph_pieces(&self, text: &str) -> Vec<Piece> {
        let mut pieces = Vec::new();
        for paragraph in self.segmenter.paragraphs(text) {
            if paragraph.len() > self.config.max_chunk_size {
                pieces.extend(self.oversized(paragraph, PARAGRAPH_JOINER));
            } else {
                pieces.push(Piece::new(paragraph, PARAGRAPH_JOINER));
            }
        }
        pieces
    }

    fn sentence_pieces(&self, text: &str, first_joiner: &'static str) -> Vec<Piece> {
        let mut pieces = Vec::new();
        for (i, sentence) in self.segmenter.sentences(text).into_iter().enumerate() {
            let joiner = if i == 0 { first_joiner } else { SENTENCE_JOINER };
            if sentence.len() > self.config.max_chunk_size {
                pieces.extend(self.oversized(sentence, joiner));
            } else {
                pieces.push(Piece::new(sentence, joiner));
            }
        }
        pieces
    }

    fn hybrid_pieces(&self, text: &str) -> Vec<Piece> {
        let mut pieces = Vec::new();
        for paragraph in self.segmenter.paragraphs(text) {
            if paragraph.len() > self.config.chunk_size {
                pieces.extend(self.sentence_pieces(paragraph, PARAGRAPH_JOINER));
            } else {
                pieces.push(Piece::new(paragraph, PARAGRAPH_JOINER));
            }
        }
        pieces
    }

    /// Fixed-size windows for a unit that alone exceeds `max_chunk_size`.
    fn oversized(&self, unit: &str, joiner: &'static str) -> Vec<Piece> {
        self.fixed_size(unit)
            .into_iter()
            .map(|window| Piece::new(window, joiner))
            .collect()
    }

    /// Greedily pack pieces into chunks no larger than `max_chunk_size`.
    fn accumulate(&self, pieces: Vec<Piece>) -> Vec<Piece> {
        let mut chunks = Vec::new();
        let mut current: Option<Piece> = None;

        for piece in pieces {
            if let Some(open) = current.as_mut() {
                if open.joined_len(&piece) <= self.config.max_chunk_size {
                    open.append(piece);
                    continue;
                }
            }
            if let Some(done) = current.replace(piece) {
                chunks.push(done);
            }
        }
        chunks.extend(current);
        chunks
    }

    /// Fold chunks below `min_chunk_size` into the preceding chunk when the
    /// result still fits in `max_chunk_size`.
    fn merge_small(&self, chunks: Vec<Piece>) -> Vec<Piece> {
        let mut merged: Vec<Piece> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if let Some(last) = merged.last_mut() {
                let small = last.text.len() < self.config.min_chunk_size
                    || chunk.text.len() < self.config.min_chunk_size;
                if small && last.joined_len(&chunk) <= self.config.max_chunk_size {
                    last.append(chunk);
                    continue;
                }
            }
            merged.push(chunk);
        }
        merged
    }

    /// Sliding window over `text`. Always advances, even when no break is
    /// found and the overlap would otherwise stall it.
    fn fixed_size(&self, text: &str) -> Vec<String> {
        let len = text.len();
        let size = self.config.chunk_size.min(self.config.max_chunk_size).max(1);
        let overlap = self.config.chunk_overlap.min(size - 1);

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < len {
            let mut end = floor_char_boundary(text, start + size);
            if end < len {
                let limit = (end + self.config.boundary_lookahead)
                    .min(start + self.config.max_chunk_size);
                let limit = floor_char_boundary(text, limit);
                if limit > end {
                    if let Some(offset) = self.segmenter.next_boundary(&text[end..limit]) {
                        end += offset;
                    }
                }
            }
            if end <= start {
                end = ceil_char_boundary(text, start + 1);
            }

            let window = text[start..end].trim();
            if !window.is_empty() {
                chunks.push(window.to_string());
            }
            if end >= len {
                break;
            }

            let next = floor_char_boundary(text, end.saturating_sub(overlap));
            start = if next > start { next } else { end };
        }
        chunks
    }
}
