//! Retrieval results and their token-budget views.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use longctx_index::chunk::estimate_tokens;
use longctx_index::{ChunkId, Metadata, SearchHit, TextChunk};

/// A chunk together with the id the index assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: ChunkId,
    pub chunk: TextChunk,
}

/// Ordered chunks returned for one query.
///
/// Scores are keyed by [`ChunkId`], never by a chunk's batch-local
/// position, so chunks from different documents cannot collide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunks: Vec<RetrievedChunk>,
    pub scores: HashMap<ChunkId, f32>,
    pub query: String,
    pub metadata: Metadata,
}

impl RetrievalResult {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Build a result from index hits, keeping their order.
    pub fn from_hits(query: impl Into<String>, hits: Vec<SearchHit>) -> Self {
        let mut result = Self::new(query);
        for hit in hits {
            result.push(hit.chunk_id, hit.chunk, hit.score);
        }
        result
    }

    /// Append a chunk. A chunk already present keeps its position and the
    /// higher of the two scores.
    pub fn push(&mut self, chunk_id: ChunkId, chunk: TextChunk, score: f32) {
        match self.scores.get_mut(&chunk_id) {
            Some(existing) => *existing = existing.max(score),
            None => {
                self.scores.insert(chunk_id, score);
                self.chunks.push(RetrievedChunk { chunk_id, chunk });
            }
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Score of `chunk_id`, 0.0 when it is not part of this result.
    pub fn score(&self, chunk_id: ChunkId) -> f32 {
        self.scores.get(&chunk_id).copied().unwrap_or(0.0)
    }

    pub fn texts(&self) -> Vec<&str> {
        self.chunks.iter().map(|c| c.chunk.text.as_str()).collect()
    }

    pub fn chunk_ids(&self) -> Vec<ChunkId> {
        self.chunks.iter().map(|c| c.chunk_id).collect()
    }

    /// Sum of the token estimates of every chunk.
    pub fn estimated_tokens(&self) -> usize {
        self.chunks.iter().map(|c| estimate_tokens(&c.chunk.text)).sum()
    }

    /// Same chunks, best score first. Ties keep their current order.
    pub fn sorted_by_score(&self) -> Self {
        let mut sorted = self.clone();
        sorted
            .chunks
            .sort_by(|a, b| self.score(b.chunk_id).total_cmp(&self.score(a.chunk_id)));
        sorted
    }

    /// Only chunks scoring at least `min_score`, in current order.
    pub fn filter_by_score(&self, min_score: f32) -> Self {
        self.retain(|chunk| self.score(chunk.chunk_id) >= min_score)
    }

    /// Only chunks accepted by `predicate`, in current order.
    pub fn filter_chunks(&self, predicate: impl Fn(&TextChunk) -> bool) -> Self {
        self.retain(|chunk| predicate(&chunk.chunk))
    }

    /// The highest-scoring chunks whose combined estimate fits in
    /// `max_tokens`, best first.
    ///
    /// Chunks are taken greedily by score; one that does not fit is skipped
    /// and smaller, lower-scored chunks may still be added.
    pub fn limit_tokens(&self, max_tokens: usize) -> Self {
        let mut limited = self.sorted_by_score();
        let mut used = 0;
        limited.chunks.retain(|chunk| {
            let tokens = estimate_tokens(&chunk.chunk.text);
            if used + tokens <= max_tokens {
                used += tokens;
                true
            } else {
                false
            }
        });
        limited.prune_scores();
        limited
    }

    /// Keep at most `n` chunks in current order.
    pub fn truncate(&mut self, n: usize) {
        self.chunks.truncate(n);
        self.prune_scores();
    }

    fn retain(&self, keep: impl Fn(&RetrievedChunk) -> bool) -> Self {
        let mut kept = self.clone();
        kept.chunks.retain(keep);
        kept.prune_scores();
        kept
    }

    fn prune_scores(&mut self) {
        let ids: Vec<ChunkId> = self.chunk_ids();
        self.scores.retain(|id, _| ids.contains(id));
    }
}
