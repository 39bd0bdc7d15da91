//! The chunk type shared by the chunker, the index and the retriever.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use longctx_embeddings::Embedding;

/// Globally unique, monotonically increasing identifier assigned by
/// [`VectorIndex::add`](crate::VectorIndex::add).
pub type ChunkId = u64;

/// String-keyed chunk metadata (document id, batch position, caller tags).
pub type Metadata = BTreeMap<String, String>;

/// Metadata key holding the owning document id.
pub const DOCUMENT_ID_KEY: &str = "document_id";

/// Metadata key holding the chunk's position within its batch.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// Metadata key holding the size of the batch the chunk came from.
pub const CHUNK_COUNT_KEY: &str = "chunk_count";

/// A bounded, contiguous slice of a source document.
///
/// `index` is local to the chunking call that produced the chunk. It is not
/// unique across documents; use the [`ChunkId`] the index assigns instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    pub index: usize,
    pub metadata: Metadata,
    pub embedding: Option<Embedding>,
}

impl TextChunk {
    pub fn new(text: impl Into<String>, index: usize) -> Self {
        Self {
            text: text.into(),
            index,
            metadata: Metadata::new(),
            embedding: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Return a copy of this chunk carrying `embedding`.
    pub fn with_embedding(&self, embedding: Embedding) -> Self {
        Self {
            embedding: Some(embedding),
            ..self.clone()
        }
    }

    pub fn document_id(&self) -> Option<&str> {
        self.metadata.get(DOCUMENT_ID_KEY).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Estimate token count (rough approximation: ~4 chars per token).
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.text)
    }
}

/// Token estimate used everywhere a budget is enforced.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_with_embedding_leaves_original_untouched() {
        let chunk = TextChunk::new("hello", 0);
        let embedded = chunk.with_embedding(vec![1.0, 0.0]);

        assert_eq!(chunk.embedding, None);
        assert_eq!(embedded.embedding, Some(vec![1.0, 0.0]));
        assert_eq!(embedded.text, "hello");
    }

    #[test]
    fn test_estimated_tokens() {
        let chunk = TextChunk::new("This is a test with about 40 characters.", 0);
        assert_eq!(chunk.estimated_tokens(), 10);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_document_id_from_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert(DOCUMENT_ID_KEY.to_string(), "doc-1".to_string());
        let chunk = TextChunk::new("x", 3).with_metadata(metadata);
        assert_eq!(chunk.document_id(), Some("doc-1"));
    }
}
