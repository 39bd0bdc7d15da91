//! Query-time retrieval over a shared [`VectorIndex`].
//!
//! Four strategies share one result type:
//!
//! - **vector**: embed the query, search the index, then filter and rerank
//! - **keyword**: fraction of query terms found in each chunk
//! - **hybrid**: `(1 - w) * vector + w * keyword` per chunk
//! - **multi-query**: vector retrieval for several phrasings, merged
//!
//! Missing collaborators degrade instead of failing: vector retrieval
//! without an embedder returns an empty result, and hybrid retrieval falls
//! back to keywords.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use ordered_float::OrderedFloat;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use longctx_embeddings::Embedder;
use longctx_index::{ChunkId, TextChunk, VectorIndex};

use crate::config::RetrieverConfig;
use crate::error::{Result, RetrievalError};
use crate::result::RetrievalResult;

/// Predicate deciding whether a chunk may appear in a result.
pub type ChunkFilter = Arc<dyn Fn(&TextChunk) -> bool + Send + Sync>;

/// Reorders (or trims) a result after filtering.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, result: RetrievalResult) -> Result<RetrievalResult>;
}

/// Leaves results untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReranker;

#[async_trait]
impl Reranker for NoopReranker {
    async fn rerank(&self, _query: &str, result: RetrievalResult) -> Result<RetrievalResult> {
        Ok(result)
    }
}

/// Options for [`Retriever::retrieve`].
#[derive(Clone)]
pub struct RetrieveOptions {
    pub k: usize,
    pub document_id: Option<String>,
    pub min_score: f32,
    pub rerank: bool,
    pub filter: Option<ChunkFilter>,
}

impl RetrieveOptions {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            document_id: None,
            min_score: 0.0,
            rerank: false,
            filter: None,
        }
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }

    pub fn with_filter(mut self, filter: impl Fn(&TextChunk) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl fmt::Debug for RetrieveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrieveOptions")
            .field("k", &self.k)
            .field("document_id", &self.document_id)
            .field("min_score", &self.min_score)
            .field("rerank", &self.rerank)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// Lower-cased query terms longer than two characters, first occurrence
/// order, no repeats.
pub fn keyword_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
        .map(str::to_lowercase)
    {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Fraction of `terms` that occur in `text`, case-insensitively.
pub fn keyword_score(terms: &[String], text: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let text = text.to_lowercase();
    let found = terms.iter().filter(|term| text.contains(term.as_str())).count();
    found as f32 / terms.len() as f32
}

/// Turns queries into ranked [`RetrievalResult`]s.
pub struct Retriever {
    index: Arc<RwLock<VectorIndex>>,
    embedder: Option<Embedder>,
    reranker: Arc<dyn Reranker>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        index: Arc<RwLock<VectorIndex>>,
        embedder: Option<Embedder>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            reranker: Arc::new(NoopReranker),
            config,
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Vector retrieval: search, drop chunks under `min_score`, apply the
    /// filter, then rerank if asked.
    ///
    /// An empty query, or a retriever without an embedder, yields an empty
    /// result rather than an error.
    pub async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> Result<RetrievalResult> {
        let empty = RetrievalResult::new(query)
            .with_metadata("strategy", "vector")
            .with_metadata("k", options.k);
        if query.trim().is_empty() || options.k == 0 {
            return Ok(empty);
        }
        let Some(embedder) = &self.embedder else {
            warn!("Vector retrieval requested without an embedding provider");
            return Ok(empty);
        };

        let embedding = embedder.embed(query).await?;
        let hits = self
            .index
            .read()
            .await
            .search(&embedding, options.k, options.document_id.as_deref())?;

        let mut result = RetrievalResult::from_hits(query, hits)
            .filter_by_score(options.min_score);
        if let Some(filter) = &options.filter {
            result = result.filter_chunks(filter.as_ref());
        }
        if options.rerank {
            result = self.reranker.rerank(query, result).await?;
        }

        result.metadata = empty.metadata;
        if let Some(document_id) = &options.document_id {
            result = result.with_metadata("document_id", document_id);
        }
        debug!("Vector retrieval returned {} chunks", result.len());
        Ok(result)
    }

    /// Run vector retrieval for each query and merge the results.
    ///
    /// With `deduplicate`, a chunk found by several queries appears once
    /// with its best score. The merged list is sorted by score and cut to
    /// `max_chunks`.
    pub async fn retrieve_multi_query(
        &self,
        queries: &[String],
        k_per_query: usize,
        max_chunks: usize,
        deduplicate: bool,
    ) -> Result<RetrievalResult> {
        let query = queries.first().cloned().unwrap_or_default();
        let options = RetrieveOptions::new(k_per_query).with_min_score(self.config.min_score);

        let mut merged = RetrievalResult::new(query);
        for variant in queries {
            let result = self.retrieve(variant, &options).await?;
            for retrieved in result.chunks {
                let score = result.scores.get(&retrieved.chunk_id).copied().unwrap_or(0.0);
                if deduplicate {
                    merged.push(retrieved.chunk_id, retrieved.chunk, score);
                } else {
                    let best = merged.scores.entry(retrieved.chunk_id).or_insert(score);
                    *best = best.max(score);
                    merged.chunks.push(retrieved);
                }
            }
        }

        let mut merged = merged.sorted_by_score();
        merged.truncate(max_chunks);
        Ok(merged
            .with_metadata("strategy", "multi_query")
            .with_metadata("queries", queries.len())
            .with_metadata("k", k_per_query))
    }

    /// Keyword retrieval over every indexed chunk (or one document's).
    ///
    /// Chunks sharing no term with the query are left out.
    pub async fn retrieve_keyword(
        &self,
        query: &str,
        k: usize,
        document_id: Option<&str>,
    ) -> Result<RetrievalResult> {
        let scored = self.keyword_scores(query, document_id).await;
        let mut result = RetrievalResult::new(query)
            .with_metadata("strategy", "keyword")
            .with_metadata("k", k);
        for (chunk_id, chunk, score) in scored.into_iter().take(k) {
            result.push(chunk_id, chunk, score);
        }
        if let Some(document_id) = document_id {
            result = result.with_metadata("document_id", document_id);
        }
        Ok(result)
    }

    /// Fuse vector and keyword scores as `(1 - w) * vector + w * keyword`.
    ///
    /// Candidates are the top `2k` of each method. A chunk found by only one
    /// method scores 0 for the other. Without an embedder this is keyword
    /// retrieval.
    pub async fn retrieve_hybrid(
        &self,
        query: &str,
        k: usize,
        keyword_weight: f32,
        document_id: Option<&str>,
    ) -> Result<RetrievalResult> {
        if !(0.0..=1.0).contains(&keyword_weight) {
            return Err(RetrievalError::InvalidParameter(format!(
                "keyword_weight must be within [0, 1], got {keyword_weight}"
            )));
        }
        if !self.has_embedder() {
            debug!("No embedding provider, hybrid retrieval uses keywords only");
            return self.retrieve_keyword(query, k, document_id).await;
        }
        if query.trim().is_empty() || k == 0 {
            return Ok(RetrievalResult::new(query)
                .with_metadata("strategy", "hybrid")
                .with_metadata("k", k));
        }

        let mut options = RetrieveOptions::new(k.saturating_mul(2));
        options.document_id = document_id.map(str::to_string);
        let vector = self.retrieve(query, &options).await?;
        let keyword = self.keyword_scores(query, document_id).await;

        let mut fused: HashMap<ChunkId, (TextChunk, f32, f32)> = HashMap::new();
        for retrieved in vector.chunks {
            let score = vector.scores.get(&retrieved.chunk_id).copied().unwrap_or(0.0);
            fused.insert(retrieved.chunk_id, (retrieved.chunk, score, 0.0));
        }
        for (chunk_id, chunk, score) in keyword.into_iter().take(k.saturating_mul(2)) {
            fused
                .entry(chunk_id)
                .or_insert_with(|| (chunk, 0.0, 0.0))
                .2 = score;
        }

        let mut ranked: Vec<(ChunkId, TextChunk, f32)> = fused
            .into_iter()
            .map(|(chunk_id, (chunk, vector_score, keyword_score))| {
                let score = (1.0 - keyword_weight) * vector_score + keyword_weight * keyword_score;
                (chunk_id, chunk, score)
            })
            .collect();
        ranked.sort_by_key(|(chunk_id, _, score)| (std::cmp::Reverse(OrderedFloat(*score)), *chunk_id));

        let mut result = RetrievalResult::new(query)
            .with_metadata("strategy", "hybrid")
            .with_metadata("k", k)
            .with_metadata("keyword_weight", keyword_weight);
        for (chunk_id, chunk, score) in ranked.into_iter().take(k) {
            result.push(chunk_id, chunk, score);
        }
        if let Some(document_id) = document_id {
            result = result.with_metadata("document_id", document_id);
        }
        debug!("Hybrid retrieval returned {} chunks", result.len());
        Ok(result)
    }

    /// Every chunk with a positive keyword score, best first, ties by id.
    async fn keyword_scores(
        &self,
        query: &str,
        document_id: Option<&str>,
    ) -> Vec<(ChunkId, TextChunk, f32)> {
        let terms = keyword_terms(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let index = self.index.read().await;
        let candidates: Vec<(ChunkId, &TextChunk)> = match document_id {
            Some(document_id) => index.get_by_document(document_id),
            None => index.chunks().collect(),
        };
        let mut scored: Vec<(ChunkId, TextChunk, f32)> = candidates
            .into_iter()
            .filter_map(|(chunk_id, chunk)| {
                let score = keyword_score(&terms, &chunk.text);
                (score > 0.0).then(|| (chunk_id, chunk.clone(), score))
            })
            .collect();
        scored.sort_by_key(|(chunk_id, _, score)| (std::cmp::Reverse(OrderedFloat(*score)), *chunk_id));
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use longctx_embeddings::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
    use longctx_index::{BackendKind, IndexConfig};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    /// Embeds by counting the words "red", "green" and "blue".
    struct ColorProvider;

    #[async_trait]
    impl EmbeddingProvider for ColorProvider {
        fn name(&self) -> &str {
            "colors"
        }

        fn default_model(&self) -> &str {
            "colors"
        }

        fn default_dimension(&self) -> usize {
            3
        }

        async fn embed(
            &self,
            request: EmbeddingRequest,
        ) -> longctx_embeddings::Result<EmbeddingResponse> {
            let text = request.text.to_lowercase();
            let count = |word: &str| text.matches(word).count() as f32 + 0.01;
            Ok(EmbeddingResponse {
                embedding: vec![count("red"), count("green"), count("blue")],
                model: "colors".to_string(),
                tokens_used: None,
            })
        }
    }

    async fn fixture(with_embedder: bool) -> Retriever {
        let embedder = Embedder::new(Arc::new(ColorProvider));
        let mut index = VectorIndex::new(IndexConfig::new("test", 3).with_backend(BackendKind::Memory));
        let texts = [
            ("warm", "red red apples"),
            ("cool", "green leaves and blue sky"),
            ("cool", "blue whales in blue water"),
        ];
        for (document, text) in texts {
            let embedding = embedder.embed(text).await.unwrap();
            index
                .add(vec![TextChunk::new(text, 0).with_embedding(embedding)], Some(document))
                .unwrap();
        }
        Retriever::new(
            Arc::new(RwLock::new(index)),
            with_embedder.then_some(embedder),
            RetrieverConfig::default(),
        )
    }

    #[test]
    fn test_keyword_terms_and_score() {
        let terms = keyword_terms("The BLUE, blue sky is up");
        assert_eq!(terms, vec!["the", "blue", "sky"]);
        assert_eq!(keyword_score(&terms, "Blue whales"), 1.0 / 3.0);
        assert_eq!(keyword_score(&[], "anything"), 0.0);
    }

    #[tokio::test]
    async fn test_vector_retrieval_ranks_by_similarity() {
        let retriever = fixture(true).await;
        let result = retriever
            .retrieve("blue", &RetrieveOptions::new(2))
            .await
            .unwrap();

        assert_eq!(result.texts(), vec!["blue whales in blue water", "green leaves and blue sky"]);
        assert_eq!(result.metadata["strategy"], "vector");
    }

    #[tokio::test]
    async fn test_filters_apply_in_order() {
        let retriever = fixture(true).await;
        let options = RetrieveOptions::new(3)
            .with_min_score(0.3)
            .with_filter(|chunk| !chunk.text.contains("whales"));
        let result = retriever.retrieve("blue", &options).await.unwrap();

        assert_eq!(result.texts(), vec!["green leaves and blue sky"]);
    }

    #[tokio::test]
    async fn test_document_scope() {
        let retriever = fixture(true).await;
        let result = retriever
            .retrieve("red", &RetrieveOptions::new(3).with_document("cool"))
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.chunks.iter().all(|c| c.chunk.document_id() == Some("cool")));
        assert_eq!(result.metadata["document_id"], "cool");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_vector_without_embedder_is_empty() {
        let retriever = fixture(false).await;
        let result = retriever
            .retrieve("blue", &RetrieveOptions::new(3))
            .await
            .unwrap();
        assert!(result.is_empty());
        assert!(logs_contain("without an embedding provider"));
    }

    #[tokio::test]
    async fn test_empty_query_is_empty_result() {
        let retriever = fixture(true).await;
        assert!(retriever.retrieve("  ", &RetrieveOptions::new(3)).await.unwrap().is_empty());
        assert!(retriever.retrieve_keyword("", 3, None).await.unwrap().is_empty());
        assert!(retriever.retrieve_hybrid("", 3, 0.5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keyword_retrieval() {
        let retriever = fixture(false).await;
        let result = retriever.retrieve_keyword("blue sky", 5, None).await.unwrap();

        assert_eq!(result.texts(), vec!["green leaves and blue sky", "blue whales in blue water"]);
        assert_eq!(result.score(result.chunk_ids()[0]), 1.0);
        assert_eq!(result.score(result.chunk_ids()[1]), 0.5);
    }

    #[tokio::test]
    async fn test_hybrid_fuses_and_validates_weight() {
        let retriever = fixture(true).await;

        let err = retriever.retrieve_hybrid("blue", 2, 1.5, None).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidParameter(_)));

        let result = retriever.retrieve_hybrid("blue sky", 3, 0.5, None).await.unwrap();
        assert_eq!(result.texts()[0], "green leaves and blue sky");
        assert_eq!(result.metadata["strategy"], "hybrid");

        // Pure keyword weight reproduces keyword scores.
        let keyword_only = retriever.retrieve_hybrid("sky", 3, 1.0, None).await.unwrap();
        assert_eq!(keyword_only.score(keyword_only.chunk_ids()[0]), 1.0);
    }

    #[tokio::test]
    async fn test_hybrid_with_huge_k_returns_every_match() {
        let retriever = fixture(true).await;
        let result = retriever
            .retrieve_hybrid("blue sky", usize::MAX, 0.5, None)
            .await
            .unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.texts()[0], "green leaves and blue sky");
    }

    #[tokio::test]
    async fn test_hybrid_without_embedder_falls_back_to_keywords() {
        let retriever = fixture(false).await;
        let result = retriever.retrieve_hybrid("apples", 3, 0.3, None).await.unwrap();
        assert_eq!(result.texts(), vec!["red red apples"]);
        assert_eq!(result.metadata["strategy"], "keyword");
    }

    #[tokio::test]
    async fn test_multi_query_dedup_and_truncation() {
        let retriever = fixture(true).await;
        let queries = vec!["blue".to_string(), "blue water".to_string(), "red".to_string()];

        let deduped = retriever
            .retrieve_multi_query(&queries, 2, 10, true)
            .await
            .unwrap();
        let mut ids = deduped.chunk_ids();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), deduped.len());

        let with_duplicates = retriever
            .retrieve_multi_query(&queries, 2, 10, false)
            .await
            .unwrap();
        assert!(with_duplicates.len() > deduped.len());

        let truncated = retriever
            .retrieve_multi_query(&queries, 2, 1, true)
            .await
            .unwrap();
        assert_eq!(truncated.len(), 1);
        assert_eq!(truncated.query, "blue");
        assert_eq!(truncated.metadata["queries"], "3");
    }
}
