//! Context manager: document registration, retrieval and the active context.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use longctx_embeddings::{Embedder, EmbeddingCache, EmbeddingProvider};
use longctx_index::chunk::estimate_tokens;
use longctx_index::{BackendKind, ChunkId, Metadata, TextChunk, VectorIndex};
use longctx_text::{
    Chunker, GenerationProvider, Generator, Summarizer, Summary, SummaryOptions, SummaryStyle,
};

use crate::config::ManagerConfig;
use crate::error::{Result, RetrievalError};
use crate::result::RetrievalResult;
use crate::retriever::{Reranker, RetrieveOptions, Retriever};

const DOCUMENTS_FILE: &str = "documents.json";

/// How [`ContextManager::retrieve_context`] finds chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    Vector,
    Keyword,
    #[default]
    Hybrid,
}

impl RetrievalStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Keyword => "keyword",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where [`ContextManager::augment_prompt`] places retrieved context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextPosition {
    #[default]
    Prepend,
    Append,
}

/// The retrieval currently in focus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveContext {
    pub result: RetrievalResult,
    pub summary: Option<Summary>,
    pub updated_at: DateTime<Utc>,
}

/// Active context plus the contexts it replaced, oldest first.
#[derive(Debug, Default)]
struct ContextState {
    active: Option<ActiveContext>,
    history: VecDeque<ActiveContext>,
}

/// Registry entry for one added document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub content_length: usize,
    pub added_at: DateTime<Utc>,
    pub metadata: Metadata,
    pub chunk_count: usize,
    pub chunk_ids: Vec<ChunkId>,
}

/// Options for [`ContextManager::retrieve_context`].
#[derive(Debug, Clone, PartialEq)]
pub struct ContextOptions {
    /// Chunks to retrieve; the manager's `retriever.default_k` when `None`.
    pub k: Option<usize>,
    pub document_id: Option<String>,
    pub strategy: RetrievalStrategy,
    pub update_active_context: bool,
}

impl ContextOptions {
    pub fn new(k: usize) -> Self {
        Self {
            k: Some(k),
            ..Self::default()
        }
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_strategy(mut self, strategy: RetrievalStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_update(mut self, update_active_context: bool) -> Self {
        self.update_active_context = update_active_context;
        self
    }
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            k: None,
            document_id: None,
            strategy: RetrievalStrategy::default(),
            update_active_context: true,
        }
    }
}

/// Options for [`ContextManager::get_active_context_text`].
#[derive(Debug, Clone, PartialEq)]
pub struct ContextTextOptions {
    pub include_summary: bool,
    /// Token budget; the manager's `max_context_tokens` when `None`.
    pub max_tokens: Option<usize>,
    pub separator: String,
    /// Written before each chunk. `{index}` becomes the chunk's 1-based rank.
    pub chunk_prefix: String,
}

impl ContextTextOptions {
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_summary(mut self, include_summary: bool) -> Self {
        self.include_summary = include_summary;
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_chunk_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.chunk_prefix = prefix.into();
        self
    }
}

impl Default for ContextTextOptions {
    fn default() -> Self {
        Self {
            include_summary: true,
            max_tokens: None,
            separator: "\n\n".to_string(),
            chunk_prefix: String::new(),
        }
    }
}

/// Options for [`ContextManager::augment_prompt`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AugmentOptions {
    /// Retrieval query; the prompt itself when `None`.
    pub query: Option<String>,
    pub context: ContextOptions,
    pub position: ContextPosition,
}

impl AugmentOptions {
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_context(mut self, context: ContextOptions) -> Self {
        self.context = context;
        self
    }

    pub fn with_position(mut self, position: ContextPosition) -> Self {
        self.position = position;
        self
    }
}

/// Counts describing a manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerStats {
    pub documents: usize,
    pub chunks: usize,
    pub backend: BackendKind,
    pub history_depth: usize,
    pub has_active_context: bool,
}

/// Owns documents, the vector index, and the active context.
///
/// Provider calls (embedding, generation) always happen before a lock is
/// taken, so readers never wait on a network round trip.
pub struct ContextManager {
    config: ManagerConfig,
    index: Arc<RwLock<VectorIndex>>,
    chunker: Chunker,
    retriever: Retriever,
    embedder: Option<Embedder>,
    generator: Option<Generator>,
    summarizer: Option<Summarizer>,
    documents: RwLock<BTreeMap<String, DocumentRecord>>,
    state: RwLock<ContextState>,
}

impl ContextManager {
    pub fn builder() -> ContextManagerBuilder {
        ContextManagerBuilder::new()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<RwLock<VectorIndex>> {
        &self.index
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Chunk, embed and index `content` under `id`.
    ///
    /// With `chunk == false` the whole content becomes one chunk. Re-adding
    /// an id replaces its registry entry; the chunks indexed the first time
    /// stay in the index.
    pub async fn add_document(
        &self,
        id: &str,
        content: &str,
        metadata: Metadata,
        chunk: bool,
    ) -> Result<Vec<ChunkId>> {
        let chunks = if chunk {
            self.chunker.chunk_text(content, &metadata).await?
        } else {
            let mut single = TextChunk::new(content, 0).with_metadata(metadata.clone());
            if let Some(embedder) = &self.embedder {
                single = single.with_embedding(embedder.embed(content).await?);
            }
            vec![single]
        };

        let chunk_ids = self.index.write().await.add(chunks, Some(id))?;

        let record = DocumentRecord {
            id: id.to_string(),
            content_length: content.len(),
            added_at: Utc::now(),
            metadata,
            chunk_count: chunk_ids.len(),
            chunk_ids: chunk_ids.clone(),
        };
        if let Some(previous) = self.documents.write().await.insert(id.to_string(), record) {
            warn!(
                "Document '{id}' re-added; {} previously indexed chunks are orphaned",
                previous.chunk_count
            );
        }

        info!("Added document '{id}' as {} chunks", chunk_ids.len());
        Ok(chunk_ids)
    }

    /// Retrieve chunks for `query`, optionally making them the active context.
    ///
    /// A non-empty result replaces the active context and pushes the previous
    /// one onto the history. With `auto_summarize` and more than one chunk,
    /// a concise summary is generated first; that call adds its latency to
    /// every context switch.
    pub async fn retrieve_context(
        &self,
        query: &str,
        options: &ContextOptions,
    ) -> Result<RetrievalResult> {
        let k = options.k.unwrap_or(self.config.retriever.default_k);
        let document_id = options.document_id.as_deref();
        let result = match options.strategy {
            RetrievalStrategy::Vector => {
                let mut retrieve = RetrieveOptions::new(k)
                    .with_min_score(self.config.retriever.min_score);
                retrieve.document_id = options.document_id.clone();
                self.retriever.retrieve(query, &retrieve).await?
            }
            RetrievalStrategy::Keyword => {
                self.retriever
                    .retrieve_keyword(query, k, document_id)
                    .await?
            }
            RetrievalStrategy::Hybrid => {
                self.retriever
                    .retrieve_hybrid(
                        query,
                        k,
                        self.config.retriever.keyword_weight,
                        document_id,
                    )
                    .await?
            }
        };

        if options.update_active_context && !result.is_empty() {
            let summary = self.summarize_result(&result).await?;
            self.set_active_context(ActiveContext {
                result: result.clone(),
                summary,
                updated_at: Utc::now(),
            })
            .await;
        }
        Ok(result)
    }

    /// Drop the active context. History is kept.
    pub async fn clear_active_context(&self) {
        self.state.write().await.active = None;
        debug!("Cleared active context");
    }

    pub async fn active_context(&self) -> Option<ActiveContext> {
        self.state.read().await.active.clone()
    }

    /// Previous active contexts, oldest first.
    pub async fn context_history(&self) -> Vec<ActiveContext> {
        self.state.read().await.history.iter().cloned().collect()
    }

    /// Render the active context within a token budget.
    ///
    /// A summary that fits in a quarter of the budget is written first,
    /// followed by the best chunks that fit in what remains. A larger
    /// summary is returned on its own.
    pub async fn get_active_context_text(&self, options: &ContextTextOptions) -> String {
        let state = self.state.read().await;
        let Some(active) = &state.active else {
            return String::new();
        };
        let budget = options.max_tokens.unwrap_or(self.config.max_context_tokens);

        let mut sections = Vec::new();
        let mut remaining = budget;
        if options.include_summary {
            if let Some(summary) = active.summary.as_ref().filter(|s| !s.is_empty()) {
                if estimate_tokens(&summary.text) > budget / 4 {
                    return summary.text.clone();
                }
                let section = format!("Summary: {}", summary.text);
                remaining = budget
                    .saturating_sub(estimate_tokens(&section) + estimate_tokens(&options.separator));
                sections.push(section);
            }
        }

        let chunks = render_chunks(&active.result, remaining, options);
        if !chunks.is_empty() {
            sections.push(chunks);
        }
        sections.join(&options.separator)
    }

    /// Retrieve context for the query (or the prompt itself) and wrap the
    /// prompt with it.
    ///
    /// Returns the prompt unchanged when nothing is found. The active
    /// context is only replaced when `options.context.update_active_context`
    /// is set.
    pub async fn augment_prompt(&self, prompt: &str, options: &AugmentOptions) -> Result<String> {
        let query = options.query.as_deref().unwrap_or(prompt);
        let result = self.retrieve_context(query, &options.context).await?;
        if result.is_empty() {
            debug!("No context found, prompt left unchanged");
            return Ok(prompt.to_string());
        }

        let context = render_chunks(
            &result,
            self.config.max_context_tokens,
            &ContextTextOptions::default(),
        );
        Ok(match options.position {
            ContextPosition::Prepend => format!("Relevant context:\n{context}\n\n{prompt}"),
            ContextPosition::Append => format!("{prompt}\n\nRelevant context:\n{context}"),
        })
    }

    /// Ask the language model for up to `num_variations` rephrasings of
    /// `query`.
    ///
    /// The original query always comes first. Only numbered or bulleted
    /// lines of the reply count as variations; with no generation provider,
    /// or nothing parseable, the result is just `[query]`.
    pub async fn expand_query(&self, query: &str, num_variations: usize) -> Result<Vec<String>> {
        let mut queries = vec![query.to_string()];
        if num_variations == 0 {
            return Ok(queries);
        }
        let Some(generator) = &self.generator else {
            warn!("Query expansion requested without a generation provider");
            return Ok(queries);
        };

        let prompt = format!(
            "Generate {num_variations} alternative phrasings of the following search query. \
             Return one per line as a numbered list.\n\nQuery: {query}\n\nAlternatives:"
        );
        let reply = generator.generate(&prompt).await?;

        for variation in reply.lines().filter_map(parse_list_item) {
            if queries.len() > num_variations {
                break;
            }
            if !queries.iter().any(|q| q.eq_ignore_ascii_case(&variation)) {
                queries.push(variation);
            }
        }
        debug!("Expanded query into {} variants", queries.len());
        Ok(queries)
    }

    /// Expand `query`, then merge vector retrievals for every variant.
    pub async fn retrieve_expanded(
        &self,
        query: &str,
        num_variations: usize,
        k: usize,
    ) -> Result<RetrievalResult> {
        let queries = self.expand_query(query, num_variations).await?;
        self.retriever
            .retrieve_multi_query(&queries, k, k, self.config.retriever.deduplicate)
            .await
    }

    /// Shorten `query` to at most `max_query_length` bytes.
    ///
    /// With `summarize` and a generation provider the query is summarized;
    /// otherwise it is cut at the last word boundary that fits.
    pub async fn handle_long_query(
        &self,
        query: &str,
        max_query_length: usize,
        summarize: bool,
    ) -> Result<String> {
        if query.len() <= max_query_length {
            return Ok(query.to_string());
        }
        if summarize {
            if let Some(summarizer) = &self.summarizer {
                let options = SummaryOptions::default()
                    .with_max_length(max_query_length)
                    .with_style(SummaryStyle::Concise);
                let summary = summarizer.summarize(query, &options).await?;
                return Ok(truncate_at_word(&summary.text, max_query_length).to_string());
            }
            debug!("No generation provider, truncating long query instead");
        }
        Ok(truncate_at_word(query, max_query_length).to_string())
    }

    pub async fn document(&self, id: &str) -> Option<DocumentRecord> {
        self.documents.read().await.get(id).cloned()
    }

    /// Every registered document, ordered by id.
    pub async fn documents(&self) -> Vec<DocumentRecord> {
        self.documents.read().await.values().cloned().collect()
    }

    pub async fn stats(&self) -> ManagerStats {
        let documents = self.documents.read().await.len();
        let (chunks, backend) = {
            let index = self.index.read().await;
            (index.len(), index.backend_kind())
        };
        let state = self.state.read().await;
        ManagerStats {
            documents,
            chunks,
            backend,
            history_depth: state.history.len(),
            has_active_context: state.active.is_some(),
        }
    }

    /// Write the document registry and the index to `storage_dir`.
    ///
    /// The active context and its history are not saved.
    pub async fn save(&self) -> Result<()> {
        let dir = &self.config.storage_dir;
        tokio::fs::create_dir_all(dir).await?;

        let registry = serde_json::to_string_pretty(&*self.documents.read().await)?;
        let tmp = dir.join(format!("{DOCUMENTS_FILE}.tmp"));
        tokio::fs::write(&tmp, registry).await?;
        tokio::fs::rename(&tmp, self.documents_path()).await?;

        self.index.read().await.save(dir).await?;
        info!("Saved context manager state to {}", dir.display());
        Ok(())
    }

    /// Replace the registry and index with what `storage_dir` holds.
    ///
    /// A directory that was never saved to loads as empty. The active
    /// context and history are cleared.
    pub async fn load(&self) -> Result<()> {
        let dir = &self.config.storage_dir;
        let registry: BTreeMap<String, DocumentRecord> =
            match tokio::fs::read_to_string(self.documents_path()).await {
                Ok(content) => serde_json::from_str(&content)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
                Err(e) => return Err(e.into()),
            };

        let mut index = VectorIndex::load(self.config.index.clone(), dir).await?;
        index.set_embedder(self.embedder.clone());

        let (documents, chunks) = (registry.len(), index.len());
        *self.index.write().await = index;
        *self.documents.write().await = registry;
        *self.state.write().await = ContextState::default();

        info!(
            "Loaded {documents} documents ({chunks} chunks) from {}",
            dir.display()
        );
        Ok(())
    }

    fn documents_path(&self) -> PathBuf {
        self.config.storage_dir.join(DOCUMENTS_FILE)
    }

    async fn summarize_result(&self, result: &RetrievalResult) -> Result<Option<Summary>> {
        if !self.config.auto_summarize || result.len() <= 1 {
            return Ok(None);
        }
        let Some(summarizer) = &self.summarizer else {
            debug!("Auto-summarize enabled without a generation provider");
            return Ok(None);
        };

        // max_length is in bytes; at ~4 bytes per token this is a quarter
        // of the token budget.
        let options = SummaryOptions::default()
            .with_max_length(self.config.max_context_tokens)
            .with_style(SummaryStyle::Concise);
        let chunks: Vec<TextChunk> = result.chunks.iter().map(|c| c.chunk.clone()).collect();
        Ok(Some(summarizer.summarize_chunks(&chunks, &options).await?))
    }

    async fn set_active_context(&self, context: ActiveContext) {
        let mut state = self.state.write().await;
        if let Some(previous) = state.active.replace(context) {
            state.history.push_back(previous);
        }
        while state.history.len() > self.config.history_size {
            state.history.pop_front();
        }
        debug!("Active context updated ({} in history)", state.history.len());
    }
}

/// Best chunks of `result` that fit in `max_tokens`, ranked and prefixed.
/// Best-first chunks whose rendered form fits in `max_tokens`, counting
/// prefixes and separators. A chunk that does not fit is skipped.
fn render_chunks(result: &RetrievalResult, max_tokens: usize, options: &ContextTextOptions) -> String {
    let separator_tokens = estimate_tokens(&options.separator);
    let mut used = 0;
    let mut rendered: Vec<String> = Vec::new();
    for retrieved in result.sorted_by_score().chunks {
        let prefix = options
            .chunk_prefix
            .replace("{index}", &(rendered.len() + 1).to_string());
        let entry = format!("{prefix}{}", retrieved.chunk.text);
        let mut cost = estimate_tokens(&entry);
        if !rendered.is_empty() {
            cost += separator_tokens;
        }
        if used + cost <= max_tokens {
            used += cost;
            rendered.push(entry);
        }
    }
    rendered.join(&options.separator)
}

/// The text of a numbered (`1.`, `2)`) or bulleted (`-`, `*`, `•`) line.
fn parse_list_item(line: &str) -> Option<String> {
    let line = line.trim();
    let rest = if let Some(rest) = ["-", "*", "•"].iter().find_map(|b| line.strip_prefix(b)) {
        rest
    } else {
        let digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
        if digits.len() == line.len() {
            return None;
        }
        digits.strip_prefix('.').or_else(|| digits.strip_prefix(')'))?
    };

    let item = rest.trim().trim_matches('"').trim();
    (!item.is_empty()).then(|| item.to_string())
}

/// Longest prefix of `text` within `max_len` bytes ending at a word boundary.
fn truncate_at_word(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let head = &text[..cut];
    match head.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => head[..pos].trim_end(),
        _ => head,
    }
}

/// Builder for [`ContextManager`].
#[derive(Default)]
pub struct ContextManagerBuilder {
    config: ManagerConfig,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    cache: Option<Arc<EmbeddingCache>>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl ContextManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = dir.into();
        self
    }

    pub fn with_embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn with_generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    pub fn with_embedding_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build the manager with an empty index. Call
    /// [`ContextManager::load`] to restore saved state.
    pub fn build(self) -> Result<ContextManager> {
        let config = self.config;
        let deadline = config.provider_timeout();

        let embedder = self.embedding_provider.map(|provider| {
            let mut embedder = Embedder::new(provider);
            if let Some(cache) = self.cache {
                embedder = embedder.with_cache(cache);
            }
            if let Some(deadline) = deadline {
                embedder = embedder.with_deadline(deadline);
            }
            embedder
        });
        if let Some(embedder) = &embedder {
            if embedder.dimension() != config.index.dimension {
                return Err(RetrievalError::Config(format!(
                    "embedding provider '{}' produces {}-dimensional vectors, index expects {}",
                    embedder.provider_name(),
                    embedder.dimension(),
                    config.index.dimension
                )));
            }
        }

        let generator = self.generation_provider.map(|provider| {
            let generator = Generator::new(provider);
            match deadline {
                Some(deadline) => generator.with_deadline(deadline),
                None => generator,
            }
        });
        let summarizer = match &generator {
            Some(generator) => Some(Summarizer::new(generator.clone(), config.summarizer.clone())?),
            None => None,
        };

        let mut chunker = Chunker::new(config.chunker.clone())?;
        let mut index = VectorIndex::new(config.index.clone());
        if let Some(embedder) = &embedder {
            chunker = chunker.with_embedder(embedder.clone());
            index = index.with_embedder(embedder.clone());
        }
        let index = Arc::new(RwLock::new(index));

        let mut retriever = Retriever::new(index.clone(), embedder.clone(), config.retriever.clone());
        if let Some(reranker) = self.reranker {
            retriever = retriever.with_reranker(reranker);
        }

        info!(
            "Context manager ready (embeddings: {}, generation: {})",
            embedder.as_ref().map_or("none", Embedder::provider_name),
            generator.as_ref().map_or("none", Generator::provider_name)
        );
        Ok(ContextManager {
            config,
            index,
            chunker,
            retriever,
            embedder,
            generator,
            summarizer,
            documents: RwLock::new(BTreeMap::new()),
            state: RwLock::new(ContextState::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_list_item() {
        assert_eq!(parse_list_item("1. first one"), Some("first one".to_string()));
        assert_eq!(parse_list_item("  12) \"quoted\" "), Some("quoted".to_string()));
        assert_eq!(parse_list_item("- bullet"), Some("bullet".to_string()));
        assert_eq!(parse_list_item("• dot"), Some("dot".to_string()));
        assert_eq!(parse_list_item("Here are some options:"), None);
        assert_eq!(parse_list_item("2024 was a year"), None);
        assert_eq!(parse_list_item("3."), None);
    }

    #[test]
    fn test_truncate_at_word() {
        assert_eq!(truncate_at_word("short", 10), "short");
        assert_eq!(truncate_at_word("the quick brown fox", 12), "the quick");
        assert_eq!(truncate_at_word("unbreakable", 5), "unbre");
        assert_eq!(truncate_at_word("ééé", 3), "é");
    }

    #[test]
    fn test_render_chunks_prefix_and_budget() {
        let mut result = RetrievalResult::new("q");
        result.push(1, TextChunk::new("low", 0), 0.1);
        result.push(2, TextChunk::new("high", 0), 0.9);
        let options = ContextTextOptions::default()
            .with_chunk_prefix("[{index}] ")
            .with_separator("\n");

        assert_eq!(render_chunks(&result, 100, &options), "[1] high\n[2] low");
        // "[1] high" is two tokens and the separator adds one more.
        assert_eq!(render_chunks(&result, 2, &options), "[1] high");
        assert_eq!(render_chunks(&result, 4, &options), "[1] high");
        assert_eq!(render_chunks(&result, 5, &options), "[1] high\n[2] low");
        assert_eq!(render_chunks(&result, 1, &options), "");
        assert_eq!(render_chunks(&result, 0, &options), "");
    }

    #[test]
    fn test_builder_rejects_dimension_mismatch() {
        use async_trait::async_trait;
        use longctx_embeddings::{EmbeddingRequest, EmbeddingResponse};

        struct Tiny;

        #[async_trait]
        impl EmbeddingProvider for Tiny {
            fn name(&self) -> &str {
                "tiny"
            }

            fn default_model(&self) -> &str {
                "tiny"
            }

            fn default_dimension(&self) -> usize {
                2
            }

            async fn embed(
                &self,
                _request: EmbeddingRequest,
            ) -> longctx_embeddings::Result<EmbeddingResponse> {
                Ok(EmbeddingResponse {
                    embedding: vec![1.0, 0.0],
                    model: "tiny".to_string(),
                    tokens_used: None,
                })
            }
        }

        let err = ContextManager::builder()
            .with_storage_dir(std::env::temp_dir())
            .with_embedding_provider(Arc::new(Tiny))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RetrievalError::Config(_)));
    }
}
