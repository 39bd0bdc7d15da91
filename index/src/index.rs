//! The vector index: chunk registry, document map and backend in lockstep.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use longctx_embeddings::{DEFAULT_DIMENSION, Embedder};

use crate::backend::{
    BackendKind, TreeConfig, VectorBackend, check_dimension, create_backend, decode_backend,
};
use crate::chunk::{ChunkId, DOCUMENT_ID_KEY, TextChunk};
use crate::error::{IndexError, Result};

/// Configuration for a [`VectorIndex`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Name used for the persisted files (`{name}.meta`, ...).
    pub name: String,

    /// Embedding dimension every stored and query vector must have.
    pub dimension: usize,

    /// Preferred backend. Falls back to memory if not compiled in.
    pub backend: BackendKind,

    /// Tree backend tuning.
    pub tree: TreeConfig,
}

impl IndexConfig {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            ..Self::default()
        }
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_tree(mut self, tree: TreeConfig) -> Self {
        self.tree = tree;
        self
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: "longctx".to_string(),
            dimension: DEFAULT_DIMENSION,
            backend: BackendKind::Flat,
            tree: TreeConfig::default(),
        }
    }
}

/// Descriptive metadata persisted as `{name}.meta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub name: String,
    pub document_count: usize,
    pub chunk_count: usize,
    pub dimension: usize,
    /// Backend actually in use (after any fallback).
    pub backend: BackendKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk_id: ChunkId,
    /// Similarity, higher is better, whatever the backend.
    pub score: f32,
    pub chunk: TextChunk,
}

/// Backend-agnostic similarity store.
///
/// Chunk ids are assigned here, globally and monotonically: every `add`
/// continues from `max(existing) + 1`, so ids are never reused across
/// documents. Re-adding a document appends new chunks; earlier chunks stay
/// searchable.
pub struct VectorIndex {
    config: IndexConfig,
    metadata: IndexMetadata,
    backend: Box<dyn VectorBackend>,
    chunks: BTreeMap<ChunkId, TextChunk>,
    documents: BTreeMap<String, Vec<ChunkId>>,
    next_id: ChunkId,
    embedder: Option<Embedder>,
}

impl VectorIndex {
    /// Create an empty index, selecting the configured backend or its fallback.
    pub fn new(config: IndexConfig) -> Self {
        let (backend, kind) = create_backend(config.backend, config.dimension, &config.tree);
        info!(
            "Created index '{}' with {kind} backend (dimension {})",
            config.name, config.dimension
        );

        let now = Utc::now();
        let metadata = IndexMetadata {
            name: config.name.clone(),
            document_count: 0,
            chunk_count: 0,
            dimension: config.dimension,
            backend: kind,
            created_at: now,
            updated_at: now,
        };

        Self {
            config,
            metadata,
            backend,
            chunks: BTreeMap::new(),
            documents: BTreeMap::new(),
            next_id: 0,
            embedder: None,
        }
    }

    /// Attach an embedder, enabling [`search_by_text`](Self::search_by_text)
    /// and [`embed_and_add`](Self::embed_and_add).
    pub fn with_embedder(mut self, embedder: Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn set_embedder(&mut self, embedder: Option<Embedder>) {
        self.embedder = embedder;
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    /// The backend actually in use.
    pub fn backend_kind(&self) -> BackendKind {
        self.metadata.backend
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Index `chunks`, optionally under `document_id`.
    ///
    /// Chunks without an embedding are skipped with a warning, so the
    /// returned id list may be shorter than the input. Ids are strictly
    /// increasing in input order. A dimension mismatch rejects the whole
    /// batch before anything is stored.
    pub fn add(&mut self, chunks: Vec<TextChunk>, document_id: Option<&str>) -> Result<Vec<ChunkId>> {
        let input_count = chunks.len();
        let mut embedded = Vec::with_capacity(input_count);
        for chunk in chunks {
            match &chunk.embedding {
                Some(embedding) => {
                    check_dimension(self.config.dimension, embedding)?;
                    embedded.push(chunk);
                }
                None => warn!(
                    "Skipping chunk {} ({} chars) without an embedding",
                    chunk.index,
                    chunk.len()
                ),
            }
        }

        let mut ids = Vec::with_capacity(embedded.len());
        for mut chunk in embedded {
            let id = self.next_id;
            if let Some(embedding) = &chunk.embedding {
                self.backend.insert(id, embedding)?;
            }
            if let Some(document_id) = document_id {
                chunk
                    .metadata
                    .entry(DOCUMENT_ID_KEY.to_string())
                    .or_insert_with(|| document_id.to_string());
            }
            self.chunks.insert(id, chunk);
            self.next_id += 1;
            ids.push(id);
        }
        self.backend.commit();

        if let Some(document_id) = document_id {
            self.documents
                .entry(document_id.to_string())
                .or_default()
                .extend(ids.iter().copied());
        }
        self.touch();

        debug!(
            "Indexed {} of {input_count} chunks (document: {document_id:?})",
            ids.len()
        );
        Ok(ids)
    }

    /// Embed chunks that lack an embedding, then [`add`](Self::add) them.
    ///
    /// Without an embedder this is plain `add`, so unembedded chunks are
    /// skipped.
    pub async fn embed_and_add(
        &mut self,
        chunks: Vec<TextChunk>,
        document_id: Option<&str>,
    ) -> Result<Vec<ChunkId>> {
        let Some(embedder) = self.embedder.clone() else {
            return self.add(chunks, document_id);
        };

        let mut prepared = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.embedding.is_some() {
                prepared.push(chunk);
            } else {
                let embedding = embedder.embed(&chunk.text).await?;
                prepared.push(chunk.with_embedding(embedding));
            }
        }
        self.add(prepared, document_id)
    }

    /// Rank stored chunks by similarity to `query`.
    ///
    /// With `document_id`, tree and flat backends over-fetch `2k` candidates
    /// and filter afterwards, so a small document can yield fewer than `k`
    /// hits even when it holds more chunks. The memory backend scans every
    /// vector and filters exactly.
    pub fn search(&self, query: &[f32], k: usize, document_id: Option<&str>) -> Result<Vec<SearchHit>> {
        check_dimension(self.config.dimension, query)?;
        if k == 0 || self.backend.is_empty() {
            return Ok(Vec::new());
        }

        let raw = match document_id {
            None => self.backend.search(query, k)?,
            Some(_) if self.backend_kind() == BackendKind::Memory => {
                self.backend.search(query, self.backend.len())?
            }
            Some(_) => self.backend.search(query, k.saturating_mul(2))?,
        };

        let hits = raw
            .into_iter()
            .filter_map(|(chunk_id, score)| {
                let chunk = self.chunks.get(&chunk_id)?;
                Some(SearchHit {
                    chunk_id,
                    score,
                    chunk: chunk.clone(),
                })
            })
            .filter(|hit| document_id.is_none_or(|doc| self.belongs_to(hit.chunk_id, doc)))
            .take(k)
            .collect();
        Ok(hits)
    }

    /// Embed `text` and [`search`](Self::search) with it.
    ///
    /// Fails with [`IndexError::ProviderNotConfigured`] when no embedder is
    /// attached.
    pub async fn search_by_text(
        &self,
        text: &str,
        k: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or(IndexError::ProviderNotConfigured)?;
        let query = embedder.embed(text).await?;
        self.search(&query, k, document_id)
    }

    pub fn get(&self, chunk_id: ChunkId) -> Option<&TextChunk> {
        self.chunks.get(&chunk_id)
    }

    /// Every chunk added under `document_id`, in id order.
    pub fn get_by_document(&self, document_id: &str) -> Vec<(ChunkId, &TextChunk)> {
        self.documents
            .get(document_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.chunks.get(id).map(|chunk| (*id, chunk)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Iterate over all stored chunks in id order.
    pub fn chunks(&self) -> impl Iterator<Item = (ChunkId, &TextChunk)> {
        self.chunks.iter().map(|(id, chunk)| (*id, chunk))
    }

    pub fn document_ids(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    fn belongs_to(&self, chunk_id: ChunkId, document_id: &str) -> bool {
        self.documents
            .get(document_id)
            .is_some_and(|ids| ids.binary_search(&chunk_id).is_ok())
    }

    fn touch(&mut self) {
        self.metadata.document_count = self.documents.len();
        self.metadata.chunk_count = self.chunks.len();
        self.metadata.updated_at = Utc::now();
    }

    fn file(&self, dir: &Path, extension: &str) -> PathBuf {
        dir.join(format!("{}.{extension}", self.config.name))
    }

    /// Persist metadata, chunks, document map and backend artifact to `dir`.
    pub async fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await?;

        write_atomic(&self.file(dir, "meta"), serde_json::to_vec_pretty(&self.metadata)?).await?;
        write_atomic(&self.file(dir, "chunks"), bincode::serialize(&self.chunks)?).await?;
        write_atomic(&self.file(dir, "docids"), bincode::serialize(&self.documents)?).await?;
        write_atomic(
            &self.file(dir, self.backend_kind().artifact_extension()),
            self.backend.to_bytes()?,
        )
        .await?;

        info!(
            "Saved index '{}' ({} chunks, {} documents) to {}",
            self.config.name,
            self.chunks.len(),
            self.documents.len(),
            dir.display()
        );
        Ok(())
    }

    /// Load an index previously saved to `dir`.
    ///
    /// A directory without `{name}.meta` yields an empty index. A backend
    /// artifact that is missing, undecodable, not compiled in, or holds a
    /// different number of vectors than the saved chunks is rebuilt from the
    /// stored chunk embeddings. Damaged metadata, chunk or document files
    /// still fail the load.
    pub async fn load(config: IndexConfig, dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut index = Self::new(config);

        let meta_path = index.file(dir, "meta");
        if !fs::try_exists(&meta_path).await? {
            info!("No saved index at {}, starting empty", meta_path.display());
            return Ok(index);
        }

        let metadata: IndexMetadata = serde_json::from_slice(&fs::read(&meta_path).await?)?;
        if metadata.dimension != index.config.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: index.config.dimension,
                actual: metadata.dimension,
            });
        }
        let chunks: BTreeMap<ChunkId, TextChunk> =
            bincode::deserialize(&fs::read(index.file(dir, "chunks")).await?)?;
        let documents: BTreeMap<String, Vec<ChunkId>> =
            bincode::deserialize(&fs::read(index.file(dir, "docids")).await?)?;

        let artifact = index.file(dir, metadata.backend.artifact_extension());
        let restored = if fs::try_exists(&artifact).await? {
            match decode_backend(metadata.backend, &fs::read(&artifact).await?) {
                Ok(Some(backend)) if backend.len() != chunks.len() => {
                    warn!(
                        "Backend artifact {} holds {} vectors but {} chunks were saved",
                        artifact.display(),
                        backend.len(),
                        chunks.len()
                    );
                    None
                }
                Ok(restored) => restored,
                Err(err) => {
                    warn!("Backend artifact {} is unreadable: {err}", artifact.display());
                    None
                }
            }
        } else {
            warn!("Backend artifact {} is missing", artifact.display());
            None
        };

        match restored {
            Some(backend) => {
                index.backend = backend;
                index.metadata.backend = metadata.backend;
            }
            None => {
                warn!(
                    "Rebuilding {} backend from {} stored chunks",
                    index.backend_kind(),
                    chunks.len()
                );
                for (id, chunk) in &chunks {
                    if let Some(embedding) = &chunk.embedding {
                        index.backend.insert(*id, embedding)?;
                    }
                }
                index.backend.commit();
            }
        }

        index.next_id = chunks.keys().next_back().map_or(0, |last| last + 1);
        index.chunks = chunks;
        index.documents = documents;
        index.metadata.created_at = metadata.created_at;
        index.metadata.updated_at = metadata.updated_at;
        index.metadata.document_count = index.documents.len();
        index.metadata.chunk_count = index.chunks.len();

        info!(
            "Loaded index '{}' ({} chunks, {} documents, {} backend)",
            index.config.name,
            index.chunks.len(),
            index.documents.len(),
            index.backend_kind()
        );
        Ok(index)
    }
}

async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<()> {
    let tmp = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or_default()
    ));
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
