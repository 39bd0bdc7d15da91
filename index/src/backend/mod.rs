//! Pluggable similarity-search backends.
//!
//! Three interchangeable variants sit behind [`VectorBackend`]:
//!
//! | kind | search | compiled with |
//! |------|--------|---------------|
//! | [`BackendKind::Flat`] | exact squared-L2 scan | feature `flat` |
//! | [`BackendKind::Tree`] | random-projection forest (approximate) | feature `tree` |
//! | [`BackendKind::Memory`] | brute-force cosine | always |
//!
//! Every backend returns similarity-like scores (higher is better). The flat
//! backend measures distance internally and converts at this boundary, so
//! callers never see backend-specific score semantics.

#[cfg(feature = "flat")]
mod flat;
mod memory;
#[cfg(feature = "tree")]
mod tree;

#[cfg(feature = "flat")]
pub use flat::FlatBackend;
pub use memory::MemoryBackend;
#[cfg(feature = "tree")]
pub use tree::TreeBackend;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chunk::ChunkId;
use crate::error::{IndexError, Result};

/// Which backend variant an index uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Exact search over all vectors by euclidean distance.
    Flat,
    /// Approximate search over a forest of random-projection trees.
    Tree,
    /// Brute-force cosine similarity over all vectors.
    Memory,
}

impl BackendKind {
    /// Whether this variant was compiled into the crate.
    pub fn is_available(self) -> bool {
        match self {
            BackendKind::Flat => cfg!(feature = "flat"),
            BackendKind::Tree => cfg!(feature = "tree"),
            BackendKind::Memory => true,
        }
    }

    /// File extension of the persisted backend artifact.
    pub fn artifact_extension(self) -> &'static str {
        match self {
            BackendKind::Flat => "flat",
            BackendKind::Tree => "tree",
            BackendKind::Memory => "mem",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Flat => "flat",
            BackendKind::Tree => "tree",
            BackendKind::Memory => "memory",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tuning for the tree backend. Ignored by the other variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Number of trees in the forest. More trees, better recall.
    pub n_trees: usize,

    /// Maximum items per leaf.
    pub leaf_size: usize,

    /// Seed for hyperplane selection; identical inserts build identical trees.
    pub seed: u64,

    /// Candidates to collect per search. Defaults to `k * n_trees`.
    pub search_k: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            n_trees: 10,
            leaf_size: 16,
            seed: 42,
            search_k: None,
        }
    }
}

/// A similarity structure keyed by [`ChunkId`].
///
/// Backends only see ids and vectors; the chunk text and document mapping
/// live in [`VectorIndex`](crate::VectorIndex).
pub trait VectorBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn dimension(&self) -> usize;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `vector` under `id`.
    fn insert(&mut self, id: ChunkId, vector: &[f32]) -> Result<()>;

    /// Finish a batch of inserts. Backends with derived structures rebuild
    /// them here.
    fn commit(&mut self) {}

    /// Return up to `k` `(id, similarity)` pairs, best first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>>;

    /// Serialize the backend state for its artifact file.
    fn to_bytes(&self) -> Result<Vec<u8>>;
}

/// Build a backend of the preferred kind, falling back to
/// [`BackendKind::Memory`] when that kind is not compiled in.
///
/// Returns the backend together with the kind actually selected.
#[cfg_attr(not(feature = "tree"), allow(unused_variables))]
pub fn create_backend(
    preferred: BackendKind,
    dimension: usize,
    tree: &TreeConfig,
) -> (Box<dyn VectorBackend>, BackendKind) {
    match preferred {
        #[cfg(feature = "flat")]
        BackendKind::Flat => return (Box::new(FlatBackend::new(dimension)), BackendKind::Flat),
        #[cfg(feature = "tree")]
        BackendKind::Tree => {
            return (
                Box::new(TreeBackend::new(dimension, tree.clone())),
                BackendKind::Tree,
            );
        }
        BackendKind::Memory => {}
        #[allow(unreachable_patterns)]
        _ => warn!("{preferred} backend is not compiled in, falling back to memory backend"),
    }
    info!("Using memory backend (dimension {dimension})");
    (Box::new(MemoryBackend::new(dimension)), BackendKind::Memory)
}

/// Restore a backend from its artifact bytes.
///
/// Returns `Ok(None)` when `kind` is not compiled in; the caller rebuilds
/// from stored vectors instead.
pub fn decode_backend(kind: BackendKind, bytes: &[u8]) -> Result<Option<Box<dyn VectorBackend>>> {
    let backend: Box<dyn VectorBackend> = match kind {
        #[cfg(feature = "flat")]
        BackendKind::Flat => Box::new(bincode::deserialize::<FlatBackend>(bytes)?),
        #[cfg(feature = "tree")]
        BackendKind::Tree => Box::new(bincode::deserialize::<TreeBackend>(bytes)?),
        BackendKind::Memory => Box::new(bincode::deserialize::<MemoryBackend>(bytes)?),
        #[allow(unreachable_patterns)]
        _ => return Ok(None),
    };
    Ok(Some(backend))
}

pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(IndexError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}
