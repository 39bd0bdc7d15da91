//! Brute-force cosine backend. Always available; the fallback for every
//! other variant.

use serde::{Deserialize, Serialize};

use longctx_embeddings::similarity::top_k_by_cosine;

use super::{BackendKind, VectorBackend, check_dimension};
use crate::chunk::ChunkId;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryBackend {
    dimension: usize,
    entries: Vec<(ChunkId, Vec<f32>)>,
}

impl MemoryBackend {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
        }
    }
}

impl VectorBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn insert(&mut self, id: ChunkId, vector: &[f32]) -> Result<()> {
        check_dimension(self.dimension, vector)?;
        self.entries.push((id, vector.to_vec()));
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>> {
        check_dimension(self.dimension, query)?;
        let candidates = self.entries.iter().map(|(id, v)| (*id, v.as_slice()));
        Ok(top_k_by_cosine(query, candidates, k)?)
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}
