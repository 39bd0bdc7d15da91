//! Exact euclidean backend.
//!
//! Vectors are stored row-major in one contiguous buffer and scanned in full
//! for every query. Distances are converted to `1 / (1 + d²)` before they
//! leave the backend.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use longctx_embeddings::squared_euclidean_distance;

use super::{BackendKind, VectorBackend, check_dimension};
use crate::chunk::ChunkId;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatBackend {
    dimension: usize,
    ids: Vec<ChunkId>,
    data: Vec<f32>,
}

impl FlatBackend {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ids: Vec::new(),
            data: Vec::new(),
        }
    }

    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.data[start..start + self.dimension]
    }
}

/// Map a squared distance onto (0, 1], larger meaning closer.
fn distance_to_similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

impl VectorBackend for FlatBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Flat
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn insert(&mut self, id: ChunkId, vector: &[f32]) -> Result<()> {
        check_dimension(self.dimension, vector)?;
        self.ids.push(id);
        self.data.extend_from_slice(vector);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>> {
        check_dimension(self.dimension, query)?;

        let mut distances = Vec::with_capacity(self.ids.len());
        for (position, id) in self.ids.iter().enumerate() {
            let distance = squared_euclidean_distance(query, self.row(position))?;
            distances.push((OrderedFloat(distance), *id));
        }
        // Smallest distance first; stable so equal distances keep insert order.
        distances.sort_by_key(|(distance, _)| *distance);

        Ok(distances
            .into_iter()
            .take(k)
            .map(|(distance, id)| (id, distance_to_similarity(distance.0)))
            .collect())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}
