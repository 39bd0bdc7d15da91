//! Approximate backend built from a forest of random-projection trees.
//!
//! Each tree recursively splits the stored vectors by a hyperplane placed
//! halfway between two randomly chosen items, until a node holds at most
//! `leaf_size` items. A query walks all trees at once, always expanding the
//! node whose hyperplane margin is most favourable, until `search_k`
//! candidates are collected; candidates are then re-scored by exact cosine.
//!
//! The forest is rebuilt on [`commit`](VectorBackend::commit). Items inserted
//! after the last build are scanned exhaustively so they are never missed.

use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use longctx_embeddings::similarity::{normalize, top_k_by_cosine};

use super::{BackendKind, TreeConfig, VectorBackend, check_dimension};
use crate::chunk::ChunkId;
use crate::error::Result;

/// Depth past which a node becomes a leaf regardless of size.
const MAX_DEPTH: usize = 48;

/// Attempts at finding two distinct items before splitting arbitrarily.
const SPLIT_ATTEMPTS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf(Vec<usize>),
    Split {
        normal: Vec<f32>,
        offset: f32,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeBackend {
    dimension: usize,
    config: TreeConfig,
    ids: Vec<ChunkId>,
    /// Unit-length copies of the inserted vectors.
    vectors: Vec<Vec<f32>>,
    nodes: Vec<Node>,
    roots: Vec<usize>,
    /// Number of items covered by the current forest.
    built: usize,
}

impl TreeBackend {
    pub fn new(dimension: usize, config: TreeConfig) -> Self {
        Self {
            dimension,
            config,
            ids: Vec::new(),
            vectors: Vec::new(),
            nodes: Vec::new(),
            roots: Vec::new(),
            built: 0,
        }
    }

    fn build(&mut self) {
        self.nodes.clear();
        self.roots.clear();

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let all: Vec<usize> = (0..self.vectors.len()).collect();
        for _ in 0..self.config.n_trees.max(1) {
            let root = self.build_node(all.clone(), 0, &mut rng);
            self.roots.push(root);
        }
        self.built = self.vectors.len();
        debug!(
            "Built {} trees over {} items ({} nodes)",
            self.roots.len(),
            self.built,
            self.nodes.len()
        );
    }

    fn build_node(&mut self, items: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        if items.len() <= self.config.leaf_size.max(1) || depth >= MAX_DEPTH {
            self.nodes.push(Node::Leaf(items));
            return self.nodes.len() - 1;
        }

        let (normal, offset) = self.pick_hyperplane(&items, rng);
        let (mut left, mut right): (Vec<usize>, Vec<usize>) = items
            .iter()
            .partition(|&&item| margin(&normal, offset, &self.vectors[item]) <= 0.0);

        // Duplicates or a degenerate plane: split arbitrarily so recursion
        // always shrinks.
        if left.is_empty() || right.is_empty() {
            let (even, odd): (Vec<(usize, usize)>, Vec<(usize, usize)>) =
                items.iter().copied().enumerate().partition(|(i, _)| i % 2 == 0);
            left = even.into_iter().map(|(_, item)| item).collect();
            right = odd.into_iter().map(|(_, item)| item).collect();
        }

        let left = self.build_node(left, depth + 1, rng);
        let right = self.build_node(right, depth + 1, rng);
        self.nodes.push(Node::Split {
            normal,
            offset,
            left,
            right,
        });
        self.nodes.len() - 1
    }

    fn pick_hyperplane(&self, items: &[usize], rng: &mut StdRng) -> (Vec<f32>, f32) {
        for _ in 0..SPLIT_ATTEMPTS {
            let a = items[rng.random_range(0..items.len())];
            let b = items[rng.random_range(0..items.len())];
            if a == b {
                continue;
            }
            let (va, vb) = (&self.vectors[a], &self.vectors[b]);
            let normal: Vec<f32> = va.iter().zip(vb).map(|(x, y)| x - y).collect();
            if normal.iter().all(|x| *x == 0.0) {
                continue;
            }
            let midpoint: Vec<f32> = va.iter().zip(vb).map(|(x, y)| (x + y) / 2.0).collect();
            let offset = dot(&normal, &midpoint);
            return (normal, offset);
        }
        (vec![0.0; self.dimension], 0.0)
    }

    fn collect_candidates(&self, query: &[f32], search_k: usize) -> Vec<usize> {
        let mut seen = vec![false; self.vectors.len()];
        let mut candidates = Vec::new();

        let mut frontier: BinaryHeap<(OrderedFloat<f32>, usize)> = self
            .roots
            .iter()
            .map(|root| (OrderedFloat(f32::INFINITY), *root))
            .collect();

        while candidates.len() < search_k {
            let Some((priority, node)) = frontier.pop() else {
                break;
            };
            match &self.nodes[node] {
                Node::Leaf(items) => {
                    for &item in items {
                        if !seen[item] {
                            seen[item] = true;
                            candidates.push(item);
                        }
                    }
                }
                Node::Split {
                    normal,
                    offset,
                    left,
                    right,
                } => {
                    let m = margin(normal, *offset, query);
                    frontier.push((OrderedFloat(priority.0.min(m)), *right));
                    frontier.push((OrderedFloat(priority.0.min(-m)), *left));
                }
            }
        }

        // Items inserted since the last build are not in any tree yet.
        for item in self.built..self.vectors.len() {
            if !seen[item] {
                candidates.push(item);
            }
        }
        candidates
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn margin(normal: &[f32], offset: f32, v: &[f32]) -> f32 {
    dot(normal, v) - offset
}

impl VectorBackend for TreeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Tree
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn insert(&mut self, id: ChunkId, vector: &[f32]) -> Result<()> {
        check_dimension(self.dimension, vector)?;
        let mut vector = vector.to_vec();
        normalize(&mut vector);
        self.ids.push(id);
        self.vectors.push(vector);
        Ok(())
    }

    fn commit(&mut self) {
        if self.built != self.vectors.len() {
            self.build();
        }
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>> {
        check_dimension(self.dimension, query)?;
        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        normalize(&mut query);

        let search_k = self
            .config
            .search_k
            .unwrap_or(k.saturating_mul(self.config.n_trees.max(1)))
            .max(k);
        let candidates = self.collect_candidates(&query, search_k);

        let scored = top_k_by_cosine(
            &query,
            candidates
                .iter()
                .map(|&item| (item, self.vectors[item].as_slice())),
            k,
        )?;
        Ok(scored
            .into_iter()
            .map(|(item, score)| (self.ids[item], score))
            .collect())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}
