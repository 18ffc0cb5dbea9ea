//! Concurrent additive weight maps.
//!
//! Element contributions arrive from many threads at once, each adding to a
//! vertex or edge total. [`ConcurrentWeights`] is a lock-striped hash map whose
//! only write operation is "add to the running total", so the result does not
//! depend on arrival order beyond floating-point rounding.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

use parking_lot::Mutex;

use crate::error::AmgError;
use crate::graph::WeightedGraph;

const DEFAULT_SHARDS: usize = 64;

/// Striped `key -> f64` map supporting concurrent `upsert`-with-addition.
pub struct ConcurrentWeights<K> {
    shards: Box<[Mutex<HashMap<K, f64>>]>,
    hasher: RandomState,
}

impl<K: Hash + Eq> ConcurrentWeights<K> {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// `shards` is rounded up to a power of two.
    pub fn with_shards(shards: usize) -> Self {
        let shards = shards.max(1).next_power_of_two();
        Self {
            shards: (0..shards).map(|_| Mutex::new(HashMap::new())).collect(),
            hasher: RandomState::new(),
        }
    }

    fn shard(&self, key: &K) -> &Mutex<HashMap<K, f64>> {
        let h = self.hasher.hash_one(key) as usize;
        &self.shards[h & (self.shards.len() - 1)]
    }

    /// Add `delta` to the total stored under `key`, inserting it at zero first.
    pub fn upsert(&self, key: K, delta: f64) {
        *self.shard(&key).lock().entry(key).or_insert(0.0) += delta;
    }

    /// Current total for `key`.
    pub fn get(&self, key: &K) -> Option<f64> {
        self.shard(key).lock().get(key).copied()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.lock().is_empty())
    }

    /// Drain into a key-sorted vector.
    pub fn into_sorted_vec(self) -> Vec<(K, f64)>
    where
        K: Ord,
    {
        let mut out: Vec<(K, f64)> = self
            .shards
            .into_vec()
            .into_iter()
            .flat_map(|s| s.into_inner())
            .collect();
        out.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

impl<K: Hash + Eq> Default for ConcurrentWeights<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects vertex and edge weights of the fine graph.
///
/// All methods take `&self` and may be called concurrently.
#[derive(Default)]
pub struct WeightAccumulator {
    vertices: ConcurrentWeights<usize>,
    edges: ConcurrentWeights<(usize, usize)>,
}

impl WeightAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex_weight(&self, v: usize, delta: f64) {
        self.vertices.upsert(v, delta);
    }

    /// The pair is unordered: `(u, v)` and `(v, u)` accumulate into one edge.
    pub fn add_edge_weight(&self, u: usize, v: usize, delta: f64) {
        self.edges.upsert((u.min(v), u.max(v)), delta);
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Emit the dense graph over `num_vertices` vertices. Vertices never
    /// touched get weight zero; edges are numbered in sorted key order.
    pub fn finalize(self, num_vertices: usize) -> Result<WeightedGraph, AmgError> {
        let mut vertex_weights = vec![0.0; num_vertices];
        for (v, w) in self.vertices.into_sorted_vec() {
            if v >= num_vertices {
                return Err(AmgError::VertexOutOfRange {
                    what: "vertex weight",
                    index: v,
                    vertex: v,
                    num_vertices,
                });
            }
            vertex_weights[v] = w;
        }
        let (edges, edge_weights): (Vec<_>, Vec<_>) = self.edges.into_sorted_vec().into_iter().unzip();
        WeightedGraph::new(vertex_weights, edges, edge_weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn unordered_pairs_merge() {
        let acc = WeightAccumulator::new();
        acc.add_edge_weight(2, 0, 1.0);
        acc.add_edge_weight(0, 2, 0.5);
        acc.add_vertex_weight(1, 3.0);
        let g = acc.finalize(3).unwrap();
        assert_eq!(g.edges(), &[(0, 2)]);
        assert_eq!(g.edge_weights(), &[1.5]);
        assert_eq!(g.vertex_weights(), &[0.0, 3.0, 0.0]);
    }

    #[test]
    fn concurrent_adds_sum_exactly_for_integers() {
        let weights = ConcurrentWeights::<usize>::with_shards(4);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for k in 0..100 {
                        weights.upsert(k % 10, 1.0);
                    }
                });
            }
        });
        assert_eq!(weights.len(), 10);
        for k in 0..10 {
            assert_eq!(weights.get(&k), Some(80.0));
        }
    }

    #[test]
    fn finalize_rejects_vertex_past_end() {
        let acc = WeightAccumulator::new();
        acc.add_vertex_weight(5, 1.0);
        assert!(matches!(acc.finalize(3), Err(AmgError::VertexOutOfRange { vertex: 5, .. })));
    }

    #[test]
    fn finalize_rejects_edge_past_end() {
        let acc = WeightAccumulator::new();
        acc.add_edge_weight(0, 7, 1.0);
        assert!(matches!(acc.finalize(3), Err(AmgError::VertexOutOfRange { what: "edge", .. })));
    }
}
