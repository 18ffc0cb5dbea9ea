//! Weighted graphs driving the coarsening.
//!
//! A [`WeightedGraph`] carries one scalar per vertex and one per undirected
//! edge. The level-0 graph is produced by a [`WeightAccumulator`] fed with
//! element contributions; every coarser graph comes out of [`coarsen`].

pub mod accumulator;
pub mod coarsen;
pub mod element;

pub use accumulator::{ConcurrentWeights, WeightAccumulator};
pub use coarsen::{coarsen, Coarsening, Matching};
pub use element::schur_complement;

use crate::error::AmgError;

/// Undirected graph with vertex and edge weights.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedGraph {
    edges: Vec<(usize, usize)>,
    edge_weights: Vec<f64>,
    vertex_weights: Vec<f64>,
}

impl WeightedGraph {
    /// Validate and build a graph over `vertex_weights.len()` vertices.
    pub fn new(
        vertex_weights: Vec<f64>,
        edges: Vec<(usize, usize)>,
        edge_weights: Vec<f64>,
    ) -> Result<Self, AmgError> {
        let num_vertices = vertex_weights.len();
        if edges.len() != edge_weights.len() {
            return Err(AmgError::LengthMismatch {
                what: "edge weights",
                expected: edges.len(),
                found: edge_weights.len(),
            });
        }
        for (index, &(a, b)) in edges.iter().enumerate() {
            for vertex in [a, b] {
                if vertex >= num_vertices {
                    return Err(AmgError::VertexOutOfRange {
                        what: "edge",
                        index,
                        vertex,
                        num_vertices,
                    });
                }
            }
            if a == b {
                return Err(AmgError::SelfLoop { edge: index, vertex: a });
            }
        }
        if let Some(index) = edge_weights.iter().position(|w| !w.is_finite()) {
            return Err(AmgError::NonFiniteWeight { what: "edge weight", index });
        }
        if let Some(index) = vertex_weights.iter().position(|w| !w.is_finite()) {
            return Err(AmgError::NonFiniteWeight { what: "vertex weight", index });
        }
        Ok(Self { edges, edge_weights, vertex_weights })
    }

    /// Build without validation; callers guarantee the invariants of [`WeightedGraph::new`].
    pub(crate) fn from_parts(
        vertex_weights: Vec<f64>,
        edges: Vec<(usize, usize)>,
        edge_weights: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(edges.len(), edge_weights.len());
        debug_assert!(edges.iter().all(|&(a, b)| a != b && a.max(b) < vertex_weights.len()));
        Self { edges, edge_weights, vertex_weights }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertex_weights.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn edge_weights(&self) -> &[f64] {
        &self.edge_weights
    }

    pub fn vertex_weights(&self) -> &[f64] {
        &self.vertex_weights
    }

    /// For each vertex, the indices of its incident edges in ascending order.
    pub fn incident_edges(&self) -> Vec<Vec<usize>> {
        let mut v2e = vec![Vec::new(); self.num_vertices()];
        for (e, &(a, b)) in self.edges.iter().enumerate() {
            v2e[a].push(e);
            v2e[b].push(e);
        }
        v2e
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_vertex() {
        let err = WeightedGraph::new(vec![1.0; 3], vec![(0, 1), (1, 3)], vec![1.0, 1.0]).unwrap_err();
        assert_eq!(
            err,
            AmgError::VertexOutOfRange { what: "edge", index: 1, vertex: 3, num_vertices: 3 }
        );
    }

    #[test]
    fn rejects_self_loop() {
        let err = WeightedGraph::new(vec![1.0; 2], vec![(1, 1)], vec![1.0]).unwrap_err();
        assert_eq!(err, AmgError::SelfLoop { edge: 0, vertex: 1 });
    }

    #[test]
    fn rejects_nan_weight() {
        let err = WeightedGraph::new(vec![1.0, f64::NAN], vec![], vec![]).unwrap_err();
        assert_eq!(err, AmgError::NonFiniteWeight { what: "vertex weight", index: 1 });
    }

    #[test]
    fn incident_edges_cover_both_endpoints() {
        let g = WeightedGraph::new(vec![0.0; 3], vec![(0, 1), (1, 2)], vec![1.0, 1.0]).unwrap();
        assert_eq!(g.incident_edges(), vec![vec![0], vec![0, 1], vec![1]]);
    }
}
