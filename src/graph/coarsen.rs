//! One pass of graph coarsening by greedy edge matching.
//!
//! 1. Every edge gets a collapse weight `w_e (s_u + s_v) / (s_u s_v)`, where the
//!    vertex strength `s_x` is its own weight plus the weights of its edges.
//!    Edges at weakly coupled vertices (ends of a chain, say) score higher.
//! 2. Edges are ranked by descending collapse weight, ties by edge index.
//! 3. At every vertex the incident edges must be decided in rank order. These
//!    per-vertex chains form the dependency graph handed to the scheduler, so
//!    edges on disjoint vertices are decided concurrently while the outcome is
//!    exactly that of a sequential sweep in rank order.
//! 4. An edge collapses when its weight reaches the threshold and neither
//!    endpoint was claimed by an earlier edge.
//!
//! Collapsed pairs merge the larger vertex index into the smaller. Surviving
//! vertices are numbered in index order, and the coarse graph sums the fine
//! weights that land on each coarse vertex or coarse vertex pair.

use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::CoarsenOptions;
use crate::error::AmgError;
use crate::graph::{ConcurrentWeights, WeightedGraph};
use crate::parallel::{on_worker_thread, run_parallel_dependency, WorkerPool};

/// Outcome of the greedy matching; fixed once computed.
#[derive(Debug, Clone, PartialEq)]
pub struct Matching {
    collapsed: Vec<bool>,
    claimed: Vec<bool>,
}

impl Matching {
    /// Per edge: was it collapsed?
    pub fn collapsed(&self) -> &[bool] {
        &self.collapsed
    }

    /// Per vertex: is it an endpoint of a collapsed edge?
    pub fn claimed(&self) -> &[bool] {
        &self.claimed
    }

    pub fn num_collapsed(&self) -> usize {
        self.collapsed.iter().filter(|&&c| c).count()
    }
}

/// Result of one coarsening pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Coarsening {
    pub matching: Matching,
    /// Fine vertex → coarse vertex; total.
    pub vertex_to_coarse: Vec<usize>,
    pub num_coarse: usize,
    pub coarse_graph: WeightedGraph,
}

/// Vertex strength: own weight plus the weights of all incident edges.
pub fn vertex_strengths(graph: &WeightedGraph) -> Vec<f64> {
    let mut strength = graph.vertex_weights().to_vec();
    for (&(a, b), &w) in graph.edges().iter().zip(graph.edge_weights()) {
        strength[a] += w;
        strength[b] += w;
    }
    strength
}

/// Collapse weight of every edge. An edge touching a zero-strength vertex
/// gets weight zero and is never collapsed.
pub fn collapse_weights(graph: &WeightedGraph) -> Vec<f64> {
    let strength = vertex_strengths(graph);
    let edges = graph.edges();
    let weights = graph.edge_weights();
    let weight_of = |e: usize| {
        let (s1, s2) = (strength[edges[e].0], strength[edges[e].1]);
        let denom = s1 * s2;
        if denom == 0.0 { 0.0 } else { weights[e] * (s1 + s2) / denom }
    };
    #[cfg(feature = "rayon")]
    if on_worker_thread() {
        return (0..graph.num_edges()).into_par_iter().map(weight_of).collect();
    }
    (0..graph.num_edges()).map(weight_of).collect()
}

/// Rank of every edge in the global decision order: descending collapse
/// weight, ties broken by edge index.
pub fn edge_ranks(collapse: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..collapse.len()).collect();
    let by_weight = |&a: &usize, &b: &usize| collapse[b].total_cmp(&collapse[a]).then(a.cmp(&b));
    if on_worker_thread() {
        #[cfg(feature = "rayon")]
        order.par_sort_unstable_by(by_weight);
    } else {
        order.sort_unstable_by(by_weight);
    }

    let mut rank = vec![0; collapse.len()];
    for (r, &e) in order.iter().enumerate() {
        rank[e] = r;
    }
    rank
}

/// Dependency graph over edges: for each vertex, consecutive incident edges
/// in rank order are linked `earlier → later`.
pub fn edge_dependencies(graph: &WeightedGraph, rank: &[usize]) -> Vec<Vec<usize>> {
    let mut v2e = graph.incident_edges();
    let by_rank = |edges: &mut Vec<usize>| edges.sort_unstable_by_key(|&e| rank[e]);
    if on_worker_thread() {
        #[cfg(feature = "rayon")]
        v2e.par_iter_mut().for_each(by_rank);
    } else {
        v2e.iter_mut().for_each(by_rank);
    }

    let mut dag = vec![Vec::new(); graph.num_edges()];
    for edges in &v2e {
        for pair in edges.windows(2) {
            dag[pair[0]].push(pair[1]);
        }
    }
    dag
}

/// Greedy maximal matching in rank order, executed through the scheduler.
pub fn greedy_matching(
    graph: &WeightedGraph,
    collapse: &[f64],
    threshold: f64,
    pool: &WorkerPool,
) -> Result<Matching, AmgError> {
    let dag = pool.install(|| edge_dependencies(graph, &edge_ranks(collapse)));
    let edges = graph.edges();

    let claimed: Vec<AtomicBool> = (0..graph.num_vertices()).map(|_| AtomicBool::new(false)).collect();
    let collapsed: Vec<AtomicBool> = (0..graph.num_edges()).map(|_| AtomicBool::new(false)).collect();

    // edges sharing a vertex never run concurrently; the scheduler orders them
    run_parallel_dependency(&dag, pool, |e| {
        let (v0, v1) = edges[e];
        if collapse[e] >= threshold
            && !claimed[v0].load(Ordering::Relaxed)
            && !claimed[v1].load(Ordering::Relaxed)
        {
            collapsed[e].store(true, Ordering::Relaxed);
            claimed[v0].store(true, Ordering::Relaxed);
            claimed[v1].store(true, Ordering::Relaxed);
        }
    })?;

    Ok(Matching {
        collapsed: collapsed.into_iter().map(AtomicBool::into_inner).collect(),
        claimed: claimed.into_iter().map(AtomicBool::into_inner).collect(),
    })
}

/// Compact vertex numbering after merging each collapsed edge's larger
/// endpoint into its smaller one. Returns the map and the coarse count.
pub fn coarse_vertex_map(graph: &WeightedGraph, matching: &Matching) -> (Vec<usize>, usize) {
    let n = graph.num_vertices();
    let edges = graph.edges();
    let mut merged = vec![false; n];
    for (e, _) in matching.collapsed.iter().enumerate().filter(|(_, c)| **c) {
        let (v0, v1) = edges[e];
        merged[v0.max(v1)] = true;
    }

    let mut v2cv = vec![0; n];
    let mut num_coarse = 0;
    for v in 0..n {
        if !merged[v] {
            v2cv[v] = num_coarse;
            num_coarse += 1;
        }
    }
    for (e, _) in matching.collapsed.iter().enumerate().filter(|(_, c)| **c) {
        let (v0, v1) = edges[e];
        v2cv[v0.max(v1)] = v2cv[v0.min(v1)];
    }
    (v2cv, num_coarse)
}

/// Coarse graph induced by `v2cv`: edges between distinct coarse vertices,
/// keyed by sorted pair with summed weights; summed vertex weights.
pub fn coarse_graph(graph: &WeightedGraph, v2cv: &[usize], num_coarse: usize) -> WeightedGraph {
    let coarse_edges = ConcurrentWeights::<(usize, usize)>::new();
    let add = |(&(a, b), &w): (&(usize, usize), &f64)| {
        let (c1, c2) = (v2cv[a], v2cv[b]);
        if c1 != c2 {
            coarse_edges.upsert((c1.min(c2), c1.max(c2)), w);
        }
    };
    if on_worker_thread() {
        #[cfg(feature = "rayon")]
        graph.edges().par_iter().zip(graph.edge_weights().par_iter()).for_each(add);
    } else {
        graph.edges().iter().zip(graph.edge_weights()).for_each(add);
    }

    let mut vertex_weights = vec![0.0; num_coarse];
    for (v, &w) in graph.vertex_weights().iter().enumerate() {
        vertex_weights[v2cv[v]] += w;
    }
    let (edges, edge_weights): (Vec<_>, Vec<_>) = coarse_edges.into_sorted_vec().into_iter().unzip();
    WeightedGraph::from_parts(vertex_weights, edges, edge_weights)
}

/// Run one full coarsening pass over `graph`. Data-parallel steps run inside
/// `pool`; with a sequential pool the whole pass stays on the calling thread.
pub fn coarsen(graph: &WeightedGraph, options: &CoarsenOptions, pool: &WorkerPool) -> Result<Coarsening, AmgError> {
    let collapse = pool.install(|| collapse_weights(graph));
    let matching = greedy_matching(graph, &collapse, options.collapse_threshold, pool)?;
    let (vertex_to_coarse, num_coarse) = coarse_vertex_map(graph, &matching);
    let coarse_graph = pool.install(|| coarse_graph(graph, &vertex_to_coarse, num_coarse));

    tracing::debug!(
        vertices = graph.num_vertices(),
        edges = graph.num_edges(),
        collapsed = matching.num_collapsed(),
        coarse_vertices = num_coarse,
        coarse_edges = coarse_graph.num_edges(),
        "coarsening pass"
    );

    Ok(Coarsening {
        matching,
        vertex_to_coarse,
        num_coarse,
        coarse_graph,
    })
}
