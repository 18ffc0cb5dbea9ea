//! Graph-coarsening algebraic multigrid.
//!
//! Each level pairs up strongly coupled unknowns with [`coarsen`], smooths with
//! block Gauss-Seidel over the resulting pairs, and transfers residuals with
//! the aggregation operator `P` (one unit entry per fine row) and `R = Pᵀ`.
//! The coarse matrix is the Galerkin product `Pᵀ A P`. Coarsening stops once a
//! level has fewer than `coarsest_size` vertices, which is then solved
//! directly.
//!
//! `R` sums fine residuals rather than averaging them; the smoother makes up
//! for the unscaled coarse correction. With exact-adjoint sweeps the V-cycle is
//! symmetric up to rounding, so it can serve as a CG preconditioner.

use std::sync::Arc;
use std::time::Instant;

use crate::config::AmgOptions;
use crate::core::traits::SystemMatrix;
use crate::error::AmgError;
use crate::graph::{coarsen, WeightAccumulator, WeightedGraph};
use crate::matrix::{CsrMatrix, SparseMatrix};
use crate::parallel::WorkerPool;
use crate::preconditioner::{BlockGaussSeidel, DirectSolver, Preconditioner};
use crate::utils::stats::{LevelStats, SetupStats, Termination};

/// Successor of a level: another level, or the terminal direct solve.
pub enum Coarse<M: SystemMatrix> {
    Level(Box<Level<M>>),
    Direct(DirectSolver),
}

impl<M: SystemMatrix> Coarse<M> {
    /// Apply the coarse operator: V-cycle or exact solve.
    pub fn mult(&self, b: &[f64], x: &mut [f64]) {
        match self {
            Coarse::Level(level) => level.mult(b, x),
            Coarse::Direct(solver) => solver.solve(b, x),
        }
    }

    /// Rows of the system this node acts on.
    pub fn size(&self) -> usize {
        match self {
            Coarse::Level(level) => level.size(),
            Coarse::Direct(solver) => solver.size(),
        }
    }
}

impl<M: SystemMatrix> Default for Coarse<M> {
    fn default() -> Self {
        Coarse::Direct(DirectSolver::default())
    }
}

/// One level of the hierarchy. Owns everything below it.
pub struct Level<M: SystemMatrix> {
    matrix: Arc<M>,
    smoother: BlockGaussSeidel<M>,
    prolongation: CsrMatrix<f64>,
    restriction: CsrMatrix<f64>,
    coarse: Coarse<M>,
    smoothing_steps: usize,
}

impl<M: SystemMatrix> Level<M> {
    pub fn size(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn matrix(&self) -> &M {
        &self.matrix
    }

    pub fn prolongation(&self) -> &CsrMatrix<f64> {
        &self.prolongation
    }

    pub fn restriction(&self) -> &CsrMatrix<f64> {
        &self.restriction
    }

    pub fn smoother(&self) -> &BlockGaussSeidel<M> {
        &self.smoother
    }

    pub fn coarse(&self) -> &Coarse<M> {
        &self.coarse
    }

    /// One multiplicative V-cycle: x ≈ A⁻¹ b.
    ///
    /// # Panics
    /// Panics if `b` or `x` does not have `size()` entries.
    pub fn mult(&self, b: &[f64], x: &mut [f64]) {
        let n = self.size();
        assert_eq!(b.len(), n, "Level::mult: right-hand side has incorrect length");
        assert_eq!(x.len(), n, "Level::mult: solution has incorrect length");

        x.fill(0.0);
        self.smoother.gs_smooth(x, b, self.smoothing_steps);

        let mut residual = vec![0.0; n];
        self.matrix.multiply(x, &mut residual);
        for (ri, &bi) in residual.iter_mut().zip(b) {
            *ri = bi - *ri;
        }

        let nc = self.restriction.nrows();
        let mut coarse_residual = vec![0.0; nc];
        self.restriction.spmv(&residual, &mut coarse_residual);
        let mut coarse_x = vec![0.0; nc];
        self.coarse.mult(&coarse_residual, &mut coarse_x);

        // reuse the residual buffer for the prolongated correction
        self.prolongation.spmv(&coarse_x, &mut residual);
        for (xi, &ci) in x.iter_mut().zip(&residual) {
            *xi += ci;
        }
        self.smoother.gs_smooth_back(x, b, self.smoothing_steps);
    }
}

impl<M: SystemMatrix> Drop for Level<M> {
    // Unlink the chain one level at a time so deep hierarchies do not recurse.
    fn drop(&mut self) {
        let mut next = std::mem::take(&mut self.coarse);
        while let Coarse::Level(mut level) = next {
            next = std::mem::take(&mut level.coarse);
        }
    }
}

/// Everything a level needs except its successor, collected top-down and
/// linked bottom-up once the terminal solve exists.
struct PendingLevel<M: SystemMatrix> {
    matrix: Arc<M>,
    smoother: BlockGaussSeidel<M>,
    prolongation: CsrMatrix<f64>,
    restriction: CsrMatrix<f64>,
}

/// Aggregation prolongation: row `v` has a single 1 in column `v2cv[v]`.
pub fn aggregation_prolongation(v2cv: &[usize], num_coarse: usize) -> Result<CsrMatrix<f64>, AmgError> {
    let n = v2cv.len();
    CsrMatrix::try_from_csr(n, num_coarse, (0..=n).collect(), v2cv.to_vec(), vec![1.0; n])
}

/// Smoothing partition: free fine dofs grouped by coarse vertex. Blocks of
/// coarse vertices without free dofs are empty.
pub fn smoothing_blocks(v2cv: &[usize], num_coarse: usize, free: &[bool]) -> Vec<Vec<usize>> {
    let mut blocks = vec![Vec::new(); num_coarse];
    for (v, &cv) in v2cv.iter().enumerate() {
        if free[v] {
            blocks[cv].push(v);
        }
    }
    blocks
}

/// A coarse vertex is free when at least one free fine dof maps to it.
pub fn coarse_free_dofs(v2cv: &[usize], num_coarse: usize, free: &[bool]) -> Vec<bool> {
    let mut coarse_free = vec![false; num_coarse];
    for (v, &cv) in v2cv.iter().enumerate() {
        coarse_free[cv] |= free[v];
    }
    coarse_free
}

/// The AMG preconditioner: the root of the level chain, the worker pool it
/// was built with, and setup statistics.
pub struct AmgPreconditioner<M: SystemMatrix> {
    root: Coarse<M>,
    pool: WorkerPool,
    stats: SetupStats,
}

impl<M: SystemMatrix> AmgPreconditioner<M> {
    /// Build the hierarchy for `matrix`.
    ///
    /// `free` marks the dofs that are unknowns (Dirichlet dofs are `false`);
    /// `graph` is the level-0 weighted graph with one vertex per row.
    pub fn new(matrix: M, free: &[bool], graph: WeightedGraph, options: &AmgOptions) -> Result<Self, AmgError> {
        options.validate()?;
        let n = matrix.nrows();
        if n == 0 || graph.num_vertices() == 0 {
            return Err(AmgError::EmptyGraph);
        }
        if matrix.ncols() != n {
            return Err(AmgError::LengthMismatch {
                what: "matrix columns",
                expected: n,
                found: matrix.ncols(),
            });
        }
        if graph.num_vertices() != n {
            return Err(AmgError::LengthMismatch {
                what: "graph vertices",
                expected: n,
                found: graph.num_vertices(),
            });
        }
        if free.len() != n {
            return Err(AmgError::LengthMismatch {
                what: "free-dof mask",
                expected: n,
                found: free.len(),
            });
        }

        let pool = match options.num_workers {
            Some(workers) => WorkerPool::with_workers(workers),
            None => WorkerPool::new(),
        };
        let mut stats = SetupStats::start();
        let root = build_hierarchy(matrix, free.to_vec(), graph, options, &pool, &mut stats)?;

        tracing::info!(
            levels = stats.num_levels(),
            fine_rows = n,
            coarsest_rows = stats.coarsest_rows,
            grid_complexity = stats.grid_complexity(),
            operator_complexity = stats.operator_complexity(),
            elapsed_ms = stats.total.as_secs_f64() * 1e3,
            "AMG hierarchy built"
        );
        Ok(Self { root, pool, stats })
    }

    /// Build from element contributions collected in `weights`.
    pub fn from_accumulator(
        matrix: M,
        free: &[bool],
        weights: WeightAccumulator,
        options: &AmgOptions,
    ) -> Result<Self, AmgError> {
        let graph = weights.finalize(matrix.nrows())?;
        Self::new(matrix, free, graph, options)
    }

    /// x ≈ A⁻¹ b, run on the preconditioner's worker pool.
    pub fn mult(&self, b: &[f64], x: &mut [f64]) {
        self.pool.install(|| self.root.mult(b, x))
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    pub fn size(&self) -> usize {
        self.root.size()
    }

    pub fn stats(&self) -> &SetupStats {
        &self.stats
    }

    pub fn num_levels(&self) -> usize {
        self.stats.num_levels()
    }

    /// Finest level, or `None` for a purely direct preconditioner.
    pub fn finest(&self) -> Option<&Level<M>> {
        match &self.root {
            Coarse::Level(level) => Some(&**level),
            Coarse::Direct(_) => None,
        }
    }
}

impl<M: SystemMatrix> Preconditioner<M, Vec<f64>> for AmgPreconditioner<M> {
    fn apply(&self, r: &Vec<f64>, z: &mut Vec<f64>) -> Result<(), AmgError> {
        self.mult(r, z);
        Ok(())
    }
}

fn build_hierarchy<M: SystemMatrix>(
    matrix: M,
    free: Vec<bool>,
    graph: WeightedGraph,
    options: &AmgOptions,
    pool: &WorkerPool,
    stats: &mut SetupStats,
) -> Result<Coarse<M>, AmgError> {
    let coarsen_options = options.coarsen_options();
    let mut pending: Vec<PendingLevel<M>> = Vec::new();
    let mut matrix = Arc::new(matrix);
    let mut free = free;
    let mut graph = graph;

    let termination = loop {
        let n = graph.num_vertices();
        if n < options.coarsest_size {
            break Termination::CoarsestSize;
        }
        if pending.len() + 1 >= options.max_levels {
            tracing::warn!(levels = options.max_levels, vertices = n, "level cap reached, solving directly");
            break Termination::MaxLevels;
        }

        let t0 = Instant::now();
        let coarsening = coarsen(&graph, &coarsen_options, pool)?;
        let nc = coarsening.num_coarse;
        if nc == 0 {
            return Err(AmgError::EmptyGraph);
        }
        if nc >= n {
            tracing::warn!(
                level = pending.len(),
                vertices = n,
                "coarsening made no progress, solving this level directly"
            );
            break Termination::Stalled;
        }

        let v2cv = &coarsening.vertex_to_coarse;
        let blocks = smoothing_blocks(v2cv, nc, &free);
        let smoother = pool.install(|| Arc::clone(&matrix).create_block_smoother(blocks))?;
        let prolongation = aggregation_prolongation(v2cv, nc)?;
        let restriction = prolongation.transpose()?;
        let coarse_matrix = pool.install(|| matrix.restrict(&prolongation))?;
        let coarse_free = coarse_free_dofs(v2cv, nc, &free);

        stats.levels.push(LevelStats {
            level: pending.len(),
            num_vertices: n,
            num_edges: graph.num_edges(),
            num_collapsed: coarsening.matching.num_collapsed(),
            num_coarse: nc,
            nnz: matrix.nnz(),
            elapsed: t0.elapsed(),
        });
        tracing::debug!(
            level = pending.len(),
            vertices = n,
            coarse_vertices = nc,
            nnz = matrix.nnz(),
            "level built"
        );

        pending.push(PendingLevel {
            matrix,
            smoother,
            prolongation,
            restriction,
        });
        matrix = Arc::new(coarse_matrix);
        free = coarse_free;
        graph = coarsening.coarse_graph;
    };

    let direct = DirectSolver::new(&*matrix, &free)?;
    stats.finish(matrix.nrows(), matrix.nnz(), termination);

    let mut coarse = Coarse::Direct(direct);
    while let Some(p) = pending.pop() {
        coarse = Coarse::Level(Box::new(Level {
            matrix: p.matrix,
            smoother: p.smoother,
            prolongation: p.prolongation,
            restriction: p.restriction,
            coarse,
            smoothing_steps: options.smoothing_steps,
        }));
    }
    Ok(coarse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use faer::Mat;

    fn laplace_1d(n: usize) -> (CsrMatrix<f64>, WeightedGraph) {
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 2.0));
            if i + 1 < n {
                triplets.push((i, i + 1, -1.0));
                triplets.push((i + 1, i, -1.0));
            }
        }
        let edges: Vec<_> = (0..n - 1).map(|i| (i, i + 1)).collect();
        let weights = vec![1.0; n - 1];
        let mut vw = vec![0.0; n];
        vw[0] = 1.0;
        vw[n - 1] = 1.0;
        (
            CsrMatrix::from_triplets(n, n, &triplets),
            WeightedGraph::new(vw, edges, weights).unwrap(),
        )
    }

    #[test]
    fn prolongation_has_one_unit_per_row() {
        let p = aggregation_prolongation(&[0, 0, 1, 2, 1], 3).unwrap();
        assert_eq!(p.nrows(), 5);
        assert_eq!(p.ncols(), 3);
        for i in 0..5 {
            assert_eq!(p.row(i).1, &[1.0]);
        }
        let r = p.transpose().unwrap();
        assert_eq!(r.row(1).0, &[2, 4]);
    }

    #[test]
    fn blocks_skip_dirichlet_dofs() {
        let blocks = smoothing_blocks(&[0, 0, 1, 1], 2, &[false, true, true, true]);
        assert_eq!(blocks, vec![vec![1], vec![2, 3]]);
        assert_eq!(coarse_free_dofs(&[0, 0, 1], 2, &[false, false, true]), vec![false, true]);
    }

    #[test]
    fn small_problem_is_solved_directly() {
        let a = Mat::from_fn(3, 3, |i, j| if i == j { 2.0 } else { 0.0 });
        let g = WeightedGraph::new(vec![2.0; 3], vec![], vec![]).unwrap();
        let amg = AmgPreconditioner::new(a, &[true; 3], g, &AmgOptions::default()).unwrap();
        assert_eq!(amg.num_levels(), 1);
        assert!(amg.finest().is_none());
        let mut x = vec![0.0; 3];
        amg.mult(&[2.0, 2.0, 2.0], &mut x);
        for xi in x {
            assert_relative_eq!(xi, 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn hierarchy_reaches_coarsest_size() {
        let (a, g) = laplace_1d(64);
        let amg = AmgPreconditioner::new(a, &[true; 64], g, &AmgOptions::default()).unwrap();
        let stats = amg.stats();
        assert_eq!(stats.termination, Termination::CoarsestSize);
        assert!(stats.coarsest_rows < 10);
        assert!(stats.num_levels() >= 3);
        for pair in stats.levels.windows(2) {
            assert!(pair[1].num_vertices < pair[0].num_vertices);
        }
    }

    #[test]
    fn level_cap_terminates_early() {
        let (a, g) = laplace_1d(64);
        let opts = AmgOptions::default().with_max_levels(2);
        let amg = AmgPreconditioner::new(a, &[true; 64], g, &opts).unwrap();
        assert_eq!(amg.num_levels(), 2);
        assert_eq!(amg.stats().termination, Termination::MaxLevels);
    }

    #[test]
    fn stalled_coarsening_falls_back_to_direct() {
        // no edges: nothing can collapse
        let n = 12;
        let a = Mat::from_fn(n, n, |i, j| if i == j { 1.0 + i as f64 } else { 0.0 });
        let g = WeightedGraph::new(vec![1.0; n], vec![], vec![]).unwrap();
        let amg = AmgPreconditioner::new(a, &vec![true; n], g, &AmgOptions::default()).unwrap();
        assert_eq!(amg.stats().termination, Termination::Stalled);
        let mut x = vec![0.0; n];
        let b: Vec<f64> = (0..n).map(|i| 1.0 + i as f64).collect();
        amg.mult(&b, &mut x);
        for xi in x {
            assert_relative_eq!(xi, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn rejects_mismatched_graph() {
        let (a, _) = laplace_1d(8);
        let (_, g) = laplace_1d(9);
        assert!(matches!(
            AmgPreconditioner::new(a, &[true; 8], g, &AmgOptions::default()),
            Err(AmgError::LengthMismatch { what: "graph vertices", .. })
        ));
    }

    #[test]
    fn rejects_empty_graph() {
        let a = CsrMatrix::<f64>::from_triplets(0, 0, &[]);
        let g = WeightedGraph::new(vec![], vec![], vec![]).unwrap();
        assert_eq!(
            AmgPreconditioner::new(a, &[], g, &AmgOptions::default()).err(),
            Some(AmgError::EmptyGraph)
        );
    }

    #[test]
    fn rejects_non_square_matrix() {
        let a = Mat::<f64>::zeros(4, 5);
        let (_, g) = laplace_1d(4);
        assert_eq!(
            AmgPreconditioner::new(a, &[true; 4], g, &AmgOptions::default()).err(),
            Some(AmgError::LengthMismatch {
                what: "matrix columns",
                expected: 4,
                found: 5,
            })
        );
    }

    #[cfg(feature = "rayon")]
    mod worker_threads {
        use super::*;

        /// CSR operator that records which Rayon worker ran each product.
        struct ThreadRecorder {
            inner: CsrMatrix<f64>,
            threads: parking_lot::Mutex<Vec<Option<usize>>>,
        }

        impl ThreadRecorder {
            fn new(inner: CsrMatrix<f64>) -> Self {
                Self { inner, threads: parking_lot::Mutex::new(Vec::new()) }
            }
        }

        impl SystemMatrix for ThreadRecorder {
            fn nrows(&self) -> usize {
                self.inner.nrows()
            }
            fn ncols(&self) -> usize {
                self.inner.ncols()
            }
            fn multiply(&self, x: &[f64], y: &mut [f64]) {
                self.threads.lock().push(rayon::current_thread_index());
                self.inner.multiply(x, y)
            }
            fn row_dot(&self, row: usize, x: &[f64]) -> f64 {
                self.inner.row_dot(row, x)
            }
            fn entry(&self, i: usize, j: usize) -> f64 {
                self.inner.get(i, j)
            }
            fn nnz(&self) -> usize {
                self.inner.nnz()
            }
            fn restrict(&self, p: &CsrMatrix<f64>) -> Result<Self, AmgError> {
                Ok(Self::new(self.inner.galerkin(p)?))
            }
        }

        fn recorded_threads(workers: usize) -> Vec<Option<usize>> {
            let (a, g) = laplace_1d(64);
            let opts = AmgOptions::default().with_num_workers(workers);
            let amg = AmgPreconditioner::new(ThreadRecorder::new(a), &[true; 64], g, &opts).unwrap();
            let mut x = vec![0.0; 64];
            amg.mult(&[1.0; 64], &mut x);
            let finest = amg.finest().unwrap();
            let threads = finest.matrix().threads.lock().clone();
            assert!(!threads.is_empty());
            threads
        }

        #[test]
        fn sequential_vcycle_stays_on_calling_thread() {
            assert!(recorded_threads(1).iter().all(Option::is_none));
        }

        #[test]
        fn threaded_vcycle_runs_on_pool_workers() {
            assert!(recorded_threads(2).iter().all(|t| matches!(t, Some(i) if *i < 2)));
        }
    }

    #[test]
    fn deep_chain_drops_without_recursion() {
        let (a, g) = laplace_1d(2000);
        let opts = AmgOptions::default().with_num_workers(1);
        let amg = AmgPreconditioner::new(a, &vec![true; 2000], g, &opts).unwrap();
        assert!(amg.num_levels() > 5);
        drop(amg);
    }
}
