//! Setup statistics of an AMG hierarchy.
//!
//! The builder owns a `SetupStats` for the duration of the build and hands it
//! to the finished preconditioner; there is no global timer state.

use std::time::{Duration, Instant};

/// What one coarsening level did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LevelStats {
    pub level: usize,
    pub num_vertices: usize,
    pub num_edges: usize,
    pub num_collapsed: usize,
    pub num_coarse: usize,
    /// Stored entries of this level's system matrix.
    pub nnz: usize,
    pub elapsed: Duration,
}

/// How the hierarchy ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Termination {
    /// Vertex count dropped below the coarsest size.
    #[default]
    CoarsestSize,
    /// A pass failed to reduce the vertex count.
    Stalled,
    /// The level cap was reached.
    MaxLevels,
}

#[derive(Clone, Debug, Default)]
pub struct SetupStats {
    pub levels: Vec<LevelStats>,
    /// Size and stored entries of the directly solved system.
    pub coarsest_rows: usize,
    pub coarsest_nnz: usize,
    pub termination: Termination,
    pub total: Duration,
    started: Option<Instant>,
}

impl SetupStats {
    pub(crate) fn start() -> Self {
        Self {
            started: Some(Instant::now()),
            ..Self::default()
        }
    }

    pub(crate) fn finish(&mut self, coarsest_rows: usize, coarsest_nnz: usize, termination: Termination) {
        self.coarsest_rows = coarsest_rows;
        self.coarsest_nnz = coarsest_nnz;
        self.termination = termination;
        if let Some(t0) = self.started.take() {
            self.total = t0.elapsed();
        }
    }

    /// Number of levels including the directly solved one.
    pub fn num_levels(&self) -> usize {
        self.levels.len() + 1
    }

    /// Σ rows over all levels / fine rows.
    pub fn grid_complexity(&self) -> f64 {
        let fine = self.levels.first().map_or(self.coarsest_rows, |l| l.num_vertices);
        if fine == 0 {
            return 1.0;
        }
        let total: usize = self.levels.iter().map(|l| l.num_vertices).sum::<usize>() + self.coarsest_rows;
        total as f64 / fine as f64
    }

    /// Σ nnz over all levels / fine nnz.
    pub fn operator_complexity(&self) -> f64 {
        let fine = self.levels.first().map_or(self.coarsest_nnz, |l| l.nnz);
        if fine == 0 {
            return 1.0;
        }
        let total: usize = self.levels.iter().map(|l| l.nnz).sum::<usize>() + self.coarsest_nnz;
        total as f64 / fine as f64
    }
}
