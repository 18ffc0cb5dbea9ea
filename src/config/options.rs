//! Construction options for the AMG preconditioner.
//!
//! `AmgOptions` carries every tunable of the hierarchy build. The defaults are
//! the classical values of the aggregation scheme: collapse threshold 0.01,
//! direct solve below 10 coarse vertices, one smoothing sweep.

use crate::error::AmgError;

/// AMG build parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AmgOptions {
    /// Minimum collapse weight for an edge to be matched.
    pub collapse_threshold: f64,

    /// Switch to a direct solve once a level has fewer vertices than this.
    pub coarsest_size: usize,

    /// Block Gauss-Seidel sweeps before and after the coarse correction.
    pub smoothing_steps: usize,

    /// Hard cap on the number of levels (the last one is solved directly).
    pub max_levels: usize,

    /// Scheduler workers; `None` uses the hardware parallelism.
    pub num_workers: Option<usize>,
}

impl Default for AmgOptions {
    fn default() -> Self {
        Self {
            collapse_threshold: 0.01,
            coarsest_size: 10,
            smoothing_steps: 1,
            max_levels: 32,
            num_workers: None,
        }
    }
}

impl AmgOptions {
    pub fn with_collapse_threshold(mut self, threshold: f64) -> Self {
        self.collapse_threshold = threshold;
        self
    }

    pub fn with_coarsest_size(mut self, size: usize) -> Self {
        self.coarsest_size = size;
        self
    }

    pub fn with_smoothing_steps(mut self, steps: usize) -> Self {
        self.smoothing_steps = steps;
        self
    }

    pub fn with_max_levels(mut self, levels: usize) -> Self {
        self.max_levels = levels;
        self
    }

    pub fn with_num_workers(mut self, workers: usize) -> Self {
        self.num_workers = Some(workers);
        self
    }

    /// The subset of options the coarsening pass reads.
    pub fn coarsen_options(&self) -> CoarsenOptions {
        CoarsenOptions {
            collapse_threshold: self.collapse_threshold,
        }
    }

    /// Reject option combinations that cannot produce a hierarchy.
    pub fn validate(&self) -> Result<(), AmgError> {
        if !self.collapse_threshold.is_finite() || self.collapse_threshold < 0.0 {
            return Err(AmgError::InvalidOption(
                "collapse_threshold must be finite and non-negative",
            ));
        }
        if self.coarsest_size == 0 {
            return Err(AmgError::InvalidOption("coarsest_size must be at least 1"));
        }
        if self.max_levels == 0 {
            return Err(AmgError::InvalidOption("max_levels must be at least 1"));
        }
        if self.num_workers == Some(0) {
            return Err(AmgError::InvalidOption("num_workers must be at least 1"));
        }
        Ok(())
    }
}

/// Options of a single coarsening pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoarsenOptions {
    pub collapse_threshold: f64,
}

impl Default for CoarsenOptions {
    fn default() -> Self {
        AmgOptions::default().coarsen_options()
    }
}
