//! Preconditioners built on the coarsening graph.
//!
//! This module defines the Preconditioner trait and the pieces of the AMG
//! hierarchy: block Gauss-Seidel smoothing, the coarsest-level direct solve and
//! the level chain itself.

use crate::error::AmgError;

/// A preconditioner M ≈ A⁻¹.
pub trait Preconditioner<M, V> {
    /// Apply M⁻¹ to r, writing z = M⁻¹ r
    fn apply(&self, r: &V, z: &mut V) -> Result<(), AmgError>;
}

pub mod amg;
pub mod block_gs;
pub mod direct;

pub use amg::{AmgPreconditioner, Coarse, Level};
pub use block_gs::{BlockGaussSeidel, Sweep};
pub use direct::DirectSolver;
