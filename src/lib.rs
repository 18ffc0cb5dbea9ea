//! h1amg: graph-coarsening algebraic multigrid over Faer
//!
//! This crate builds a multilevel preconditioner for symmetric positive
//! definite systems from a weighted graph of element couplings. Coarsening is
//! a greedy edge matching executed by a dependency-driven task scheduler, so
//! the hierarchy is identical for any number of worker threads.

pub mod parallel;

pub mod config;
pub mod core;
pub mod error;
pub mod graph;
pub mod matrix;
pub mod preconditioner;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use self::core::*;
pub use error::*;
pub use graph::*;
pub use matrix::*;
pub use parallel::*;
pub use preconditioner::*;
pub use utils::*;
