//! Utilities shared across the crate.

pub mod stats;
pub use stats::{LevelStats, SetupStats, Termination};
