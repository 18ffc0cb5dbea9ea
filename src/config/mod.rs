//! Configuration types for the hierarchy build.

pub mod options;
pub use options::{AmgOptions, CoarsenOptions};
