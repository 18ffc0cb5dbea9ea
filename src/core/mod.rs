//! Core traits shared by matrices, smoothers and the hierarchy.

pub mod traits;
pub use traits::SystemMatrix;
