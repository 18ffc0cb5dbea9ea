//! Matrix module: the CSR storage and the dense (Faer) system operator.

pub mod dense;
pub mod sparse;
pub use sparse::{CsrMatrix, SparseMatrix};
