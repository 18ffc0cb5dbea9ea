//! Core linear-algebra traits for h1amg.

use std::sync::Arc;

use faer::Mat;

use crate::error::AmgError;
use crate::matrix::CsrMatrix;
use crate::preconditioner::BlockGaussSeidel;

/// Capabilities a level's system matrix must offer to the hierarchy.
///
/// Each concrete storage implements this directly; the hierarchy is generic
/// over it, so the coarse matrix produced by [`SystemMatrix::restrict`] has the
/// same representation as the fine one.
pub trait SystemMatrix: Send + Sync + Sized {
    /// Number of rows.
    fn nrows(&self) -> usize;

    /// Number of columns. The hierarchy only accepts square matrices.
    fn ncols(&self) -> usize;

    /// Compute y = A · x.  `x.len() == y.len() == nrows()`.
    fn multiply(&self, x: &[f64], y: &mut [f64]);

    /// Compute the dot product of row `row` with `x`.
    fn row_dot(&self, row: usize, x: &[f64]) -> f64;

    /// Entry A[i, j], zero when structurally absent.
    fn entry(&self, i: usize, j: usize) -> f64;

    /// Number of stored entries.
    fn nnz(&self) -> usize;

    /// Galerkin product Pᵀ A P.
    fn restrict(&self, p: &CsrMatrix<f64>) -> Result<Self, AmgError>;

    /// Dense copy of the principal submatrix on `indices`.
    fn submatrix(&self, indices: &[usize]) -> Mat<f64> {
        let n = indices.len();
        Mat::from_fn(n, n, |i, j| self.entry(indices[i], indices[j]))
    }

    /// Build a block Gauss-Seidel smoother over the given partition.
    fn create_block_smoother(
        self: Arc<Self>,
        blocks: Vec<Vec<usize>>,
    ) -> Result<BlockGaussSeidel<Self>, AmgError> {
        BlockGaussSeidel::new(self, blocks)
    }
}
