//! Dense‐matrix system operator on top of Faer.
//!
//! Small problems (and tests) can drive the hierarchy with a plain
//! `faer::Mat<f64>`; every coarse level is then dense as well.

use faer::linalg::matmul::matmul;
use faer::{Accum, Mat};

use crate::core::traits::SystemMatrix;
use crate::error::AmgError;
use crate::matrix::CsrMatrix;
use crate::parallel::kernel_parallelism;

impl SystemMatrix for Mat<f64> {
    fn nrows(&self) -> usize {
        Mat::nrows(self)
    }

    fn ncols(&self) -> usize {
        Mat::ncols(self)
    }

    fn multiply(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(Mat::ncols(self), x.len(), "Input vector x has incorrect length");
        assert_eq!(Mat::nrows(self), y.len(), "Output vector y has incorrect length");
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = self.row_dot(i, x);
        }
    }

    fn row_dot(&self, row: usize, x: &[f64]) -> f64 {
        (0..Mat::ncols(self)).map(|j| self[(row, j)] * x[j]).sum()
    }

    fn entry(&self, i: usize, j: usize) -> f64 {
        self[(i, j)]
    }

    fn nnz(&self) -> usize {
        Mat::nrows(self) * Mat::ncols(self)
    }

    fn restrict(&self, p: &CsrMatrix<f64>) -> Result<Self, AmgError> {
        if Mat::nrows(self) != Mat::ncols(self) {
            return Err(AmgError::LengthMismatch {
                what: "matrix columns",
                expected: Mat::nrows(self),
                found: Mat::ncols(self),
            });
        }
        if p.nrows() != Mat::nrows(self) {
            return Err(AmgError::LengthMismatch {
                what: "prolongation rows",
                expected: Mat::nrows(self),
                found: p.nrows(),
            });
        }
        let par = kernel_parallelism();
        let p = p.as_faer().to_dense();
        let mut ap = Mat::<f64>::zeros(Mat::nrows(self), p.ncols());
        matmul(ap.as_mut(), Accum::Replace, self.as_ref(), p.as_ref(), 1.0, par);
        let mut coarse = Mat::<f64>::zeros(p.ncols(), p.ncols());
        matmul(coarse.as_mut(), Accum::Replace, p.transpose(), ap.as_ref(), 1.0, par);
        Ok(coarse)
    }

    fn submatrix(&self, indices: &[usize]) -> Mat<f64> {
        let n = indices.len();
        Mat::from_fn(n, n, |i, j| self[(indices[i], indices[j])])
    }
}
