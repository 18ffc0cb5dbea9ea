// SparseMatrix trait and the CSR storage used by the hierarchy

use faer::sparse::linalg::matmul::sparse_sparse_matmul;
use faer::sparse::{CreationError, SparseRowMat, Triplet};
use faer::traits::RealField;

use crate::core::traits::SystemMatrix;
use crate::error::AmgError;
use crate::parallel::kernel_parallelism;

/// A read‐only sparse matrix supporting y = A * x.
pub trait SparseMatrix<T> {
    /// Number of rows.
    fn nrows(&self) -> usize;
    /// Number of columns.
    fn ncols(&self) -> usize;
    /// Compute y = A * x.  `x.len() == ncols()`, `y.len() == nrows()`.
    fn spmv(&self, x: &[T], y: &mut [T]);
}

/// Compressed sparse row matrix over Faer's `SparseRowMat`. Column indices
/// are sorted within each row and duplicates are summed at construction.
#[derive(Debug, Clone)]
pub struct CsrMatrix<T> {
    inner: SparseRowMat<usize, T>,
}

impl<T: RealField + Copy> CsrMatrix<T> {
    /// Build a CSR from raw row‐ptr, col‐idx, and values.
    ///
    /// # Panics
    /// Panics if the arrays do not describe a valid `nrows × ncols` pattern.
    pub fn from_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Self {
        match Self::try_from_csr(nrows, ncols, row_ptr, col_idx, values) {
            Ok(m) => m,
            Err(e) => panic!("CsrMatrix::from_csr: {e}"),
        }
    }

    /// Checked variant of [`CsrMatrix::from_csr`]. Rows need not be sorted.
    pub fn try_from_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self, AmgError> {
        if row_ptr.len() != nrows + 1 {
            return Err(AmgError::LengthMismatch {
                what: "row_ptr",
                expected: nrows + 1,
                found: row_ptr.len(),
            });
        }
        if col_idx.len() != values.len() {
            return Err(AmgError::LengthMismatch {
                what: "values",
                expected: col_idx.len(),
                found: values.len(),
            });
        }
        if row_ptr[0] != 0 {
            return Err(AmgError::LengthMismatch {
                what: "row_ptr",
                expected: 0,
                found: row_ptr[0],
            });
        }
        if let Some(w) = row_ptr.windows(2).find(|w| w[0] > w[1]) {
            return Err(AmgError::LengthMismatch {
                what: "row_ptr",
                expected: w[0],
                found: w[1],
            });
        }
        if row_ptr[nrows] != col_idx.len() {
            return Err(AmgError::LengthMismatch {
                what: "row_ptr",
                expected: col_idx.len(),
                found: row_ptr[nrows],
            });
        }
        if let Some((k, &j)) = col_idx.iter().enumerate().find(|&(_, &j)| j >= ncols) {
            return Err(AmgError::VertexOutOfRange {
                what: "column index",
                index: k,
                vertex: j,
                num_vertices: ncols,
            });
        }

        let mut triplets = Vec::with_capacity(col_idx.len());
        for i in 0..nrows {
            let range = row_ptr[i]..row_ptr[i + 1];
            for (&j, &v) in col_idx[range.clone()].iter().zip(&values[range]) {
                triplets.push(Triplet::new(i, j, v));
            }
        }
        Self::assemble(nrows, ncols, &triplets)
    }

    /// Assemble from `(row, col, value)` triplets; duplicates are summed.
    ///
    /// # Panics
    /// Panics on an out-of-range index.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, T)]) -> Self {
        match Self::try_from_triplets(nrows, ncols, triplets) {
            Ok(m) => m,
            Err(e) => panic!("CsrMatrix::from_triplets: {e}"),
        }
    }

    /// Checked variant of [`CsrMatrix::from_triplets`].
    pub fn try_from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, T)]) -> Result<Self, AmgError> {
        for (k, &(i, j, _)) in triplets.iter().enumerate() {
            if i >= nrows {
                return Err(AmgError::VertexOutOfRange {
                    what: "row index",
                    index: k,
                    vertex: i,
                    num_vertices: nrows,
                });
            }
            if j >= ncols {
                return Err(AmgError::VertexOutOfRange {
                    what: "column index",
                    index: k,
                    vertex: j,
                    num_vertices: ncols,
                });
            }
        }
        let triplets: Vec<_> = triplets.iter().map(|&(i, j, v)| Triplet::new(i, j, v)).collect();
        Self::assemble(nrows, ncols, &triplets)
    }

    fn assemble(nrows: usize, ncols: usize, triplets: &[Triplet<usize, usize, T>]) -> Result<Self, AmgError> {
        let inner = SparseRowMat::try_new_from_triplets(nrows, ncols, triplets).map_err(|err| match err {
            CreationError::Generic(err) => AmgError::Sparse(err),
            CreationError::OutOfBounds { col, .. } => AmgError::VertexOutOfRange {
                what: "column index",
                index: 0,
                vertex: col,
                num_vertices: ncols,
            },
        })?;
        Ok(Self { inner })
    }

    pub fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.inner.ncols()
    }

    pub fn nnz(&self) -> usize {
        self.inner.compute_nnz()
    }

    /// Underlying Faer matrix.
    pub fn as_faer(&self) -> &SparseRowMat<usize, T> {
        &self.inner
    }

    /// Column indices and values of row `i`.
    pub fn row(&self, i: usize) -> (&[usize], &[T]) {
        (self.inner.symbolic().col_idx_of_row_raw(i), self.inner.val_of_row(i))
    }

    /// Entry (i, j), zero when not stored.
    pub fn get(&self, i: usize, j: usize) -> T {
        match self.inner.get(i, j) {
            Some(&v) => v,
            None => T::zero(),
        }
    }

    /// Explicit transpose, as the row-major view of this matrix's
    /// column-major form.
    pub fn transpose(&self) -> Result<Self, AmgError> {
        let inner = self.inner.to_col_major()?.into_transpose();
        Ok(Self { inner })
    }

    /// Galerkin product Pᵀ · self · P.
    ///
    /// Faer multiplies column-major operands, and the CSR storage of a matrix
    /// is the CSC storage of its transpose. The product is formed as
    /// `Cᵀ = Pᵀ (Aᵀ P)`, whose CSC storage is the CSR storage of `C`.
    pub fn galerkin(&self, p: &CsrMatrix<T>) -> Result<Self, AmgError> {
        if self.nrows() != self.ncols() {
            return Err(AmgError::LengthMismatch {
                what: "matrix columns",
                expected: self.nrows(),
                found: self.ncols(),
            });
        }
        if p.nrows() != self.nrows() {
            return Err(AmgError::LengthMismatch {
                what: "prolongation rows",
                expected: self.nrows(),
                found: p.nrows(),
            });
        }
        let par = kernel_parallelism();
        let p_csc = p.inner.to_col_major()?;
        let at_p = sparse_sparse_matmul(self.inner.transpose(), p_csc.as_ref(), T::one(), par)?;
        let ct = sparse_sparse_matmul(p.inner.transpose(), at_p.as_ref(), T::one(), par)?;
        Ok(Self { inner: ct.into_transpose() })
    }
}

impl<T: RealField + Copy> SparseMatrix<T> for CsrMatrix<T> {
    fn nrows(&self) -> usize {
        self.inner.nrows()
    }
    fn ncols(&self) -> usize {
        self.inner.ncols()
    }
    fn spmv(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.ncols());
        assert_eq!(y.len(), self.nrows());
        for (i, yi) in y.iter_mut().enumerate() {
            let (cols, vals) = self.row(i);
            *yi = cols
                .iter()
                .zip(vals)
                .fold(T::zero(), |acc, (&j, &v)| acc + v * x[j]);
        }
    }
}

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[cfg(feature = "rayon")]
use crate::parallel::on_worker_thread;

#[cfg(feature = "rayon")]
impl<T: RealField + Copy + Send + Sync> CsrMatrix<T> {
    /// Parallel SpMV using Rayon, on the pool of the calling thread.
    pub fn spmv_parallel(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.ncols());
        assert_eq!(y.len(), self.nrows());
        y.par_iter_mut().enumerate().for_each(|(i, yi)| {
            let (cols, vals) = self.row(i);
            *yi = cols
                .iter()
                .zip(vals)
                .fold(T::zero(), |acc, (&j, &v)| acc + v * x[j]);
        });
    }
}

/// Rows above which `multiply` switches to the Rayon SpMV.
#[cfg(feature = "rayon")]
const PARALLEL_SPMV_ROWS: usize = 4096;

impl SystemMatrix for CsrMatrix<f64> {
    fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    fn ncols(&self) -> usize {
        self.inner.ncols()
    }

    // Parallel only on a worker thread, so a sequential caller stays on its
    // own thread.
    fn multiply(&self, x: &[f64], y: &mut [f64]) {
        #[cfg(feature = "rayon")]
        if self.nrows() >= PARALLEL_SPMV_ROWS && on_worker_thread() {
            return self.spmv_parallel(x, y);
        }
        self.spmv(x, y)
    }

    fn row_dot(&self, row: usize, x: &[f64]) -> f64 {
        let (cols, vals) = self.row(row);
        cols.iter().zip(vals).map(|(&j, &v)| v * x[j]).sum()
    }

    fn entry(&self, i: usize, j: usize) -> f64 {
        self.get(i, j)
    }

    fn nnz(&self) -> usize {
        self.inner.compute_nnz()
    }

    fn restrict(&self, p: &CsrMatrix<f64>) -> Result<Self, AmgError> {
        self.galerkin(p)
    }
}
