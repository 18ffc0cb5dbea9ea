//! Direct dense solve for the coarsest level, using Faer's full-pivoting LU.
//!
//! The matrix is restricted to the free dofs before factorization; entries of
//! the solution at non-free dofs are zero.

use faer::linalg::solvers::{FullPivLu, SolveCore};
use faer::{Conj, MatMut};

use crate::core::traits::SystemMatrix;
use crate::error::AmgError;

/// LU-factored system restricted to a free-dof mask.
#[derive(Default)]
pub struct DirectSolver {
    size: usize,
    free: Vec<usize>,
    factor: Option<FullPivLu<f64>>,
}

impl DirectSolver {
    /// Factor `a` on the dofs where `free` is set.
    pub fn new<M: SystemMatrix>(a: &M, free: &[bool]) -> Result<Self, AmgError> {
        let size = a.nrows();
        if free.len() != size {
            return Err(AmgError::LengthMismatch {
                what: "free-dof mask",
                expected: size,
                found: free.len(),
            });
        }
        let free: Vec<usize> = (0..size).filter(|&i| free[i]).collect();
        let factor = if free.is_empty() {
            None
        } else {
            Some(FullPivLu::new(a.submatrix(&free).as_ref()))
        };
        Ok(Self { size, free, factor })
    }

    /// Number of rows of the full (unrestricted) system.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of free dofs actually solved for.
    pub fn num_free(&self) -> usize {
        self.free.len()
    }

    /// Solve `A x = b` on the free dofs; `x` is zero elsewhere.
    pub fn solve(&self, b: &[f64], x: &mut [f64]) {
        assert_eq!(b.len(), self.size, "DirectSolver: right-hand side has incorrect length");
        assert_eq!(x.len(), self.size, "DirectSolver: solution has incorrect length");
        x.fill(0.0);
        let Some(factor) = &self.factor else {
            return;
        };
        let mut rhs: Vec<f64> = self.free.iter().map(|&i| b[i]).collect();
        let n = rhs.len();
        factor.solve_in_place_with_conj(Conj::No, MatMut::from_column_major_slice_mut(rhs.as_mut_slice(), n, 1));
        for (&i, &v) in self.free.iter().zip(rhs.iter()) {
            x[i] = v;
        }
    }
}
