// Block Gauss-Seidel smoother over a partition of the unknowns

use std::sync::Arc;

use bitflags::bitflags;
use faer::linalg::solvers::{FullPivLu, SolveCore};
use faer::{Conj, MatMut};

use crate::core::traits::SystemMatrix;
use crate::error::AmgError;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Sweep: u32 {
        const FORWARD   = 0b01; // blocks in ascending order
        const BACKWARD  = 0b10; // blocks in descending order
        const SYMMETRIC = Self::FORWARD.bits() | Self::BACKWARD.bits();
    }
}

/// Block Gauss-Seidel smoother.
///
/// Each block is relaxed by solving its diagonal block exactly against the
/// current values outside the block. Empty blocks are skipped.
pub struct BlockGaussSeidel<M> {
    matrix: Arc<M>,
    blocks: Vec<Vec<usize>>,
    factors: Vec<Option<FullPivLu<f64>>>,
}

impl<M: SystemMatrix> BlockGaussSeidel<M> {
    /// Setup: factor each block's diagonal submatrix.
    pub fn new(matrix: Arc<M>, blocks: Vec<Vec<usize>>) -> Result<Self, AmgError> {
        let n = matrix.nrows();
        let mut factors = Vec::with_capacity(blocks.len());
        for (b, block) in blocks.iter().enumerate() {
            if block.is_empty() {
                factors.push(None);
                continue;
            }
            for &i in block {
                if i >= n {
                    return Err(AmgError::VertexOutOfRange {
                        what: "smoothing block",
                        index: b,
                        vertex: i,
                        num_vertices: n,
                    });
                }
                let d = matrix.entry(i, i);
                if d == 0.0 || !d.is_finite() {
                    return Err(AmgError::SingularBlock { block: b });
                }
            }
            let sub = matrix.submatrix(block);
            factors.push(Some(FullPivLu::new(sub.as_ref())));
        }
        Ok(Self { matrix, blocks, factors })
    }

    pub fn blocks(&self) -> &[Vec<usize>] {
        &self.blocks
    }

    /// `steps` forward sweeps, in place.
    pub fn gs_smooth(&self, x: &mut [f64], b: &[f64], steps: usize) {
        self.smooth(x, b, steps, Sweep::FORWARD);
    }

    /// `steps` backward sweeps, in place. The adjoint of [`Self::gs_smooth`]
    /// for a symmetric matrix.
    pub fn gs_smooth_back(&self, x: &mut [f64], b: &[f64], steps: usize) {
        self.smooth(x, b, steps, Sweep::BACKWARD);
    }

    /// `steps` sweeps in the given direction(s); a symmetric sweep runs
    /// forward then backward.
    pub fn smooth(&self, x: &mut [f64], b: &[f64], steps: usize, sweep: Sweep) {
        let mut scratch = Vec::new();
        for _ in 0..steps {
            if sweep.contains(Sweep::FORWARD) {
                for k in 0..self.blocks.len() {
                    self.smooth_block(k, x, b, &mut scratch);
                }
            }
            if sweep.contains(Sweep::BACKWARD) {
                for k in (0..self.blocks.len()).rev() {
                    self.smooth_block(k, x, b, &mut scratch);
                }
            }
        }
    }

    fn smooth_block(&self, k: usize, x: &mut [f64], b: &[f64], d: &mut Vec<f64>) {
        let Some(lu) = &self.factors[k] else {
            return;
        };
        let block = &self.blocks[k];
        // d = (b - A x) on the block, then x_block += A_bb⁻¹ d
        d.clear();
        d.extend(block.iter().map(|&i| b[i] - self.matrix.row_dot(i, x)));
        let n = d.len();
        lu.solve_in_place_with_conj(Conj::No, MatMut::from_column_major_slice_mut(d.as_mut_slice(), n, 1));
        for (&i, &di) in block.iter().zip(d.iter()) {
            x[i] += di;
        }
    }
}
