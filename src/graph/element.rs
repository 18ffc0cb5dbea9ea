//! Element-matrix contributions to the fine graph weights.
//!
//! For every element the assembly loop hands over its local matrix and the
//! global dof numbers. The vertex weight of a dof is the 1×1 Schur complement
//! of the element matrix onto that dof; the edge weight of a dof pair is the
//! `(0, 0)` entry of the 2×2 Schur complement onto the pair, ordered by local
//! index, so it is taken at the dof that comes first in the element.

use faer::linalg::solvers::{FullPivLu, SolveCore};
use faer::{Conj, Mat, MatRef};

use crate::error::AmgError;
use crate::graph::WeightAccumulator;

/// Schur complement of `a` onto the index set `keep`:
/// `S = A_kk − A_kr A_rr⁻¹ A_rk`, where `r` is the complement of `keep`.
pub fn schur_complement(a: MatRef<'_, f64>, keep: &[usize]) -> Mat<f64> {
    let n = a.nrows();
    let rest: Vec<usize> = (0..n).filter(|i| !keep.contains(i)).collect();
    let mut s = Mat::from_fn(keep.len(), keep.len(), |i, j| a[(keep[i], keep[j])]);
    if rest.is_empty() {
        return s;
    }

    let a_rr = Mat::from_fn(rest.len(), rest.len(), |i, j| a[(rest[i], rest[j])]);
    // X = A_rr⁻¹ A_rk, solved column by column in place
    let mut x = Mat::from_fn(rest.len(), keep.len(), |i, j| a[(rest[i], keep[j])]);
    let lu = FullPivLu::new(a_rr.as_ref());
    lu.solve_in_place_with_conj(Conj::No, x.as_mut());

    for i in 0..keep.len() {
        for j in 0..keep.len() {
            let coupling: f64 = (0..rest.len()).map(|k| a[(keep[i], rest[k])] * x[(k, j)]).sum();
            s[(i, j)] -= coupling;
        }
    }
    s
}

impl WeightAccumulator {
    /// Add the vertex and edge weights of one element.
    ///
    /// `elmat` is the element matrix in the local numbering of `dofs`.
    pub fn add_element_matrix(&self, dofs: &[usize], elmat: MatRef<'_, f64>) -> Result<(), AmgError> {
        let n = dofs.len();
        if elmat.nrows() != n || elmat.ncols() != n {
            return Err(AmgError::LengthMismatch {
                what: "element matrix",
                expected: n,
                found: elmat.nrows().max(elmat.ncols()),
            });
        }

        let mut vertex_weights = Vec::with_capacity(n);
        for i in 0..n {
            let w = schur_complement(elmat, &[i])[(0, 0)];
            if !w.is_finite() {
                return Err(AmgError::NonFiniteWeight { what: "element vertex weight", index: dofs[i] });
            }
            vertex_weights.push(w);
        }
        let mut edge_weights = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in 0..i {
                let w = schur_complement(elmat, &[j, i])[(0, 0)];
                if !w.is_finite() {
                    return Err(AmgError::NonFiniteWeight { what: "element edge weight", index: dofs[i] });
                }
                edge_weights.push((dofs[j], dofs[i], w));
            }
        }

        // all weights are checked before any is published
        for (&dof, w) in dofs.iter().zip(vertex_weights) {
            self.add_vertex_weight(dof, w);
        }
        for (u, v, w) in edge_weights {
            self.add_edge_weight(u, v, w);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use faer::mat;

    #[test]
    fn schur_of_1d_stiffness() {
        let k = mat![[1.0, -1.0], [-1.0, 1.0]];
        // eliminating one end of a bar leaves nothing: constants are in the kernel
        assert_relative_eq!(schur_complement(k.as_ref(), &[0])[(0, 0)], 0.0, epsilon = 1e-14);
        let full = schur_complement(k.as_ref(), &[0, 1]);
        assert_eq!(full[(0, 0)], 1.0);
        assert_eq!(full[(0, 1)], -1.0);
    }

    #[test]
    fn schur_of_spd_3x3() {
        let a = mat![
            [4.0, 1.0, 0.0],
            [1.0, 3.0, 1.0],
            [0.0, 1.0, 2.0]
        ];
        // S = 4 - [1 0] [[3,1],[1,2]]^-1 [1 0]^T = 4 - 2/5
        assert_relative_eq!(schur_complement(a.as_ref(), &[0])[(0, 0)], 3.6, epsilon = 1e-12);
    }

    #[test]
    fn bar_elements_produce_path_graph() {
        let acc = WeightAccumulator::new();
        let k = mat![[2.0, -2.0], [-2.0, 2.0]];
        for e in 0..3 {
            acc.add_element_matrix(&[e, e + 1], k.as_ref()).unwrap();
        }
        let g = acc.finalize(4).unwrap();
        assert_eq!(g.edges(), &[(0, 1), (1, 2), (2, 3)]);
        assert_eq!(g.edge_weights(), &[2.0, 2.0, 2.0]);
        for &w in g.vertex_weights() {
            assert_relative_eq!(w, 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn edge_weight_is_taken_at_first_local_dof() {
        let acc = WeightAccumulator::new();
        let k = mat![[1.5, -1.0], [-1.0, 3.0]];
        acc.add_element_matrix(&[0, 1], k.as_ref()).unwrap();
        let g = acc.finalize(2).unwrap();
        assert_eq!(g.edges(), &[(0, 1)]);
        assert_eq!(g.edge_weights(), &[1.5]);
    }

    #[test]
    fn edge_weight_follows_local_order_not_global_numbers() {
        // same element with dofs listed high-to-low: the first local dof is 7
        let acc = WeightAccumulator::new();
        let k = mat![[1.5, -1.0], [-1.0, 3.0]];
        acc.add_element_matrix(&[7, 2], k.as_ref()).unwrap();
        let g = acc.finalize(8).unwrap();
        assert_eq!(g.edges(), &[(2, 7)]);
        assert_eq!(g.edge_weights(), &[1.5]);
    }

    #[test]
    fn rejects_mismatched_element() {
        let acc = WeightAccumulator::new();
        let k = Mat::<f64>::zeros(3, 3);
        assert!(matches!(
            acc.add_element_matrix(&[0, 1], k.as_ref()),
            Err(AmgError::LengthMismatch { what: "element matrix", .. })
        ));
    }
}
