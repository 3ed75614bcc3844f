//! Truncated SVD of matrix-free operators.
//!
//! [`TruncatedSvd`] is the only contract the incremental model relies on: give
//! it any [`LinearOperator`] and a rank `k`, get back `k` singular triplets.
//! Singular values are not required to come back ordered; callers that need
//! an order apply [`sort_triplets_descending`] themselves.
//!
//! The provided solvers run the single-svdlib kernels on top of
//! [`SvdLibOperator`], which exposes any operator through single-svdlib's
//! `SMat` interface.

use std::cmp::Ordering;

use ndarray::{s, Array1, Array2, ArrayView1, ArrayViewMut1, Axis};
use num_traits::Float;
use single_svdlib::{SMat, SvdRec};

use crate::error::{IpcasError, Result};
use crate::linop::LinearOperator;
use crate::IpcasFloat;

mod lanczos;
mod randomized;

pub use lanczos::LanczosSvd;
pub use randomized::RandomizedSvd;
pub use single_svdlib::randomized::PowerIterationNormalizer;

/// Which end of the spectrum to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Which {
    #[default]
    LargestMagnitude,
}

/// `u` is rows × k, `s` has length k, `vt` is k × cols. Column `i` of `u`,
/// entry `i` of `s` and row `i` of `vt` belong together.
#[derive(Debug, Clone)]
pub struct SvdTriplets<T> {
    pub u: Array2<T>,
    pub s: Array1<T>,
    pub vt: Array2<T>,
}

impl<T: IpcasFloat> SvdTriplets<T> {
    pub fn rank(&self) -> usize {
        self.s.len()
    }

    /// `diag(s) · vt`, the right factor scaled by its singular values.
    pub fn scaled_vt(&self) -> Array2<T> {
        &self.vt * &self.s.view().insert_axis(Axis(1))
    }
}

pub trait TruncatedSvd<T: IpcasFloat> {
    /// Computes `k` singular triplets of `op` selected by `which`.
    ///
    /// Fails with `InvalidParameter` unless `0 < k <= min(op.shape())`, and
    /// with `SolverDidNotConverge` when the iteration budget runs out.
    fn svds<O>(&self, op: &O, k: usize, which: Which) -> Result<SvdTriplets<T>>
    where
        O: LinearOperator<T> + ?Sized;
}

/// Borrows a [`LinearOperator`] as a single-svdlib `SMat`.
///
/// `svd_opa` maps onto `matvec` (and `rmatvec` when transposed). `nnz`
/// reports the dense size since centred operators have no sparsity to speak of.
pub struct SvdLibOperator<'a, O: ?Sized>(pub &'a O);

impl<T, O> SMat<T> for SvdLibOperator<'_, O>
where
    T: IpcasFloat,
    O: LinearOperator<T> + ?Sized,
{
    fn nrows(&self) -> usize {
        self.0.nrows()
    }

    fn ncols(&self) -> usize {
        self.0.ncols()
    }

    fn nnz(&self) -> usize {
        self.0.nrows() * self.0.ncols()
    }

    fn svd_opa(&self, x: &[T], y: &mut [T], transposed: bool) {
        let x = ArrayView1::from(x);
        let product = if transposed {
            self.0.rmatvec(x)
        } else {
            self.0.matvec(x)
        };
        ArrayViewMut1::from(y).assign(&product);
    }
}

/// Rejects `k` outside `1..=min(rows, cols)` and returns `min(rows, cols)`.
pub(crate) fn check_rank<T, O>(op: &O, k: usize) -> Result<usize>
where
    T: IpcasFloat,
    O: LinearOperator<T> + ?Sized,
{
    let (n_rows, n_cols) = op.shape();
    let min_dim = n_rows.min(n_cols);
    if k == 0 || k > min_dim {
        return Err(IpcasError::InvalidParameter(format!(
            "number of singular triplets ({}) must be in 1..={} for a {}x{} operator",
            k, min_dim, n_rows, n_cols
        )));
    }
    Ok(min_dim)
}

/// The `k` largest triplets of a single-svdlib result. Fewer than `k`
/// significant values means the iteration budget ran out.
pub(crate) fn triplets_from_rec<T: IpcasFloat>(rec: SvdRec<T>, k: usize) -> Result<SvdTriplets<T>> {
    if rec.d < k {
        return Err(IpcasError::SolverDidNotConverge {
            iterations: rec.diagnostics.iterations,
        });
    }

    let sorted = sort_triplets_descending(SvdTriplets {
        u: rec.ut.reversed_axes(),
        s: rec.s,
        vt: rec.vt,
    });
    Ok(SvdTriplets {
        u: sorted.u.slice_move(s![.., ..k]),
        s: sorted.s.slice_move(s![..k]),
        vt: sorted.vt.slice_move(s![..k, ..]),
    })
}

/// Reorders the triplets by descending singular value. NaNs compare equal, so
/// their position is unspecified.
pub fn sort_triplets_descending<T: IpcasFloat>(triplets: SvdTriplets<T>) -> SvdTriplets<T> {
    let s = &triplets.s;
    let mut order: Vec<usize> = (0..s.len()).collect();
    order.sort_by(|&a, &b| s[b].partial_cmp(&s[a]).unwrap_or(Ordering::Equal));

    if order.iter().enumerate().all(|(i, &j)| i == j) {
        return triplets;
    }

    SvdTriplets {
        u: triplets.u.select(Axis(1), &order),
        s: triplets.s.select(Axis(0), &order),
        vt: triplets.vt.select(Axis(0), &order),
    }
}

/// Sign normalisation: flips each right singular vector (and its left partner)
/// so that its largest-magnitude entry is positive. single-svdlib 0.8 has no
/// `svd_flip` of its own.
pub fn svd_flip<T: IpcasFloat>(triplets: &mut SvdTriplets<T>) {
    for (i, mut row) in triplets.vt.outer_iter_mut().enumerate() {
        let pivot = row.iter().copied().fold(T::zero(), |best, v| {
            if Float::abs(v) > Float::abs(best) {
                v
            } else {
                best
            }
        });
        if pivot < T::zero() {
            row.mapv_inplace(|v| -v);
            if i < triplets.u.ncols() {
                triplets.u.column_mut(i).mapv_inplace(|v| -v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linop::test_utils::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::{rngs::StdRng, SeedableRng};
    use single_svdlib::Diagnostics;

    fn rec(d: usize, s: Array1<f64>, ut: Array2<f64>, vt: Array2<f64>) -> SvdRec<f64> {
        SvdRec {
            d,
            ut,
            s,
            vt,
            diagnostics: Diagnostics {
                non_zero: 0,
                dimensions: d,
                iterations: 7,
                transposed: false,
                lanczos_steps: 7,
                ritz_values_stabilized: d,
                significant_values: d,
                singular_values: d,
                end_interval: [-1e-30, 1e-30],
                kappa: 1e-6,
                random_seed: 1,
            },
        }
    }

    #[test]
    fn test_svdlib_operator_applies_both_directions() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = random_matrix(4, 3, &mut rng);
        let op = SvdLibOperator(&a);
        assert_eq!(SMat::<f64>::nrows(&op), 4);
        assert_eq!(SMat::<f64>::ncols(&op), 3);
        assert_eq!(SMat::<f64>::nnz(&op), 12);

        let x = [1.0, -2.0, 0.5];
        let mut y = [0.0; 4];
        op.svd_opa(&x[..], &mut y[..], false);
        let expected = a.dot(&array![1.0, -2.0, 0.5]);
        for (got, want) in y.iter().zip(expected.iter()) {
            assert_relative_eq!(*got, *want, epsilon = 1e-12);
        }

        let w = [0.5, 1.0, -1.0, 2.0];
        let mut z = [0.0; 3];
        op.svd_opa(&w[..], &mut z[..], true);
        let expected = a.t().dot(&array![0.5, 1.0, -1.0, 2.0]);
        for (got, want) in z.iter().zip(expected.iter()) {
            assert_relative_eq!(*got, *want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_triplets_from_rec_sorts_and_truncates() {
        let result = triplets_from_rec(
            rec(
                3,
                array![1.0, 3.0, 2.0],
                array![[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]],
                array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            ),
            2,
        )
        .unwrap();

        assert_eq!(result.s, array![3.0, 2.0]);
        assert_eq!(result.u, array![[0.0, 0.5], [1.0, 0.5]]);
        assert_eq!(result.vt, array![[0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_too_few_significant_values_is_non_convergence() {
        let err = triplets_from_rec(
            rec(1, array![2.0], array![[1.0, 0.0]], array![[0.0, 1.0]]),
            2,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            IpcasError::SolverDidNotConverge { iterations: 7 }
        ));
    }

    #[test]
    fn test_sort_triplets_descending_permutes_all_factors() {
        let triplets = SvdTriplets {
            u: array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            s: array![1.0, 3.0, 2.0],
            vt: array![[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]],
        };
        let sorted = sort_triplets_descending(triplets);

        assert_eq!(sorted.s, array![3.0, 2.0, 1.0]);
        assert_eq!(sorted.vt, array![[0.0, 1.0], [0.5, 0.5], [1.0, 0.0]]);
        assert_eq!(sorted.u, array![[2.0, 3.0, 1.0], [5.0, 6.0, 4.0]]);
    }

    #[test]
    fn test_sort_keeps_ordered_input() {
        let triplets = SvdTriplets {
            u: array![[1.0, 0.0], [0.0, 1.0]],
            s: array![2.0, 1.0],
            vt: array![[1.0, 0.0], [0.0, 1.0]],
        };
        let sorted = sort_triplets_descending(triplets.clone());
        assert_eq!(sorted.s, triplets.s);
        assert_eq!(sorted.vt, triplets.vt);
    }

    #[test]
    fn test_svd_flip_makes_pivot_positive() {
        let mut triplets = SvdTriplets {
            u: array![[1.0, 1.0], [2.0, -1.0]],
            s: array![2.0, 1.0],
            vt: array![[0.6, -0.8], [0.8, 0.6]],
        };
        svd_flip(&mut triplets);

        assert_eq!(triplets.vt, array![[-0.6, 0.8], [0.8, 0.6]]);
        assert_eq!(triplets.u, array![[-1.0, 1.0], [-2.0, -1.0]]);
    }

    #[test]
    fn test_scaled_vt() {
        let triplets = SvdTriplets {
            u: Array2::<f64>::zeros((1, 2)),
            s: array![2.0, 0.5],
            vt: array![[1.0, 0.0, 1.0], [0.0, 2.0, 0.0]],
        };
        assert_eq!(
            triplets.scaled_vt(),
            array![[2.0, 0.0, 2.0], [0.0, 1.0, 0.0]]
        );
    }
}
