use std::ops::AddAssign;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use num_traits::{Float, NumCast};

pub mod csr;

pub use csr::promote_csr;

/// Column sums over the stored entries, cast into `T`.
pub trait MatrixSum {
    fn sum_col<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum;

    fn sum_col_squared<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum;
}

/// Column-wise mean and population standard deviation (`ddof = 0`), with
/// implicit zeros counted as samples.
pub trait MatrixMeanStd {
    fn mean_col<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum;

    fn mean_std_col<T>(&self) -> anyhow::Result<(Vec<T>, Vec<T>)>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum;
}

/// Products of a sparse matrix with dense right-hand sides.
///
/// # Panics
///
/// All methods panic when the inner dimensions disagree.
pub trait SparseDenseProduct<T> {
    fn dot_dense(&self, rhs: ArrayView2<'_, T>) -> Array2<T>;

    fn dot_vec(&self, rhs: ArrayView1<'_, T>) -> Array1<T>;

    /// `selfᵗ · rhs` without forming the transpose.
    fn transpose_dot_dense(&self, rhs: ArrayView2<'_, T>) -> Array2<T>;

    fn transpose_dot_vec(&self, rhs: ArrayView1<'_, T>) -> Array1<T>;
}
