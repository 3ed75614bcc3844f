use std::ops::AddAssign;

use anyhow::{anyhow, bail};
use nalgebra_sparse::CsrMatrix;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use num_traits::{Float, NumCast};
use rayon::prelude::*;

use crate::error::IpcasError;
use crate::IpcasFloat;

use super::{MatrixMeanStd, MatrixSum, SparseDenseProduct};

impl<M: NumCast + Copy> MatrixSum for CsrMatrix<M> {
    fn sum_col<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum,
    {
        let mut result = vec![T::zero(); self.ncols()];
        for (&col_index, &value) in self.col_indices().iter().zip(self.values().iter()) {
            result[col_index] +=
                T::from(value).ok_or_else(|| anyhow!("Failed to convert to target type"))?;
        }
        Ok(result)
    }

    fn sum_col_squared<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum,
    {
        let mut result = vec![T::zero(); self.ncols()];
        for (&col_index, &value) in self.col_indices().iter().zip(self.values().iter()) {
            let val = T::from(value).ok_or_else(|| anyhow!("Failed to convert to target type"))?;
            result[col_index] += val * val;
        }
        Ok(result)
    }
}

impl<M: NumCast + Copy> MatrixMeanStd for CsrMatrix<M> {
    fn mean_col<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum,
    {
        if self.nrows() == 0 {
            bail!("Cannot compute column means of a matrix without rows");
        }
        let n = T::from(self.nrows()).ok_or_else(|| anyhow!("Row count not representable"))?;
        let sums: Vec<T> = self.sum_col()?;
        Ok(sums.into_iter().map(|s| s / n).collect())
    }

    fn mean_std_col<T>(&self) -> anyhow::Result<(Vec<T>, Vec<T>)>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum,
    {
        let mean: Vec<T> = self.mean_col()?;
        let n = T::from(self.nrows()).ok_or_else(|| anyhow!("Row count not representable"))?;
        let sq_sums: Vec<T> = self.sum_col_squared()?;

        // E[x²] - E[x]² can dip below zero by rounding on constant columns.
        let std = sq_sums
            .iter()
            .zip(mean.iter())
            .map(|(&sq, &mu)| (sq / n - mu * mu).max(T::zero()).sqrt())
            .collect();

        Ok((mean, std))
    }
}

impl<T: IpcasFloat> SparseDenseProduct<T> for CsrMatrix<T> {
    fn dot_dense(&self, rhs: ArrayView2<'_, T>) -> Array2<T> {
        assert_eq!(
            self.ncols(),
            rhs.nrows(),
            "Dimension mismatch: sparse matrix has {} columns but right-hand side has {} rows.",
            self.ncols(),
            rhs.nrows(),
        );

        let offsets = self.row_offsets();
        let col_indices = self.col_indices();
        let values = self.values();

        let mut out = Array2::zeros((self.nrows(), rhs.ncols()));
        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row, mut out_row)| {
                for idx in offsets[row]..offsets[row + 1] {
                    out_row.scaled_add(values[idx], &rhs.row(col_indices[idx]));
                }
            });
        out
    }

    fn dot_vec(&self, rhs: ArrayView1<'_, T>) -> Array1<T> {
        assert_eq!(
            self.ncols(),
            rhs.len(),
            "Dimension mismatch: sparse matrix has {} columns but vector has {} entries.",
            self.ncols(),
            rhs.len(),
        );

        self.row_iter()
            .map(|row| {
                row.col_indices()
                    .iter()
                    .zip(row.values().iter())
                    .map(|(&col, &value)| value * rhs[col])
                    .sum::<T>()
            })
            .collect()
    }

    fn transpose_dot_dense(&self, rhs: ArrayView2<'_, T>) -> Array2<T> {
        assert_eq!(
            self.nrows(),
            rhs.nrows(),
            "Dimension mismatch: sparse matrix has {} rows but right-hand side has {} rows.",
            self.nrows(),
            rhs.nrows(),
        );

        let mut out = Array2::zeros((self.ncols(), rhs.ncols()));
        for (row_idx, row) in self.row_iter().enumerate() {
            let rhs_row = rhs.row(row_idx);
            for (&col, &value) in row.col_indices().iter().zip(row.values().iter()) {
                out.row_mut(col).scaled_add(value, &rhs_row);
            }
        }
        out
    }

    fn transpose_dot_vec(&self, rhs: ArrayView1<'_, T>) -> Array1<T> {
        assert_eq!(
            self.nrows(),
            rhs.len(),
            "Dimension mismatch: sparse matrix has {} rows but vector has {} entries.",
            self.nrows(),
            rhs.len(),
        );

        let mut out = Array1::zeros(self.ncols());
        for (row_idx, row) in self.row_iter().enumerate() {
            let weight = rhs[row_idx];
            for (&col, &value) in row.col_indices().iter().zip(row.values().iter()) {
                out[col] += value * weight;
            }
        }
        out
    }
}

/// Converts a CSR matrix with integer (or other numeric) entries into a
/// floating-point one with the same sparsity pattern.
pub fn promote_csr<I, T>(x: &CsrMatrix<I>) -> crate::Result<CsrMatrix<T>>
where
    I: NumCast + Copy,
    T: IpcasFloat,
{
    let values = x
        .values()
        .iter()
        .map(|&v| {
            num_traits::cast::<I, T>(v).ok_or_else(|| {
                IpcasError::InvalidParameter("sparse value not representable as float".to_string())
            })
        })
        .collect::<crate::Result<Vec<T>>>()?;

    CsrMatrix::try_from_csr_data(
        x.nrows(),
        x.ncols(),
        x.row_offsets().to_vec(),
        x.col_indices().to_vec(),
        values,
    )
    .map_err(|e| IpcasError::SparseFormat(e.to_string()))
}
