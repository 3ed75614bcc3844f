use std::fmt;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::{IpcasError, Result};
use crate::linop::LinearOperator;
use crate::IpcasFloat;

/// `X - X·V·Vᵗ`: the part of `X` not explained by the column space of `V`.
///
/// `V` (features × r) is expected to have (nearly) orthonormal columns, e.g.
/// the transposed components of an earlier fit. Orthonormality is not
/// checked; with a non-orthonormal basis the operator is still the exact
/// `X·(I - V·Vᵗ)`, just not a projection.
pub struct ResidualProjectionOperator<'a, T: IpcasFloat, O: ?Sized> {
    x: &'a O,
    basis: ArrayView2<'a, T>,
}

impl<'a, T, O> ResidualProjectionOperator<'a, T, O>
where
    T: IpcasFloat,
    O: LinearOperator<T> + ?Sized,
{
    pub fn new(x: &'a O, basis: ArrayView2<'a, T>) -> Result<Self> {
        if x.ncols() != basis.nrows() {
            return Err(IpcasError::dimension(
                "ResidualProjectionOperator basis rows",
                x.ncols(),
                basis.nrows(),
            ));
        }
        Ok(Self { x, basis })
    }

    pub fn basis(&self) -> ArrayView2<'a, T> {
        self.basis
    }

    /// `(I - V·Vᵗ) · m`
    fn complement(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        let projected = self.basis.dot(&self.basis.t().dot(&m));
        &m - &projected
    }

    fn complement_vec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        let projected = self.basis.dot(&self.basis.t().dot(&v));
        &v - &projected
    }
}

impl<T, O> LinearOperator<T> for ResidualProjectionOperator<'_, T, O>
where
    T: IpcasFloat,
    O: LinearOperator<T> + ?Sized,
{
    fn nrows(&self) -> usize {
        self.x.nrows()
    }

    fn ncols(&self) -> usize {
        self.x.ncols()
    }

    // X·v - X·V·Vᵗ·v, with a single application of X.
    fn matvec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        self.x.matvec(self.complement_vec(v).view())
    }

    fn matmat(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        self.x.matmat(self.complement(m).view())
    }

    fn rmatvec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        let xt_v = self.x.rmatvec(v);
        self.complement_vec(xt_v.view())
    }

    fn rmatmat(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        let xt_m = self.x.rmatmat(m);
        self.complement(xt_m.view())
    }
}

impl<T, O> fmt::Debug for ResidualProjectionOperator<'_, T, O>
where
    T: IpcasFloat,
    O: LinearOperator<T> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResidualProjectionOperator")
            .field("shape", &self.shape())
            .field("basis_rank", &self.basis.ncols())
            .finish()
    }
}
