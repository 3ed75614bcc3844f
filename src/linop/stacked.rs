use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};

use crate::error::{IpcasError, Result};
use crate::linop::LinearOperator;
use crate::IpcasFloat;

/// Vertical concatenation `[A; B]` of two operators with the same column count.
///
/// Forward products return the rows of `A` first, then those of `B`. The
/// adjoint splits its input after `A.nrows()` rows and sums
/// `Aᵗ·u_top + Bᵗ·u_bottom`.
#[derive(Debug, Clone)]
pub struct StackedLinearOperator<A, B> {
    top: A,
    bottom: B,
}

impl<A, B> StackedLinearOperator<A, B> {
    pub fn new<T>(top: A, bottom: B) -> Result<Self>
    where
        T: IpcasFloat,
        A: LinearOperator<T>,
        B: LinearOperator<T>,
    {
        if top.ncols() != bottom.ncols() {
            return Err(IpcasError::dimension(
                "StackedLinearOperator column count",
                top.ncols(),
                bottom.ncols(),
            ));
        }
        Ok(Self { top, bottom })
    }

    pub fn top(&self) -> &A {
        &self.top
    }

    pub fn bottom(&self) -> &B {
        &self.bottom
    }

    pub fn into_parts(self) -> (A, B) {
        (self.top, self.bottom)
    }
}

impl<T, A, B> LinearOperator<T> for StackedLinearOperator<A, B>
where
    T: IpcasFloat,
    A: LinearOperator<T>,
    B: LinearOperator<T>,
{
    fn nrows(&self) -> usize {
        self.top.nrows() + self.bottom.nrows()
    }

    fn ncols(&self) -> usize {
        self.top.ncols()
    }

    fn matvec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        let split = self.top.nrows();
        let mut out = Array1::zeros(self.nrows());
        out.slice_mut(s![..split]).assign(&self.top.matvec(v));
        out.slice_mut(s![split..]).assign(&self.bottom.matvec(v));
        out
    }

    fn matmat(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        let split = self.top.nrows();
        let mut out = Array2::zeros((self.nrows(), m.ncols()));
        out.slice_mut(s![..split, ..]).assign(&self.top.matmat(m));
        out.slice_mut(s![split.., ..]).assign(&self.bottom.matmat(m));
        out
    }

    fn rmatvec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        let split = self.top.nrows();
        let mut out = self.top.rmatvec(v.slice(s![..split]));
        out += &self.bottom.rmatvec(v.slice(s![split..]));
        out
    }

    fn rmatmat(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        let split = self.top.nrows();
        let mut out = self.top.rmatmat(m.slice(s![..split, ..]));
        out += &self.bottom.rmatmat(m.slice(s![split.., ..]));
        out
    }
}
