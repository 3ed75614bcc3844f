//! Matrix-free linear operators.
//!
//! The truncated SVD solver never looks at matrix entries; it only needs the
//! products `A·M` and `Aᵗ·M`. Everything the incremental model feeds to the
//! solver (mean-centred batches, residual projections, stacked summaries) is
//! expressed as a [`LinearOperator`] composed over borrowed operands, so the
//! dense centred matrix is never formed.
//!
//! The four apply methods of an operator must agree with each other:
//! `⟨A·x, y⟩ = ⟨x, Aᵗ·y⟩` for every `x` and `y`.

use nalgebra_sparse::CsrMatrix;
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Data, Ix2};

use crate::sparse::SparseDenseProduct;
use crate::IpcasFloat;

mod mean_center;
mod residual;
mod stacked;

pub(crate) use mean_center::default_epsilon;
pub use mean_center::{MeanCenterOperator, DEFAULT_STD_EPSILON};
pub use residual::ResidualProjectionOperator;
pub use stacked::StackedLinearOperator;

/// A linear map `A: T^ncols → T^nrows` together with its adjoint.
///
/// # Panics
///
/// Implementations panic when the input does not have the expected leading
/// dimension (`ncols` for the forward products, `nrows` for the adjoint ones).
/// Constructors of composed operators validate their operands instead, so a
/// successfully built operator only panics on a misuse of `apply`.
///
/// Operators are `Sync`: the solver applies them to several vectors in
/// parallel.
pub trait LinearOperator<T: IpcasFloat>: Sync {
    fn nrows(&self) -> usize;

    fn ncols(&self) -> usize;

    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    /// `A · v`
    fn matvec(&self, v: ArrayView1<'_, T>) -> Array1<T>;

    /// `A · M`
    fn matmat(&self, m: ArrayView2<'_, T>) -> Array2<T>;

    /// `Aᵗ · v`
    fn rmatvec(&self, v: ArrayView1<'_, T>) -> Array1<T>;

    /// `Aᵗ · M`
    fn rmatmat(&self, m: ArrayView2<'_, T>) -> Array2<T>;

    /// The adjoint as an operator in its own right, borrowing `self`.
    fn adjoint(&self) -> AdjointOperator<'_, Self>
    where
        Self: Sized,
    {
        AdjointOperator { inner: self }
    }
}

impl<T, O> LinearOperator<T> for &O
where
    T: IpcasFloat,
    O: LinearOperator<T> + ?Sized,
{
    #[inline]
    fn nrows(&self) -> usize {
        (**self).nrows()
    }

    #[inline]
    fn ncols(&self) -> usize {
        (**self).ncols()
    }

    #[inline]
    fn matvec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        (**self).matvec(v)
    }

    #[inline]
    fn matmat(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        (**self).matmat(m)
    }

    #[inline]
    fn rmatvec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        (**self).rmatvec(v)
    }

    #[inline]
    fn rmatmat(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        (**self).rmatmat(m)
    }
}

/// Dense matrices (owned, views, shared) delegate to ndarray's `dot`.
impl<T, S> LinearOperator<T> for ArrayBase<S, Ix2>
where
    T: IpcasFloat,
    S: Data<Elem = T> + Sync,
{
    #[inline]
    fn nrows(&self) -> usize {
        self.dim().0
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.dim().1
    }

    fn matvec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        self.dot(&v)
    }

    fn matmat(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        self.dot(&m)
    }

    fn rmatvec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        self.t().dot(&v)
    }

    fn rmatmat(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        self.t().dot(&m)
    }
}

impl<T: IpcasFloat> LinearOperator<T> for CsrMatrix<T> {
    #[inline]
    fn nrows(&self) -> usize {
        CsrMatrix::nrows(self)
    }

    #[inline]
    fn ncols(&self) -> usize {
        CsrMatrix::ncols(self)
    }

    fn matvec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        self.dot_vec(v)
    }

    fn matmat(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        self.dot_dense(m)
    }

    fn rmatvec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        self.transpose_dot_vec(v)
    }

    fn rmatmat(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        self.transpose_dot_dense(m)
    }
}

/// `Aᵗ` viewed as an operator: forward and adjoint products are swapped.
#[derive(Debug, Clone, Copy)]
pub struct AdjointOperator<'a, O: ?Sized> {
    inner: &'a O,
}

impl<'a, O: ?Sized> AdjointOperator<'a, O> {
    pub fn new(inner: &'a O) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &'a O {
        self.inner
    }
}

impl<T, O> LinearOperator<T> for AdjointOperator<'_, O>
where
    T: IpcasFloat,
    O: LinearOperator<T> + ?Sized,
{
    fn nrows(&self) -> usize {
        self.inner.ncols()
    }

    fn ncols(&self) -> usize {
        self.inner.nrows()
    }

    fn matvec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        self.inner.rmatvec(v)
    }

    fn matmat(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        self.inner.rmatmat(m)
    }

    fn rmatvec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        self.inner.matvec(v)
    }

    fn rmatmat(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        self.inner.matmat(m)
    }
}

/// Materialises an operator column by column. Only meant for small operators
/// (tests, diagnostics); the incremental model never calls it.
pub fn to_dense<T, O>(op: &O) -> Array2<T>
where
    T: IpcasFloat,
    O: LinearOperator<T> + ?Sized,
{
    let identity = Array2::<T>::eye(op.ncols());
    op.matmat(identity.view())
}
