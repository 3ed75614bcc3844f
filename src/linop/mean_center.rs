use std::fmt;

use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use num_traits::Float;

use crate::error::{IpcasError, Result};
use crate::linop::LinearOperator;
use crate::utils::cast;
use crate::IpcasFloat;

/// Default lower bound applied to the standard deviation before inverting it.
pub const DEFAULT_STD_EPSILON: f64 = 1e-300;

/// `(X - 1·μᵗ) · diag(1/σ)` applied lazily.
///
/// `X` is typically a sparse batch (rows are samples, columns features). The
/// centred and scaled matrix is never formed: the forward product scales the
/// right-hand side first and subtracts the rank-one mean term afterwards, the
/// adjoint does the reverse.
///
/// Standard deviations below the epsilon are clipped to it instead of
/// failing, so constant features end up with a huge (but finite) scale on an
/// all-zero centred column.
pub struct MeanCenterOperator<'a, T: IpcasFloat, O: ?Sized> {
    x: &'a O,
    mean: ArrayView1<'a, T>,
    inv_std: Array1<T>,
}

impl<'a, T, O> MeanCenterOperator<'a, T, O>
where
    T: IpcasFloat,
    O: LinearOperator<T> + ?Sized,
{
    pub fn new(x: &'a O, mean: ArrayView1<'a, T>, std: ArrayView1<'_, T>) -> Result<Self> {
        Self::with_epsilon(x, mean, std, default_epsilon())
    }

    pub fn with_epsilon(
        x: &'a O,
        mean: ArrayView1<'a, T>,
        std: ArrayView1<'_, T>,
        epsilon: T,
    ) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(IpcasError::dimension(
                "MeanCenterOperator std length",
                mean.len(),
                std.len(),
            ));
        }
        if mean.len() != x.ncols() {
            return Err(IpcasError::dimension(
                "MeanCenterOperator mean length",
                x.ncols(),
                mean.len(),
            ));
        }

        let clipped = std.iter().filter(|&&s| !(s >= epsilon)).count();
        if clipped > 0 {
            debug!("Clipping {} standard deviations to {:e}", clipped, epsilon);
        }
        let inv_std = std.mapv(|s| T::one() / Float::max(s, epsilon));

        Ok(Self { x, mean, inv_std })
    }

    pub fn inner(&self) -> &'a O {
        self.x
    }

    pub fn mean(&self) -> ArrayView1<'a, T> {
        self.mean
    }

    pub fn inv_std(&self) -> ArrayView1<'_, T> {
        self.inv_std.view()
    }

    /// The effective (clipped) standard deviation.
    pub fn std(&self) -> Array1<T> {
        self.inv_std.mapv(|s| T::one() / s)
    }
}

/// `max(1e-300, smallest positive normal)`, so f32 does not round the guard to zero.
pub(crate) fn default_epsilon<T: IpcasFloat>() -> T {
    Float::max(cast(DEFAULT_STD_EPSILON), <T as Float>::min_positive_value())
}

impl<T, O> LinearOperator<T> for MeanCenterOperator<'_, T, O>
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

    fn matvec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        let scaled = &v * &self.inv_std;
        let shift = self.mean.dot(&scaled);
        let mut out = self.x.matvec(scaled.view());
        out -= shift;
        out
    }

    fn matmat(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        let scaled = &m * &self.inv_std.view().insert_axis(Axis(1));
        // One shift per right-hand side column, broadcast down the rows.
        let shift = self.mean.dot(&scaled);
        let mut out = self.x.matmat(scaled.view());
        out -= &shift;
        out
    }

    fn rmatvec(&self, v: ArrayView1<'_, T>) -> Array1<T> {
        let total = v.sum();
        let mut out = self.x.rmatvec(v);
        Zip::from(&mut out)
            .and(&self.mean)
            .and(&self.inv_std)
            .for_each(|o, &mu, &inv| *o = (*o - mu * total) * inv);
        out
    }

    fn rmatmat(&self, m: ArrayView2<'_, T>) -> Array2<T> {
        let col_sums = m.sum_axis(Axis(0));
        let mut out = self.x.rmatmat(m);
        Zip::indexed(&mut out).for_each(|(j, c), o| {
            *o = (*o - self.mean[j] * col_sums[c]) * self.inv_std[j];
        });
        out
    }
}

impl<T, O> fmt::Debug for MeanCenterOperator<'_, T, O>
where
    T: IpcasFloat,
    O: LinearOperator<T> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeanCenterOperator")
            .field("shape", &self.shape())
            .field("mean", &self.mean)
            .field("std", &self.std())
            .finish()
    }
}
