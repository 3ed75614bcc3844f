use std::sync::Arc;

use ndarray::Array2;
use parking_lot::RwLock;

use super::{FittedState, Ipcas, MergeStrategy};
use crate::error::Result;
use crate::linop::LinearOperator;
use crate::svd::{RandomizedSvd, TruncatedSvd};
use crate::IpcasFloat;

/// Thread-safe handle to an [`Ipcas`] model.
///
/// Updates take the write lock, so batches from different threads are
/// serialised and each one sees the state left by the previous one.
/// `transform` and the getters only take the read lock and may run
/// concurrently with each other.
pub struct SharedIpcas<T: IpcasFloat, S = RandomizedSvd> {
    inner: Arc<RwLock<Ipcas<T, S>>>,
}

impl<T: IpcasFloat, S> Clone for SharedIpcas<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: IpcasFloat, S> From<Ipcas<T, S>> for SharedIpcas<T, S> {
    fn from(model: Ipcas<T, S>) -> Self {
        Self::new(model)
    }
}

impl<T: IpcasFloat, S> SharedIpcas<T, S> {
    pub fn new(model: Ipcas<T, S>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(model)),
        }
    }

    pub fn n_samples_seen(&self) -> usize {
        self.inner.read().n_samples_seen()
    }

    pub fn is_fitted(&self) -> bool {
        self.inner.read().is_fitted()
    }

    /// Copy of the current fitted state.
    pub fn snapshot(&self) -> Option<FittedState<T>> {
        self.inner.read().state().cloned()
    }

    /// Runs `f` with shared access to the model.
    pub fn read<R>(&self, f: impl FnOnce(&Ipcas<T, S>) -> R) -> R {
        f(&self.inner.read())
    }

    /// Gives back the model if this is the last handle.
    pub fn try_into_inner(self) -> std::result::Result<Ipcas<T, S>, Self> {
        Arc::try_unwrap(self.inner)
            .map(RwLock::into_inner)
            .map_err(|inner| Self { inner })
    }
}

impl<T, S> SharedIpcas<T, S>
where
    T: IpcasFloat,
    S: TruncatedSvd<T>,
{
    /// Folds a batch in and returns the updated sample count.
    pub fn partial_fit<X>(&self, x: &X) -> Result<usize>
    where
        X: LinearOperator<T> + ?Sized,
    {
        let mut model = self.inner.write();
        Ok(model.partial_fit(x)?.n_samples_seen())
    }

    pub fn partial_fit_with<X>(&self, x: &X, strategy: MergeStrategy) -> Result<usize>
    where
        X: LinearOperator<T> + ?Sized,
    {
        let mut model = self.inner.write();
        Ok(model.partial_fit_with(x, strategy)?.n_samples_seen())
    }

    pub fn transform<X>(&self, x: &X) -> Result<Array2<T>>
    where
        X: LinearOperator<T> + ?Sized,
    {
        self.inner.read().transform(x)
    }
}
