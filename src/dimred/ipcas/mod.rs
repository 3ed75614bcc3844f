//! # Incremental PCA via streaming SVD
//!
//! [`Ipcas`] keeps a rank-`k` approximation of the top right singular subspace
//! of a matrix that arrives one batch of rows at a time. Each batch is
//! normalised lazily with a fixed mean and standard deviation
//! ([`MeanCenterOperator`]) and merged with the rank-`k` summary of everything
//! seen so far, `diag(s) · components`, through a truncated SVD. The full data
//! matrix is never stored and no decomposition is recomputed from scratch.
//!
//! Batches must be applied in arrival order and one at a time: every update
//! depends on the state left by the previous one. Wrap the model in
//! [`SharedIpcas`] to share it between threads.

use log::debug;
use ndarray::{concatenate, Array1, Array2, ArrayView1, Axis};
use num_traits::Float;

use crate::error::{IpcasError, Result};
use crate::linop::{
    default_epsilon, LinearOperator, MeanCenterOperator, ResidualProjectionOperator,
    StackedLinearOperator,
};
use crate::svd::{
    sort_triplets_descending, svd_flip, RandomizedSvd, SvdTriplets, TruncatedSvd, Which,
};
use crate::utils::cast_usize;
use crate::IpcasFloat;

mod shared;

pub use shared::SharedIpcas;

/// How a new batch is merged with the accumulated subspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// One solve on `[batch; diag(s)·components]`.
    #[default]
    Stack,
    /// Legacy path with two solves: first the part of the batch outside the
    /// current subspace, then the dense stack of that residual's triplets
    /// on top of the history.
    ResidualRestack,
}

impl MergeStrategy {
    pub fn from_use_stack(use_stack: bool) -> Self {
        if use_stack {
            MergeStrategy::Stack
        } else {
            MergeStrategy::ResidualRestack
        }
    }
}

/// Denominator of `explained_variance_ratio`, always multiplied by
/// `n_samples_seen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VarianceNormalization {
    /// `Σ std²`: the total variance of the raw features.
    #[default]
    FeatureVariance,
    /// `n_features`: every feature counted with unit variance, which is the
    /// total variance of the standardised data.
    UnitVariance,
}

/// Everything derived from the fitted subspace. Rebuilt as a whole by every
/// successful `partial_fit`.
#[derive(Debug, Clone)]
pub struct FittedState<T> {
    pub n_samples_seen: usize,
    /// Descending.
    pub singular_values: Array1<T>,
    /// `k × n_features`, orthonormal rows in the order of `singular_values`.
    pub components: Array2<T>,
    pub explained_variance: Array1<T>,
    pub explained_variance_ratio: Array1<T>,
}

impl<T: IpcasFloat> FittedState<T> {
    /// `diag(singular_values) · components`, the rank-`k` summary of all
    /// batches seen so far.
    pub fn scaled_components(&self) -> Array2<T> {
        &self.components * &self.singular_values.view().insert_axis(Axis(1))
    }
}

/// Incremental principal component analysis of row batches with fixed
/// normalisation.
///
/// # Type Parameters
/// - `T`: element type (`f32` or `f64`)
/// - `S`: truncated SVD solver, [`RandomizedSvd`] unless configured otherwise
#[derive(Debug)]
pub struct Ipcas<T: IpcasFloat, S = RandomizedSvd> {
    n_components: usize,
    mean: Array1<T>,
    std: Array1<T>,
    std_epsilon: T,
    merge_strategy: MergeStrategy,
    variance_normalization: VarianceNormalization,
    solver: S,
    state: Option<FittedState<T>>,
}

impl<T: IpcasFloat> Ipcas<T, RandomizedSvd> {
    /// Creates an unfitted model with the default solver and options.
    ///
    /// # Parameters
    /// - `n_components`: rank `k` of the maintained subspace
    /// - `mean`, `std`: per-feature normalisation, fixed for the model's lifetime
    pub fn new(n_components: usize, mean: Array1<T>, std: Array1<T>) -> Result<Self> {
        IpcasBuilder::new()
            .n_components(n_components)
            .mean(mean)
            .std(std)
            .build()
    }
}

impl<T, S> Ipcas<T, S>
where
    T: IpcasFloat,
    S: TruncatedSvd<T>,
{
    /// Folds one batch (rows are samples) into the model using the configured
    /// merge strategy.
    ///
    /// # Returns
    /// - `Ok(&mut self)`: the state now reflects every batch seen so far
    /// - `Err`: the batch was rejected or the solver failed; the previous
    ///   state is untouched
    pub fn partial_fit<X>(&mut self, x: &X) -> Result<&mut Self>
    where
        X: LinearOperator<T> + ?Sized,
    {
        self.partial_fit_with(x, self.merge_strategy)
    }

    /// Same as [`Ipcas::partial_fit`] with the merge strategy chosen per call.
    pub fn partial_fit_with<X>(&mut self, x: &X, strategy: MergeStrategy) -> Result<&mut Self>
    where
        X: LinearOperator<T> + ?Sized,
    {
        self.check_features(x.ncols())?;
        let batch_rows = x.nrows();
        if batch_rows == 0 {
            return Err(IpcasError::InvalidParameter(
                "cannot fit an empty batch".to_string(),
            ));
        }
        let n_samples_seen = self.n_samples_seen() + batch_rows;
        if n_samples_seen < 2 {
            return Err(IpcasError::InsufficientSamples {
                seen: n_samples_seen,
            });
        }

        let next_state = {
            let centred = MeanCenterOperator::with_epsilon(
                x,
                self.mean.view(),
                self.std.view(),
                self.std_epsilon,
            )?;

            let triplets = match &self.state {
                None => {
                    debug!(
                        "IPCAS initial fit on {}x{} batch, k = {}",
                        batch_rows,
                        x.ncols(),
                        self.n_components
                    );
                    self.solver
                        .svds(&centred, self.n_components, Which::LargestMagnitude)?
                }
                Some(state) => {
                    debug!(
                        "IPCAS merging {}x{} batch into {} samples with {:?}",
                        batch_rows,
                        x.ncols(),
                        state.n_samples_seen,
                        strategy
                    );
                    match strategy {
                        MergeStrategy::Stack => self.merge_stacked(&centred, state)?,
                        MergeStrategy::ResidualRestack => self.merge_residual(&centred, state)?,
                    }
                }
            };

            self.derive_state(triplets, n_samples_seen)
        };

        if let Some(leading) = next_state.singular_values.first() {
            debug!(
                "IPCAS now at {} samples, leading singular value {}",
                next_state.n_samples_seen, leading
            );
        }
        self.state = Some(next_state);
        Ok(self)
    }

    /// Projects a batch onto the fitted components: `centred(x) · componentsᵗ`,
    /// giving `x.nrows() × k` scores.
    pub fn transform<X>(&self, x: &X) -> Result<Array2<T>>
    where
        X: LinearOperator<T> + ?Sized,
    {
        let state = self.state.as_ref().ok_or(IpcasError::NotFitted)?;
        self.check_features(x.ncols())?;

        let centred =
            MeanCenterOperator::with_epsilon(x, self.mean.view(), self.std.view(), self.std_epsilon)?;
        Ok(centred.matmat(state.components.t()))
    }

    fn merge_stacked<X>(
        &self,
        centred: &MeanCenterOperator<'_, T, X>,
        state: &FittedState<T>,
    ) -> Result<SvdTriplets<T>>
    where
        X: LinearOperator<T> + ?Sized,
    {
        let history = state.scaled_components();
        let stacked = StackedLinearOperator::new(centred, history.view())?;
        self.solver
            .svds(&stacked, self.n_components, Which::LargestMagnitude)
    }

    fn merge_residual<X>(
        &self,
        centred: &MeanCenterOperator<'_, T, X>,
        state: &FittedState<T>,
    ) -> Result<SvdTriplets<T>>
    where
        X: LinearOperator<T> + ?Sized,
    {
        let residual = ResidualProjectionOperator::new(centred, state.components.t())?;
        let residual_triplets =
            self.solver
                .svds(&residual, self.n_components, Which::LargestMagnitude)?;

        let summary = concatenate(
            Axis(0),
            &[
                residual_triplets.scaled_vt().view(),
                state.scaled_components().view(),
            ],
        )?;
        self.solver
            .svds(&summary, self.n_components, Which::LargestMagnitude)
    }
}

impl<T: IpcasFloat, S> Ipcas<T, S> {
    fn check_features(&self, n_features: usize) -> Result<()> {
        if n_features != self.mean.len() {
            return Err(IpcasError::dimension(
                "IPCAS batch feature count",
                self.mean.len(),
                n_features,
            ));
        }
        Ok(())
    }

    /// Orders and sign-normalises the solver output and recomputes every
    /// derived quantity.
    fn derive_state(&self, triplets: SvdTriplets<T>, n_samples_seen: usize) -> FittedState<T> {
        let mut triplets = sort_triplets_descending(triplets);
        svd_flip(&mut triplets);

        let squared = triplets.s.mapv(|s| s * s);
        let dof = cast_usize::<T>(n_samples_seen - 1);
        let total = self.total_variance(n_samples_seen);

        FittedState {
            n_samples_seen,
            explained_variance: squared.mapv(|v| v / dof),
            explained_variance_ratio: squared.mapv(|v| v / total),
            singular_values: triplets.s,
            components: triplets.vt,
        }
    }

    fn total_variance(&self, n_samples_seen: usize) -> T {
        let n = cast_usize::<T>(n_samples_seen);
        match self.variance_normalization {
            VarianceNormalization::FeatureVariance => {
                self.std.iter().map(|&s| s * s).sum::<T>() * n
            }
            VarianceNormalization::UnitVariance => cast_usize::<T>(self.std.len()) * n,
        }
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> ArrayView1<'_, T> {
        self.mean.view()
    }

    pub fn std(&self) -> ArrayView1<'_, T> {
        self.std.view()
    }

    pub fn merge_strategy(&self) -> MergeStrategy {
        self.merge_strategy
    }

    pub fn variance_normalization(&self) -> VarianceNormalization {
        self.variance_normalization
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&FittedState<T>> {
        self.state.as_ref()
    }

    /// Total number of rows folded in so far; 0 before the first fit.
    pub fn n_samples_seen(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.n_samples_seen)
    }

    pub fn singular_values(&self) -> Option<&Array1<T>> {
        self.state.as_ref().map(|s| &s.singular_values)
    }

    pub fn components(&self) -> Option<&Array2<T>> {
        self.state.as_ref().map(|s| &s.components)
    }

    pub fn explained_variance(&self) -> Option<&Array1<T>> {
        self.state.as_ref().map(|s| &s.explained_variance)
    }

    pub fn explained_variance_ratio(&self) -> Option<&Array1<T>> {
        self.state.as_ref().map(|s| &s.explained_variance_ratio)
    }
}

/// Builder for [`Ipcas`].
///
/// `n_components`, `mean` and `std` are required; everything else has a default:
/// - `merge_strategy`: [`MergeStrategy::Stack`]
/// - `variance_normalization`: [`VarianceNormalization::FeatureVariance`]
/// - `std_epsilon`: 1e-300 (smallest positive normal for `f32`)
/// - `solver`: [`RandomizedSvd::default()`]
///
/// ```ignore
/// let mut ipcas = IpcasBuilder::new()
///     .n_components(10)
///     .mean(mean)
///     .std(std)
///     .merge_strategy(MergeStrategy::Stack)
///     .build()?;
/// for batch in batches {
///     ipcas.partial_fit(&batch)?;
/// }
/// let scores = ipcas.transform(&new_batch)?;
/// ```
pub struct IpcasBuilder<T: IpcasFloat, S = RandomizedSvd> {
    n_components: Option<usize>,
    mean: Option<Array1<T>>,
    std: Option<Array1<T>>,
    std_epsilon: T,
    merge_strategy: MergeStrategy,
    variance_normalization: VarianceNormalization,
    solver: S,
}

impl<T: IpcasFloat> Default for IpcasBuilder<T, RandomizedSvd> {
    fn default() -> Self {
        Self {
            n_components: None,
            mean: None,
            std: None,
            std_epsilon: default_epsilon(),
            merge_strategy: MergeStrategy::default(),
            variance_normalization: VarianceNormalization::default(),
            solver: RandomizedSvd::default(),
        }
    }
}

impl<T: IpcasFloat> IpcasBuilder<T, RandomizedSvd> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: IpcasFloat, S> IpcasBuilder<T, S> {
    pub fn n_components(mut self, n_components: usize) -> Self {
        self.n_components = Some(n_components);
        self
    }

    pub fn mean(mut self, mean: Array1<T>) -> Self {
        self.mean = Some(mean);
        self
    }

    pub fn std(mut self, std: Array1<T>) -> Self {
        self.std = Some(std);
        self
    }

    /// Lower bound applied to `std` before it is inverted.
    pub fn std_epsilon(mut self, epsilon: T) -> Self {
        self.std_epsilon = epsilon;
        self
    }

    pub fn merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = strategy;
        self
    }

    /// Shorthand for `merge_strategy(MergeStrategy::from_use_stack(use_stack))`.
    pub fn use_stack(self, use_stack: bool) -> Self {
        self.merge_strategy(MergeStrategy::from_use_stack(use_stack))
    }

    pub fn variance_normalization(mut self, normalization: VarianceNormalization) -> Self {
        self.variance_normalization = normalization;
        self
    }

    /// Replaces the truncated SVD solver.
    pub fn solver<S2>(self, solver: S2) -> IpcasBuilder<T, S2> {
        IpcasBuilder {
            n_components: self.n_components,
            mean: self.mean,
            std: self.std,
            std_epsilon: self.std_epsilon,
            merge_strategy: self.merge_strategy,
            variance_normalization: self.variance_normalization,
            solver,
        }
    }

    pub fn build(self) -> Result<Ipcas<T, S>> {
        let n_components = self.n_components.ok_or_else(|| {
            IpcasError::InvalidParameter("n_components must be set".to_string())
        })?;
        let mean = self
            .mean
            .ok_or_else(|| IpcasError::InvalidParameter("mean must be set".to_string()))?;
        let std = self
            .std
            .ok_or_else(|| IpcasError::InvalidParameter("std must be set".to_string()))?;

        if mean.len() != std.len() {
            return Err(IpcasError::dimension(
                "IPCAS std length",
                mean.len(),
                std.len(),
            ));
        }
        if n_components == 0 || n_components > mean.len() {
            return Err(IpcasError::InvalidParameter(format!(
                "n_components ({}) must be in 1..={} (number of features)",
                n_components,
                mean.len()
            )));
        }
        if !(self.std_epsilon > T::zero()) || !Float::is_finite(self.std_epsilon) {
            return Err(IpcasError::InvalidParameter(format!(
                "std_epsilon must be positive and finite, got {}",
                self.std_epsilon
            )));
        }

        Ok(Ipcas {
            n_components,
            mean,
            std,
            std_epsilon: self.std_epsilon,
            merge_strategy: self.merge_strategy,
            variance_normalization: self.variance_normalization,
            solver: self.solver,
            state: None,
        })
    }
}
