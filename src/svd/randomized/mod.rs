use log::debug;
use single_svdlib::randomized::{randomized_svd, PowerIterationNormalizer};

use crate::error::{IpcasError, Result};
use crate::linop::LinearOperator;
use crate::svd::{check_rank, triplets_from_rec, SvdLibOperator, SvdTriplets, TruncatedSvd, Which};
use crate::IpcasFloat;

/// Randomized range finder (Halko, Martinsson & Tropp) from single-svdlib.
///
/// `k + n_oversamples` Gaussian probes are pushed through the operator,
/// refined by `n_power_iterations` rounds of `A·Aᵗ` with the configured
/// normaliser, and the projected matrix `Qᵗ·A` is decomposed densely. The
/// probe block is capped at `min(rows, cols)`; at that size the range of the
/// operator is captured exactly and the result is exact up to rounding.
///
/// The probes are drawn from a generator seeded with `random_seed`, so results
/// are reproducible. single-svdlib 0.8 prints its timings to stdout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomizedSvd {
    pub n_oversamples: usize,
    pub n_power_iterations: usize,
    pub normalizer: PowerIterationNormalizer,
    pub random_seed: u64,
}

impl Default for RandomizedSvd {
    fn default() -> Self {
        Self {
            n_oversamples: 10,
            n_power_iterations: 4,
            normalizer: PowerIterationNormalizer::QR,
            random_seed: 42,
        }
    }
}

impl RandomizedSvd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_oversamples(mut self, n_oversamples: usize) -> Self {
        self.n_oversamples = n_oversamples;
        self
    }

    pub fn n_power_iterations(mut self, n_power_iterations: usize) -> Self {
        self.n_power_iterations = n_power_iterations;
        self
    }

    pub fn normalizer(mut self, normalizer: PowerIterationNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }
}

impl<T: IpcasFloat> TruncatedSvd<T> for RandomizedSvd {
    fn svds<O>(&self, op: &O, k: usize, which: Which) -> Result<SvdTriplets<T>>
    where
        O: LinearOperator<T> + ?Sized,
    {
        let Which::LargestMagnitude = which;
        let min_dim = check_rank::<T, O>(op, k)?;

        // A wider block changes shape under QR and is no more accurate.
        let n_oversamples = self.n_oversamples.min(min_dim - k);
        let rec = randomized_svd(
            &SvdLibOperator(op),
            k,
            n_oversamples,
            self.n_power_iterations,
            self.normalizer,
            Some(self.random_seed),
        )
        .map_err(|e| IpcasError::Decomposition(format!("randomized SVD failed: {}", e)))?;

        debug!(
            "Randomized SVD of {}x{} operator: k = {}, block = {}, power iterations = {}",
            op.nrows(),
            op.ncols(),
            k,
            k + n_oversamples,
            self.n_power_iterations
        );
        triplets_from_rec(rec, k)
    }
}
