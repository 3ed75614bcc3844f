use log::debug;
use single_svdlib::lanczos::svd_las2;

use crate::error::{IpcasError, Result};
use crate::linop::LinearOperator;
use crate::svd::{check_rank, triplets_from_rec, SvdLibOperator, SvdTriplets, TruncatedSvd, Which};
use crate::utils::cast;
use crate::IpcasFloat;

/// Lanczos solver (LAS2 from SVDLIBC) from single-svdlib.
///
/// Runs at most `iterations` Lanczos steps on `AᵗA` (0 means
/// `min(rows, cols)`) and keeps the Ritz values whose error bound is within
/// `kappa`. When fewer than `k` values become significant the solve fails with
/// `SolverDidNotConverge`, so rank-deficient operators are better served by
/// [`RandomizedSvd`](crate::svd::RandomizedSvd).
///
/// LAS2 works on at least two dimensions: a single triplet is computed as two
/// and truncated, which needs an operator of at least 2x2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LanczosSvd {
    pub iterations: usize,
    pub kappa: f64,
    /// 0 lets single-svdlib pick a random seed.
    pub random_seed: u32,
}

impl Default for LanczosSvd {
    fn default() -> Self {
        Self {
            iterations: 0,
            kappa: 1e-6,
            random_seed: 42,
        }
    }
}

impl LanczosSvd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn kappa(mut self, kappa: f64) -> Self {
        self.kappa = kappa;
        self
    }

    pub fn random_seed(mut self, seed: u32) -> Self {
        self.random_seed = seed;
        self
    }
}

impl<T: IpcasFloat> TruncatedSvd<T> for LanczosSvd {
    fn svds<O>(&self, op: &O, k: usize, which: Which) -> Result<SvdTriplets<T>>
    where
        O: LinearOperator<T> + ?Sized,
    {
        let Which::LargestMagnitude = which;
        let min_dim = check_rank::<T, O>(op, k)?;

        let dimensions = k.max(2);
        if dimensions > min_dim {
            return Err(IpcasError::InvalidParameter(format!(
                "Lanczos needs an operator of at least 2x2, got {}x{}",
                op.nrows(),
                op.ncols()
            )));
        }

        let end_interval = [cast::<T>(-1.0e-30), cast::<T>(1.0e-30)];
        let rec = svd_las2(
            &SvdLibOperator(op),
            dimensions,
            self.iterations,
            &end_interval,
            cast(self.kappa),
            self.random_seed,
        )
        .map_err(|e| IpcasError::Decomposition(format!("Lanczos SVD failed: {}", e)))?;

        debug!(
            "Lanczos SVD of {}x{} operator: {} of {} values significant after {} steps",
            op.nrows(),
            op.ncols(),
            rec.d,
            dimensions,
            rec.diagnostics.lanczos_steps
        );
        triplets_from_rec(rec, k)
    }
}
