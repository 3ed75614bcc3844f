//! Error types shared by the operators, the solver and the incremental model.
//!
//! Every failure here is synchronous and final for the call that raised it:
//! shape problems and misuse are caller errors, and solver failures are
//! surfaced unchanged without retry.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IpcasError>;

#[derive(Error, Debug)]
pub enum IpcasError {
    /// Two operands that must agree along one axis do not.
    #[error("Dimension mismatch in {context}: expected {expected}, found {found}.")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    /// `transform` (or a state accessor that needs components) was called
    /// before the first successful `partial_fit`.
    #[error("IPCAS has not been fitted yet")]
    NotFitted,

    #[error("Invalid input parameter: {0}")]
    InvalidParameter(String),

    /// The explained variance divides by `n_samples_seen - 1`.
    #[error("At least two samples are required across all batches, {seen} seen so far")]
    InsufficientSamples { seen: usize },

    #[error("Truncated SVD did not converge after {iterations} iterations")]
    SolverDidNotConverge { iterations: usize },

    #[error("Dense decomposition failed: {0}")]
    Decomposition(String),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error("Invalid sparse matrix: {0}")]
    SparseFormat(String),
}

impl IpcasError {
    pub(crate) fn dimension(context: &'static str, expected: usize, found: usize) -> Self {
        IpcasError::DimensionMismatch {
            context,
            expected,
            found,
        }
    }

    /// `true` for the shape-validation failures raised at construction time.
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(self, IpcasError::DimensionMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message() {
        let error = IpcasError::dimension("MeanCenterOperator std", 3, 5);
        assert_eq!(
            error.to_string(),
            "Dimension mismatch in MeanCenterOperator std: expected 3, found 5."
        );
        assert!(error.is_dimension_mismatch());
    }

    #[test]
    fn test_not_fitted_message() {
        let error = IpcasError::NotFitted;
        assert_eq!(error.to_string(), "IPCAS has not been fitted yet");
        assert!(!error.is_dimension_mismatch());
    }

    #[test]
    fn test_solver_message() {
        let error = IpcasError::SolverDidNotConverge { iterations: 100 };
        assert_eq!(
            error.to_string(),
            "Truncated SVD did not converge after 100 iterations"
        );
    }
}
