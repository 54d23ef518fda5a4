//! Error types for the baseline decomposer.

use signet_common::SignetError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BaselineError>;

/// Failure of a single sample's optimisation. Recoverable: the batch caller
/// decides whether it aborts the batch or gets a fallback.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("did not converge after {iterations} iterations (last change {change:e})")]
    NotConverged { iterations: usize, change: f64 },

    #[error("spectrum contains non-finite values")]
    NonFinite,

    #[error("spectrum has {got} entries, expected {expected}")]
    Dimension { expected: usize, got: usize },
}

#[derive(Error, Debug)]
pub enum BaselineError {
    #[error("Decomposition of row {row} failed: {source}")]
    Solver {
        row: usize,
        #[source]
        source: SolverError,
    },

    #[error("Invalid signature matrix: {0}")]
    InvalidSignatures(String),

    #[error("Worker pool error: {0}")]
    Pool(String),

    #[error(transparent)]
    Common(#[from] SignetError),

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

impl From<rayon::ThreadPoolBuildError> for BaselineError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        BaselineError::Pool(e.to_string())
    }
}
