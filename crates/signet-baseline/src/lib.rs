//! Baseline signature decomposition.
//!
//! Finds, for every observed spectrum `x`, the exposure vector `w` that
//! minimises `‖S·w − x‖²` over the probability simplex (`w ≥ 0`, `Σw = 1`).
//! There are no learned parameters: the result only depends on the
//! signature matrix and the solver settings.
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use signet_baseline::{Baseline, FailurePolicy};
//! use signet_common::SignatureMatrix;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let signatures = Arc::new(SignatureMatrix::from_csv("data/signatures.csv")?);
//! let baseline = Baseline::new(signatures, 4)?;
//!
//! let spectrum = vec![1.0 / 96.0; 96];
//! let result = baseline.decompose_batch(&[spectrum], FailurePolicy::Abort)?;
//! println!("{:?}", result.weights[0]);
//! # Ok(())
//! # }
//! ```

mod decomposer;
mod error;
mod simplex;

pub use decomposer::{Baseline, Decomposition, SolverSettings};
pub use error::{BaselineError, Result, SolverError};
pub use signet_config::FailurePolicy;
pub use simplex::project_onto_simplex;
