//! signet-common: shared types, errors, tabular IO and metrics used across all SigNet crates.
//!
//! Every model in the workspace consumes the same two inputs: a batch of
//! normalised 96-context mutation spectra and a fixed [`SignatureMatrix`].
//! This crate owns both, together with the CSV table format used to move
//! batches in and out of the process.

pub mod error;
pub mod metrics;
pub mod signatures;
pub mod spectrum;
pub mod table;

// Re-export commonly used types
pub use error::{Result, SignetError};
pub use metrics::ClassificationMetrics;
pub use signatures::SignatureMatrix;
pub use spectrum::{NormalizedBatch, NUM_MUTATION_TYPES};
pub use table::LabeledTable;
