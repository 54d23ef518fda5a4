//! signet-finetuner
//!
//! Burden-conditioned networks that refine signature exposures:
//!
//! - [`FineTunerLowNumMut`] for samples with few mutations, from the
//!   distribution and the burden alone
//! - [`FineTunerLargeNumMut`] for samples with many mutations, as a residual
//!   over the baseline guess
//! - [`Classifier`], which scores whether a sample looks realistic
//!
//! Networks run on Candle. Every forward takes an explicit [`Mode`]; the
//! small-weight cutoff is applied in [`Mode::Eval`] only.

pub mod classifier;
pub mod config;
pub mod cutoff;
pub mod device;
pub mod error;
pub mod finetuner;
pub mod input;
pub mod large;
pub mod layers;
pub mod low;
pub mod persistence;
pub mod weights;

pub use classifier::Classifier;
pub use config::{ModelConfig, ModelKind};
pub use device::select_device;
pub use error::{FinetunerError, Result};
pub use finetuner::{refine_baseline_guess, Finetuner};
pub use input::FinetunerInput;
pub use large::FineTunerLargeNumMut;
pub use low::FineTunerLowNumMut;
pub use persistence::{load_model, read_config, save_classifier, save_finetuner, LoadedModel};
pub use weights::ModelWeights;

use candle_core::Tensor;

/// Whether a forward pass is part of training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Dropout active, no cutoff
    Train,
    /// Deterministic, cutoff applied
    Eval,
}

impl Mode {
    pub fn is_train(self) -> bool {
        matches!(self, Mode::Train)
    }
}

/// A network mapping a [`FinetunerInput`] batch to (B, K) exposures.
pub trait ExposureNetwork {
    fn config(&self) -> &ModelConfig;

    fn weights(&self) -> &ModelWeights;

    fn weights_mut(&mut self) -> &mut ModelWeights;

    /// Each output row is non-negative and sums to one, up to the cutoff's
    /// epsilon in [`Mode::Eval`].
    fn forward(&self, input: &FinetunerInput, mode: Mode) -> Result<Tensor>;
}

/// Shared tail of both finetuners: reject non-finite output, then apply the
/// cutoff outside of training.
pub(crate) fn finish(weights: Tensor, cutoff: f64, mode: Mode) -> Result<Tensor> {
    cutoff::ensure_finite(&weights, "finetuner output")?;
    match mode {
        Mode::Train => Ok(weights),
        Mode::Eval => cutoff::apply_cutoff(&weights, cutoff),
    }
}

pub(crate) fn expect_kind(
    config: &ModelConfig,
    expected: ModelKind,
    name: &'static str,
) -> Result<()> {
    if config.model_type == expected {
        Ok(())
    } else {
        Err(FinetunerError::WrongModelKind {
            expected: name,
            found: config.model_type,
        })
    }
}
