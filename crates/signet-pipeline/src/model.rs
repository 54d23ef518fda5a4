//! The two seams the composition is built on.

use candle_core::Tensor;
use signet_finetuner::{Classifier, FinetunerInput, Mode};

use crate::Result;

/// Anything that turns an input batch into (B, K) exposures in evaluation mode.
pub trait ExposureModel: Send + Sync {
    fn num_classes(&self) -> usize;

    fn predict(&self, input: &FinetunerInput) -> Result<Tensor>;
}

/// Scores each row's probability of coming from a realistic sample.
pub trait Router: Send + Sync {
    /// Shape (B,).
    fn realistic_probability(&self, input: &FinetunerInput) -> Result<Tensor>;
}

impl Router for Classifier {
    fn realistic_probability(&self, input: &FinetunerInput) -> Result<Tensor> {
        Ok(self.forward(input, Mode::Eval)?)
    }
}
