//! Realistic-vs-random classifier over the same inputs as the low-burden
//! finetuner, ending in one sigmoid unit.

use candle_core::{Device, Tensor};
use candle_nn::{linear, Linear, Module};
use tracing::debug;

use crate::cutoff::ensure_finite;
use crate::layers::{BurdenBranch, DistributionBranch, HiddenStack, DROPOUT};
use crate::{FinetunerInput, Mode, ModelConfig, ModelKind, ModelWeights, Result};

#[derive(Debug)]
pub struct Classifier {
    config: ModelConfig,
    weights: ModelWeights,
    distribution: DistributionBranch,
    burden: BurdenBranch,
    hidden: HiddenStack,
    output: Linear,
}

impl Classifier {
    pub fn new(config: ModelConfig, device: &Device) -> Result<Self> {
        crate::expect_kind(&config, ModelKind::Classifier, "classifier")?;
        config.validate()?;

        let weights = ModelWeights::new(device);
        let vb = weights.builder();
        let units = config.num_units;
        let distribution = DistributionBranch::new(units, vb.pp("distribution"))?;
        let burden = BurdenBranch::new(&config.sigmoid_params, vb.pp("burden"))?;
        let width = units + burden.width();
        let hidden = HiddenStack::new(width, config.num_hidden_layers, Some(DROPOUT), vb.pp("hidden"))?;
        let output = linear(width, 1, vb.pp("output"))?;

        debug!(params = weights.num_parameters(), "classifier built");
        Ok(Self {
            config,
            weights,
            distribution,
            burden,
            hidden,
            output,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn weights(&self) -> &ModelWeights {
        &self.weights
    }

    pub(crate) fn weights_mut(&mut self) -> &mut ModelWeights {
        &mut self.weights
    }

    /// Probability that each row is a realistic sample, shape (B,).
    pub fn forward(&self, input: &FinetunerInput, mode: Mode) -> Result<Tensor> {
        let dist = self.distribution.forward(&input.mutation_dist)?;
        let burden = self.burden.forward(&input.num_mut)?;
        let joined = Tensor::cat(&[&dist, &burden], 1)?;
        let xs = self.hidden.forward(&joined, mode)?;
        let probs = candle_nn::ops::sigmoid(&self.output.forward(&xs)?)?.flatten_all()?;
        ensure_finite(&probs, "classifier output")?;
        Ok(probs)
    }

    /// Copy onto `device`, returning a new handle.
    pub fn to_device(&self, device: &Device) -> Result<Self> {
        let moved = Self::new(self.config.clone(), device)?;
        moved.weights.copy_from(&self.weights)?;
        Ok(moved)
    }

    /// Drop the classifier and free its parameter memory.
    pub fn release(self) {
        debug!(device = ?self.weights.device(), "releasing classifier");
    }
}
