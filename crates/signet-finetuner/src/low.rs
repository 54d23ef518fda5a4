//! Finetuner for low mutational burden.
//!
//! The distribution and the gated burden are embedded separately, joined,
//! passed through a dropout hidden stack and a softmax head.

use candle_core::{Device, Tensor};
use candle_nn::{linear, Linear, Module};
use tracing::debug;

use crate::cutoff::ensure_finite;
use crate::layers::{BurdenBranch, DistributionBranch, HiddenStack, DROPOUT};
use crate::{finish, ExposureNetwork, FinetunerInput, Mode, ModelConfig, ModelKind, ModelWeights, Result};

#[derive(Debug)]
pub struct FineTunerLowNumMut {
    config: ModelConfig,
    weights: ModelWeights,
    distribution: DistributionBranch,
    burden: BurdenBranch,
    hidden: HiddenStack,
    output: Linear,
}

impl FineTunerLowNumMut {
    /// Build a freshly initialised network on `device`.
    pub fn new(config: ModelConfig, device: &Device) -> Result<Self> {
        crate::expect_kind(&config, ModelKind::FineTunerLowNumMut, "low-burden finetuner")?;
        config.validate()?;

        let weights = ModelWeights::new(device);
        let vb = weights.builder();
        let units = config.num_units;
        let distribution = DistributionBranch::new(units, vb.pp("distribution"))?;
        let burden = BurdenBranch::new(&config.sigmoid_params, vb.pp("burden"))?;
        let width = units + burden.width();
        let hidden = HiddenStack::new(width, config.num_hidden_layers, Some(DROPOUT), vb.pp("hidden"))?;
        let output = linear(width, config.num_classes, vb.pp("output"))?;

        debug!(
            params = weights.num_parameters(),
            hidden = config.num_hidden_layers,
            units,
            "low-burden finetuner built"
        );
        Ok(Self {
            config,
            weights,
            distribution,
            burden,
            hidden,
            output,
        })
    }
}

impl ExposureNetwork for FineTunerLowNumMut {
    fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn weights(&self) -> &ModelWeights {
        &self.weights
    }

    fn weights_mut(&mut self) -> &mut ModelWeights {
        &mut self.weights
    }

    fn forward(&self, input: &FinetunerInput, mode: Mode) -> Result<Tensor> {
        let dist = self.distribution.forward(&input.mutation_dist)?;
        let burden = self.burden.forward(&input.num_mut)?;
        let joined = Tensor::cat(&[&dist, &burden], 1)?;
        ensure_finite(&joined, "low-burden joined representation")?;

        let xs = self.hidden.forward(&joined, mode)?;
        let xs = candle_nn::ops::softmax(&self.output.forward(&xs)?, 1)?;
        finish(xs, self.config.cutoff, mode)
    }
}
