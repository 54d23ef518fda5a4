//! Finetuner for high mutational burden.
//!
//! Learns a residual on top of the baseline guess: the network output is
//! added to the guess, clamped at zero and renormalised per row.

use std::f64::consts::LN_10;

use candle_core::{Device, Tensor};
use candle_nn::{linear, Linear, Module};
use signet_common::NUM_MUTATION_TYPES;
use signet_config::SigmoidGate;
use tracing::debug;

use crate::cutoff::ensure_finite;
use crate::layers::{gate_activation, leaky, HiddenStack};
use crate::{
    finish, ExposureNetwork, FinetunerError, FinetunerInput, Mode, ModelConfig, ModelKind,
    ModelWeights, Result,
};

/// Gate that is always present in addition to the configured one.
pub const FIXED_GATE: SigmoidGate = SigmoidGate::new(10000.0, 200.0);

/// Number of scalar burden features appended to the input.
const BURDEN_FEATURES: usize = 3;

#[derive(Debug)]
pub struct FineTunerLargeNumMut {
    config: ModelConfig,
    weights: ModelWeights,
    input: Linear,
    hidden: HiddenStack,
    output: Linear,
}

impl FineTunerLargeNumMut {
    /// Build a freshly initialised network on `device`.
    pub fn new(config: ModelConfig, device: &Device) -> Result<Self> {
        crate::expect_kind(&config, ModelKind::FineTunerLargeNumMut, "high-burden finetuner")?;
        config.validate()?;

        let weights = ModelWeights::new(device);
        let vb = weights.builder();
        let units = config.num_units;
        let in_features = NUM_MUTATION_TYPES + config.num_classes + BURDEN_FEATURES;
        let input = linear(in_features, units, vb.pp("input"))?;
        let hidden = HiddenStack::new(units, config.num_hidden_layers, None, vb.pp("hidden"))?;
        let output = linear(units, config.num_classes, vb.pp("output"))?;

        debug!(
            params = weights.num_parameters(),
            hidden = config.num_hidden_layers,
            units,
            "high-burden finetuner built"
        );
        Ok(Self {
            config,
            weights,
            input,
            hidden,
            output,
        })
    }

    /// `[log10(n) / 6, gate(n), fixed_gate(n)]` as a (B, 3) tensor.
    fn burden_features(&self, num_mut: &Tensor) -> Result<Tensor> {
        let scaled_log = num_mut.log()?.affine(1.0 / (6.0 * LN_10), 0.0)?;
        let gated = gate_activation(num_mut, &self.config.sigmoid_params[0])?;
        let fixed = gate_activation(num_mut, &FIXED_GATE)?;
        let features = Tensor::cat(&[&scaled_log, &gated, &fixed], 1)?;
        ensure_finite(&features, "burden features")?;
        Ok(features)
    }
}

impl ExposureNetwork for FineTunerLargeNumMut {
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
        let guess = input
            .baseline_guess
            .as_ref()
            .ok_or(FinetunerError::MissingBaseline("high-burden"))?;
        signet_common::spectrum::check_exposure_batch(guess, input.rows(), self.config.num_classes)?;

        let features = self.burden_features(&input.num_mut)?;
        let xs = Tensor::cat(&[&input.mutation_dist, guess, &features], 1)?;
        let xs = leaky(&self.input.forward(&xs)?)?;
        let xs = self.hidden.forward(&xs, mode)?;
        let xs = (self.output.forward(&xs)? + guess)?.relu()?;
        // No epsilon: a row clamped to all zeros yields NaN and is rejected below.
        let xs = xs.broadcast_div(&xs.sum_keepdim(1)?)?;
        finish(xs, self.config.cutoff, mode)
    }
}
