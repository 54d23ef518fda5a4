//! Building blocks shared by the finetuner and classifier networks.

use candle_core::{Result, Tensor};
use candle_nn::{linear, Dropout, Linear, Module, VarBuilder};
use signet_common::NUM_MUTATION_TYPES;
use signet_config::SigmoidGate;

use crate::Mode;

/// Negative slope of every leaky ReLU in the networks.
pub const LEAKY_SLOPE: f64 = 0.1;

/// Dropout probability on the low-burden and classifier hidden stacks.
pub const DROPOUT: f32 = 0.1;

/// Width of each burden gate's projection.
pub(crate) const GATE_UNITS: usize = 3;

pub(crate) fn leaky(xs: &Tensor) -> Result<Tensor> {
    candle_nn::ops::leaky_relu(xs, LEAKY_SLOPE)
}

/// `sigmoid((n - midpoint) / scale)` applied to a (batch, 1) burden column.
///
/// Exactly 0.5 when `n == midpoint`.
pub fn gate_activation(num_mut: &Tensor, gate: &SigmoidGate) -> Result<Tensor> {
    let z = num_mut
        .affine(1.0, -gate.midpoint)?
        .affine(1.0 / gate.scale, 0.0)?;
    candle_nn::ops::sigmoid(&z)
}

/// Two leaky layers over the 96-context distribution.
#[derive(Debug, Clone)]
pub(crate) struct DistributionBranch {
    first: Linear,
    second: Linear,
}

impl DistributionBranch {
    pub fn new(units: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            first: linear(NUM_MUTATION_TYPES, units, vb.pp("layer1"))?,
            second: linear(units, units, vb.pp("layer2"))?,
        })
    }

    pub fn forward(&self, mutation_dist: &Tensor) -> Result<Tensor> {
        let xs = leaky(&self.first.forward(mutation_dist)?)?;
        leaky(&self.second.forward(&xs)?)
    }
}

/// Sigmoid gates over the burden, each projected to [`GATE_UNITS`] and then
/// mixed by one joint layer.
#[derive(Debug, Clone)]
pub(crate) struct BurdenBranch {
    gates: Vec<SigmoidGate>,
    projections: Vec<Linear>,
    joint: Linear,
}

impl BurdenBranch {
    pub fn new(gates: &[SigmoidGate], vb: VarBuilder) -> Result<Self> {
        let projections = (0..gates.len())
            .map(|i| linear(1, GATE_UNITS, vb.pp(format!("gate{}", i + 1))))
            .collect::<Result<Vec<_>>>()?;
        let width = gates.len() * GATE_UNITS;
        Ok(Self {
            gates: gates.to_vec(),
            projections,
            joint: linear(width, width, vb.pp("joint"))?,
        })
    }

    pub fn width(&self) -> usize {
        self.gates.len() * GATE_UNITS
    }

    pub fn forward(&self, num_mut: &Tensor) -> Result<Tensor> {
        let parts = self
            .gates
            .iter()
            .zip(&self.projections)
            .map(|(gate, proj)| leaky(&proj.forward(&gate_activation(num_mut, gate)?)?))
            .collect::<Result<Vec<_>>>()?;
        let joined = Tensor::cat(&parts, 1)?;
        leaky(&self.joint.forward(&joined)?)
    }
}

/// `num_layers` square leaky layers, optionally with dropout before each.
#[derive(Debug, Clone)]
pub(crate) struct HiddenStack {
    layers: Vec<Linear>,
    dropout: Option<Dropout>,
}

impl HiddenStack {
    pub fn new(
        width: usize,
        num_layers: usize,
        dropout: Option<f32>,
        vb: VarBuilder,
    ) -> Result<Self> {
        let layers = (0..num_layers)
            .map(|i| linear(width, width, vb.pp(i.to_string())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            layers,
            dropout: dropout.map(Dropout::new),
        })
    }

    pub fn forward(&self, xs: &Tensor, mode: Mode) -> Result<Tensor> {
        let mut xs = xs.clone();
        for layer in &self.layers {
            if let Some(dropout) = &self.dropout {
                xs = dropout.forward(&xs, mode.is_train())?;
            }
            xs = leaky(&layer.forward(&xs)?)?;
        }
        Ok(xs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_gate_midpoint_is_half() {
        let n = Tensor::new(&[[5000f32], [10000.0]], &Device::Cpu).unwrap();
        let out = gate_activation(&n, &SigmoidGate::new(5000.0, 2000.0))
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        assert_eq!(out[0][0], 0.5);
        assert!(out[1][0] > 0.9);
    }

    #[test]
    fn test_burden_branch_width() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let gates = signet_config::NetworkType::Low.default_gates();
        let branch = BurdenBranch::new(&gates, vb).unwrap();
        assert_eq!(branch.width(), 9);

        let n = Tensor::new(&[[120f32], [40_000.0]], &Device::Cpu).unwrap();
        assert_eq!(branch.forward(&n).unwrap().dims(), &[2, 9]);
    }

    #[test]
    fn test_hidden_stack_eval_is_deterministic() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let stack = HiddenStack::new(8, 2, Some(DROPOUT), vb).unwrap();
        let xs = Tensor::ones((3, 8), DType::F32, &Device::Cpu).unwrap();

        let a = stack.forward(&xs, Mode::Eval).unwrap().to_vec2::<f32>().unwrap();
        let b = stack.forward(&xs, Mode::Eval).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(a, b);
    }
}
