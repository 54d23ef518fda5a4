//! Model configuration, stored next to the trained weights.

use serde::{Deserialize, Serialize};
use signet_config::{NetworkType, SigmoidGate, TrainingConfig};

use crate::{FinetunerError, Result};

/// Which network a configuration builds. Serialised with the names the
/// saved `config.json` files use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    FineTunerLowNumMut,
    FineTunerLargeNumMut,
    Classifier,
}

impl From<NetworkType> for ModelKind {
    fn from(t: NetworkType) -> Self {
        match t {
            NetworkType::Low => ModelKind::FineTunerLowNumMut,
            NetworkType::Large => ModelKind::FineTunerLargeNumMut,
        }
    }
}

impl ModelKind {
    fn gate_count(&self) -> usize {
        match self {
            ModelKind::FineTunerLowNumMut | ModelKind::Classifier => 3,
            ModelKind::FineTunerLargeNumMut => 1,
        }
    }
}

/// Everything needed to rebuild a network's exact shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_type: ModelKind,
    pub num_classes: usize,
    pub num_hidden_layers: usize,
    pub num_units: usize,
    pub cutoff: f64,
    pub sigmoid_params: Vec<SigmoidGate>,
}

impl ModelConfig {
    /// Low-burden finetuner with default shape.
    pub fn low(num_classes: usize) -> Self {
        Self {
            model_type: ModelKind::FineTunerLowNumMut,
            num_classes,
            num_hidden_layers: 2,
            num_units: 400,
            cutoff: 0.001,
            sigmoid_params: NetworkType::Low.default_gates(),
        }
    }

    /// High-burden finetuner with default shape.
    pub fn large(num_classes: usize) -> Self {
        Self {
            model_type: ModelKind::FineTunerLargeNumMut,
            sigmoid_params: NetworkType::Large.default_gates(),
            ..Self::low(num_classes)
        }
    }

    /// Realistic-vs-random classifier. Its output is a single probability.
    pub fn classifier() -> Self {
        Self {
            model_type: ModelKind::Classifier,
            ..Self::low(1)
        }
    }

    /// The configuration a training run builds.
    pub fn from_training(config: &TrainingConfig) -> Self {
        Self {
            model_type: config.network_type.into(),
            num_classes: config.num_classes,
            num_hidden_layers: config.num_hidden_layers,
            num_units: config.num_neurons,
            cutoff: config.cutoff,
            sigmoid_params: config.gates(),
        }
    }

    pub fn with_hidden(mut self, num_hidden_layers: usize, num_units: usize) -> Self {
        self.num_hidden_layers = num_hidden_layers;
        self.num_units = num_units;
        self
    }

    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn with_gates(mut self, gates: Vec<SigmoidGate>) -> Self {
        self.sigmoid_params = gates;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FinetunerError::InvalidConfig(msg));

        if self.num_units == 0 {
            return invalid("num_units must be at least 1".to_string());
        }
        match self.model_type {
            ModelKind::Classifier if self.num_classes != 1 => {
                return invalid(format!(
                    "a classifier has one output, got num_classes = {}",
                    self.num_classes
                ));
            }
            _ if self.num_classes == 0 => {
                return invalid("num_classes must be at least 1".to_string());
            }
            _ => {}
        }
        if !(0.0..1.0).contains(&self.cutoff) {
            return invalid(format!("cutoff {} is outside [0, 1)", self.cutoff));
        }
        if self.sigmoid_params.len() != self.model_type.gate_count() {
            return invalid(format!(
                "{:?} needs {} sigmoid gates, got {}",
                self.model_type,
                self.model_type.gate_count(),
                self.sigmoid_params.len()
            ));
        }
        for gate in &self.sigmoid_params {
            gate.validate()
                .map_err(|e| FinetunerError::InvalidConfig(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_validate() {
        assert!(ModelConfig::low(72).validate().is_ok());
        assert!(ModelConfig::large(72).validate().is_ok());
        assert!(ModelConfig::classifier().validate().is_ok());
    }

    #[test]
    fn test_json_uses_model_type_names() {
        let json = serde_json::to_value(ModelConfig::large(65)).unwrap();
        assert_eq!(json["model_type"], "FineTunerLargeNumMut");
        assert_eq!(json["sigmoid_params"], serde_json::json!([[5000.0, 2000.0]]));

        let back: ModelConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, ModelConfig::large(65));
    }

    #[test]
    fn test_gate_count_enforced() {
        let config = ModelConfig::large(72).with_gates(NetworkType::Low.default_gates());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_classifier_single_output() {
        let mut config = ModelConfig::classifier();
        config.num_classes = 72;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_training() {
        let mut training = TrainingConfig::new(NetworkType::Large, 3, 32, 1e-3);
        training.num_neurons = 64;
        training.num_hidden_layers = 1;
        let config = ModelConfig::from_training(&training);
        assert_eq!(config.model_type, ModelKind::FineTunerLargeNumMut);
        assert_eq!((config.num_hidden_layers, config.num_units), (1, 64));
        assert!(config.validate().is_ok());
    }
}
