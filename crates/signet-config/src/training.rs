//! Options recognised by the finetuner trainer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, DeviceKind, FailurePolicy, NetworkType, Result, SigmoidGate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Name of the trained model, used in log lines
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Passes over the whole training set
    pub iterations: usize,

    pub batch_size: usize,

    pub lr: f64,

    #[serde(default = "default_hidden_layers")]
    pub num_hidden_layers: usize,

    /// Hidden width
    #[serde(default = "default_num_neurons")]
    pub num_neurons: usize,

    pub network_type: NetworkType,

    #[serde(default = "default_num_classes")]
    pub num_classes: usize,

    /// Burden gates; the variant's defaults when omitted
    #[serde(default)]
    pub sigmoid_params: Option<Vec<SigmoidGate>>,

    /// Evaluation-mode exposure cutoff
    #[serde(default = "default_cutoff")]
    pub cutoff: f64,

    #[serde(default)]
    pub device: DeviceKind,

    #[serde(default = "default_true")]
    pub enable_logging: bool,

    /// Checkpoint directory; nothing is written when absent
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_log_freq")]
    pub log_freq: usize,

    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,

    #[serde(default = "default_weight_decay")]
    pub weight_decay: f64,

    /// Worker threads for the baseline decomposer
    #[serde(default = "default_baseline_workers")]
    pub baseline_workers: usize,

    /// What to do with training rows the baseline cannot decompose
    #[serde(default = "default_failure_policy")]
    pub failure_policy: FailurePolicy,

    /// Seed for batch shuffling; entropy-seeded when absent
    #[serde(default)]
    pub shuffle_seed: Option<u64>,

    /// Input tables, required by the `signet-train` binary only
    #[serde(default)]
    pub data: Option<DataConfig>,
}

/// CSV inputs for a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// 96 × K signature table
    pub signatures: PathBuf,
    /// Raw mutation counts, one row per sample
    pub train_inputs: PathBuf,
    /// True exposures, one row per sample
    pub train_labels: PathBuf,
    pub val_inputs: PathBuf,
    pub val_labels: PathBuf,
    /// Saved high-burden finetuner whose output replaces the baseline
    /// guesses before training
    #[serde(default)]
    pub refine_with: Option<PathBuf>,
}

fn default_model_id() -> String { "finetuner".to_string() }
fn default_hidden_layers() -> usize { 2 }
fn default_num_neurons() -> usize { 400 }
fn default_num_classes() -> usize { 72 }
fn default_cutoff() -> f64 { 0.001 }
fn default_true() -> bool { true }
fn default_log_freq() -> usize { 100 }
fn default_checkpoint_every() -> usize { 500 }
fn default_weight_decay() -> f64 { 1e-4 }
fn default_baseline_workers() -> usize { 2 }
fn default_failure_policy() -> FailurePolicy { FailurePolicy::Uniform }

impl TrainingConfig {
    /// A config with defaults for everything but the required options.
    pub fn new(network_type: NetworkType, iterations: usize, batch_size: usize, lr: f64) -> Self {
        Self {
            model_id: default_model_id(),
            iterations,
            batch_size,
            lr,
            num_hidden_layers: default_hidden_layers(),
            num_neurons: default_num_neurons(),
            network_type,
            num_classes: default_num_classes(),
            sigmoid_params: None,
            cutoff: default_cutoff(),
            device: DeviceKind::default(),
            enable_logging: true,
            model_path: None,
            log_freq: default_log_freq(),
            checkpoint_every: default_checkpoint_every(),
            weight_decay: default_weight_decay(),
            baseline_workers: default_baseline_workers(),
            failure_policy: default_failure_policy(),
            shuffle_seed: None,
            data: None,
        }
    }

    /// Burden gates to build the network with.
    pub fn gates(&self) -> Vec<SigmoidGate> {
        self.sigmoid_params
            .clone()
            .unwrap_or_else(|| self.network_type.default_gates())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.iterations == 0 {
            return invalid("iterations must be at least 1");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1");
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return invalid("lr must be a positive number");
        }
        if self.num_neurons == 0 || self.num_classes == 0 {
            return invalid("num_neurons and num_classes must be at least 1");
        }
        if self.log_freq == 0 || self.checkpoint_every == 0 {
            return invalid("log_freq and checkpoint_every must be at least 1");
        }
        if self.baseline_workers == 0 {
            return invalid("baseline_workers must be at least 1");
        }
        if !(0.0..1.0).contains(&self.cutoff) {
            return invalid("cutoff must be in [0, 1)");
        }

        let gates = self.gates();
        if gates.len() != self.network_type.gate_count() {
            return Err(ConfigError::Invalid(format!(
                "network type {:?} needs {} sigmoid gates, got {}",
                self.network_type,
                self.network_type.gate_count(),
                gates.len()
            )));
        }
        gates.iter().try_for_each(SigmoidGate::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"
        iterations = 5
        batch_size = 500
        lr = 0.0001
        network_type = "large"
    "#;

    #[test]
    fn test_minimal_toml_gets_defaults() {
        let config: TrainingConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.num_hidden_layers, 2);
        assert_eq!(config.num_neurons, 400);
        assert_eq!(config.num_classes, 72);
        assert_eq!(config.log_freq, 100);
        assert_eq!(config.checkpoint_every, 500);
        assert_eq!(config.device, DeviceKind::Cpu);
        assert_eq!(config.failure_policy, FailurePolicy::Uniform);
        assert_eq!(config.gates(), vec![SigmoidGate::new(5000.0, 2000.0)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_failure_policy_read_from_file() {
        let text = format!("{MINIMAL}\nfailure_policy = \"abort\"\n");
        let config: TrainingConfig = toml::from_str(&text).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_unknown_network_type_rejected() {
        let text = MINIMAL.replace("\"large\"", "\"medium\"");
        assert!(toml::from_str::<TrainingConfig>(&text).is_err());
    }

    #[test]
    fn test_wrong_gate_count_rejected() {
        let mut config = TrainingConfig::new(NetworkType::Low, 1, 8, 1e-3);
        config.sigmoid_params = Some(vec![SigmoidGate::new(5000.0, 2000.0)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_batch_rejected() {
        let config = TrainingConfig::new(NetworkType::Large, 1, 0, 1e-3);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_yaml_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.yaml");
        std::fs::write(
            &path,
            "iterations: 2\nbatch_size: 16\nlr: 0.001\nnetwork_type: low\n\
             sigmoid_params: [[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]\n",
        )
        .unwrap();

        let config: TrainingConfig = crate::load(&path).unwrap();
        assert_eq!(config.network_type, NetworkType::Low);
        assert_eq!(config.gates()[2], SigmoidGate::new(5.0, 6.0));
        assert!(config.validate().is_ok());
    }
}
