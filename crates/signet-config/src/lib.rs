//! Configuration loading for SigNet.
//!
//! Reads a TOML (or YAML, by extension) file given as the first CLI argument
//! or through the `SIGNET_CONFIG` environment variable.

pub mod error;
pub mod inference;
pub mod training;

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use error::{ConfigError, Result};
pub use inference::{CombinedMember, InferenceConfig, MemberConfig};
pub use training::{DataConfig, TrainingConfig};

/// Environment variable consulted when no config path is passed on the command line.
pub const CONFIG_ENV: &str = "SIGNET_CONFIG";

/// One sigmoid gate over the mutation burden: `sigmoid((n - midpoint) / scale)`.
///
/// Serialised as a two-element array `[midpoint, scale]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct SigmoidGate {
    pub midpoint: f64,
    pub scale: f64,
}

impl SigmoidGate {
    pub const fn new(midpoint: f64, scale: f64) -> Self {
        Self { midpoint, scale }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.midpoint.is_finite() || !self.scale.is_finite() || self.scale == 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sigmoid gate ({}, {}) needs a finite midpoint and a non-zero scale",
                self.midpoint, self.scale
            )));
        }
        Ok(())
    }
}

impl From<[f64; 2]> for SigmoidGate {
    fn from([midpoint, scale]: [f64; 2]) -> Self {
        Self { midpoint, scale }
    }
}

impl From<SigmoidGate> for [f64; 2] {
    fn from(g: SigmoidGate) -> Self {
        [g.midpoint, g.scale]
    }
}

/// Finetuner variant to train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Distribution + burden only
    Low,
    /// Distribution + baseline guess + burden, residual on the baseline
    Large,
}

impl NetworkType {
    /// Default burden gates for this variant.
    pub fn default_gates(&self) -> Vec<SigmoidGate> {
        match self {
            NetworkType::Low => vec![
                SigmoidGate::new(500.0, 1000.0),
                SigmoidGate::new(5000.0, 2000.0),
                SigmoidGate::new(10000.0, 5000.0),
            ],
            NetworkType::Large => vec![SigmoidGate::new(5000.0, 2000.0)],
        }
    }

    /// Number of configurable gates this variant expects.
    pub fn gate_count(&self) -> usize {
        match self {
            NetworkType::Low => 3,
            NetworkType::Large => 1,
        }
    }
}

/// Where tensors live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Cpu,
    /// Falls back to CPU when no CUDA device is available
    Cuda,
}

/// What the baseline decomposer does when a sample fails to converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Fail the whole batch with the first failing row
    #[default]
    Abort,
    /// Substitute a uniform exposure and report the row
    Uniform,
}

/// Deserialize a config file, choosing the format from its extension.
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    debug!(path = %path.display(), yaml = is_yaml, "parsing configuration");

    if is_yaml {
        Ok(serde_yaml::from_str(&content)?)
    } else {
        Ok(toml::from_str(&content)?)
    }
}

/// Resolve the config path from the first CLI argument or `SIGNET_CONFIG`.
pub fn config_path(mut args: impl Iterator<Item = String>) -> Result<PathBuf> {
    args.next()
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from)
        .ok_or(ConfigError::Missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_serializes_as_pair() {
        let gate: SigmoidGate = serde_json::from_str("[5000.0, 2000.0]").unwrap();
        assert_eq!(gate, SigmoidGate::new(5000.0, 2000.0));
        assert_eq!(serde_json::to_string(&gate).unwrap(), "[5000.0,2000.0]");
    }

    #[test]
    fn test_gate_rejects_zero_scale() {
        assert!(SigmoidGate::new(10.0, 0.0).validate().is_err());
        assert!(SigmoidGate::new(10.0, 5.0).validate().is_ok());
    }

    #[test]
    fn test_default_gate_counts_match_variant() {
        for kind in [NetworkType::Low, NetworkType::Large] {
            assert_eq!(kind.default_gates().len(), kind.gate_count());
        }
    }

    #[test]
    fn test_config_path_prefers_argument() {
        let path = config_path(vec!["train.toml".to_string()].into_iter()).unwrap();
        assert_eq!(path, PathBuf::from("train.toml"));
    }
}
