//! Options for the `signet-refine` inference binary.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, DeviceKind, FailurePolicy, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// 96 × K signature table
    pub signatures: PathBuf,
    /// Raw mutation counts, one row per sample
    pub inputs: PathBuf,
    /// Where the refined exposures are written
    pub output: PathBuf,

    #[serde(default)]
    pub device: DeviceKind,

    #[serde(default = "default_workers")]
    pub baseline_workers: usize,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// When set, weights below this value are folded into an extra "unknown" column
    #[serde(default)]
    pub unknown_threshold: Option<f32>,

    /// Ensemble members; a single member means no averaging
    pub members: Vec<MemberConfig>,
}

/// One ensemble member.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MemberConfig {
    Combined(CombinedMember),
    Classified {
        classifier: PathBuf,
        realistic: CombinedMember,
        random: CombinedMember,
        #[serde(default = "default_classification_cutoff")]
        classification_cutoff: f32,
    },
}

/// Model directories for a combined finetuner. With both set, rows are
/// routed by burden: below `burden_cutoff` to `low`, otherwise to `large`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedMember {
    #[serde(default)]
    pub low: Option<PathBuf>,
    #[serde(default)]
    pub large: Option<PathBuf>,
    #[serde(default = "default_burden_cutoff")]
    pub burden_cutoff: f32,
}

fn default_workers() -> usize { 2 }
fn default_classification_cutoff() -> f32 { 0.5 }
fn default_burden_cutoff() -> f32 { 1000.0 }

impl CombinedMember {
    pub fn validate(&self) -> Result<()> {
        if self.low.is_none() && self.large.is_none() {
            return Err(ConfigError::Invalid(
                "combined member needs a low or a large model directory".to_string(),
            ));
        }
        if !(self.burden_cutoff.is_finite() && self.burden_cutoff > 0.0) {
            return Err(ConfigError::Invalid("burden_cutoff must be positive".to_string()));
        }
        Ok(())
    }
}

impl InferenceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.members.is_empty() {
            return Err(ConfigError::Invalid("at least one member is required".to_string()));
        }
        if self.baseline_workers == 0 {
            return Err(ConfigError::Invalid("baseline_workers must be at least 1".to_string()));
        }
        if let Some(t) = self.unknown_threshold {
            if !(0.0..1.0).contains(&t) {
                return Err(ConfigError::Invalid("unknown_threshold must be in [0, 1)".to_string()));
            }
        }
        for member in &self.members {
            match member {
                MemberConfig::Combined(c) => c.validate()?,
                MemberConfig::Classified {
                    realistic,
                    random,
                    classification_cutoff,
                    ..
                } => {
                    realistic.validate()?;
                    random.validate()?;
                    if !(0.0..=1.0).contains(classification_cutoff) {
                        return Err(ConfigError::Invalid(
                            "classification_cutoff must be in [0, 1]".to_string(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
