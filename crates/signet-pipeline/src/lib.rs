//! signet-pipeline
//!
//! Composes the baseline decomposer and the trained networks into the
//! models used at inference time:
//!
//! - [`CombinedFinetuner`]: baseline guess, then the finetuner for the
//!   sample's burden regime
//! - [`ClassifiedFinetuner`]: a router splits the batch between a realistic
//!   and a random specialist, and rows are put back in input order
//! - [`FinetunerEnsemble`]: the mean over independently trained members

pub mod classified;
pub mod combined;
pub mod ensemble;
pub mod error;
pub mod model;
pub mod partition;
pub mod postprocess;

pub use classified::{ClassifiedFinetuner, DEFAULT_CLASSIFICATION_CUTOFF};
pub use combined::{CombinedFinetuner, Selection};
pub use ensemble::FinetunerEnsemble;
pub use error::{PipelineError, Result};
pub use model::{ExposureModel, Router};
pub use postprocess::{fold_into_unknown, DEFAULT_UNKNOWN_THRESHOLD};

use std::sync::Arc;

use candle_core::Device;
use signet_baseline::Baseline;
use signet_config::{InferenceConfig, MemberConfig};

/// Build the ensemble described by an inference config.
pub fn ensemble_from_config(
    config: &InferenceConfig,
    baseline: Arc<Baseline>,
    device: &Device,
) -> Result<FinetunerEnsemble> {
    config.validate()?;
    let members = config
        .members
        .iter()
        .map(|member| -> Result<Arc<dyn ExposureModel>> {
            let model: Arc<dyn ExposureModel> = match member {
                MemberConfig::Combined(c) => Arc::new(CombinedFinetuner::from_config(
                    c,
                    Some(baseline.clone()),
                    config.failure_policy,
                    device,
                )?),
                MemberConfig::Classified {
                    classifier,
                    realistic,
                    random,
                    classification_cutoff,
                } => Arc::new(ClassifiedFinetuner::from_config(
                    classifier,
                    realistic,
                    random,
                    *classification_cutoff,
                    Some(baseline.clone()),
                    config.failure_policy,
                    device,
                )?),
            };
            Ok(model)
        })
        .collect::<Result<Vec<_>>>()?;
    FinetunerEnsemble::new(members)
}
