//! Route each row to a realistic or a random specialist.

use std::path::Path;
use std::sync::Arc;

use candle_core::{Device, Tensor};
use signet_baseline::{Baseline, FailurePolicy};
use signet_config::CombinedMember;
use signet_finetuner::{load_model, FinetunerInput, LoadedModel};
use tracing::debug;

use crate::partition::{route_rows, Branch};
use crate::{CombinedFinetuner, ExposureModel, PipelineError, Result, Router};

/// Default probability at or above which a row counts as realistic.
pub const DEFAULT_CLASSIFICATION_CUTOFF: f32 = 0.5;

/// Splits a batch with a [`Router`] and sends each side to its own model.
///
/// Output row `i` always corresponds to input row `i`, and a specialist is
/// not invoked when no row is routed to it.
pub struct ClassifiedFinetuner {
    router: Box<dyn Router>,
    realistic: Box<dyn ExposureModel>,
    random: Box<dyn ExposureModel>,
    classification_cutoff: f32,
}

impl std::fmt::Debug for ClassifiedFinetuner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifiedFinetuner")
            .field("num_classes", &self.realistic.num_classes())
            .field("classification_cutoff", &self.classification_cutoff)
            .finish()
    }
}

impl ClassifiedFinetuner {
    pub fn new(
        router: Box<dyn Router>,
        realistic: Box<dyn ExposureModel>,
        random: Box<dyn ExposureModel>,
    ) -> Result<Self> {
        if realistic.num_classes() != random.num_classes() {
            return Err(PipelineError::ClassMismatch(format!(
                "realistic specialist has {}, random specialist has {}",
                realistic.num_classes(),
                random.num_classes()
            )));
        }
        Ok(Self {
            router,
            realistic,
            random,
            classification_cutoff: DEFAULT_CLASSIFICATION_CUTOFF,
        })
    }

    pub fn with_classification_cutoff(mut self, cutoff: f32) -> Self {
        self.classification_cutoff = cutoff;
        self
    }

    /// Load a classifier directory and two combined specialists onto `device`.
    pub fn from_config(
        classifier: &Path,
        realistic: &CombinedMember,
        random: &CombinedMember,
        classification_cutoff: f32,
        baseline: Option<Arc<Baseline>>,
        failure_policy: FailurePolicy,
        device: &Device,
    ) -> Result<Self> {
        let router = match load_model(classifier, device)? {
            LoadedModel::Classifier(c) => c,
            LoadedModel::Finetuner(_) => {
                return Err(PipelineError::WrongModel {
                    expected: "classifier",
                    path: classifier.display().to_string(),
                })
            }
        };
        let realistic =
            CombinedFinetuner::from_config(realistic, baseline.clone(), failure_policy, device)?;
        let random = CombinedFinetuner::from_config(random, baseline, failure_policy, device)?;
        Ok(Self::new(Box::new(router), Box::new(realistic), Box::new(random))?
            .with_classification_cutoff(classification_cutoff))
    }
}

impl ExposureModel for ClassifiedFinetuner {
    fn num_classes(&self) -> usize {
        self.realistic.num_classes()
    }

    fn predict(&self, input: &FinetunerInput) -> Result<Tensor> {
        let probs = self
            .router
            .realistic_probability(input)?
            .flatten_all()?
            .to_vec1::<f32>()?;
        let mask: Vec<bool> = probs
            .iter()
            .map(|p| *p >= self.classification_cutoff)
            .collect();
        debug!(
            realistic = mask.iter().filter(|m| **m).count(),
            rows = mask.len(),
            "classified batch"
        );

        route_rows(input, &mask, self.num_classes(), |branch, sub| match branch {
            Branch::First => self.realistic.predict(sub),
            Branch::Second => self.random.predict(sub),
        })
    }
}
