//! Baseline decomposition followed by a burden-appropriate finetuner.

use std::sync::Arc;

use candle_core::{Device, Tensor};
use signet_baseline::{Baseline, FailurePolicy};
use signet_config::{CombinedMember, ConfigError};
use signet_finetuner::{ExposureNetwork, Finetuner, FinetunerInput, Mode};
use tracing::{debug, info, warn};

use crate::partition::{route_rows, Branch};
use crate::{ExposureModel, PipelineError, Result};

/// Which finetuner handles which rows.
#[derive(Debug)]
pub enum Selection {
    /// Every row goes to one network.
    Single(Finetuner),
    /// Rows with burden below `burden_cutoff` go to `low`, the rest to `large`.
    ByBurden {
        low: Finetuner,
        large: Finetuner,
        burden_cutoff: f32,
    },
}

impl Selection {
    fn num_classes(&self) -> usize {
        match self {
            Selection::Single(f) => f.num_classes(),
            Selection::ByBurden { low, .. } => low.num_classes(),
        }
    }

    fn needs_baseline(&self) -> bool {
        match self {
            Selection::Single(f) => f.needs_baseline(),
            Selection::ByBurden { low, large, .. } => low.needs_baseline() || large.needs_baseline(),
        }
    }
}

#[derive(Debug)]
pub struct CombinedFinetuner {
    selection: Selection,
    baseline: Option<Arc<Baseline>>,
    failure_policy: FailurePolicy,
}

impl CombinedFinetuner {
    /// `baseline` fills in missing baseline guesses; without it, inputs for a
    /// high-burden network must carry their own.
    pub fn new(selection: Selection, baseline: Option<Arc<Baseline>>) -> Result<Self> {
        let k = selection.num_classes();
        if let Selection::ByBurden { large, .. } = &selection {
            if large.num_classes() != k {
                return Err(PipelineError::ClassMismatch(format!(
                    "low finetuner has {k}, large finetuner has {}",
                    large.num_classes()
                )));
            }
        }
        if let Some(b) = &baseline {
            b.signatures().ensure_classes(k)?;
        }
        Ok(Self {
            selection,
            baseline,
            failure_policy: FailurePolicy::default(),
        })
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Load the model directories named by `member` onto `device`.
    pub fn from_config(
        member: &CombinedMember,
        baseline: Option<Arc<Baseline>>,
        failure_policy: FailurePolicy,
        device: &Device,
    ) -> Result<Self> {
        member.validate()?;
        let load = |dir: &std::path::Path| -> Result<Finetuner> {
            info!(path = %dir.display(), "loading finetuner");
            Ok(Finetuner::load(dir, device)?)
        };
        let selection = match (&member.low, &member.large) {
            (Some(low), Some(large)) => Selection::ByBurden {
                low: load(low)?,
                large: load(large)?,
                burden_cutoff: member.burden_cutoff,
            },
            (Some(dir), None) | (None, Some(dir)) => Selection::Single(load(dir)?),
            (None, None) => {
                return Err(ConfigError::Invalid("combined member names no model".to_string()).into())
            }
        };
        Ok(Self::new(selection, baseline)?.with_failure_policy(failure_policy))
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Drop the networks and free their parameter memory.
    pub fn release(self) {
        match self.selection {
            Selection::Single(f) => f.release(),
            Selection::ByBurden { low, large, .. } => {
                low.release();
                large.release();
            }
        }
    }

    fn with_baseline_guess(&self, input: &FinetunerInput) -> Result<FinetunerInput> {
        if input.baseline_guess.is_some() || !self.selection.needs_baseline() {
            return Ok(input.clone());
        }
        let baseline = self.baseline.as_ref().ok_or(PipelineError::MissingBaseline)?;
        let decomposition = baseline.decompose_tensor(&input.mutation_dist, self.failure_policy)?;
        if !decomposition.fallback_rows.is_empty() {
            warn!(
                rows = ?decomposition.fallback_rows,
                "baseline guess replaced by uniform exposure"
            );
        }
        let guess = decomposition.to_tensor(input.device())?;
        Ok(input.clone().with_baseline(guess)?)
    }
}

impl ExposureModel for CombinedFinetuner {
    fn num_classes(&self) -> usize {
        self.selection.num_classes()
    }

    fn predict(&self, input: &FinetunerInput) -> Result<Tensor> {
        let input = self.with_baseline_guess(input)?;
        match &self.selection {
            Selection::Single(f) => Ok(f.forward(&input, Mode::Eval)?),
            Selection::ByBurden {
                low,
                large,
                burden_cutoff,
            } => {
                let burdens = input.num_mut.flatten_all()?.to_vec1::<f32>()?;
                let mask: Vec<bool> = burdens.iter().map(|n| n < burden_cutoff).collect();
                debug!(rows = burdens.len(), cutoff = burden_cutoff, "routing by burden");
                route_rows(&input, &mask, self.num_classes(), |branch, sub| {
                    let net = match branch {
                        Branch::First => low,
                        Branch::Second => large,
                    };
                    Ok(net.forward(sub, Mode::Eval)?)
                })
            }
        }
    }
}
