//! Training and validation partitions.

use std::path::Path;

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use signet_baseline::{Baseline, FailurePolicy};
use signet_common::spectrum::{check_exposure_batch, check_spectrum_batch, normalize_counts};
use signet_common::LabeledTable;
use signet_finetuner::{refine_baseline_guess, FinetunerInput};
use tracing::info;

use crate::{Result, TrainerError};

/// Aligned inputs, baseline guesses, labels and burdens for one data split.
#[derive(Debug, Clone)]
pub struct DataPartitions {
    /// (N, 96) normalised spectra
    pub inputs: Tensor,
    /// (N, K) baseline guesses
    pub prev_guess: Tensor,
    /// (N, K) true exposures
    pub labels: Tensor,
    /// (N, 1) mutation burdens
    pub num_mut: Tensor,
}

/// One shuffled mini-batch.
#[derive(Debug, Clone)]
pub struct TrainingBatch {
    pub input: FinetunerInput,
    pub labels: Tensor,
}

impl DataPartitions {
    pub fn new(inputs: Tensor, prev_guess: Tensor, labels: Tensor, num_mut: Tensor) -> Result<Self> {
        let rows = check_spectrum_batch(&inputs)?;
        let k = labels.dims().get(1).copied().unwrap_or(0);
        check_exposure_batch(&labels, rows, k)?;
        check_exposure_batch(&prev_guess, rows, k)?;
        let num_mut = signet_common::spectrum::burden_column(&num_mut, rows)?;
        if rows == 0 {
            return Err(TrainerError::Data("partition has no rows".to_string()));
        }
        Ok(Self {
            inputs,
            prev_guess,
            labels,
            num_mut,
        })
    }

    /// Build a partition from raw counts and true exposures, computing the
    /// baseline guesses with `baseline`.
    pub fn from_tables(
        counts: &LabeledTable,
        labels: &LabeledTable,
        baseline: &Baseline,
        policy: FailurePolicy,
        device: &Device,
    ) -> Result<Self> {
        if counts.nrows() != labels.nrows() {
            return Err(TrainerError::Data(format!(
                "{} count rows but {} label rows",
                counts.nrows(),
                labels.nrows()
            )));
        }
        baseline.signatures().ensure_classes(labels.ncols())?;

        let batch = normalize_counts(&counts.to_tensor(device)?)?;
        let guess = baseline
            .decompose_tensor(&batch.mutation_dist, policy)?
            .to_tensor(device)?;
        info!(rows = counts.nrows(), "built data partition");
        Self::new(batch.mutation_dist, guess, labels.to_tensor(device)?, batch.num_mut)
    }

    pub fn rows(&self) -> usize {
        self.inputs.dims()[0]
    }

    pub fn num_classes(&self) -> usize {
        self.labels.dims()[1]
    }

    /// The whole partition as one network input.
    pub fn input(&self) -> Result<FinetunerInput> {
        Ok(FinetunerInput::new(self.inputs.clone(), self.num_mut.clone())?
            .with_baseline(self.prev_guess.clone())?)
    }

    /// Replace the baseline guesses with the output of the finetuner saved
    /// in `dir`, so a model can be trained on top of another's guesses.
    pub fn refine_prev_guess(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let device = self.inputs.device().clone();
        let refined = refine_baseline_guess(dir, &self.input()?)?;
        self.prev_guess = refined.to_device(&device)?;
        Ok(())
    }

    pub fn to_device(&self, device: &Device) -> Result<Self> {
        Ok(Self {
            inputs: self.inputs.to_device(device)?,
            prev_guess: self.prev_guess.to_device(device)?,
            labels: self.labels.to_device(device)?,
            num_mut: self.num_mut.to_device(device)?,
        })
    }

    /// One pass over the partition in a fresh random order. The last batch
    /// is smaller when `batch_size` does not divide the row count.
    pub fn batches(&self, batch_size: usize, rng: &mut StdRng) -> Result<Vec<TrainingBatch>> {
        let mut order: Vec<u32> = (0..self.rows() as u32).collect();
        order.shuffle(rng);

        let input = self.input()?;
        order
            .chunks(batch_size.max(1))
            .map(|rows| {
                let ids = Tensor::from_slice(rows, rows.len(), self.labels.device())?;
                Ok(TrainingBatch {
                    input: input.select_rows(rows)?,
                    labels: self.labels.index_select(&ids, 0)?,
                })
            })
            .collect()
    }
}
