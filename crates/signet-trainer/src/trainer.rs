//! The finetuner training loop.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use candle_core::Device;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use rand::rngs::StdRng;
use rand::SeedableRng;
use signet_common::metrics::{classification_metrics, jensen_shannon, DEFAULT_PRESENCE_THRESHOLD};
use signet_config::TrainingConfig;
use signet_finetuner::{save_finetuner, select_device, ExposureNetwork, Finetuner, Mode, ModelConfig};
use tracing::{debug, info, warn};

use crate::sink::{MetricSink, NoopSink, TracingSink};
use crate::{DataPartitions, Result, TrainerError};

/// Number of recent validation losses the score is averaged over.
pub const VALIDATION_WINDOW: usize = 50;

/// Lets another thread stop training between batches.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    /// Highest negated mean of the validation-loss window seen during training
    pub best_score: f64,
    /// Optimizer steps taken
    pub steps: usize,
    /// Directory of the last checkpoint written
    pub checkpoint: Option<PathBuf>,
    pub stopped_early: bool,
}

pub struct FinetunerTrainer {
    config: TrainingConfig,
    train: DataPartitions,
    val: DataPartitions,
    device: Device,
    sink: Box<dyn MetricSink>,
    stop: StopHandle,
}

impl std::fmt::Debug for FinetunerTrainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinetunerTrainer")
            .field("model_id", &self.config.model_id)
            .field("train_rows", &self.train.rows())
            .field("val_rows", &self.val.rows())
            .field("device", &self.device)
            .finish()
    }
}

impl FinetunerTrainer {
    pub fn new(config: TrainingConfig, train: DataPartitions, val: DataPartitions) -> Result<Self> {
        config.validate()?;
        for (name, part) in [("train", &train), ("val", &val)] {
            if part.num_classes() != config.num_classes {
                return Err(TrainerError::Data(format!(
                    "{name} labels have {} signatures, config expects {}",
                    part.num_classes(),
                    config.num_classes
                )));
            }
        }

        let device = select_device(config.device);
        let sink: Box<dyn MetricSink> = if config.enable_logging {
            Box::new(TracingSink::new(config.model_id.clone()))
        } else {
            Box::new(NoopSink)
        };
        Ok(Self {
            train: train.to_device(&device)?,
            val: val.to_device(&device)?,
            config,
            device,
            sink,
            stop: StopHandle::new(),
        })
    }

    /// Replace the metric sink. Has no effect on whether logging is enabled.
    pub fn with_sink(mut self, sink: Box<dyn MetricSink>) -> Self {
        if self.config.enable_logging {
            self.sink = sink;
        }
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Train a fresh network and return the best validation score.
    ///
    /// Checkpoints go to `model_path` every `checkpoint_every` steps and once
    /// more at the end, including after a stop request.
    pub fn objective(&mut self) -> Result<TrainingOutcome> {
        let model = Finetuner::new(ModelConfig::from_training(&self.config), &self.device)?;
        let mut optimizer = AdamW::new(
            model.weights().all_vars(),
            ParamsAdamW {
                lr: self.config.lr,
                weight_decay: self.config.weight_decay,
                ..Default::default()
            },
        )?;
        let mut rng = match self.config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(
            model = %self.config.model_id,
            kind = ?model.kind(),
            params = model.weights().num_parameters(),
            train_rows = self.train.rows(),
            val_rows = self.val.rows(),
            "training started"
        );

        let start = Instant::now();
        let val_input = self.val.input()?;
        let mut window: VecDeque<f64> = VecDeque::with_capacity(VALIDATION_WINDOW);
        let mut best_score = f64::NEG_INFINITY;
        let mut checkpoint = None;
        let mut stopped_early = false;
        let mut step = 0usize;

        'passes: for pass in 0..self.config.iterations {
            for batch in self.train.batches(self.config.batch_size, &mut rng)? {
                if self.stop.is_stopped() {
                    warn!(step, pass, "stop requested");
                    stopped_early = true;
                    break 'passes;
                }

                let prediction = model.forward(&batch.input, Mode::Train)?;
                let loss = jensen_shannon(&prediction, &batch.labels)?;
                let train_loss = loss.to_scalar::<f32>()? as f64;
                if !train_loss.is_finite() {
                    return Err(TrainerError::NonFiniteLoss { step });
                }
                optimizer.backward_step(&loss)?;

                let val_prediction = model.forward(&val_input, Mode::Eval)?.detach();
                let val_loss = jensen_shannon(&val_prediction, &self.val.labels)?.to_scalar::<f32>()? as f64;
                if window.len() == VALIDATION_WINDOW {
                    window.pop_front();
                }
                window.push_back(val_loss);
                if let Some(mean) = nan_mean(&window) {
                    best_score = best_score.max(-mean);
                }

                if step % self.config.log_freq == 0 {
                    let train_metrics = classification_metrics(
                        &batch.labels,
                        &prediction.detach(),
                        DEFAULT_PRESENCE_THRESHOLD,
                    )?;
                    let val_metrics = classification_metrics(
                        &self.val.labels,
                        &val_prediction,
                        DEFAULT_PRESENCE_THRESHOLD,
                    )?;
                    self.sink.log_scalar("train_loss", train_loss, step);
                    self.sink.log_scalar("val_loss", val_loss, step);
                    self.sink.log_classification("train", &train_metrics, step);
                    self.sink.log_classification("val", &val_metrics, step);
                }

                if step % self.config.checkpoint_every == 0 {
                    checkpoint = self.save(&model)?.or(checkpoint);
                }
                step += 1;
            }
            debug!(pass, step, best_score, "pass finished");
        }

        checkpoint = self.save(&model)?.or(checkpoint);
        info!(
            model = %self.config.model_id,
            steps = step,
            best_score,
            elapsed_s = start.elapsed().as_secs_f64(),
            stopped_early,
            "training finished"
        );
        model.release();

        Ok(TrainingOutcome {
            best_score,
            steps: step,
            checkpoint,
            stopped_early,
        })
    }

    fn save(&self, model: &Finetuner) -> Result<Option<PathBuf>> {
        match &self.config.model_path {
            Some(dir) => {
                save_finetuner(model, dir)?;
                Ok(Some(dir.clone()))
            }
            None => Ok(None),
        }
    }
}

/// Mean of the non-NaN values, `None` when there are none.
fn nan_mean(values: &VecDeque<f64>) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
