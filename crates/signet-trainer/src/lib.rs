//! signet-trainer
//!
//! Trains one finetuner on a pair of data partitions: shuffled mini-batches,
//! Jensen-Shannon loss, AdamW updates, a rolling validation score and
//! periodic checkpoints.

pub mod data;
pub mod error;
pub mod sink;
pub mod trainer;

pub use data::{DataPartitions, TrainingBatch};
pub use error::{Result, TrainerError};
pub use sink::{MetricSink, NoopSink, TracingSink};
pub use trainer::{FinetunerTrainer, StopHandle, TrainingOutcome, VALIDATION_WINDOW};
