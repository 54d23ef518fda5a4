use std::sync::{Arc, Mutex};

use candle_core::Device;
use signet_baseline::{Baseline, FailurePolicy};
use signet_common::LabeledTable;
use signet_config::{NetworkType, TrainingConfig};
use signet_finetuner::{ExposureNetwork, Finetuner, ModelKind};
use signet_trainer::{DataPartitions, FinetunerTrainer, MetricSink, TrainerError};
use signet_test_utils::{count_table, random_exposures, seeded_rng, synthetic_signatures};

const K: usize = 4;

fn partition(baseline: &Baseline, rows: usize, seed: u64, burden: f32) -> DataPartitions {
    let mut rng = seeded_rng(seed);
    let exposures = random_exposures(&mut rng, rows, K, 2);
    let counts = count_table(&mut rng, baseline.signatures(), &exposures, burden);
    let labels = LabeledTable::new(
        counts.row_labels.clone(),
        baseline.signatures().names().to_vec(),
        exposures,
    )
    .unwrap();
    DataPartitions::from_tables(&counts, &labels, baseline, FailurePolicy::Uniform, &Device::Cpu)
        .unwrap()
}

fn setup(network: NetworkType, burden: f32) -> (TrainingConfig, DataPartitions, DataPartitions) {
    let baseline = Baseline::new(Arc::new(synthetic_signatures(K)), 2).unwrap();
    let mut config = TrainingConfig::new(network, 2, 8, 1e-3);
    config.num_classes = K;
    config.num_hidden_layers = 1;
    config.num_neurons = 16;
    config.checkpoint_every = 3;
    config.log_freq = 2;
    config.shuffle_seed = Some(42);
    config.enable_logging = false;
    (
        config,
        partition(&baseline, 40, 1, burden),
        partition(&baseline, 10, 2, burden),
    )
}

#[derive(Clone, Default)]
struct SharedRecorder(Arc<Mutex<Vec<(String, usize)>>>);

impl MetricSink for SharedRecorder {
    fn log_scalar(&mut self, name: &str, _value: f64, step: usize) {
        self.0.lock().unwrap().push((name.to_string(), step));
    }
}

#[test]
fn test_training_runs_and_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let (mut config, train, val) = setup(NetworkType::Low, 300.0);
    config.model_path = Some(dir.path().join("low"));

    let mut trainer = FinetunerTrainer::new(config, train, val).unwrap();
    let outcome = trainer.objective().unwrap();

    // 40 rows in batches of 8, two passes.
    assert_eq!(outcome.steps, 10);
    assert!(!outcome.stopped_early);
    assert!(outcome.best_score.is_finite());
    assert!(outcome.best_score <= 0.0);
    assert_eq!(outcome.checkpoint, Some(dir.path().join("low")));

    let restored = Finetuner::load(dir.path().join("low"), &Device::Cpu).unwrap();
    assert_eq!(restored.kind(), ModelKind::FineTunerLowNumMut);
    assert_eq!(restored.config().num_classes, K);
}

#[test]
fn test_large_network_trains_on_baseline_guesses() {
    let (config, train, val) = setup(NetworkType::Large, 20_000.0);
    let mut trainer = FinetunerTrainer::new(config, train, val).unwrap();
    let outcome = trainer.objective().unwrap();
    assert_eq!(outcome.steps, 10);
    assert!(outcome.best_score.is_finite());
    assert_eq!(outcome.checkpoint, None);
}

#[test]
fn test_stop_before_first_batch_still_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let (mut config, train, val) = setup(NetworkType::Low, 300.0);
    config.model_path = Some(dir.path().to_path_buf());

    let mut trainer = FinetunerTrainer::new(config, train, val).unwrap();
    trainer.stop_handle().stop();
    let outcome = trainer.objective().unwrap();

    assert_eq!(outcome.steps, 0);
    assert!(outcome.stopped_early);
    assert_eq!(outcome.best_score, f64::NEG_INFINITY);
    assert!(dir.path().join("config.json").is_file());
    assert!(dir.path().join("model.safetensors").is_file());
}

#[test]
fn test_metrics_logged_every_log_freq_steps() {
    let (mut config, train, val) = setup(NetworkType::Low, 300.0);
    config.enable_logging = true;
    config.iterations = 1;

    let recorder = SharedRecorder::default();
    let mut trainer = FinetunerTrainer::new(config, train, val)
        .unwrap()
        .with_sink(Box::new(recorder.clone()));
    trainer.objective().unwrap();

    let logged = recorder.0.lock().unwrap();
    let loss_steps: Vec<usize> = logged
        .iter()
        .filter(|(name, _)| name == "val_loss")
        .map(|(_, step)| *step)
        .collect();
    assert_eq!(loss_steps, vec![0, 2, 4]);
    assert!(logged.iter().any(|(name, _)| name == "train_f1"));
}

#[test]
fn test_class_count_mismatch_rejected() {
    let (mut config, train, val) = setup(NetworkType::Low, 300.0);
    config.num_classes = K + 1;
    let err = FinetunerTrainer::new(config, train, val).unwrap_err();
    assert!(matches!(err, TrainerError::Data(_)));
}

#[test]
fn test_prev_guess_refined_by_saved_finetuner() {
    let dir = tempfile::tempdir().unwrap();
    let config = signet_finetuner::ModelConfig::large(K).with_hidden(1, 8);
    let net = Finetuner::new(config, &Device::Cpu).unwrap();
    signet_finetuner::save_finetuner(&net, dir.path()).unwrap();

    let (_, mut train, _) = setup(NetworkType::Large, 20_000.0);
    let expected = net
        .forward(&train.input().unwrap(), signet_finetuner::Mode::Eval)
        .unwrap()
        .to_vec2::<f32>()
        .unwrap();
    train.refine_prev_guess(dir.path()).unwrap();
    assert_eq!(train.prev_guess.to_vec2::<f32>().unwrap(), expected);
}
