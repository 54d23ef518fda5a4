use candle_core::{Device, Tensor};
use signet_finetuner::persistence::{CONFIG_FILE, WEIGHTS_FILE};
use signet_finetuner::{
    load_model, read_config, refine_baseline_guess, save_classifier, save_finetuner, Classifier,
    ExposureNetwork, Finetuner, FinetunerError, FinetunerInput, LoadedModel, Mode, ModelConfig,
    ModelKind,
};
use signet_test_utils::{burden_column, random_exposures, seeded_rng, spectrum_batch, synthetic_signatures};

const K: usize = 4;

fn input(with_baseline: bool) -> FinetunerInput {
    let device = Device::Cpu;
    let sigs = synthetic_signatures(K);
    let exposures = random_exposures(&mut seeded_rng(3), 3, K, 2);
    let input = FinetunerInput::new(
        spectrum_batch(&sigs, &exposures, &device),
        burden_column(&[120.0, 6_000.0, 40_000.0], &device),
    )
    .unwrap();
    if with_baseline {
        let guess = Tensor::full(0.25f32, (3, K), &device).unwrap();
        input.with_baseline(guess).unwrap()
    } else {
        input
    }
}

#[test]
fn test_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let net = Finetuner::new(ModelConfig::large(K).with_hidden(2, 12), &Device::Cpu).unwrap();
    save_finetuner(&net, dir.path()).unwrap();

    assert!(dir.path().join(CONFIG_FILE).is_file());
    assert!(dir.path().join(WEIGHTS_FILE).is_file());
    // No temporary files left behind.
    let entries = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(entries, 2);

    let loaded = Finetuner::load(dir.path(), &Device::Cpu).unwrap();
    assert_eq!(loaded.config(), net.config());
    assert_eq!(
        loaded.weights().snapshot().unwrap(),
        net.weights().snapshot().unwrap()
    );

    let batch = input(true);
    let a = net.forward(&batch, Mode::Eval).unwrap().to_vec2::<f32>().unwrap();
    let b = loaded.forward(&batch, Mode::Eval).unwrap().to_vec2::<f32>().unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_resave_with_other_shape_replaces_both_files() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("model");

    let low = Finetuner::new(ModelConfig::low(K).with_hidden(1, 8), &Device::Cpu).unwrap();
    save_finetuner(&low, &dir).unwrap();
    let large = Finetuner::new(ModelConfig::large(K).with_hidden(2, 12), &Device::Cpu).unwrap();
    save_finetuner(&large, &dir).unwrap();

    let loaded = Finetuner::load(&dir, &Device::Cpu).unwrap();
    assert_eq!(loaded.kind(), ModelKind::FineTunerLargeNumMut);
    assert_eq!(
        loaded.weights().snapshot().unwrap(),
        large.weights().snapshot().unwrap()
    );
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 2);
    // Neither the staging directory nor the previous save is left beside it.
    let siblings: Vec<_> = std::fs::read_dir(root.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(siblings, vec![std::ffi::OsString::from("model")]);
}

#[test]
fn test_config_json_carries_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let net = Finetuner::new(ModelConfig::low(K).with_hidden(1, 8), &Device::Cpu).unwrap();
    save_finetuner(&net, dir.path()).unwrap();

    let raw = std::fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["model_type"], "FineTunerLowNumMut");
    assert!(json["saved_at"].is_string());
    assert_eq!(read_config(dir.path()).unwrap(), *net.config());
}

#[test]
fn test_missing_config_cannot_reconstruct() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_model(dir.path(), &Device::Cpu).unwrap_err();
    assert!(matches!(err, FinetunerError::CannotReconstruct { .. }));
}

#[test]
fn test_missing_weights_cannot_reconstruct() {
    let dir = tempfile::tempdir().unwrap();
    let net = Finetuner::new(ModelConfig::low(K).with_hidden(1, 8), &Device::Cpu).unwrap();
    save_finetuner(&net, dir.path()).unwrap();
    std::fs::remove_file(dir.path().join(WEIGHTS_FILE)).unwrap();

    let err = Finetuner::load(dir.path(), &Device::Cpu).unwrap_err();
    assert!(matches!(err, FinetunerError::CannotReconstruct { .. }));
}

#[test]
fn test_mismatched_weights_cannot_reconstruct() {
    let dir = tempfile::tempdir().unwrap();
    let net = Finetuner::new(ModelConfig::low(K).with_hidden(1, 8), &Device::Cpu).unwrap();
    save_finetuner(&net, dir.path()).unwrap();

    // Same kind, different width: the stored tensors no longer fit.
    let other = Finetuner::new(ModelConfig::low(K).with_hidden(1, 16), &Device::Cpu).unwrap();
    let other_dir = tempfile::tempdir().unwrap();
    save_finetuner(&other, other_dir.path()).unwrap();
    std::fs::copy(
        other_dir.path().join(WEIGHTS_FILE),
        dir.path().join(WEIGHTS_FILE),
    )
    .unwrap();

    let err = Finetuner::load(dir.path(), &Device::Cpu).unwrap_err();
    assert!(matches!(err, FinetunerError::CannotReconstruct { .. }));
}

#[test]
fn test_classifier_directory_loads_as_classifier() {
    let dir = tempfile::tempdir().unwrap();
    let clf = Classifier::new(ModelConfig::classifier().with_hidden(1, 8), &Device::Cpu).unwrap();
    save_classifier(&clf, dir.path()).unwrap();

    match load_model(dir.path(), &Device::Cpu).unwrap() {
        LoadedModel::Classifier(c) => assert_eq!(c.config().model_type, ModelKind::Classifier),
        other => panic!("expected a classifier, got {:?}", other.kind()),
    }
    let err = Finetuner::load(dir.path(), &Device::Cpu).unwrap_err();
    assert!(matches!(err, FinetunerError::WrongModelKind { .. }));
}

#[test]
fn test_refine_baseline_guess_matches_loaded_model() {
    let dir = tempfile::tempdir().unwrap();
    let net = Finetuner::new(ModelConfig::large(K).with_hidden(1, 8), &Device::Cpu).unwrap();
    save_finetuner(&net, dir.path()).unwrap();

    let batch = input(true);
    let refined = refine_baseline_guess(dir.path(), &batch)
        .unwrap()
        .to_vec2::<f32>()
        .unwrap();
    let direct = net.forward(&batch, Mode::Eval).unwrap().to_vec2::<f32>().unwrap();
    assert_eq!(refined, direct);
}
