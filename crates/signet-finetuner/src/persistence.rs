//! Saving and loading model directories.
//!
//! A model directory holds `config.json` (the [`ModelConfig`] plus a save
//! timestamp) and `model.safetensors`. A save writes both files into a
//! hidden sibling directory and renames it over the model directory, so
//! readers never observe a partial file or a config from another save.
//! The model directory is owned by the save: anything else in it is
//! replaced.

use std::fs;
use std::path::{Path, PathBuf};

use candle_core::Device;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    Classifier, ExposureNetwork, FineTunerLargeNumMut, FineTunerLowNumMut, Finetuner,
    FinetunerError, ModelConfig, ModelKind, ModelWeights, Result,
};

pub const CONFIG_FILE: &str = "config.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

#[derive(Debug, Serialize, Deserialize)]
struct SavedConfig {
    #[serde(flatten)]
    config: ModelConfig,
    saved_at: DateTime<Utc>,
}

/// A model restored from disk.
#[derive(Debug)]
pub enum LoadedModel {
    Finetuner(Finetuner),
    Classifier(Classifier),
}

impl LoadedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Finetuner(f) => f.kind(),
            Self::Classifier(c) => c.config().model_type,
        }
    }
}

/// Write a finetuner to `dir`, replacing any previous save.
pub fn save_finetuner(model: &Finetuner, dir: impl AsRef<Path>) -> Result<()> {
    save_parts(model.config(), model.weights(), dir.as_ref())
}

/// Write a classifier to `dir`, replacing any previous save.
pub fn save_classifier(model: &Classifier, dir: impl AsRef<Path>) -> Result<()> {
    save_parts(model.config(), model.weights(), dir.as_ref())
}

fn save_parts(config: &ModelConfig, weights: &ModelWeights, dir: &Path) -> Result<()> {
    let name = dir.file_name().ok_or_else(|| {
        FinetunerError::InvalidConfig(format!("{} does not name a directory", dir.display()))
    })?;
    let name = name.to_string_lossy();
    let parent = match dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    // Both files are staged together so a reader never pairs new weights
    // with an old config.
    let staging = sibling(parent, &name, "tmp");
    fs::create_dir(&staging)?;
    if let Err(e) = write_parts(config, weights, &staging) {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }
    swap_into_place(&staging, dir, parent, &name)?;

    info!(
        path = %dir.display(),
        kind = ?config.model_type,
        params = weights.num_parameters(),
        "model saved"
    );
    Ok(())
}

fn write_parts(config: &ModelConfig, weights: &ModelWeights, staging: &Path) -> Result<()> {
    let weights_path = staging.join(WEIGHTS_FILE);
    weights.save(&weights_path)?;
    fs::File::open(&weights_path)?.sync_all()?;

    let saved = SavedConfig {
        config: config.clone(),
        saved_at: Utc::now(),
    };
    let config_path = staging.join(CONFIG_FILE);
    fs::write(&config_path, serde_json::to_vec_pretty(&saved)?)?;
    fs::File::open(&config_path)?.sync_all()?;
    Ok(())
}

/// Replace `dir` with `staging`. A previous save is moved aside first and
/// removed once the new directory is in place.
fn swap_into_place(staging: &Path, dir: &Path, parent: &Path, name: &str) -> Result<()> {
    if !dir.exists() {
        fs::rename(staging, dir)?;
        return Ok(());
    }
    let retired = sibling(parent, name, "old");
    fs::rename(dir, &retired)?;
    if let Err(e) = fs::rename(staging, dir) {
        // Put the previous save back before reporting the failure.
        let _ = fs::rename(&retired, dir);
        let _ = fs::remove_dir_all(staging);
        return Err(e.into());
    }
    if let Err(e) = fs::remove_dir_all(&retired) {
        warn!(path = %retired.display(), error = %e, "could not remove previous save");
    }
    Ok(())
}

fn sibling(parent: &Path, name: &str, suffix: &str) -> PathBuf {
    parent.join(format!(".{name}.{}.{suffix}", uuid::Uuid::new_v4()))
}

/// Read and validate the configuration stored in `dir`.
pub fn read_config(dir: impl AsRef<Path>) -> Result<ModelConfig> {
    let dir = dir.as_ref();
    let path = dir.join(CONFIG_FILE);
    let cannot = |reason: String| FinetunerError::CannotReconstruct {
        path: dir.display().to_string(),
        reason,
    };

    let raw = fs::read(&path).map_err(|e| cannot(format!("reading {CONFIG_FILE}: {e}")))?;
    let saved: SavedConfig =
        serde_json::from_slice(&raw).map_err(|e| cannot(format!("parsing {CONFIG_FILE}: {e}")))?;
    saved
        .config
        .validate()
        .map_err(|e| cannot(e.to_string()))?;
    debug!(path = %dir.display(), saved_at = %saved.saved_at, "read model config");
    Ok(saved.config)
}

/// Rebuild whichever model `dir` holds, on `device`.
pub fn load_model(dir: impl AsRef<Path>, device: &Device) -> Result<LoadedModel> {
    let dir = dir.as_ref();
    let config = read_config(dir)?;
    let weights_path = dir.join(WEIGHTS_FILE);
    let cannot = |reason: String| FinetunerError::CannotReconstruct {
        path: dir.display().to_string(),
        reason,
    };
    if !weights_path.is_file() {
        return Err(cannot(format!("{WEIGHTS_FILE} is missing")));
    }

    let mut model = match config.model_type {
        ModelKind::FineTunerLowNumMut => {
            LoadedModel::Finetuner(Finetuner::Low(FineTunerLowNumMut::new(config, device)?))
        }
        ModelKind::FineTunerLargeNumMut => {
            LoadedModel::Finetuner(Finetuner::Large(FineTunerLargeNumMut::new(config, device)?))
        }
        ModelKind::Classifier => LoadedModel::Classifier(Classifier::new(config, device)?),
    };
    let weights = match &mut model {
        LoadedModel::Finetuner(f) => f.weights_mut(),
        LoadedModel::Classifier(c) => c.weights_mut(),
    };
    weights
        .load(&weights_path)
        .map_err(|e| cannot(format!("loading {WEIGHTS_FILE}: {e}")))?;

    info!(path = %dir.display(), kind = ?model.kind(), ?device, "model loaded");
    Ok(model)
}
