//! signet-train: train a low- or high-burden finetuner from CSV tables.
//!
//! Usage: `signet-train <config.toml|config.yaml>` (or set `SIGNET_CONFIG`).
//! Ctrl-C stops training after the current batch and writes a final checkpoint.

use std::sync::Arc;

use anyhow::Context;
use signet_baseline::Baseline;
use signet_common::{LabeledTable, SignatureMatrix};
use signet_config::{DataConfig, TrainingConfig};
use signet_finetuner::select_device;
use signet_trainer::{DataPartitions, FinetunerTrainer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("signet=info,info")),
        )
        .init();

    let path = signet_config::config_path(std::env::args().skip(1))?;
    let config: TrainingConfig = signet_config::load(&path)
        .with_context(|| format!("loading training config {}", path.display()))?;
    config.validate()?;
    let data = config
        .data
        .clone()
        .context("training config has no [data] section")?;
    info!(
        config = %path.display(),
        model = %config.model_id,
        network = ?config.network_type,
        "signet-train starting"
    );

    let (train, val) = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || load_partitions(&config, &data)).await??
    };

    let mut trainer = FinetunerTrainer::new(config, train, val)?;
    let stop = trainer.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current batch");
            stop.stop();
        }
    });

    let outcome = tokio::task::spawn_blocking(move || trainer.objective()).await??;
    info!(
        best_score = outcome.best_score,
        steps = outcome.steps,
        checkpoint = ?outcome.checkpoint,
        stopped_early = outcome.stopped_early,
        "done"
    );
    Ok(())
}

fn load_partitions(
    config: &TrainingConfig,
    data: &DataConfig,
) -> anyhow::Result<(DataPartitions, DataPartitions)> {
    let signatures = Arc::new(
        SignatureMatrix::from_csv(&data.signatures)
            .with_context(|| format!("reading signatures {}", data.signatures.display()))?,
    );
    signatures.ensure_classes(config.num_classes)?;
    let baseline = Baseline::new(signatures, config.baseline_workers)?;
    let device = select_device(config.device);
    info!(policy = ?config.failure_policy, "baseline failure policy");

    let read = |path: &std::path::Path| {
        LabeledTable::read_csv(path).with_context(|| format!("reading {}", path.display()))
    };
    let mut train = DataPartitions::from_tables(
        &read(&data.train_inputs)?,
        &read(&data.train_labels)?,
        &baseline,
        config.failure_policy,
        &device,
    )?;
    let mut val = DataPartitions::from_tables(
        &read(&data.val_inputs)?,
        &read(&data.val_labels)?,
        &baseline,
        config.failure_policy,
        &device,
    )?;

    if let Some(dir) = &data.refine_with {
        info!(path = %dir.display(), "refining baseline guesses with a saved finetuner");
        train.refine_prev_guess(dir)?;
        val.refine_prev_guess(dir)?;
    }
    Ok((train, val))
}
