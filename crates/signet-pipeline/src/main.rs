//! signet-refine: decompose mutation counts into refined signature exposures.
//!
//! Usage: `signet-refine <config.toml|config.yaml>` (or set `SIGNET_CONFIG`).

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use signet_baseline::Baseline;
use signet_common::spectrum::normalize_counts;
use signet_common::{LabeledTable, SignatureMatrix};
use signet_config::InferenceConfig;
use signet_finetuner::{select_device, FinetunerInput};
use signet_pipeline::{ensemble_from_config, fold_into_unknown, ExposureModel};
use tracing::info;
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
    let config: InferenceConfig = signet_config::load(&path)
        .with_context(|| format!("loading inference config {}", path.display()))?;
    config.validate()?;
    info!(config = %path.display(), members = config.members.len(), "signet-refine starting");

    // Decomposition and the forward passes are CPU/GPU bound.
    let written = tokio::task::spawn_blocking(move || refine(&config)).await??;
    info!(rows = written, "done");
    Ok(())
}

fn refine(config: &InferenceConfig) -> anyhow::Result<usize> {
    let start = Instant::now();
    let signatures = Arc::new(
        SignatureMatrix::from_csv(&config.signatures)
            .with_context(|| format!("reading signatures {}", config.signatures.display()))?,
    );
    let table = LabeledTable::read_csv(&config.inputs)
        .with_context(|| format!("reading counts {}", config.inputs.display()))?;
    info!(
        samples = table.nrows(),
        signatures = signatures.num_signatures(),
        "inputs loaded"
    );

    let device = select_device(config.device);
    let batch = normalize_counts(&table.to_tensor(&device)?)?;
    let baseline = Arc::new(Baseline::new(signatures.clone(), config.baseline_workers)?);
    let ensemble = ensemble_from_config(config, baseline, &device)?;

    let input = FinetunerInput::new(batch.mutation_dist, batch.num_mut)?;
    let mut weights = ensemble.predict(&input)?;

    let mut columns = signatures.names().to_vec();
    if let Some(threshold) = config.unknown_threshold {
        weights = fold_into_unknown(&weights, threshold)?;
        columns.push("Unknown".to_string());
    }

    let out = LabeledTable::from_tensor(&weights, Some(table.row_labels.clone()), columns)?;
    out.write_csv(&config.output, "sample")
        .with_context(|| format!("writing {}", config.output.display()))?;
    info!(
        output = %config.output.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "exposures written"
    );
    Ok(out.nrows())
}
