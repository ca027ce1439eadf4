//! `infer` command.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use clone_detect_core::dataset::{load_records, write_submission};
use clone_detect_train::Pipeline;
use tracing::info;

use super::{device, load_config, report};

/// Arguments for the infer command.
#[derive(Args, Debug)]
pub struct InferArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Run directory containing `model.safetensors`
    #[arg(long)]
    pub checkpoint: PathBuf,

    /// Records to classify (`.csv` or `.jsonl`)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Submission path. Defaults to `[inference].output_file` under the
    /// training output directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Handle the infer command.
pub fn handle_infer_command(args: InferArgs) -> u8 {
    match run(args) {
        Ok(()) => 0,
        Err(e) => report(e),
    }
}

fn run(args: InferArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let output = args
        .output
        .unwrap_or_else(|| config.training.output_dir.join(&config.inference.output_file));

    let pipeline = Pipeline::from_config(config, device()).context("building pipeline")?;
    let records = load_records(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let predictions = pipeline
        .infer(&args.checkpoint, &records)
        .with_context(|| format!("predicting with {}", args.checkpoint.display()))?;
    write_submission(&output, &predictions)
        .with_context(|| format!("writing {}", output.display()))?;

    let positives = predictions.iter().filter(|p| p.similar == 1).count();
    info!(records = predictions.len(), positives, output = %output.display(), "Inference complete");
    Ok(())
}
