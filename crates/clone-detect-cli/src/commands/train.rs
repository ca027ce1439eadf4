//! `train` command.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use clone_detect_core::{FoldSelection, RandomContext};
use clone_detect_train::Pipeline;
use tracing::info;

use super::{device, load_config, report};

/// Arguments for the train command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Dataset root holding `all/` and `fold_k/` directories
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory for checkpoints, overriding `[training].output_dir`
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Train a single fold (1-based) instead of following `do_all`
    #[arg(long)]
    pub fold: Option<usize>,
}

/// Handle the train command.
pub fn handle_train_command(args: TrainArgs) -> u8 {
    match run(args) {
        Ok(()) => 0,
        Err(e) => report(e),
    }
}

fn run(args: TrainArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(dir) = args.data_dir {
        config.training.data_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.training.output_dir = dir;
    }
    let seed = config.training.seed;

    let pipeline = Pipeline::from_config(config, device()).context("building pipeline")?;
    let mut rng = RandomContext::new(seed);

    let runs = match args.fold {
        Some(0) => anyhow::bail!("--fold is 1-based"),
        Some(k) => {
            let selection = FoldSelection::Fold(k);
            let summary = pipeline
                .run_training(selection, &mut rng)
                .with_context(|| format!("training {}", selection.dir_name()))?;
            vec![(selection, summary)]
        }
        None => pipeline.run_all(&mut rng).context("training")?,
    };

    for (selection, summary) in &runs {
        match summary.final_metrics() {
            Some(metrics) => info!(fold = %selection.dir_name(), steps = summary.steps, %metrics, "Run complete"),
            None => info!(fold = %selection.dir_name(), steps = summary.steps, "Run complete"),
        }
    }
    Ok(())
}
