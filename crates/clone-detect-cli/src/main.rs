//! `clone-detect`: train clone classifiers and write submissions.
//!
//! ```bash
//! # Full-data or k-fold training, per [training].do_all
//! clone-detect train --config config.toml
//!
//! # Predict labels for a test file
//! clone-detect infer --config config.toml --checkpoint output/all --input test.csv
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::infer::InferArgs;
use commands::train::TrainArgs;

#[derive(Parser)]
#[command(name = "clone-detect", version, about = "Code clone detection with pretrained code models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fine-tune a classifier on `all/` or on every fold
    Train(TrainArgs),
    /// Predict clone labels with a trained checkpoint
    Infer(InferArgs),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Train(args) => commands::train::handle_train_command(args),
        Commands::Infer(args) => commands::infer::handle_infer_command(args),
    };
    ExitCode::from(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_train_with_fold() {
        let cli = Cli::try_parse_from(["clone-detect", "train", "--config", "c.toml", "--fold", "3"]).unwrap();
        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.fold, Some(3));
                assert_eq!(args.config, std::path::PathBuf::from("c.toml"));
                assert!(args.data_dir.is_none());
            }
            Commands::Infer(_) => panic!("expected train"),
        }
    }

    #[test]
    fn test_infer_requires_checkpoint() {
        assert!(Cli::try_parse_from(["clone-detect", "infer", "-c", "c.toml", "-i", "test.csv"]).is_err());
    }

    #[test]
    fn test_missing_config_exits_with_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let args = TrainArgs {
            config: dir.path().join("absent.toml"),
            data_dir: None,
            output_dir: None,
            fold: None,
        };
        assert_eq!(commands::train::handle_train_command(args), 1);
    }
}
