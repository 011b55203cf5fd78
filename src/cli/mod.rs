// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `train`  — resolves the configuration and trains
//   2. `sample` — continues a prompt with a saved model
//   3. `config` — prints the resolved configuration
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, OverrideArgs, SampleArgs, TrainArgs};

use crate::infra::tracker::{render, stdout_supports_color};

#[derive(Parser, Debug)]
#[command(
    name = "char-lm",
    version = "0.1.0",
    about = "Train character-level language models (LSTM, RHN, Transformer) on a source-code corpus."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)  => run_train(args),
            Commands::Sample(args) => run_sample(args),
            Commands::Config(args) => run_config(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let use_case = TrainUseCase::new(args.overrides.overrides()?).resuming(args.resume);
    let epochs = use_case.execute()?;

    println!("Training complete after {epochs} epochs.");
    Ok(())
}

fn run_sample(args: SampleArgs) -> Result<()> {
    use crate::application::sample_use_case::SampleUseCase;

    let use_case = SampleUseCase::open(&args.run_dir)?;
    let sample = use_case.execute(args.prompt.as_deref(), args.steps, args.epoch)?;
    println!("{}", render(&sample.styled(), stdout_supports_color()));
    Ok(())
}

fn run_config(args: OverrideArgs) -> Result<()> {
    use crate::application::train_use_case::resolve_experiment;

    let snapshot = resolve_experiment(&args.overrides()?)?;
    let width = snapshot.entries().map(|(path, _)| path.len()).max().unwrap_or(0);
    for (path, resolved) in snapshot.entries() {
        println!("{path:<width$} = {}  ({})", resolved.value.to_json(), resolved.source);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train_flags() {
        let cli = Cli::try_parse_from([
            "char-lm", "train", "--epochs", "3", "--model", "rhn", "--device", "cpu",
            "--set", "seq_len=64", "--set", "optimizer.optimizer=Noam", "--resume",
        ])
        .unwrap();
        match cli.command {
            Commands::Train(args) => {
                assert!(args.resume);
                assert_eq!(args.overrides.epochs, Some(3));
                assert_eq!(args.overrides.model, Some(commands::ModelChoice::Rhn));
                assert_eq!(args.overrides.set.len(), 2);
            }
            other => panic!("expected train, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_sample_defaults() {
        let cli = Cli::try_parse_from(["char-lm", "sample", "--prompt", "import "]).unwrap();
        match cli.command {
            Commands::Sample(args) => {
                assert_eq!(args.run_dir, std::path::PathBuf::from("runs/source_code"));
                assert_eq!(args.prompt.as_deref(), Some("import "));
                assert_eq!(args.epoch, None);
            }
            other => panic!("expected sample, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        assert!(Cli::try_parse_from(["char-lm", "train", "--model", "gru"]).is_err());
    }
}
