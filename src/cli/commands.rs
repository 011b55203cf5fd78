// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `sample` and `config`
// and all their configurable flags.
//
// Flags never carry defaults of their own: every default lives in
// the experiment schema, and a flag only becomes an override when
// it is given.
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Overrides;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a character-level model on the source-code corpus
    Train(TrainArgs),

    /// Continue a prompt with a model saved by `train`
    Sample(SampleArgs),

    /// Resolve and print the configuration without training
    Config(OverrideArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChoice {
    Lstm,
    Rhn,
    Transformer,
}

impl ModelChoice {
    /// Name of the `model` factory this choice selects.
    pub fn factory(self) -> &'static str {
        match self {
            ModelChoice::Lstm        => "lstm_model",
            ModelChoice::Rhn         => "rhn_model",
            ModelChoice::Transformer => "transformer_model",
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceChoice {
    Cpu,
    Gpu,
}

/// Flags shared by every command that resolves the configuration.
#[derive(Args, Debug, Default)]
pub struct OverrideArgs {
    /// Number of full passes through the training data
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Model variant
    #[arg(long, value_enum)]
    pub model: Option<ModelChoice>,

    /// Learning rate (optimizer.learning_rate)
    #[arg(long)]
    pub lr: Option<f64>,

    /// Backend device (device.kind)
    #[arg(long, value_enum)]
    pub device: Option<DeviceChoice>,

    /// Any setting by dotted path, e.g. --set optimizer.optimizer=Noam
    /// Values parse as JSON when possible, as text otherwise.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

impl OverrideArgs {
    /// `--set` assignments first, then the dedicated flags, so a flag
    /// wins over a `--set` of the same key.
    pub fn overrides(&self) -> Result<Overrides> {
        let mut o = Overrides::new();
        for assignment in &self.set {
            o.assign(assignment)?;
        }
        if let Some(epochs) = self.epochs {
            o.literal("epochs", epochs);
        }
        if let Some(model) = self.model {
            o.factory("model", model.factory());
        }
        if let Some(lr) = self.lr {
            o.literal("optimizer.learning_rate", lr);
        }
        if let Some(device) = self.device {
            let kind = match device {
                DeviceChoice::Cpu => "cpu",
                DeviceChoice::Gpu => "gpu",
            };
            o.literal("device.kind", kind);
        }
        Ok(o)
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub overrides: OverrideArgs,

    /// Continue from the latest epoch saved in the run directory
    #[arg(long)]
    pub resume: bool,
}

/// All arguments for the `sample` command
#[derive(Args, Debug)]
pub struct SampleArgs {
    /// Run directory written by `train`
    #[arg(long, default_value = "runs/source_code")]
    pub run_dir: PathBuf,

    /// Text to continue (defaults to the prompt used during training)
    #[arg(long)]
    pub prompt: Option<String>,

    /// Number of symbols to generate
    #[arg(long)]
    pub steps: Option<usize>,

    /// Epoch whose weights to use (defaults to the latest)
    #[arg(long)]
    pub epoch: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::overrides::Override;

    #[test]
    fn test_flags_become_overrides() {
        let args = OverrideArgs {
            epochs: Some(3),
            model:  Some(ModelChoice::Transformer),
            lr:     Some(0.5),
            device: Some(DeviceChoice::Gpu),
            set:    vec!["batch_size=4".into(), "epochs=9".into()],
        };
        let o = args.overrides().unwrap();
        assert_eq!(o.len(), 5);
        assert!(matches!(o.get("model"), Some(Override::Factory(n)) if n == "transformer_model"));
        // The dedicated flag wins over --set.
        assert!(matches!(o.get("epochs"), Some(Override::Literal(_))));
        assert!(matches!(o.get("batch_size"), Some(Override::Assign(v)) if v == &serde_json::json!(4)));
    }

    #[test]
    fn test_malformed_set_is_rejected() {
        let args = OverrideArgs { set: vec!["batch_size".into()], ..Default::default() };
        assert!(args.overrides().is_err());
    }
}
