// ============================================================
// Layer 2 — Experiment Configuration
// ============================================================
// Declares every setting of the source-code experiment, its
// default, and the factories that derive it from other settings.
//
//   text        ← data_path, train_file, valid_file, tokenizer
//   n_tokens    ← text
//   model       ← n_tokens + the hyperparameters of the variant
//   transformer ← d_model, n_layers, dropout      (nested group)
//   optimizer   ← d_model                        (nested group)
//
// Anything can be overridden by dotted path before resolution:
//   model=transformer_model   optimizer.optimizer=Noam   device.kind=gpu

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{ConfigSnapshot, Schema, Value};
use crate::data::corpus::Corpus;
use crate::domain::tokenizer::Tokenizer;
use crate::ml::backend::DeviceSettings;
use crate::ml::model::{HighwayModelConfig, LstmModelConfig, ModelSpec, TransformerModelConfig};
use crate::ml::optimizer::{OptimizerKind, OptimizerSettings};
use crate::ml::sampler::{DEFAULT_PROMPT, DEFAULT_STEPS};

pub fn experiment_schema() -> Schema {
    let mut s = Schema::new();

    s.declare("epochs").default_value(10);
    s.declare("is_save_models").default_value(true);
    s.declare("run_dir").default_value("runs/source_code");

    // ── Corpus ───────────────────────────────────────────────────────────────
    s.declare("data_path").default_value("data");
    s.declare("train_file").default_value("train.py");
    s.declare("valid_file").default_value("valid.py");
    s.declare("tokenizer").option("character", &[], |_| {
        Ok(Value::serialize(&Tokenizer::Character)?)
    });
    s.declare("text").option(
        "source_code",
        &["data_path", "train_file", "valid_file", "tokenizer"],
        |c| {
            let dir: PathBuf = c.get("data_path")?;
            let train: String = c.get("train_file")?;
            let valid: String = c.get("valid_file")?;
            let corpus = Corpus::load(dir, &train, &valid, c.get("tokenizer")?)?;
            Ok(Value::component(corpus))
        },
    );
    s.declare("n_tokens").option("from_text", &["text"], |c| {
        Ok(serde_json::json!(c.component::<Corpus>("text")?.n_tokens()).into())
    });

    // ── Shape of the experiment ──────────────────────────────────────────────
    s.declare("batch_size").default_value(16);
    s.declare("seq_len").default_value(512);
    s.declare("d_model").default_value(512);
    s.declare("n_layers").default_value(2);
    s.declare("dropout").default_value(0.2);
    s.declare("d_lstm").default_value(512);
    s.declare("rhn_depth").default_value(3);

    // ── Model variants ───────────────────────────────────────────────────────
    s.declare("model")
        .default_option(
            "lstm_model",
            &["n_tokens", "d_model", "d_lstm", "n_layers", "dropout"],
            |c| {
                let config = LstmModelConfig::new(
                    c.get("n_tokens")?, c.get("d_model")?, c.get("d_lstm")?, c.get("n_layers")?,
                )
                .with_dropout(c.get("dropout")?);
                Ok(Value::serialize(&ModelSpec::Lstm(config))?)
            },
        )
        .option(
            "rhn_model",
            &["n_tokens", "d_model", "d_lstm", "n_layers", "rhn_depth", "dropout"],
            |c| {
                let config = HighwayModelConfig::new(
                    c.get("n_tokens")?, c.get("d_model")?, c.get("d_lstm")?, c.get("n_layers")?,
                )
                .with_depth(c.get("rhn_depth")?)
                .with_dropout(c.get("dropout")?);
                Ok(Value::serialize(&ModelSpec::Rhn(config))?)
            },
        )
        .option("transformer_model", &["n_tokens", "seq_len", "transformer"], |c| {
            let t: TransformerSettings = c.get("transformer")?;
            let config = TransformerModelConfig::new(
                c.get("n_tokens")?, c.get("seq_len")?, t.d_model, t.n_heads, t.n_layers, t.d_ff,
            )
            .with_dropout(t.dropout);
            Ok(Value::serialize(&ModelSpec::Transformer(config))?)
        });

    // ── Transformer sub-configuration ────────────────────────────────────────
    {
        let t = s.group("transformer");
        t.declare("d_model").option("from_parent", &["d_model"], |c| inherit(c, "d_model"));
        t.declare("n_layers").option("from_parent", &["n_layers"], |c| inherit(c, "n_layers"));
        t.declare("dropout").option("from_parent", &["dropout"], |c| inherit(c, "dropout"));
        t.declare("n_heads").default_value(8);
        t.declare("d_ff").option("four_times_d_model", &["d_model"], |c| {
            let d_model: usize = c.get("d_model")?;
            Ok(serde_json::json!(4 * d_model).into())
        });
    }

    // ── Optimiser ────────────────────────────────────────────────────────────
    {
        let o = s.group("optimizer");
        o.declare("optimizer").default_value("Adam");
        // Noam's rate is a scale on its own warmup curve, not Adam's step size.
        o.declare("learning_rate").option("by_optimizer", &["optimizer"], |c| {
            let lr = match c.get::<OptimizerKind>("optimizer")? {
                OptimizerKind::Adam => 1e-3,
                OptimizerKind::Noam => 1.0,
            };
            Ok(serde_json::json!(lr).into())
        });
        o.declare("beta1").default_value(0.9);
        o.declare("beta2").default_value(0.999);
        o.declare("eps").default_value(1e-8);
        o.declare("weight_decay").default_value(0.0);
        o.declare("d_model").option("from_parent", &["d_model"], |c| inherit(c, "d_model"));
        o.declare("warmup").default_value(4000);
    }

    // ── Device ───────────────────────────────────────────────────────────────
    {
        let d = s.group("device");
        d.declare("kind").default_value("cpu");
        d.declare("index").default_value(0);
    }

    // ── Per-epoch sample ─────────────────────────────────────────────────────
    {
        let p = s.group("sampling");
        p.declare("prompt").default_value(DEFAULT_PROMPT);
        p.declare("steps").default_value(DEFAULT_STEPS);
    }

    s
}

/// Copy a value of the enclosing scope unchanged.
fn inherit(c: &crate::config::Scope<'_>, name: &str) -> Result<Value> {
    Ok(Value::Data(c.get::<serde_json::Value>(name)?))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerSettings {
    pub d_model:  usize,
    pub n_layers: usize,
    pub dropout:  f64,
    pub n_heads:  usize,
    pub d_ff:     usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingSettings {
    pub prompt: String,
    pub steps:  usize,
}

/// Everything the training use case reads from a resolved snapshot.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub epochs:         usize,
    pub is_save_models: bool,
    pub run_dir:        PathBuf,
    pub batch_size:     usize,
    pub seq_len:        usize,
    pub corpus:         Arc<Corpus>,
    pub model:          ModelSpec,
    pub optimizer:      OptimizerSettings,
    pub device:         DeviceSettings,
    pub sampling:       SamplingSettings,
}

impl Experiment {
    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Result<Self> {
        Ok(Self {
            epochs:         snapshot.get("epochs")?,
            is_save_models: snapshot.get("is_save_models")?,
            run_dir:        snapshot.get("run_dir")?,
            batch_size:     snapshot.get("batch_size")?,
            seq_len:        snapshot.get("seq_len")?,
            corpus:         snapshot.component("text")?,
            model:          snapshot.get("model")?,
            optimizer:      snapshot.get("optimizer")?,
            device:         snapshot.get("device")?,
            sampling:       snapshot.get("sampling")?,
        })
    }
}

/// The part of a saved configs.json needed to rebuild a trained model.
#[derive(Debug, Clone, Deserialize)]
pub struct SavedRun {
    pub seq_len:   usize,
    pub tokenizer: Tokenizer,
    pub model:     ModelSpec,
    pub device:    DeviceSettings,
    pub sampling:  SamplingSettings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, ConfigError, Overrides, Source};
    use crate::ml::backend::DeviceKind;

    fn with_corpus() -> Overrides {
        let mut o = Overrides::new();
        let corpus = Corpus::from_texts("def f(x):\n    return x\n", "pass\n", Tokenizer::Character)
            .unwrap();
        o.component("text", corpus);
        o
    }

    #[test]
    fn test_defaults() {
        let snap = resolve(&experiment_schema(), &with_corpus()).unwrap();
        let exp  = Experiment::from_snapshot(&snap).unwrap();
        assert_eq!(exp.batch_size, 16);
        assert_eq!(exp.seq_len, 512);
        assert_eq!(exp.epochs, 10);
        assert_eq!(exp.optimizer.optimizer, OptimizerKind::Adam);
        assert_eq!(exp.optimizer.d_model, 512);
        assert_eq!(exp.device.kind, DeviceKind::Cpu);
        assert_eq!(exp.sampling.prompt, "def train(");
        assert_eq!(exp.sampling.steps, 25);

        match &exp.model {
            ModelSpec::Lstm(c) => {
                assert_eq!(c.n_tokens, exp.corpus.n_tokens());
                assert_eq!(c.d_lstm, 512);
                assert_eq!(c.n_layers, 2);
            }
            other => panic!("expected the lstm default, got {}", other.name()),
        }
        assert_eq!(snap.source("model"), Some(&Source::DefaultFactory("lstm_model".into())));
        assert_eq!(snap.source("text"), Some(&Source::Literal));
    }

    #[test]
    fn test_literal_batch_size_beats_default() {
        let mut o = with_corpus();
        o.literal("batch_size", 4);
        let snap = resolve(&experiment_schema(), &o).unwrap();
        assert_eq!(snap.get::<usize>("batch_size").unwrap(), 4);
        assert_eq!(snap.source("batch_size"), Some(&Source::Literal));
    }

    #[test]
    fn test_transformer_group_follows_parent() {
        let mut o = with_corpus();
        o.assign("model=transformer_model").unwrap();
        o.assign("d_model=64").unwrap();
        o.assign("n_layers=6").unwrap();
        o.assign("transformer.n_heads=4").unwrap();
        o.assign("seq_len=32").unwrap();
        let snap = resolve(&experiment_schema(), &o).unwrap();

        let t: TransformerSettings = snap.get("transformer").unwrap();
        assert_eq!((t.d_model, t.n_layers, t.n_heads, t.d_ff), (64, 6, 4, 256));
        match snap.get::<ModelSpec>("model").unwrap() {
            ModelSpec::Transformer(c) => {
                assert_eq!(c.max_len, 32);
                assert_eq!(c.d_ff, 256);
            }
            other => panic!("expected transformer, got {}", other.name()),
        }
        assert_eq!(snap.get::<usize>("optimizer.d_model").unwrap(), 64);
    }

    #[test]
    fn test_noam_and_device_overrides() {
        let mut o = with_corpus();
        o.assign("optimizer.optimizer=Noam").unwrap();
        o.assign("device.kind=gpu").unwrap();
        let snap = resolve(&experiment_schema(), &o).unwrap();
        let exp  = Experiment::from_snapshot(&snap).unwrap();
        assert_eq!(exp.optimizer.optimizer, OptimizerKind::Noam);
        assert_eq!(exp.device.kind, DeviceKind::Gpu);
    }

    #[test]
    fn test_noam_scale_is_one_and_adam_rate_is_small() {
        let snap = resolve(&experiment_schema(), &with_corpus()).unwrap();
        assert_eq!(snap.get::<f64>("optimizer.learning_rate").unwrap(), 1e-3);

        let mut o = with_corpus();
        o.assign("optimizer.optimizer=Noam").unwrap();
        let snap = resolve(&experiment_schema(), &o).unwrap();
        let exp  = Experiment::from_snapshot(&snap).unwrap();
        assert_eq!(exp.optimizer.learning_rate, 1.0);

        // d_model 512, warmup 4000: peak = 512^-0.5 * 4000^-0.5 ≈ 7.0e-4
        let peak = exp.optimizer.schedule().at(4000);
        assert!(peak > 1e-4 && peak < 1e-3, "peak learning rate {peak}");
    }

    #[test]
    fn test_explicit_learning_rate_beats_noam_scale() {
        let mut o = with_corpus();
        o.assign("optimizer.optimizer=Noam").unwrap();
        o.assign("optimizer.learning_rate=2.0").unwrap();
        let snap = resolve(&experiment_schema(), &o).unwrap();
        assert_eq!(snap.get::<f64>("optimizer.learning_rate").unwrap(), 2.0);
    }

    #[test]
    fn test_typo_is_rejected() {
        let mut o = with_corpus();
        o.assign("optimiser.learning_rate=0.1").unwrap();
        let err = resolve(&experiment_schema(), &o).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(k) if k == "optimiser.learning_rate"));
    }

    #[test]
    fn test_missing_corpus_names_the_setting() {
        let dir = tempfile::tempdir().unwrap();
        let mut o = Overrides::new();
        o.literal("data_path", dir.path().to_string_lossy().to_string());
        let err = resolve(&experiment_schema(), &o).unwrap_err();
        assert!(matches!(&err, ConfigError::Factory { setting, .. } if setting == "text"));
    }

    #[test]
    fn test_saved_run_decodes_from_snapshot_json() {
        let snap  = resolve(&experiment_schema(), &with_corpus()).unwrap();
        let saved: SavedRun = serde_json::from_value(snap.to_json()).unwrap();
        assert_eq!(saved.seq_len, 512);
        assert_eq!(saved.model.name(), "lstm");
        assert_eq!(saved.tokenizer, Tokenizer::Character);
    }
}
