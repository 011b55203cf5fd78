// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Persists one experiment run so it can be resumed or sampled.
//
// What gets saved:
//   1. configs.json          — the resolved configuration snapshot,
//                              written once before training
//   2. vocab.json            — the symbol list, index order preserved
//   3. model_epoch_N.mpk.gz  — model weights after epoch N
//   4. latest_epoch.json     — the last epoch whose weights exist
//
// The snapshot is what lets `sample` rebuild the exact model
// architecture before loading weights into it.
//
// Burn's CompactRecorder:
//   - Serialises model parameters to MessagePack format
//   - Compresses with gzip for smaller file size
//   - Type-safe: loading fails if architecture doesn't match
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{prelude::*, record::CompactRecorder};
use serde::de::DeserializeOwned;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::config::ConfigSnapshot;
use crate::domain::vocabulary::Vocabulary;

const CONFIGS_FILE: &str = "configs.json";
const VOCAB_FILE: &str = "vocab.json";
const LATEST_FILE: &str = "latest_epoch.json";

/// Manages the files of one run directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the run directory if it doesn't already exist.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create run directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing run directory for reading.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        anyhow::ensure!(dir.is_dir(), "Run directory '{}' does not exist", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save model weights for a given epoch and move the latest-epoch pointer.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<()> {
        // Without extension — the recorder adds it
        let path = self.model_path(epoch);
        model
            .clone()
            .save_file(path.clone(), &CompactRecorder::new())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join(LATEST_FILE);
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {LATEST_FILE}"))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the weights of `epoch` into `model`, which must have the
    /// architecture the weights were saved from.
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, epoch: usize, device: &B::Device) -> Result<M> {
        let path = self.model_path(epoch);
        tracing::info!("Loading checkpoint from epoch {}", epoch);
        model
            .load_file(path.clone(), &CompactRecorder::new(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))
    }

    /// The last epoch whose weights were saved, if any.
    pub fn latest_epoch(&self) -> Result<Option<usize>> {
        let path = self.dir.join(LATEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        let epoch = serde_json::from_str::<usize>(s.trim())
            .with_context(|| format!("Malformed '{}'", path.display()))?;
        Ok(Some(epoch))
    }

    pub fn save_snapshot(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        self.write_json(CONFIGS_FILE, &snapshot.to_json())
    }

    /// Decode the saved snapshot, or a part of it, into `T`.
    pub fn load_snapshot<T: DeserializeOwned>(&self) -> Result<T> {
        self.read_json(CONFIGS_FILE)
    }

    pub fn save_vocabulary(&self, vocabulary: &Vocabulary) -> Result<()> {
        self.write_json(VOCAB_FILE, vocabulary)
    }

    pub fn load_vocabulary(&self) -> Result<Vocabulary> {
        self.read_json(VOCAB_FILE)
    }

    fn model_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("model_epoch_{epoch}"))
    }

    fn write_json<T: serde::Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        // serde_json::to_string_pretty adds indentation for readability
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Saved '{}'", path.display());
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read '{}'. Make sure you have run 'train' with this run directory.",
                path.display()
            )
        })?;
        serde_json::from_str(&json).with_context(|| format!("Malformed '{}'", path.display()))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{CharModel, LstmModel, LstmModelConfig};
    use burn::backend::NdArray;

    type B = NdArray;

    #[test]
    fn test_latest_epoch_absent_then_present() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::create(dir.path().join("run")).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), None);

        let device = Default::default();
        let model: LstmModel<B> = LstmModelConfig::new(4, 3, 3, 1).init(&device);
        ckpt.save_model(&model, 1).unwrap();
        ckpt.save_model(&model, 2).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), Some(2));
    }

    #[test]
    fn test_weights_round_trip() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::create(dir.path()).unwrap();
        let device = Default::default();
        let config = LstmModelConfig::new(5, 4, 4, 1);
        let saved: LstmModel<B> = config.init(&device);
        ckpt.save_model(&saved, 1).unwrap();

        let loaded = ckpt.load_model(config.init::<B>(&device), 1, &device).unwrap();
        let input  = Tensor::<B, 1, Int>::from_ints([0, 1, 2, 3], &device).reshape([4, 1]);
        let a: Vec<f32> = saved.forward(input.clone(), None).scores.into_data().to_vec().unwrap();
        let b: Vec<f32> = loaded.forward(input, None).scores.into_data().to_vec().unwrap();
        // CompactRecorder stores half precision.
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-2);
        }
    }

    #[test]
    fn test_vocabulary_round_trip() {
        let dir   = tempfile::tempdir().unwrap();
        let ckpt  = CheckpointManager::create(dir.path()).unwrap();
        let vocab = Vocabulary::build("hello".chars());
        ckpt.save_vocabulary(&vocab).unwrap();
        let back = ckpt.load_vocabulary().unwrap();
        assert_eq!(Vec::<char>::from(back), Vec::<char>::from(vocab));
    }

    #[test]
    fn test_open_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CheckpointManager::open(dir.path().join("nope")).is_err());
    }
}
