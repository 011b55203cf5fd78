// ============================================================
// Layer 2 — Sample Use Case
// ============================================================
// Rebuilds a trained model from a run directory and greedily
// continues a prompt:
//
//   1. Read configs.json → model architecture, seq_len, device
//   2. Read vocab.json   → the exact index assignment of training
//   3. Load the weights of the requested (or latest) epoch
//   4. Greedy decoding on the inference backend

use anyhow::{anyhow, ensure, Context, Result};
use burn::{prelude::*, tensor::backend::AutodiffBackend};
use std::path::PathBuf;

use crate::application::configs::SavedRun;
use crate::domain::tokenizer::Tokenizer;
use crate::domain::vocabulary::Vocabulary;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::backend::BackendTask;
use crate::ml::model::{CharModel, ModelSpec};
use crate::ml::sampler::{GreedySampler, Sample};

pub struct SampleUseCase {
    checkpoints: CheckpointManager,
    saved:       SavedRun,
    vocabulary:  Vocabulary,
}

impl SampleUseCase {
    pub fn open(run_dir: impl Into<PathBuf>) -> Result<Self> {
        let checkpoints = CheckpointManager::open(run_dir).context("checkpoint phase failed")?;
        let saved: SavedRun = checkpoints.load_snapshot().context("checkpoint phase failed")?;
        let vocabulary = checkpoints.load_vocabulary().context("checkpoint phase failed")?;
        ensure!(
            saved.model.n_tokens() == vocabulary.len(),
            "checkpoint phase failed: {} model expects {} symbols but vocab.json has {}",
            saved.model.name(), saved.model.n_tokens(), vocabulary.len()
        );
        Ok(Self { checkpoints, saved, vocabulary })
    }

    /// Continue `prompt` (default: the prompt the run sampled with)
    /// for `steps` symbols using the weights of `epoch` (default: latest).
    pub fn execute(&self, prompt: Option<&str>, steps: Option<usize>, epoch: Option<usize>) -> Result<Sample> {
        let epoch = match epoch {
            Some(e) => e,
            None => self
                .checkpoints
                .latest_epoch()
                .context("checkpoint phase failed")?
                .ok_or_else(|| {
                    anyhow!(
                        "No saved model in '{}'. Train with is_save_models=true first.",
                        self.checkpoints.dir().display()
                    )
                })
                .context("checkpoint phase failed")?,
        };

        let task = SampleTask {
            checkpoints: &self.checkpoints,
            model:       &self.saved.model,
            vocabulary:  &self.vocabulary,
            tokenizer:   self.saved.tokenizer,
            seq_len:     self.saved.seq_len,
            prompt:      prompt.unwrap_or(self.saved.sampling.prompt.as_str()),
            steps:       steps.unwrap_or(self.saved.sampling.steps),
            epoch,
        };
        self.saved.device.dispatch(task)
    }
}

struct SampleTask<'a> {
    checkpoints: &'a CheckpointManager,
    model:       &'a ModelSpec,
    vocabulary:  &'a Vocabulary,
    tokenizer:   Tokenizer,
    seq_len:     usize,
    prompt:      &'a str,
    steps:       usize,
    epoch:       usize,
}

impl BackendTask for SampleTask<'_> {
    type Output = Result<Sample>;

    // Inference only: everything runs on the inner (non-autodiff) backend.
    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<Sample> {
        match self.model {
            ModelSpec::Lstm(c)        => self.generate::<B::InnerBackend, _>(c.init::<B::InnerBackend>(&device), &device),
            ModelSpec::Rhn(c)         => self.generate::<B::InnerBackend, _>(c.init::<B::InnerBackend>(&device), &device),
            ModelSpec::Transformer(c) => self.generate::<B::InnerBackend, _>(c.init::<B::InnerBackend>(&device), &device),
        }
    }
}

impl SampleTask<'_> {
    fn generate<B: Backend, M: CharModel<B>>(&self, model: M, device: &B::Device) -> Result<Sample> {
        let model = self
            .checkpoints
            .load_model(model, self.epoch, device)
            .context("checkpoint phase failed")?;
        GreedySampler::new(self.vocabulary, self.tokenizer, self.seq_len, self.steps)
            .sample::<B, _>(&model, self.prompt, device)
            .context("sampling phase failed")
    }
}
