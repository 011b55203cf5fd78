// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epochs of train and validation passes, with a greedy sample
// before each one:
//
//   Idle → Sampling → TrainPass → ValidPass → Idle → … → Done
//
// TrainPass: forward, loss, backward, one Adam step per window.
//   The recurrent state is carried from window to window, detached
//   so backward stops at the window boundary, and reset at the
//   start of every epoch.
// ValidPass: same traversal on model.valid() (no autodiff, no
//   dropout), no optimiser step.
// Sampling: runs on model.valid() as well; a failure is logged and
//   the sample skipped, everything else aborts the run.
//
// Key Burn insight:
//   - Training uses B (Autodiff<…>) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - Validation tensors must also live on B::InnerBackend
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{ensure, Context, Result};
use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{batcher::SequentialBatches, corpus::Corpus};
use crate::domain::tracking::{EpochSummary, Namespace, PassStats, StepMetrics};
use crate::domain::traits::Tracker;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::loss::{accuracy, cross_entropy};
use crate::ml::model::{CarriedState, CharModel};
use crate::ml::optimizer::LearningRateSchedule;
use crate::ml::sampler::GreedySampler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sampling,
    TrainPass,
    ValidPass,
    Done,
}

#[derive(Debug, Clone)]
pub struct TrainerSettings {
    pub epochs:       usize,
    pub batch_size:   usize,
    pub seq_len:      usize,
    pub prompt:       String,
    pub sample_steps: usize,
}

pub struct Trainer<'a, B: AutodiffBackend, O> {
    settings:    TrainerSettings,
    corpus:      &'a Corpus,
    optim:       O,
    schedule:    LearningRateSchedule,
    tracker:     &'a mut dyn Tracker,
    checkpoints: Option<&'a CheckpointManager>,
    device:      B::Device,
    phase:       Phase,
    epoch:       usize,
    step:        u64,
}

impl<'a, B: AutodiffBackend, O> Trainer<'a, B, O> {
    pub fn new(
        settings: TrainerSettings,
        corpus:   &'a Corpus,
        optim:    O,
        schedule: LearningRateSchedule,
        tracker:  &'a mut dyn Tracker,
        device:   B::Device,
    ) -> Self {
        Self {
            settings, corpus, optim, schedule, tracker,
            checkpoints: None,
            device,
            phase: Phase::Idle,
            epoch: 0,
            step:  0,
        }
    }

    /// Save the model after every epoch.
    pub fn with_checkpoints(mut self, checkpoints: &'a CheckpointManager) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    /// Continue after `epoch` completed epochs, e.g. when resuming.
    pub fn starting_at(mut self, epoch: usize) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of completed epochs.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn global_step(&self) -> u64 {
        self.step
    }

    /// Run the remaining epochs and return the trained model.
    pub fn run<M>(&mut self, mut model: M) -> Result<M>
    where
        M: CharModel<B> + AutodiffModule<B>,
        M::InnerModule: CharModel<B::InnerBackend>,
        O: Optimizer<M, B>,
    {
        let TrainerSettings { batch_size, seq_len, .. } = self.settings;
        let train = SequentialBatches::new(self.corpus.train(), batch_size, seq_len)?;
        let valid = SequentialBatches::new(self.corpus.valid(), batch_size, seq_len)?;
        ensure!(
            !train.is_empty(),
            "training split is too short for batch_size={batch_size} seq_len={seq_len}"
        );
        // Completed epochs each ran every training window, so the
        // schedule continues where an uninterrupted run would be.
        self.step = self.step.max(self.epoch as u64 * train.len() as u64);
        if valid.is_empty() {
            tracing::warn!("Validation split is shorter than one window; valid metrics will be NaN");
        }
        tracing::info!(
            "{} train / {} valid windows per epoch, starting after epoch {} (step {})",
            train.len(), valid.len(), self.epoch, self.step
        );

        while self.epoch < self.settings.epochs {
            let epoch = self.epoch + 1;

            self.phase = Phase::Sampling;
            self.sample(&model, epoch)?;

            self.phase = Phase::TrainPass;
            let (trained, train_stats) = self
                .train_pass(model, &train)
                .with_context(|| format!("training pass of epoch {epoch} failed"))?;
            model = trained;

            self.phase = Phase::ValidPass;
            let valid_stats = self
                .valid_pass(&model, &valid)
                .with_context(|| format!("validation pass of epoch {epoch} failed"))?;

            self.tracker.end_epoch(&EpochSummary { epoch, train: train_stats, valid: valid_stats })?;
            if let Some(checkpoints) = self.checkpoints {
                checkpoints.save_model(&model, epoch)?;
                tracing::info!("Checkpoint saved for epoch {}", epoch);
            }

            self.epoch = epoch;
            self.phase = Phase::Idle;
        }

        self.phase = Phase::Done;
        Ok(model)
    }

    fn sample<M>(&mut self, model: &M, epoch: usize) -> Result<()>
    where
        M: AutodiffModule<B>,
        M::InnerModule: CharModel<B::InnerBackend>,
    {
        let sampler = GreedySampler::new(
            self.corpus.vocabulary(),
            self.corpus.tokenizer(),
            self.settings.seq_len,
            self.settings.sample_steps,
        );
        let inference = model.valid();
        match sampler.sample::<B::InnerBackend, _>(&inference, &self.settings.prompt, &self.device) {
            Ok(sample) => self.tracker.sample(epoch, &sample.styled()),
            Err(e) => {
                tracing::warn!("Sampling skipped for epoch {}: {}", epoch, e);
                Ok(())
            }
        }
    }

    fn train_pass<M>(&mut self, mut model: M, windows: &SequentialBatches) -> Result<(M, PassStats)>
    where
        M: CharModel<B> + AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let mut stats = PassStats::default();
        let mut state: Option<M::State> = None;

        for window in windows.windows() {
            let (input, target) = window.to_tensors::<B>(&self.device);
            let weights = window.weights::<B>(&self.device);
            let output  = model.forward(input, state.take());

            let loss = cross_entropy(output.scores.clone(), target.clone(), weights.clone());
            let loss_value: f64 = loss.clone().into_scalar().elem::<f64>();
            ensure!(loss_value.is_finite(), "loss became {loss_value} at step {}", self.step + 1);
            let acc = accuracy(output.scores, target, weights);

            // Backward pass + Adam update
            self.step += 1;
            let lr    = self.schedule.at(self.step);
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model     = self.optim.step(lr, model, grads);
            state     = Some(output.state.detach());

            let metrics = StepMetrics { loss: loss_value, accuracy: acc, learning_rate: Some(lr) };
            self.tracker.step(Namespace::Train, self.step, &metrics)?;
            stats.record(&metrics);
        }

        Ok((model, stats))
    }

    fn valid_pass<M>(&mut self, model: &M, windows: &SequentialBatches) -> Result<PassStats>
    where
        M: AutodiffModule<B>,
        M::InnerModule: CharModel<B::InnerBackend>,
    {
        // dropout disabled for deterministic evaluation
        let model     = model.valid();
        let mut stats = PassStats::default();
        let mut state = None;

        for window in windows.windows() {
            let (input, target) = window.to_tensors::<B::InnerBackend>(&self.device);
            let weights = window.weights::<B::InnerBackend>(&self.device);
            let output  = model.forward(input, state.take());

            let loss: f64 = cross_entropy(output.scores.clone(), target.clone(), weights.clone())
                .into_scalar().elem::<f64>();
            ensure!(loss.is_finite(), "validation loss became {loss}");

            let metrics = StepMetrics { loss, accuracy: accuracy(output.scores, target, weights), learning_rate: None };
            self.tracker.step(Namespace::Valid, self.step, &metrics)?;
            stats.record(&metrics);
            state = Some(output.state);
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSnapshot;
    use crate::domain::tokenizer::Tokenizer;
    use crate::domain::tracking::StyledText;
    use crate::ml::model::{LstmModel, LstmModelConfig};
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::AdamConfig;

    type B = Autodiff<NdArray>;

    #[derive(Default)]
    struct MemoryTracker {
        train_steps: usize,
        valid_steps: usize,
        first_step:  Option<u64>,
        samples:     Vec<(usize, StyledText)>,
        epochs:      Vec<EpochSummary>,
    }

    impl Tracker for MemoryTracker {
        fn begin_run(&mut self, _snapshot: &ConfigSnapshot) -> Result<()> {
            Ok(())
        }

        fn step(&mut self, namespace: Namespace, step: u64, _m: &StepMetrics) -> Result<()> {
            self.first_step.get_or_insert(step);
            match namespace {
                Namespace::Train => self.train_steps += 1,
                Namespace::Valid => self.valid_steps += 1,
            }
            Ok(())
        }

        fn sample(&mut self, epoch: usize, text: &StyledText) -> Result<()> {
            self.samples.push((epoch, text.clone()));
            Ok(())
        }

        fn end_epoch(&mut self, summary: &EpochSummary) -> Result<()> {
            self.epochs.push(*summary);
            Ok(())
        }

        fn end_run(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn corpus() -> Corpus {
        let text = "aabb".repeat(25);
        Corpus::from_texts(&text, &text[..40], Tokenizer::Character).unwrap()
    }

    fn settings(epochs: usize, prompt: &str) -> TrainerSettings {
        TrainerSettings { epochs, batch_size: 2, seq_len: 5, prompt: prompt.to_string(), sample_steps: 4 }
    }

    #[test]
    fn test_runs_exactly_the_configured_epochs() {
        let device  = Default::default();
        let corpus  = corpus();
        let model   = LstmModelConfig::new(corpus.n_tokens(), 4, 8, 1).init::<B>(&device);
        let mut tracker = MemoryTracker::default();

        let mut trainer = Trainer::<B, _>::new(
            settings(3, "ab"),
            &corpus,
            AdamConfig::new().init::<B, LstmModel<B>>(),
            LearningRateSchedule::Constant(1e-2),
            &mut tracker,
            device,
        );
        trainer.run(model).unwrap();
        assert_eq!(trainer.phase(), Phase::Done);
        assert_eq!(trainer.epoch(), 3);
        // 100 symbols, batch 2, seq_len 5 → 10 windows per epoch
        assert_eq!(trainer.global_step(), 30);
        drop(trainer);

        assert_eq!(tracker.epochs.len(), 3);
        assert_eq!(tracker.epochs.iter().map(|e| e.epoch).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(tracker.train_steps, 30);
        // 40 symbols → 4 valid windows per epoch
        assert_eq!(tracker.valid_steps, 12);
        assert_eq!(tracker.samples.len(), 3);
        assert!(tracker.epochs.iter().all(|e| e.train.mean_loss().is_finite()));
    }

    #[test]
    fn test_sampling_failure_is_skipped() {
        let device  = Default::default();
        let corpus  = corpus();
        let model   = LstmModelConfig::new(corpus.n_tokens(), 4, 4, 1).init::<B>(&device);
        let mut tracker = MemoryTracker::default();

        // 'def train(' is not in an "aabb" vocabulary.
        let mut trainer = Trainer::<B, _>::new(
            settings(2, "def train("),
            &corpus,
            AdamConfig::new().init::<B, LstmModel<B>>(),
            LearningRateSchedule::Constant(1e-2),
            &mut tracker,
            device,
        );
        trainer.run(model).unwrap();
        assert_eq!(trainer.phase(), Phase::Done);
        drop(trainer);

        assert!(tracker.samples.is_empty());
        assert_eq!(tracker.epochs.len(), 2);
    }

    #[test]
    fn test_resume_runs_only_remaining_epochs() {
        let device  = Default::default();
        let corpus  = corpus();
        let model   = LstmModelConfig::new(corpus.n_tokens(), 4, 4, 1).init::<B>(&device);
        let mut tracker = MemoryTracker::default();

        let mut trainer = Trainer::<B, _>::new(
            settings(3, "ab"),
            &corpus,
            AdamConfig::new().init::<B, LstmModel<B>>(),
            LearningRateSchedule::Constant(1e-2),
            &mut tracker,
            device,
        )
        .starting_at(2);
        trainer.run(model).unwrap();
        // 10 windows per epoch: step numbering continues after epoch 2
        assert_eq!(trainer.global_step(), 30);
        drop(trainer);

        assert_eq!(tracker.epochs.iter().map(|e| e.epoch).collect::<Vec<_>>(), vec![3]);
        assert_eq!(tracker.first_step, Some(21));
        assert_eq!(tracker.train_steps, 10);
    }

    #[test]
    fn test_too_short_corpus_is_an_error() {
        let device = Default::default();
        let corpus = Corpus::from_texts("ab", "ab", Tokenizer::Character).unwrap();
        let model  = LstmModelConfig::new(corpus.n_tokens(), 4, 4, 1).init::<B>(&device);
        let mut tracker = MemoryTracker::default();

        let mut trainer = Trainer::<B, _>::new(
            settings(1, "a"),
            &corpus,
            AdamConfig::new().init::<B, LstmModel<B>>(),
            LearningRateSchedule::Constant(1e-2),
            &mut tracker,
            device,
        );
        assert!(trainer.run(model).is_err());
    }
}
