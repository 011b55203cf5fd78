// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one training run in order:
//
//   Step 1: Resolve the configuration   (config)
//   Step 2: Open the run directory      (Layer 6 - infra)
//   Step 3: Save configs.json + vocab   (Layer 6 - infra)
//   Step 4: Pick the backend and model  (Layer 5 - ml)
//   Step 5: Resume from the last epoch  (Layer 6 - infra), if asked
//   Step 6: Run the training loop       (Layer 5 - ml)
//
// Every error leaves this layer wrapped with the phase it came from.
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use burn::{module::AutodiffModule, prelude::*, tensor::backend::AutodiffBackend};

use crate::application::configs::{experiment_schema, Experiment};
use crate::config::{resolve, ConfigError, ConfigSnapshot, Overrides};
use crate::domain::traits::Tracker;
use crate::infra::{checkpoint::CheckpointManager, tracker::ExperimentTracker};
use crate::ml::backend::BackendTask;
use crate::ml::model::{CharModel, ModelSpec};
use crate::ml::trainer::{Trainer, TrainerSettings};

/// Resolve the experiment configuration once.
pub fn resolve_experiment(overrides: &Overrides) -> Result<ConfigSnapshot> {
    resolve(&experiment_schema(), overrides).map_err(|e| {
        let phase = phase_of(&e);
        anyhow::Error::new(e).context(format!("{phase} phase failed"))
    })
}

/// Loading the corpus happens inside resolution, but is reported as its own phase.
fn phase_of(e: &ConfigError) -> &'static str {
    match e {
        ConfigError::Factory { setting, .. } if setting == "text" => "corpus",
        _ => "configuration",
    }
}

pub struct TrainUseCase {
    overrides: Overrides,
    resume:    bool,
}

impl TrainUseCase {
    pub fn new(overrides: Overrides) -> Self {
        Self { overrides, resume: false }
    }

    /// Continue from the latest saved epoch of the run directory.
    pub fn resuming(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Execute the run and return the number of completed epochs.
    pub fn execute(&self) -> Result<usize> {
        // ── Step 1: Resolve ──────────────────────────────────────────────────
        let snapshot   = resolve_experiment(&self.overrides)?;
        let experiment = Experiment::from_snapshot(&snapshot).context("configuration phase failed")?;

        // ── Step 2: Run directory and tracker ────────────────────────────────
        let checkpoints = CheckpointManager::create(&experiment.run_dir)
            .context("checkpoint phase failed")?;
        let mut tracker = ExperimentTracker::new(&experiment.run_dir)
            .context("checkpoint phase failed")?;
        tracker.begin_run(&snapshot)?;

        // ── Step 3: Save what `sample` needs to rebuild the model ────────────
        checkpoints.save_snapshot(&snapshot).context("checkpoint phase failed")?;
        checkpoints
            .save_vocabulary(experiment.corpus.vocabulary())
            .context("checkpoint phase failed")?;

        // ── Step 5 prerequisite: where to resume from ────────────────────────
        let resume_from = if self.resume {
            let latest = checkpoints.latest_epoch().context("checkpoint phase failed")?;
            if latest.is_none() {
                tracing::warn!("Nothing to resume in '{}', starting fresh", checkpoints.dir().display());
            }
            latest
        } else {
            None
        };

        // ── Steps 4–6: Backend dispatch, then the loop ───────────────────────
        let task = TrainTask {
            experiment:  &experiment,
            tracker:     &mut tracker,
            checkpoints: experiment.is_save_models.then_some(&checkpoints),
            resume_from,
            loader:      &checkpoints,
        };
        let completed = experiment.device.dispatch(task)?;

        tracker.end_run()?;
        Ok(completed)
    }
}

struct TrainTask<'a> {
    experiment:  &'a Experiment,
    tracker:     &'a mut dyn Tracker,
    /// Where to save each epoch; `None` when saving is disabled.
    checkpoints: Option<&'a CheckpointManager>,
    resume_from: Option<usize>,
    loader:      &'a CheckpointManager,
}

impl BackendTask for TrainTask<'_> {
    type Output = Result<usize>;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<usize> {
        match &self.experiment.model {
            ModelSpec::Lstm(c)        => self.train::<B, _>(c.init::<B>(&device), device),
            ModelSpec::Rhn(c)         => self.train::<B, _>(c.init::<B>(&device), device),
            ModelSpec::Transformer(c) => self.train::<B, _>(c.init::<B>(&device), device),
        }
    }
}

impl TrainTask<'_> {
    fn train<B, M>(self, model: M, device: B::Device) -> Result<usize>
    where
        B: AutodiffBackend,
        M: CharModel<B> + AutodiffModule<B>,
        M::InnerModule: CharModel<B::InnerBackend>,
    {
        let exp = self.experiment;
        tracing::info!(
            "Model ready: {} over {} symbols with {} parameters",
            exp.model.name(), exp.model.n_tokens(), model.num_params()
        );

        let (model, start) = match self.resume_from {
            Some(epoch) => {
                let model = self
                    .loader
                    .load_model(model, epoch, &device)
                    .context("checkpoint phase failed")?;
                (model, epoch)
            }
            None => (model, 0),
        };

        let settings = TrainerSettings {
            epochs:       exp.epochs,
            batch_size:   exp.batch_size,
            seq_len:      exp.seq_len,
            prompt:       exp.sampling.prompt.clone(),
            sample_steps: exp.sampling.steps,
        };
        // Optimiser moments start from zero on resume; only weights are restored.
        let optim = exp.optimizer.adam().init::<B, M>();

        let mut trainer = Trainer::<B, _>::new(
            settings,
            &exp.corpus,
            optim,
            exp.optimizer.schedule(),
            self.tracker,
            device,
        )
        .starting_at(start);
        if let Some(checkpoints) = self.checkpoints {
            trainer = trainer.with_checkpoints(checkpoints);
        }

        trainer.run(model).context("training phase failed")?;
        Ok(trainer.epoch())
    }
}
