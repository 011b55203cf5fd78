// ============================================================
// Layer 5 — Optimiser Settings and Learning-Rate Schedule
// ============================================================
// Adam does the update (burn's AdamConfig). What varies is the
// learning rate fed into each `optim.step(lr, ...)`:
//
//   Adam → constant:  lr
//   Noam → warmup then inverse square-root decay (Vaswani et al.)
//
//     lr · d_model^-0.5 · min(step^-0.5, step · warmup^-1.5)
//
// `step` is the 1-based global optimiser step.
//
// Reference: Kingma & Ba (2015) Adam
//            Vaswani et al. (2017) §5.3

use burn::optim::{decay::WeightDecayConfig, AdamConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerKind {
    Adam,
    Noam,
}

/// The resolved `optimizer` group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub optimizer:     OptimizerKind,
    pub learning_rate: f64,
    pub beta1:         f32,
    pub beta2:         f32,
    pub eps:           f32,
    pub weight_decay:  f32,
    pub d_model:       usize,
    pub warmup:        usize,
}

impl OptimizerSettings {
    pub fn adam(&self) -> AdamConfig {
        let mut config = AdamConfig::new()
            .with_beta_1(self.beta1)
            .with_beta_2(self.beta2)
            .with_epsilon(self.eps);
        if self.weight_decay > 0.0 {
            config = config.with_weight_decay(Some(WeightDecayConfig::new(self.weight_decay)));
        }
        config
    }

    pub fn schedule(&self) -> LearningRateSchedule {
        match self.optimizer {
            OptimizerKind::Adam => LearningRateSchedule::Constant(self.learning_rate),
            OptimizerKind::Noam => LearningRateSchedule::Noam {
                learning_rate: self.learning_rate,
                d_model:       self.d_model,
                warmup:        self.warmup.max(1),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LearningRateSchedule {
    Constant(f64),
    Noam { learning_rate: f64, d_model: usize, warmup: usize },
}

impl LearningRateSchedule {
    /// Learning rate for the 1-based optimiser step `step`.
    pub fn at(&self, step: u64) -> f64 {
        match *self {
            LearningRateSchedule::Constant(lr) => lr,
            LearningRateSchedule::Noam { learning_rate, d_model, warmup } => {
                let step   = step.max(1) as f64;
                let warmup = warmup as f64;
                let factor = (step.powf(-0.5)).min(step * warmup.powf(-1.5));
                learning_rate * (d_model as f64).powf(-0.5) * factor
            }
        }
    }
}
