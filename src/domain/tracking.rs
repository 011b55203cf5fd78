// ============================================================
// Layer 3 — Tracking Types
// ============================================================
// Plain data the training loop hands to its observability
// collaborator. Nothing here formats or persists anything.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which pass a metric belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Train,
    Valid,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Train => "train",
            Namespace::Valid => "valid",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display hint for one fragment of sampled text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// The prompt the model was given.
    Subtle,
    /// A symbol the model produced.
    Value,
}

/// Ordered (text, style) fragments.
pub type StyledText = Vec<(String, Style)>;

/// Scalars reported for one training or validation window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    pub loss:          f64,
    pub accuracy:      f64,
    pub learning_rate: Option<f64>,
}

/// Running totals over one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PassStats {
    pub steps:        usize,
    pub loss_sum:     f64,
    pub accuracy_sum: f64,
}

impl PassStats {
    pub fn record(&mut self, m: &StepMetrics) {
        self.steps        += 1;
        self.loss_sum     += m.loss;
        self.accuracy_sum += m.accuracy;
    }

    /// NaN when the pass had no windows.
    pub fn mean_loss(&self) -> f64 {
        if self.steps > 0 { self.loss_sum / self.steps as f64 } else { f64::NAN }
    }

    pub fn mean_accuracy(&self) -> f64 {
        if self.steps > 0 { self.accuracy_sum / self.steps as f64 } else { f64::NAN }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    /// 1-based index of the epoch that just finished.
    pub epoch: usize,
    pub train: PassStats,
    pub valid: PassStats,
}
