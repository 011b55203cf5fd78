// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one row per epoch to metrics.csv in the run directory.
//
// Metrics recorded per epoch:
//   - epoch:          the epoch number (1, 2, 3, ...)
//   - train_loss:     mean cross-entropy over the training windows
//   - valid_loss:     mean cross-entropy over the validation windows
//   - train_accuracy: mean fraction of next symbols predicted exactly
//   - valid_accuracy: same, on the validation split
//
// Example CSV output:
//   epoch,train_loss,valid_loss,train_accuracy,valid_accuracy
//   1,3.124500,3.089200,0.123000,0.118000
//   2,2.890100,2.854300,0.184000,0.172000
//
// The header is written only when the file is new, so a resumed
// run keeps appending to the same log.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::domain::tracking::EpochSummary;

const HEADER: &str = "epoch,train_loss,valid_loss,train_accuracy,valid_accuracy";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:          usize,
    pub train_loss:     f64,
    /// Should track train_loss — divergence indicates overfitting
    pub valid_loss:     f64,
    pub train_accuracy: f64,
    pub valid_accuracy: f64,
}

impl EpochMetrics {
    /// Returns true if this epoch improved over the previous best valid_loss
    pub fn is_improvement(&self, best_valid_loss: f64) -> bool {
        self.valid_loss < best_valid_loss
    }
}

impl From<&EpochSummary> for EpochMetrics {
    fn from(s: &EpochSummary) -> Self {
        Self {
            epoch:          s.epoch,
            train_loss:     s.train.mean_loss(),
            valid_loss:     s.valid.mean_loss(),
            train_accuracy: s.train.mean_accuracy(),
            valid_accuracy: s.valid.mean_accuracy(),
        }
    }
}

/// Appends epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train_loss,
            m.valid_loss,
            m.train_accuracy,
            m.valid_accuracy,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, valid_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.valid_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
