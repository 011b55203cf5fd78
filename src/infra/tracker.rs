// ============================================================
// Layer 6 — Experiment Tracker
// ============================================================
// The default observability collaborator of the training loop:
//
//   begin_run  → logs every resolved setting with its provenance
//   step       → debug-level per-window scalars
//   sample     → prints the styled greedy sample to the terminal
//   end_epoch  → prints the epoch summary, appends it to metrics.csv
//   end_run    → logs completion
//
// Styles map to ANSI attributes: the prompt is dimmed, generated
// symbols are bold. Plain text when stdout is not a terminal or
// NO_COLOR is set.

use anyhow::Result;
use std::path::Path;
use std::time::Instant;

use crate::config::ConfigSnapshot;
use crate::domain::tracking::{EpochSummary, Namespace, StepMetrics, Style, StyledText};
use crate::domain::traits::Tracker;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};

const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub struct ExperimentTracker {
    metrics:         MetricsLogger,
    epochs:          Option<usize>,
    best_valid_loss: f64,
    started:         Option<Instant>,
    color:           bool,
}

impl ExperimentTracker {
    pub fn new(run_dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            metrics:         MetricsLogger::new(run_dir)?,
            epochs:          None,
            best_valid_loss: f64::INFINITY,
            started:         None,
            color:           stdout_supports_color(),
        })
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }
}

/// Whether ANSI styling should be written to stdout.
pub fn stdout_supports_color() -> bool {
    console::Term::stdout().is_term() && std::env::var_os("NO_COLOR").is_none()
}

/// Join styled fragments into one line.
pub fn render(text: &StyledText, color: bool) -> String {
    text.iter()
        .map(|(fragment, style)| {
            // Newlines in source code would break the one-line sample.
            let fragment = fragment.replace('\n', "\\n");
            if !color {
                return fragment;
            }
            let code = match style {
                Style::Subtle => DIM,
                Style::Value  => BOLD,
            };
            format!("{code}{fragment}{RESET}")
        })
        .collect()
}

impl Tracker for ExperimentTracker {
    fn begin_run(&mut self, snapshot: &ConfigSnapshot) -> Result<()> {
        self.epochs  = snapshot.get::<usize>("epochs").ok();
        self.started = Some(Instant::now());
        for (path, resolved) in snapshot.entries() {
            tracing::info!("{path} = {} ({})", resolved.value.to_json(), resolved.source);
        }
        tracing::info!("Run started, metrics at '{}'", self.metrics.csv_path().display());
        Ok(())
    }

    fn step(&mut self, namespace: Namespace, step: u64, m: &StepMetrics) -> Result<()> {
        match m.learning_rate {
            Some(lr) => tracing::debug!(
                "{namespace} step {step}: loss={:.4} accuracy={:.4} lr={lr:.3e}",
                m.loss, m.accuracy
            ),
            None => tracing::debug!(
                "{namespace} step {step}: loss={:.4} accuracy={:.4}",
                m.loss, m.accuracy
            ),
        }
        Ok(())
    }

    fn sample(&mut self, epoch: usize, text: &StyledText) -> Result<()> {
        println!("Sample {:>3} | {}", epoch, render(text, self.color));
        Ok(())
    }

    fn end_epoch(&mut self, summary: &EpochSummary) -> Result<()> {
        let m = EpochMetrics::from(summary);
        let total = self.epochs.map(|e| e.to_string()).unwrap_or_else(|| "?".to_string());
        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | valid_loss={:.4} | train_acc={:.1}% | valid_acc={:.1}%",
            m.epoch, total, m.train_loss, m.valid_loss,
            m.train_accuracy * 100.0, m.valid_accuracy * 100.0,
        );
        if m.is_improvement(self.best_valid_loss) {
            self.best_valid_loss = m.valid_loss;
            tracing::info!("New best valid_loss {:.4} at epoch {}", m.valid_loss, m.epoch);
        }
        self.metrics.log(&m)
    }

    fn end_run(&mut self) -> Result<()> {
        match self.started {
            Some(t) => tracing::info!("Training complete in {:.1?}", t.elapsed()),
            None    => tracing::info!("Training complete!"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tracking::PassStats;

    #[test]
    fn test_render_plain_and_colored() {
        let text = vec![("def f(".to_string(), Style::Subtle), ("x\n".to_string(), Style::Value)];
        assert_eq!(render(&text, false), "def f(x\\n");
        assert_eq!(render(&text, true), "\x1b[2mdef f(\x1b[0m\x1b[1mx\\n\x1b[0m");
    }

    #[test]
    fn test_color_follows_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ExperimentTracker::new(dir.path()).unwrap();
        assert_eq!(tracker.color, stdout_supports_color());
        if !console::Term::stdout().is_term() {
            assert!(!tracker.color);
        }
        assert!(!tracker.with_color(false).color);
    }

    #[test]
    fn test_end_epoch_appends_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = ExperimentTracker::new(dir.path()).unwrap().with_color(false);
        let mut train = PassStats::default();
        train.record(&StepMetrics { loss: 1.0, accuracy: 0.5, learning_rate: Some(1e-3) });
        let summary = EpochSummary { epoch: 1, train, valid: train };
        tracker.end_epoch(&summary).unwrap();
        tracker.end_run().unwrap();

        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.lines().nth(1).unwrap().starts_with("1,1.000000,1.000000,0.500000"));
    }
}
