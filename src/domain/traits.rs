// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training loop reports to a Tracker instead of writing to
// global state. The run lifecycle is explicit:
//
//   begin_run → (step | sample | end_epoch)* → end_run
//
// Implementations:
//   - ExperimentTracker → tracing + terminal + metrics.csv
//   - test trackers     → record calls in memory

use anyhow::Result;

use crate::config::ConfigSnapshot;
use crate::domain::tracking::{EpochSummary, Namespace, StepMetrics, StyledText};

pub trait Tracker {
    /// Called once with the frozen configuration before any epoch.
    fn begin_run(&mut self, snapshot: &ConfigSnapshot) -> Result<()>;

    /// One training or validation window finished.
    fn step(&mut self, namespace: Namespace, step: u64, metrics: &StepMetrics) -> Result<()>;

    /// The greedy-decoding probe of one epoch.
    fn sample(&mut self, epoch: usize, text: &StyledText) -> Result<()>;

    fn end_epoch(&mut self, summary: &EpochSummary) -> Result<()>;

    fn end_run(&mut self) -> Result<()>;
}
