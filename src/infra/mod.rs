// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns the training loop reports to but does
// not own:
//
//   checkpoint.rs — the run directory: configs.json, vocab.json,
//                   per-epoch model records (CompactRecorder) and
//                   the latest-epoch pointer used for resume
//
//   metrics.rs    — epoch-level loss/accuracy appended to
//                   metrics.csv for later plotting
//
//   tracker.rs    — the default Tracker: tracing logs, the styled
//                   sample on the terminal, metrics.csv rows
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Run-directory persistence
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Default experiment tracker
pub mod tracker;
