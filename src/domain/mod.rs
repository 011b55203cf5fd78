// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe the experiment: symbols, the
// vocabulary, and what the training loop reports.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only structs, enums and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Text → symbols
pub mod tokenizer;

// Symbol ↔ index mapping
pub mod vocabulary;

// Metrics, styles and epoch summaries
pub mod tracking;

// The Tracker abstraction the training loop reports to
pub mod traits;
