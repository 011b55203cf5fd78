// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the raw corpus files to burn integer tensors.
//
//   train.py / valid.py
//       │
//       ▼
//   Corpus              → reads both files, builds the vocabulary,
//       │                 encodes each split to an index sequence
//       ▼
//   SequentialBatches   → (seq_len, batch_size) windows that keep
//                         temporal order across batches
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Loads the train/valid text files and the vocabulary
pub mod corpus;

/// Slices an index sequence into ordered windows
pub mod batcher;
