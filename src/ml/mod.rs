// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the Burn framework specific code: models,
// loss, optimiser settings, backend choice and the loops that
// drive them. Layer 4 only hands it tensors.
//
// What's in this layer:
//
//   model/        — three next-symbol predictors behind CharModel
//                   (LSTM, recurrent highway, causal transformer)
//
//   loss.rs       — flattened cross-entropy and argmax accuracy
//
//   optimizer.rs  — Adam settings and the learning-rate schedule
//                   (constant or Noam warmup)
//
//   backend.rs    — cpu / gpu backend dispatch
//
//   sampler.rs    — greedy continuation of a prompt
//
//   trainer.rs    — the epoch loop: sample, train pass, valid pass,
//                   checkpoint
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Model contract and the three variants
pub mod model;

/// Cross-entropy loss and accuracy over [T, B, V] scores
pub mod loss;

/// Adam configuration and learning-rate schedules
pub mod optimizer;

/// Backend selection from the `device` settings
pub mod backend;

/// Greedy decoding probe
pub mod sampler;

/// Full training loop with validation and checkpointing
pub mod trainer;
