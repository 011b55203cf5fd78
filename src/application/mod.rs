// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training or sampling).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No terminal formatting here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The experiment's settings, defaults and factories
pub mod configs;

// The training workflow
pub mod train_use_case;

// Greedy continuation from a saved run
pub mod sample_use_case;
