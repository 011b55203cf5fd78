// ============================================================
// Configuration Resolver
// ============================================================
// A declarative registry of experiment settings. Each setting has
// an optional static default and any number of named factories;
// factories declare which other settings they read. Resolution
// evaluates the table once, in dependency order, and freezes the
// result into a ConfigSnapshot that lives for the whole run.
//
//   schema.rs     — declaring settings, groups and factories
//   overrides.rs  — run-time replacements keyed by dotted path
//   resolver.rs   — the topological evaluation
//   snapshot.rs   — the frozen, typed read-back
//   value.rs      — data values and constructed components
//   error.rs      — every way resolution can fail

pub mod error;
pub mod overrides;
pub mod resolver;
pub mod schema;
pub mod snapshot;
pub mod value;

pub use error::ConfigError;
pub use overrides::Overrides;
pub use resolver::{resolve, Scope};
pub use schema::Schema;
pub use snapshot::{ConfigSnapshot, Source};
pub use value::Value;
