// ============================================================
// Configuration — Errors
// ============================================================
// Every way resolution can fail. All of them are fatal at
// startup and name the setting (or cycle) that caused them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// No override, no default factory and no static default.
    #[error("setting `{0}` is unresolved: it has no override, no default factory and no default value")]
    Unresolved(String),

    /// Factories that (transitively) depend on themselves.
    #[error("circular dependency between settings: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    /// An override key that matches no declared setting.
    #[error("unknown configuration key `{0}`")]
    UnknownKey(String),

    #[error("setting `{setting}` has no factory named `{factory}`")]
    UnknownFactory { setting: String, factory: String },

    #[error("setting `{setting}` depends on `{dependency}`, which is not declared")]
    UnknownDependency { setting: String, dependency: String },

    #[error("setting `{setting}` has more than one default factory: {}", .candidates.join(", "))]
    AmbiguousDefault { setting: String, candidates: Vec<String> },

    #[error("factory `{factory}` for setting `{setting}` failed")]
    Factory {
        setting: String,
        factory: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("factory for `{setting}` read `{dependency}` without declaring it as a dependency")]
    UndeclaredRead { setting: String, dependency: String },

    #[error("setting `{0}` is not part of the resolved configuration")]
    Missing(String),

    #[error("setting `{setting}` holds a {found}, not a {expected}")]
    WrongKind { setting: String, expected: String, found: String },

    #[error("setting `{setting}` cannot be decoded")]
    Decode {
        setting: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed override `{0}`, expected key=value")]
    MalformedOverride(String),
}
