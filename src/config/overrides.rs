// ============================================================
// Configuration — Overrides
// ============================================================
// Run-time replacements keyed by dotted path. They come from two
// places:
//   - code, which knows whether it means a literal or a factory
//   - the command line (`--set key=value`), where a value is parsed
//     as JSON if it can be and kept as a string otherwise; the
//     resolver decides if that string names a factory
//
// Setting the same key twice keeps the last value.

use std::any::Any;
use std::collections::BTreeMap;

use crate::config::error::ConfigError;
use crate::config::value::Value;

#[derive(Debug, Clone)]
pub enum Override {
    Literal(Value),
    Factory(String),
    Assign(serde_json::Value),
}

#[derive(Debug, Clone, Default)]
pub struct Overrides {
    entries: BTreeMap<String, Override>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn literal(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> &mut Self {
        self.entries.insert(key.into(), Override::Literal(Value::Data(value.into())));
        self
    }

    /// Inject an already-built component, e.g. an in-memory corpus.
    pub fn component<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) -> &mut Self {
        self.entries.insert(key.into(), Override::Literal(Value::component(value)));
        self
    }

    pub fn factory(&mut self, key: impl Into<String>, name: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), Override::Factory(name.into()));
        self
    }

    /// Parse a `key=value` assignment from the command line.
    pub fn assign(&mut self, assignment: &str) -> Result<&mut Self, ConfigError> {
        let (key, raw) = assignment
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| ConfigError::MalformedOverride(assignment.to_string()))?;

        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        self.entries.insert(key.to_string(), Override::Assign(value));
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&Override> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assigned(o: &Overrides, key: &str) -> serde_json::Value {
        match o.get(key) {
            Some(Override::Assign(v)) => v.clone(),
            other => panic!("expected an assignment for {key}, got {other:?}"),
        }
    }

    #[test]
    fn test_assign_parses_json_then_falls_back_to_string() {
        let mut o = Overrides::new();
        o.assign("epochs=3").unwrap();
        o.assign("optimizer.learning_rate = 0.5").unwrap();
        o.assign("optimizer.optimizer=Noam").unwrap();
        o.assign("is_save_models=false").unwrap();

        assert_eq!(assigned(&o, "epochs"), json!(3));
        assert_eq!(assigned(&o, "optimizer.learning_rate"), json!(0.5));
        assert_eq!(assigned(&o, "optimizer.optimizer"), json!("Noam"));
        assert_eq!(assigned(&o, "is_save_models"), json!(false));
    }

    #[test]
    fn test_malformed_assignment() {
        let mut o = Overrides::new();
        assert!(matches!(o.assign("epochs"), Err(ConfigError::MalformedOverride(_))));
        assert!(matches!(o.assign("=3"), Err(ConfigError::MalformedOverride(_))));
        assert!(o.is_empty());
    }

    #[test]
    fn test_last_assignment_wins() {
        let mut o = Overrides::new();
        o.literal("epochs", 3).literal("epochs", 5);
        assert_eq!(o.len(), 1);
        assert!(matches!(o.get("epochs"), Some(Override::Literal(Value::Data(v))) if *v == json!(5)));
    }
}
