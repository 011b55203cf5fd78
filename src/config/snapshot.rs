// ============================================================
// Configuration — Snapshot
// ============================================================
// The frozen result of resolution. Read-only: there is no way to
// change a setting once the snapshot exists.
//
// Values are read back by dotted path. A group path such as
// "optimizer" decodes the whole group from one nested object, so
// a serde struct can mirror each group.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::error::ConfigError;
use crate::config::value::Value;

/// Where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Literal,
    Factory(String),
    DefaultFactory(String),
    Default,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Literal           => write!(f, "override"),
            Source::Factory(n)        => write!(f, "factory `{n}` (override)"),
            Source::DefaultFactory(n) => write!(f, "factory `{n}`"),
            Source::Default           => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub value:  Value,
    pub source: Source,
}

#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    entries: BTreeMap<String, Resolved>,
}

impl ConfigSnapshot {
    pub(crate) fn new(entries: BTreeMap<String, Resolved>) -> Self {
        Self { entries }
    }

    /// Decode a setting, or a whole group, into `T`.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConfigError> {
        let json = match self.entries.get(path) {
            Some(Resolved { value: Value::Data(v), .. }) => v.clone(),
            Some(Resolved { value, .. }) => {
                return Err(ConfigError::WrongKind {
                    setting:  path.to_string(),
                    expected: std::any::type_name::<T>().to_string(),
                    found:    value.kind(),
                })
            }
            None => self.group(path).ok_or_else(|| ConfigError::Missing(path.to_string()))?,
        };
        serde_json::from_value(json).map_err(|source| ConfigError::Decode {
            setting: path.to_string(),
            source,
        })
    }

    pub fn component<T: Any + Send + Sync>(&self, path: &str) -> Result<Arc<T>, ConfigError> {
        let resolved = self
            .entries
            .get(path)
            .ok_or_else(|| ConfigError::Missing(path.to_string()))?;
        let component = match &resolved.value {
            Value::Component(c) => c.downcast::<T>(),
            Value::Data(_)      => None,
        };
        component.ok_or_else(|| ConfigError::WrongKind {
            setting:  path.to_string(),
            expected: format!("component {}", std::any::type_name::<T>()),
            found:    resolved.value.kind(),
        })
    }

    pub fn source(&self, path: &str) -> Option<&Source> {
        self.entries.get(path).map(|r| &r.source)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Resolved)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The whole snapshot as one nested JSON object, for persistence.
    pub fn to_json(&self) -> serde_json::Value {
        nest(self.entries.iter().map(|(k, r)| (k.as_str(), r.value.to_json())))
    }

    fn group(&self, path: &str) -> Option<serde_json::Value> {
        let prefix = format!("{path}.");
        let rows: Vec<_> = self
            .entries
            .iter()
            .filter_map(|(k, r)| k.strip_prefix(&prefix).map(|rest| (rest, r.value.to_json())))
            .collect();
        if rows.is_empty() {
            None
        } else {
            Some(nest(rows))
        }
    }
}

/// Build a nested JSON object from dotted keys.
pub(crate) fn nest<'k>(rows: impl IntoIterator<Item = (&'k str, serde_json::Value)>) -> serde_json::Value {
    let mut root = serde_json::Map::new();
    for (key, value) in rows {
        let mut node = &mut root;
        let mut parts = key.split('.').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                node.insert(part.to_string(), value);
                break;
            }
            let child = node
                .entry(part.to_string())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            if !child.is_object() {
                *child = serde_json::Value::Object(serde_json::Map::new());
            }
            let serde_json::Value::Object(map) = child else { break };
            node = map;
        }
    }
    serde_json::Value::Object(root)
}
