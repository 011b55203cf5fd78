// ============================================================
// Configuration — Values
// ============================================================
// A resolved setting is either plain data (anything serde can
// describe) or a constructed component such as the loaded corpus.
//
// Data values travel as serde_json::Value so the whole snapshot
// can be written to disk and typed back out with serde.
// Components are shared behind an Arc and recovered by downcast.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

#[derive(Clone)]
pub struct Component {
    type_name: &'static str,
    inner:     Arc<dyn Any + Send + Sync>,
}

impl Component {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner:     value,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<component {}>", self.type_name)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Data(serde_json::Value),
    Component(Component),
}

impl Value {
    /// Serialise any serde type into a data value.
    pub fn serialize<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::Data(serde_json::to_value(value)?))
    }

    pub fn component<T: Any + Send + Sync>(value: T) -> Self {
        Self::Component(Component::new(value))
    }

    pub fn kind(&self) -> String {
        match self {
            Value::Data(_)      => "data value".to_string(),
            Value::Component(c) => format!("component {}", c.type_name()),
        }
    }

    /// The JSON form written to the snapshot file. Components
    /// cannot be serialised, so they are recorded by type name.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Data(v)      => v.clone(),
            Value::Component(c) => serde_json::Value::String(format!("{c:?}")),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Data(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_downcast() {
        let c = Component::new(vec![1u32, 2, 3]);
        assert_eq!(*c.downcast::<Vec<u32>>().unwrap(), vec![1, 2, 3]);
        assert!(c.downcast::<String>().is_none());
    }

    #[test]
    fn test_component_renders_type_name() {
        let v = Value::component(5u8);
        assert_eq!(v.to_json(), serde_json::json!("<component u8>"));
    }
}
