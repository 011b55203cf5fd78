// ============================================================
// Configuration — Resolver
// ============================================================
// Turns a Schema plus Overrides into a frozen ConfigSnapshot.
//
// Per setting, the first rule that applies wins:
//   1. literal override            → use it as is
//   2. factory-name override       → invoke that factory
//   3. default factory             → invoke it
//   4. static default              → use it
//   5. otherwise                   → ConfigError::Unresolved
//
// Factories run depth-first in dependency order. A setting that is
// reached again while its own factory is still collecting inputs
// closes a cycle, reported with the full path (a -> b -> a).
// Dependencies only count when a factory is actually invoked, so a
// literal override cuts every edge below it.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::error::ConfigError;
use crate::config::overrides::{Override, Overrides};
use crate::config::schema::{Factory, Schema, Setting, Table, Target};
use crate::config::snapshot::{nest, ConfigSnapshot, Resolved, Source};
use crate::config::value::Value;

/// The inputs a factory is allowed to read: exactly the
/// dependencies it declared, keyed by the name it used.
pub struct Scope<'a> {
    setting: &'a str,
    deps:    &'a BTreeMap<String, Value>,
}

impl<'a> Scope<'a> {
    fn raw(&self, name: &str) -> Result<&Value, ConfigError> {
        self.deps.get(name).ok_or_else(|| ConfigError::UndeclaredRead {
            setting:    self.setting.to_string(),
            dependency: name.to_string(),
        })
    }

    /// Decode a declared data dependency into `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, ConfigError> {
        match self.raw(name)? {
            Value::Data(v) => serde_json::from_value(v.clone()).map_err(|source| {
                ConfigError::Decode { setting: name.to_string(), source }
            }),
            other => Err(ConfigError::WrongKind {
                setting:  name.to_string(),
                expected: std::any::type_name::<T>().to_string(),
                found:    other.kind(),
            }),
        }
    }

    /// Fetch a declared component dependency.
    pub fn component<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ConfigError> {
        let value = self.raw(name)?;
        let found = value.kind();
        let component = match value {
            Value::Component(c) => c.downcast::<T>(),
            Value::Data(_)      => None,
        };
        component.ok_or_else(|| ConfigError::WrongKind {
            setting:  name.to_string(),
            expected: format!("component {}", std::any::type_name::<T>()),
            found,
        })
    }
}

/// Resolve every declared setting exactly once.
pub fn resolve(schema: &Schema, overrides: &Overrides) -> Result<ConfigSnapshot, ConfigError> {
    let table = schema.flatten();

    // Typos must fail loudly instead of silently leaving a default in place.
    for key in overrides.keys() {
        if !table.settings.contains_key(key) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
    }

    let mut run = Resolution {
        table:     &table,
        overrides,
        done:      BTreeMap::new(),
        stack:     Vec::new(),
    };
    for path in &table.order {
        run.resolve(path)?;
    }

    tracing::debug!("Resolved {} settings", run.done.len());
    Ok(ConfigSnapshot::new(run.done))
}

enum Choice<'a> {
    Ready(Value, Source),
    Invoke(&'a Factory, Source, String),
}

struct Resolution<'a, 's> {
    table:     &'a Table<'s>,
    overrides: &'a Overrides,
    done:      BTreeMap<String, Resolved>,
    /// Settings whose factories are currently gathering inputs.
    stack:     Vec<String>,
}

impl<'a, 's: 'a> Resolution<'a, 's> {
    fn resolve(&mut self, path: &str) -> Result<(), ConfigError> {
        if self.done.contains_key(path) {
            return Ok(());
        }
        if let Some(pos) = self.stack.iter().position(|p| p == path) {
            let mut cycle = self.stack[pos..].to_vec();
            cycle.push(path.to_string());
            return Err(ConfigError::Cycle(cycle));
        }

        let setting: &'a Setting = self.table.settings[path];
        let resolved = match self.choose(path, setting)? {
            Choice::Ready(value, source) => Resolved { value, source },
            Choice::Invoke(factory, source, name) => {
                self.stack.push(path.to_string());
                let deps = self.gather(path, factory)?;
                self.stack.pop();

                let scope = Scope { setting: path, deps: &deps };
                let value = (factory.build)(&scope).map_err(|e| ConfigError::Factory {
                    setting: path.to_string(),
                    factory: name,
                    source:  e.into(),
                })?;
                Resolved { value, source }
            }
        };

        tracing::debug!("{} <- {}", path, resolved.source);
        self.done.insert(path.to_string(), resolved);
        Ok(())
    }

    fn choose(&self, path: &str, setting: &'a Setting) -> Result<Choice<'a>, ConfigError> {
        let by_name = |name: &str| {
            setting.factory(name).ok_or_else(|| ConfigError::UnknownFactory {
                setting: path.to_string(),
                factory: name.to_string(),
            })
        };

        match self.overrides.get(path) {
            Some(Override::Literal(value)) => {
                return Ok(Choice::Ready(value.clone(), Source::Literal));
            }
            Some(Override::Factory(name)) => {
                let factory = by_name(name)?;
                return Ok(Choice::Invoke(factory, Source::Factory(name.clone()), name.clone()));
            }
            Some(Override::Assign(raw)) => {
                // A string naming one of this setting's factories selects it;
                // anything else is taken literally.
                if let Some(factory) = raw.as_str().and_then(|name| setting.factory(name)) {
                    let name = raw.as_str().unwrap_or_default().to_string();
                    return Ok(Choice::Invoke(factory, Source::Factory(name.clone()), name));
                }
                return Ok(Choice::Ready(Value::Data(raw.clone()), Source::Literal));
            }
            None => {}
        }

        if let Some(name) = self.default_factory(path, setting)? {
            let factory = by_name(name)?;
            return Ok(Choice::Invoke(
                factory,
                Source::DefaultFactory(name.to_string()),
                name.to_string(),
            ));
        }

        match &setting.default {
            Some(value) => Ok(Choice::Ready(value.clone(), Source::Default)),
            None        => Err(ConfigError::Unresolved(path.to_string())),
        }
    }

    fn default_factory(
        &self,
        path: &str,
        setting: &'a Setting,
    ) -> Result<Option<&'a str>, ConfigError> {
        match setting.defaults.as_slice() {
            [only] => Ok(Some(only.as_str())),
            []     => match setting.factories.as_slice() {
                [(only, _)] => Ok(Some(only.as_str())),
                _           => Ok(None),
            },
            many   => Err(ConfigError::AmbiguousDefault {
                setting:    path.to_string(),
                candidates: many.to_vec(),
            }),
        }
    }

    fn gather(
        &mut self,
        path: &str,
        factory: &Factory,
    ) -> Result<BTreeMap<String, Value>, ConfigError> {
        let mut deps = BTreeMap::new();
        for dep in &factory.deps {
            let target = self.table.lookup(path, dep).ok_or_else(|| {
                ConfigError::UnknownDependency {
                    setting:    path.to_string(),
                    dependency: dep.clone(),
                }
            })?;
            let value = match target {
                Target::Setting(p) => {
                    self.resolve(&p)?;
                    self.done[&p].value.clone()
                }
                Target::Group(g) => {
                    // A group dependency resolves all of its members and
                    // hands the factory one nested object.
                    let members = self.table.members(&g);
                    for m in &members {
                        self.resolve(m)?;
                    }
                    let prefix = format!("{g}.");
                    let rows = members.iter().map(|m| {
                        (&m[prefix.len()..], self.done[m].value.to_json())
                    });
                    Value::Data(nest(rows))
                }
            };
            deps.insert(dep.clone(), value);
        }
        Ok(deps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn int(v: i64) -> anyhow::Result<Value> {
        Ok(Value::Data(json!(v)))
    }

    #[test]
    fn test_literal_override_beats_default() {
        let mut schema = Schema::new();
        schema.declare("batch_size").default_value(16);

        let mut overrides = Overrides::new();
        overrides.literal("batch_size", 4);

        let snap = resolve(&schema, &overrides).unwrap();
        assert_eq!(snap.get::<usize>("batch_size").unwrap(), 4);
        assert_eq!(snap.source("batch_size"), Some(&Source::Literal));
    }

    #[test]
    fn test_literal_override_beats_default_factory() {
        let mut schema = Schema::new();
        schema.declare("n").default_value(1).option("big", &[], |_| int(100));

        let mut overrides = Overrides::new();
        overrides.literal("n", 7);
        let snap = resolve(&schema, &overrides).unwrap();
        assert_eq!(snap.get::<i64>("n").unwrap(), 7);

        // Without the override the single factory is the default.
        let snap = resolve(&schema, &Overrides::new()).unwrap();
        assert_eq!(snap.get::<i64>("n").unwrap(), 100);
    }

    #[test]
    fn test_factory_override_selects_named_factory() {
        let mut schema = Schema::new();
        schema
            .declare("model")
            .default_option("small", &[], |_| int(1))
            .option("large", &[], |_| int(2));

        let snap = resolve(&schema, &Overrides::new()).unwrap();
        assert_eq!(snap.get::<i64>("model").unwrap(), 1);

        let mut overrides = Overrides::new();
        overrides.factory("model", "large");
        let snap = resolve(&schema, &overrides).unwrap();
        assert_eq!(snap.get::<i64>("model").unwrap(), 2);
        assert_eq!(snap.source("model"), Some(&Source::Factory("large".into())));
    }

    #[test]
    fn test_assignment_string_picks_factory_or_literal() {
        let mut schema = Schema::new();
        schema
            .declare("model")
            .default_option("small", &[], |_| int(1))
            .option("large", &[], |_| int(2));
        schema.declare("name").default_value("x");

        let mut overrides = Overrides::new();
        overrides.assign("model=large").unwrap();
        overrides.assign("name=large").unwrap();
        let snap = resolve(&schema, &overrides).unwrap();
        assert_eq!(snap.get::<i64>("model").unwrap(), 2);
        assert_eq!(snap.get::<String>("name").unwrap(), "large");
    }

    #[test]
    fn test_unresolved_setting_is_named() {
        let mut schema = Schema::new();
        schema.declare("n_tokens");
        let err = resolve(&schema, &Overrides::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Unresolved(ref s) if s == "n_tokens"));
    }

    #[test]
    fn test_unknown_override_key_is_rejected() {
        let mut schema = Schema::new();
        schema.declare("batch_size").default_value(16);
        let mut overrides = Overrides::new();
        overrides.literal("batch_sise", 4);
        let err = resolve(&schema, &overrides).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(ref k) if k == "batch_sise"));
    }

    #[test]
    fn test_unknown_factory_override_is_rejected() {
        let mut schema = Schema::new();
        schema.declare("model").option("lstm", &[], |_| int(1));
        let mut overrides = Overrides::new();
        overrides.factory("model", "gru");
        let err = resolve(&schema, &overrides).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFactory { .. }));
    }

    #[test]
    fn test_dependencies_run_first() {
        let mut schema = Schema::new();
        schema.declare("d_ff").option("four_x", &["d_model"], |s| {
            int(4 * s.get::<i64>("d_model")?)
        });
        schema.declare("d_model").default_value(32);

        let snap = resolve(&schema, &Overrides::new()).unwrap();
        assert_eq!(snap.get::<i64>("d_ff").unwrap(), 128);
    }

    #[test]
    fn test_cycle_is_reported_with_path() {
        let mut schema = Schema::new();
        schema.declare("a").option("from_b", &["b"], |s| int(s.get::<i64>("b")?));
        schema.declare("b").option("from_a", &["a"], |s| int(s.get::<i64>("a")?));

        let err = resolve(&schema, &Overrides::new()).unwrap_err();
        match err {
            ConfigError::Cycle(path) => assert_eq!(path, vec!["a", "b", "a"]),
            other => panic!("expected a cycle, got {other}"),
        }
        let mut overrides = Overrides::new();
        overrides.literal("b", 3);
        let snap = resolve(&schema, &overrides).unwrap();
        assert_eq!(snap.get::<i64>("a").unwrap(), 3);
    }

    #[test]
    fn test_cycle_message_names_the_cycle() {
        let err = ConfigError::Cycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "circular dependency between settings: a -> b -> a");
    }

    #[test]
    fn test_nested_group_reads_outer_scope() {
        let mut schema = Schema::new();
        schema.declare("d_model").default_value(64);
        let opt = schema.group("optimizer");
        opt.declare("d_model").option("from_model", &["d_model"], |s| {
            int(s.get::<i64>("d_model")?)
        });
        opt.declare("learning_rate").default_value(0.5);

        let mut overrides = Overrides::new();
        overrides.literal("optimizer.learning_rate", 0.1);
        let snap = resolve(&schema, &overrides).unwrap();
        assert_eq!(snap.get::<i64>("optimizer.d_model").unwrap(), 64);
        assert_eq!(snap.get::<f64>("optimizer.learning_rate").unwrap(), 0.1);
    }

    #[test]
    fn test_group_dependency_gets_nested_object() {
        #[derive(serde::Deserialize)]
        struct Sub { heads: i64, width: i64 }

        let mut schema = Schema::new();
        schema.group("sub").declare("heads").default_value(2);
        schema.group("sub").declare("width").default_value(8);
        schema.declare("total").option("product", &["sub"], |s| {
            let sub: Sub = s.get("sub")?;
            int(sub.heads * sub.width)
        });

        let snap = resolve(&schema, &Overrides::new()).unwrap();
        assert_eq!(snap.get::<i64>("total").unwrap(), 16);
    }

    #[test]
    fn test_undeclared_read_fails_the_factory() {
        let mut schema = Schema::new();
        schema.declare("a").default_value(1);
        schema.declare("b").option("sneaky", &[], |s| int(s.get::<i64>("a")?));
        let err = resolve(&schema, &Overrides::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Factory { ref setting, .. } if setting == "b"));
    }

    #[test]
    fn test_ambiguous_default_is_rejected() {
        let mut schema = Schema::new();
        schema
            .declare("m")
            .default_option("x", &[], |_| int(1))
            .default_option("y", &[], |_| int(2));
        let err = resolve(&schema, &Overrides::new()).unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousDefault { .. }));
    }

    #[test]
    fn test_factories_run_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut schema = Schema::new();
        schema.declare("base").option("count", &[], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            int(1)
        });
        schema.declare("x").option("a", &["base"], |s| int(s.get::<i64>("base")?));
        schema.declare("y").option("b", &["base"], |s| int(s.get::<i64>("base")?));

        resolve(&schema, &Overrides::new()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_component_values_flow_to_dependents() {
        let mut schema = Schema::new();
        schema.declare("text").option("inline", &[], |_| {
            Ok(Value::component(String::from("abcabc")))
        });
        schema.declare("len").option("from_text", &["text"], |s| {
            int(s.component::<String>("text")?.len() as i64)
        });

        let snap = resolve(&schema, &Overrides::new()).unwrap();
        assert_eq!(snap.get::<i64>("len").unwrap(), 6);
        assert_eq!(*snap.component::<String>("text").unwrap(), "abcabc");
    }
}
