// ============================================================
// Configuration — Schema
// ============================================================
// The declaration table: every setting name with its optional
// static default and its named factories. Groups nest another
// schema under a name, so `optimizer.learning_rate` lives in the
// `optimizer` group.
//
//   let mut schema = Schema::new();
//   schema.declare("batch_size").default_value(16);
//   schema.declare("n_tokens").option("from_text", &["text"], |s| { ... });
//   schema.group("optimizer").declare("learning_rate").default_value(1e-3);
//
// Nothing runs here. Factories are invoked by the resolver.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::resolver::Scope;
use crate::config::value::Value;

type BuildFn = dyn Fn(&Scope<'_>) -> anyhow::Result<Value> + Send + Sync;

/// A named way of producing a setting's value from other settings.
#[derive(Clone)]
pub struct Factory {
    pub(crate) deps:  Vec<String>,
    pub(crate) build: Arc<BuildFn>,
}

#[derive(Clone, Default)]
pub struct Setting {
    pub(crate) default:   Option<Value>,
    pub(crate) factories: Vec<(String, Factory)>,
    pub(crate) defaults:  Vec<String>,
}

impl Setting {
    /// Static default, used when no override and no default factory applies.
    pub fn default_value(&mut self, value: impl Into<serde_json::Value>) -> &mut Self {
        self.default = Some(Value::Data(value.into()));
        self
    }

    /// Register a named factory. A setting with a single factory
    /// uses it as its default.
    pub fn option<F>(&mut self, name: &str, deps: &[&str], build: F) -> &mut Self
    where
        F: Fn(&Scope<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let factory = Factory {
            deps:  deps.iter().map(|d| d.to_string()).collect(),
            build: Arc::new(build),
        };
        match self.factories.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = factory,
            None       => self.factories.push((name.to_string(), factory)),
        }
        self
    }

    /// Register a factory and mark it as this setting's default.
    pub fn default_option<F>(&mut self, name: &str, deps: &[&str], build: F) -> &mut Self
    where
        F: Fn(&Scope<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.option(name, deps, build);
        if !self.defaults.iter().any(|d| d == name) {
            self.defaults.push(name.to_string());
        }
        self
    }

    pub(crate) fn factory(&self, name: &str) -> Option<&Factory> {
        self.factories.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn factory_names(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|(n, _)| n.as_str())
    }
}

#[derive(Clone)]
enum Entry {
    Setting(Setting),
    Group(Schema),
}

#[derive(Clone, Default)]
pub struct Schema {
    entries: Vec<(String, Entry)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a setting, or return the existing declaration so more
    /// factories can be attached to it.
    ///
    /// # Panics
    /// Panics if `name` is already a group, or contains a dot.
    pub fn declare(&mut self, name: &str) -> &mut Setting {
        assert!(!name.contains('.'), "setting name `{name}` must not contain '.'");
        let idx = match self.entries.iter().position(|(n, _)| n == name) {
            Some(idx) => idx,
            None => {
                self.entries.push((name.to_string(), Entry::Setting(Setting::default())));
                self.entries.len() - 1
            }
        };
        match &mut self.entries[idx].1 {
            Entry::Setting(s) => s,
            Entry::Group(_)   => panic!("`{name}` is declared as a group, not a setting"),
        }
    }

    /// Get or create a nested group.
    ///
    /// # Panics
    /// Panics if `name` is already a setting, or contains a dot.
    pub fn group(&mut self, name: &str) -> &mut Schema {
        assert!(!name.contains('.'), "group name `{name}` must not contain '.'");
        let idx = match self.entries.iter().position(|(n, _)| n == name) {
            Some(idx) => idx,
            None => {
                self.entries.push((name.to_string(), Entry::Group(Schema::new())));
                self.entries.len() - 1
            }
        };
        match &mut self.entries[idx].1 {
            Entry::Group(g)   => g,
            Entry::Setting(_) => panic!("`{name}` is declared as a setting, not a group"),
        }
    }

    pub(crate) fn flatten(&self) -> Table<'_> {
        let mut table = Table::default();
        self.flatten_into("", &mut table);
        table
    }

    fn flatten_into<'s>(&'s self, prefix: &str, table: &mut Table<'s>) {
        for (name, entry) in &self.entries {
            let path = join(prefix, name);
            match entry {
                Entry::Setting(s) => {
                    table.order.push(path.clone());
                    table.settings.insert(path, s);
                }
                Entry::Group(g) => {
                    g.flatten_into(&path, table);
                    table.groups.insert(path);
                }
            }
        }
    }
}

pub(crate) fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// What a dependency name refers to after scoping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Setting(String),
    Group(String),
}

/// The schema flattened to dotted paths, in declaration order.
#[derive(Default)]
pub(crate) struct Table<'s> {
    pub(crate) order:    Vec<String>,
    pub(crate) settings: BTreeMap<String, &'s Setting>,
    pub(crate) groups:   BTreeSet<String>,
}

impl<'s> Table<'s> {
    /// Resolve a dependency named by the setting at `path`. Names are
    /// looked up from the setting's own group outwards; a setting never
    /// refers to itself, so `optimizer.d_model` depending on `d_model`
    /// finds the top-level `d_model`.
    pub(crate) fn lookup(&self, path: &str, dep: &str) -> Option<Target> {
        let mut scope = parent(path);
        loop {
            let candidate = join(scope, dep);
            if candidate != path {
                if self.settings.contains_key(&candidate) {
                    return Some(Target::Setting(candidate));
                }
                if self.groups.contains(&candidate) {
                    return Some(Target::Group(candidate));
                }
            }
            if scope.is_empty() {
                return None;
            }
            scope = parent(scope);
        }
    }

    pub(crate) fn members(&self, group: &str) -> Vec<String> {
        let prefix = format!("{group}.");
        self.order
            .iter()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect()
    }
}

fn parent(path: &str) -> &str {
    path.rsplit_once('.').map(|(p, _)| p).unwrap_or("")
}
