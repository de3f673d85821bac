//! The run-time context: named outputs of every completed ancestor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Accumulated map of variable name → node output.
///
/// The context is append-only along an execution path. Executors receive a
/// snapshot and the runtime derives the next one with [`Context::with_output`];
/// nothing ever removes or mutates an existing entry in place.
///
/// Variables live at the root of the map: `{{form.email}}` reads
/// `context["form"]["email"]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Map<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new context with `name` bound to `output`.
    ///
    /// Binding a name that already exists replaces the value in the returned
    /// snapshot only; `self` is left untouched.
    pub fn with_output(&self, name: impl Into<String>, output: Value) -> Self {
        let mut next = self.0.clone();
        next.insert(name.into(), output);
        Self(next)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Follow a dot-separated path from the root.
    ///
    /// Numeric segments index into arrays, so `items.0.sku` works.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let root = self.0.get(segments.next()?)?;
        segments.try_fold(root, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
