//! Per-run variable namespace.

use autoflow_graph::{Arg, VarPath};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Path-addressable variables of one run.
///
/// Top-level identifiers map to values; object values can be read and written
/// field by field through dotted paths. Nested writes create the containers
/// they need.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValueStore {
  values: Map<String, Value>,
}

impl ValueStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Bind call arguments to input parameters by position. Parameters without
  /// an argument are bound to `null`.
  pub fn seed(params: &[String], args: Vec<Value>) -> Self {
    let mut args = args.into_iter();
    let values = params
      .iter()
      .map(|param| (param.clone(), args.next().unwrap_or(Value::Null)))
      .collect();
    Self { values }
  }

  /// Read a path. `None` when any segment is missing.
  pub fn get(&self, path: &VarPath) -> Option<&Value> {
    let root = self.values.get(path.root())?;
    path
      .fields()
      .iter()
      .try_fold(root, |value, field| value.get(field.as_str()))
  }

  /// Whether every segment of `path` exists. `null` counts as present.
  pub fn contains(&self, path: &VarPath) -> bool {
    self.get(path).is_some()
  }

  /// Write a path, merging into (or creating) the containing objects.
  pub fn set(&mut self, path: &VarPath, value: Value) {
    let current = self.values.remove(path.root());
    let merged = merge(current, path, path.fields(), value);
    self.values.insert(path.root().to_string(), merged);
  }

  /// The actual value of a task argument. Missing variables read as `null`.
  pub fn read_arg(&self, arg: &Arg) -> Value {
    match arg {
      Arg::Literal(value) => value.clone(),
      Arg::Var(path) => self.get(path).cloned().unwrap_or(Value::Null),
    }
  }

  pub fn as_map(&self) -> &Map<String, Value> {
    &self.values
  }

  pub fn into_value(self) -> Value {
    Value::Object(self.values)
  }
}

fn merge(current: Option<Value>, path: &VarPath, fields: &[String], value: Value) -> Value {
  let Some((field, rest)) = fields.split_first() else {
    return value;
  };

  let mut object = match current {
    Some(Value::Object(object)) => object,
    None => Map::new(),
    Some(other) => {
      warn!(path = %path, replaced = %other, "replacing non-object value on nested write");
      Map::new()
    }
  };

  let child = object.remove(field.as_str());
  object.insert(field.clone(), merge(child, path, rest, value));
  Value::Object(object)
}
