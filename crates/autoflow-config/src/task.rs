use autoflow_task::{InvokeKind, TaskFn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::input::ArgDef;

/// How a task names its function.
#[derive(Debug, Clone)]
pub enum FuncRef {
  /// A function handle supplied in code.
  Handle(TaskFn),
  /// A (possibly dotted) name resolved at run time, e.g. `"CONT.retObj"`.
  Named(String),
}

impl FuncRef {
  /// The name a task inherits from its function, if any.
  pub fn derived_name(&self) -> Option<&str> {
    match self {
      FuncRef::Handle(func) => func.name(),
      FuncRef::Named(name) => Some(name.as_str()),
    }
  }

  /// Whether this reference holds the given handle.
  pub fn is_handle(&self, func: &TaskFn) -> bool {
    matches!(self, FuncRef::Handle(own) if own.same_as(func))
  }
}

impl From<TaskFn> for FuncRef {
  fn from(func: TaskFn) -> Self {
    FuncRef::Handle(func)
  }
}

impl From<&TaskFn> for FuncRef {
  fn from(func: &TaskFn) -> Self {
    FuncRef::Handle(func.clone())
  }
}

impl From<&str> for FuncRef {
  fn from(name: &str) -> Self {
    FuncRef::Named(name.to_string())
  }
}

impl From<String> for FuncRef {
  fn from(name: String) -> Self {
    FuncRef::Named(name)
  }
}

impl Serialize for FuncRef {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.derived_name().unwrap_or("<anonymous>"))
  }
}

impl<'de> Deserialize<'de> for FuncRef {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    String::deserialize(deserializer).map(FuncRef::Named)
  }
}

/// An ordering constraint: the referenced task must finish first.
#[derive(Debug, Clone)]
pub enum AfterRef {
  /// A task name.
  Name(String),
  /// The first task (in description order) using this function.
  Func(TaskFn),
  /// The task at this position in the description.
  Position(usize),
}

impl From<&str> for AfterRef {
  fn from(name: &str) -> Self {
    AfterRef::Name(name.to_string())
  }
}

impl From<String> for AfterRef {
  fn from(name: String) -> Self {
    AfterRef::Name(name)
  }
}

impl From<TaskFn> for AfterRef {
  fn from(func: TaskFn) -> Self {
    AfterRef::Func(func)
  }
}

impl From<&TaskFn> for AfterRef {
  fn from(func: &TaskFn) -> Self {
    AfterRef::Func(func.clone())
  }
}

impl From<usize> for AfterRef {
  fn from(position: usize) -> Self {
    AfterRef::Position(position)
  }
}

impl Serialize for AfterRef {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      AfterRef::Name(name) => serializer.serialize_str(name),
      AfterRef::Func(func) => serializer.serialize_str(func.name().unwrap_or("<anonymous>")),
      AfterRef::Position(position) => serializer.serialize_u64(*position as u64),
    }
  }
}

impl<'de> Deserialize<'de> for AfterRef {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
      Name(String),
      Position(usize),
    }

    Ok(match Raw::deserialize(deserializer)? {
      Raw::Name(name) => AfterRef::Name(name),
      Raw::Position(position) => AfterRef::Position(position),
    })
  }
}

/// A task as written by the flow author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDef {
  #[serde(alias = "f")]
  pub func: FuncRef,

  /// Argument descriptors: variable paths or literals.
  #[serde(default, alias = "a", alias = "args")]
  pub inputs: Vec<ArgDef>,

  /// Output variable paths receiving the ordered results.
  #[serde(default, alias = "out")]
  pub outputs: Vec<String>,

  /// Invocation style (`callback`/`cb` or `direct`/`ret`).
  #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
  pub kind: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,

  /// Accepts a single reference or a list.
  #[serde(
    default,
    deserialize_with = "one_or_many",
    skip_serializing_if = "Vec::is_empty"
  )]
  pub after: Vec<AfterRef>,
}

impl TaskDef {
  pub fn new<I, A, O, S>(func: impl Into<FuncRef>, inputs: I, outputs: O) -> Self
  where
    I: IntoIterator<Item = A>,
    A: Into<ArgDef>,
    O: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      func: func.into(),
      inputs: inputs.into_iter().map(Into::into).collect(),
      outputs: outputs.into_iter().map(Into::into).collect(),
      kind: None,
      name: None,
      after: Vec::new(),
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn with_kind(mut self, kind: InvokeKind) -> Self {
    self.kind = Some(kind.to_string());
    self
  }

  /// Mark the task as direct-style.
  pub fn direct(self) -> Self {
    self.with_kind(InvokeKind::Direct)
  }

  /// Add an ordering constraint.
  pub fn after(mut self, reference: impl Into<AfterRef>) -> Self {
    self.after.push(reference.into());
    self
  }
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
  }

  Ok(match OneOrMany::deserialize(deserializer)? {
    OneOrMany::One(item) => vec![item],
    OneOrMany::Many(items) => items,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_deserialize_short_keys() {
    let def: TaskDef = serde_json::from_value(json!({
      "f": "CONT.retObj",
      "a": ["a.foo", "b", 3],
      "out": ["c"],
      "type": "ret",
      "after": "prepare"
    }))
    .unwrap();

    assert!(matches!(&def.func, FuncRef::Named(name) if name == "CONT.retObj"));
    assert_eq!(
      def.inputs,
      vec![
        ArgDef::from("a.foo"),
        ArgDef::from("b"),
        ArgDef::Literal(json!(3))
      ]
    );
    assert_eq!(def.outputs, vec!["c"]);
    assert_eq!(def.kind.as_deref(), Some("ret"));
    assert!(matches!(def.after.as_slice(), [AfterRef::Name(name)] if name == "prepare"));
  }

  #[test]
  fn test_deserialize_after_list_with_position() {
    let def: TaskDef = serde_json::from_value(json!({
      "func": "add",
      "after": ["multiply", 0]
    }))
    .unwrap();

    assert!(matches!(
      def.after.as_slice(),
      [AfterRef::Name(name), AfterRef::Position(0)] if name == "multiply"
    ));
    assert!(def.inputs.is_empty());
  }

  #[test]
  fn test_handle_derived_name() {
    let f = TaskFn::direct(|_, _| Ok(serde_json::Value::Null)).named("sum");
    let def = TaskDef::new(&f, ["a", "b"], ["c"]).direct();

    assert_eq!(def.func.derived_name(), Some("sum"));
    assert!(def.func.is_handle(&f));
    assert_eq!(def.kind.as_deref(), Some("direct"));
    assert_eq!(
      serde_json::to_value(&def).unwrap(),
      json!({ "func": "sum", "inputs": ["a", "b"], "outputs": ["c"], "kind": "direct" })
    );
  }
}
