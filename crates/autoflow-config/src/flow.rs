use autoflow_task::Locals;
use serde::{Deserialize, Serialize};

use crate::task::TaskDef;

/// Completion discipline names accepted in [`OutputDef::mode`].
pub const MODE_ALL_PRODUCERS: &str = "all_producers";
pub const MODE_FIRST_SUCCESS: &str = "first_success";

/// The requested results of a flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputDef {
  /// Output variable paths, in the order they are delivered.
  #[serde(default, alias = "a")]
  pub outputs: Vec<String>,

  /// `all_producers` (default) or `first_success`. The short forms
  /// `finalcb` and `finalcbFirst` are accepted too.
  #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
  pub mode: Option<String>,
}

impl OutputDef {
  /// Wait for every requested path.
  pub fn all<I, S>(outputs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      outputs: outputs.into_iter().map(Into::into).collect(),
      mode: None,
    }
  }

  /// Keep only the first successful producer of each path.
  pub fn first_success<I, S>(outputs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      outputs: outputs.into_iter().map(Into::into).collect(),
      mode: Some(MODE_FIRST_SUCCESS.to_string()),
    }
  }
}

/// A raw flow description, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowDef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,

  /// Input parameter names, bound positionally to call arguments.
  #[serde(default, alias = "inParams")]
  pub in_params: Vec<String>,

  #[serde(default)]
  pub tasks: Vec<TaskDef>,

  #[serde(default, alias = "outTask")]
  pub output: OutputDef,

  /// Functions available to tasks that reference theirs by name.
  #[serde(skip)]
  pub locals: Locals,
}

impl FlowDef {
  pub fn new<I, S>(in_params: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      in_params: in_params.into_iter().map(Into::into).collect(),
      ..Self::default()
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn task(mut self, task: TaskDef) -> Self {
    self.tasks.push(task);
    self
  }

  pub fn output(mut self, output: OutputDef) -> Self {
    self.output = output;
    self
  }

  pub fn with_locals(mut self, locals: Locals) -> Self {
    self.locals = locals;
    self
  }
}
