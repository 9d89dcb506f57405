use std::fmt;
use std::str::FromStr;

use autoflow_config::{FuncRef, MODE_ALL_PRODUCERS, MODE_FIRST_SUCCESS};
use autoflow_task::{InvokeKind, Locals};
use serde::{Deserialize, Serialize};

use crate::dependencies::Dependencies;
use crate::path::{Arg, VarPath};

/// A task after validation: unique name, parsed arguments, normalized
/// ordering constraints.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSpec {
  pub name: String,
  pub func: FuncRef,
  pub invoke: InvokeKind,
  pub inputs: Vec<Arg>,
  pub outputs: Vec<VarPath>,
  /// Names of tasks that must be done before this one may fire.
  pub after: Vec<String>,
}

impl TaskSpec {
  /// Variable paths this task reads, in argument order.
  pub fn input_paths(&self) -> impl Iterator<Item = &VarPath> {
    self.inputs.iter().filter_map(Arg::as_var)
  }
}

/// Completion discipline of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
  /// Wait for every output; any task error fails the run.
  #[default]
  AllProducers,
  /// Keep the first successful producer of each output; errors are tolerated.
  FirstSuccess,
}

impl fmt::Display for OutputMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OutputMode::AllProducers => f.write_str(MODE_ALL_PRODUCERS),
      OutputMode::FirstSuccess => f.write_str(MODE_FIRST_SUCCESS),
    }
  }
}

impl FromStr for OutputMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      MODE_ALL_PRODUCERS | "all" | "finalcb" => Ok(OutputMode::AllProducers),
      MODE_FIRST_SUCCESS | "first" | "finalcbFirst" => Ok(OutputMode::FirstSuccess),
      other => Err(other.to_string()),
    }
  }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OutputSpec {
  pub outputs: Vec<VarPath>,
  pub mode: OutputMode,
}

/// A validated flow. Immutable once built; a runner only reads it.
#[derive(Debug, Clone, Serialize)]
pub struct Graph {
  pub name: String,
  pub in_params: Vec<String>,
  /// Tasks in description order.
  pub tasks: Vec<TaskSpec>,
  pub output: OutputSpec,
  #[serde(skip)]
  pub locals: Locals,
}

impl Graph {
  pub fn task(&self, name: &str) -> Option<&TaskSpec> {
    self.tasks.iter().find(|task| task.name == name)
  }

  pub fn task_index(&self, name: &str) -> Option<usize> {
    self.tasks.iter().position(|task| task.name == name)
  }

  /// Names of the tasks that write any path under `root`.
  pub fn producers_of<'a>(&'a self, root: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    self
      .tasks
      .iter()
      .filter(move |task| task.outputs.iter().any(|out| out.root() == root))
      .map(|task| task.name.as_str())
  }

  /// Whether some task writes exactly `path`.
  pub fn produces(&self, path: &VarPath) -> bool {
    self
      .tasks
      .iter()
      .any(|task| task.outputs.iter().any(|out| out == path))
  }

  /// Build the task dependency view of this graph.
  pub fn dependencies(&self) -> Dependencies {
    Dependencies::new(self)
  }
}
