use autoflow_task::InvokeKind;
use thiserror::Error;

/// A structural problem found while validating a flow description.
///
/// Validation collects these instead of failing; a graph is only safe to run
/// when the list is empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("duplicate task name '{name}' (task {index} renamed to '{renamed}')")]
  DuplicateTaskName {
    name: String,
    index: usize,
    renamed: String,
  },

  #[error("duplicate input parameter '{name}'")]
  DuplicateInParam { name: String },

  #[error("input parameter '{name}' is not a valid identifier")]
  InvalidInParam { name: String },

  #[error("task '{task}' has an empty function name")]
  EmptyFunctionName { task: String },

  #[error("task '{task}' has unknown invocation kind '{kind}'")]
  UnknownInvokeKind { task: String, kind: String },

  #[error("task '{task}' is declared {declared} style but its function is {actual} style")]
  InvokeKindMismatch {
    task: String,
    declared: InvokeKind,
    actual: InvokeKind,
  },

  #[error("malformed variable path '{path}' in {location}")]
  MalformedPath { location: String, path: String },

  #[error("task '{task}' runs after unknown task '{reference}'")]
  UnknownAfterTask { task: String, reference: String },

  #[error("task '{task}' runs after function '{function}' which no task uses")]
  UnknownAfterFunction { task: String, function: String },

  #[error("task '{task}' runs after position {position} but the flow has {len} tasks")]
  AfterPositionOutOfRange {
    task: String,
    position: usize,
    len: usize,
  },

  #[error("unknown output mode '{mode}'")]
  UnknownMode { mode: String },

  #[error("task '{task}' reads '{variable}' which is neither an input parameter nor a task output")]
  UnresolvedInput { task: String, variable: String },

  #[error("flow output '{variable}' is neither an input parameter nor a task output")]
  UnresolvedOutput { variable: String },
}
