//! Flow runtime errors.

use autoflow_graph::ValidationError;
use autoflow_task::TaskFailure;

/// Errors that end a flow run, or prevent one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlowError {
  /// The flow description has validation errors and must not be run.
  #[error("flow '{flow}' failed validation with {} error(s)", .errors.len())]
  Invalid {
    flow: String,
    errors: Vec<ValidationError>,
  },

  /// A task failed while every producer was required.
  #[error("task '{task}' failed: {source}")]
  Task {
    task: String,
    #[source]
    source: TaskFailure,
  },

  /// No task is running and the requested outputs can never be produced.
  #[error("no tasks running, flow will not complete, remaining tasks: {}", .remaining.join(", "))]
  Deadlock { remaining: Vec<String> },

  /// More call arguments than the flow has input parameters.
  #[error("flow takes {expected} argument(s) but {actual} were given")]
  TooManyArguments { expected: usize, actual: usize },

  /// The run ended without reporting a result.
  #[error("flow run aborted before completing")]
  Aborted,
}

impl FlowError {
  /// The task failure behind a [`FlowError::Task`].
  pub fn task_failure(&self) -> Option<&TaskFailure> {
    match self {
      FlowError::Task { source, .. } => Some(source),
      _ => None,
    }
  }
}
