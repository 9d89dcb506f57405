//! Normalized task outcome.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TaskFailure;

/// The single `(error, results)` pair produced by every task invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
  /// Failure reported by the task, if any.
  pub error: Option<TaskFailure>,
  /// Ordered results. Empty on failure.
  pub results: Vec<Value>,
}

impl TaskOutcome {
  pub fn succeeded(results: Vec<Value>) -> Self {
    Self {
      error: None,
      results,
    }
  }

  pub fn failed(error: impl Into<TaskFailure>) -> Self {
    Self {
      error: Some(error.into()),
      results: Vec::new(),
    }
  }

  pub fn is_error(&self) -> bool {
    self.error.is_some()
  }

  /// No error and a first result that is not `null`.
  ///
  /// Falsy values such as `0`, `""` or `false` still count.
  pub fn has_value(&self) -> bool {
    self.error.is_none() && self.results.first().is_some_and(|v| !v.is_null())
  }
}
