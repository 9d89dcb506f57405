//! Task failure and resolution errors.

use serde::{Deserialize, Serialize};

use crate::function::InvokeKind;

/// A failure reported by a task.
///
/// This is what a callback task passes to [`Completion::err`](crate::Completion::err)
/// and what a direct task returns as its `Err`. It is cheap to clone so that it
/// can travel both in lifecycle events and in the final flow error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct TaskFailure {
  pub message: String,
}

impl TaskFailure {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }

  /// Build a failure from any error, keeping its source chain in the message.
  pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
      message.push_str(": ");
      message.push_str(&cause.to_string());
      source = cause.source();
    }
    Self { message }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

impl From<&str> for TaskFailure {
  fn from(message: &str) -> Self {
    Self::new(message)
  }
}

impl From<String> for TaskFailure {
  fn from(message: String) -> Self {
    Self::new(message)
  }
}

impl From<serde_json::Error> for TaskFailure {
  fn from(error: serde_json::Error) -> Self {
    Self::from_error(&error)
  }
}

/// Errors raised while resolving a deferred function reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
  /// No lookup scope knows the name.
  #[error("function '{name}' could not be resolved in any lookup scope")]
  NotFound { name: String },

  /// The name resolved, but to a function of the other invocation style.
  #[error("function '{name}' is {actual} style but the task declares {declared} style")]
  KindMismatch {
    name: String,
    declared: InvokeKind,
    actual: InvokeKind,
  },
}

impl From<ResolveError> for TaskFailure {
  fn from(error: ResolveError) -> Self {
    Self::new(error.to_string())
  }
}
