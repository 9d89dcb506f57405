//! Task functions and the context they run in.
//!
//! A task function comes in one of two invocation styles:
//!
//! - **callback**: receives its arguments plus a [`Completion`] and reports its
//!   results through it, possibly long after the body returned (the body may
//!   spawn async work and move the completion into it).
//! - **direct**: receives its arguments and returns a single value or fails.
//!
//! Both styles receive a [`TaskContext`] carrying the caller-supplied
//! [`InvocationContext`] of the run.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::TaskFailure;

/// How a task function is called and how it reports results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeKind {
  /// Trailing completion handle receiving `(error, ...results)`.
  #[default]
  #[serde(alias = "cb")]
  Callback,
  /// Returns one value or fails.
  #[serde(alias = "ret")]
  Direct,
}

impl fmt::Display for InvokeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      InvokeKind::Callback => f.write_str("callback"),
      InvokeKind::Direct => f.write_str("direct"),
    }
  }
}

impl FromStr for InvokeKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "callback" | "cb" => Ok(InvokeKind::Callback),
      "direct" | "ret" | "returns" => Ok(InvokeKind::Direct),
      other => Err(other.to_string()),
    }
  }
}

/// Caller state shared with every task of one run.
///
/// Cloning is cheap; all clones point at the same state.
#[derive(Clone, Default)]
pub struct InvocationContext {
  state: Option<Arc<dyn Any + Send + Sync>>,
}

impl InvocationContext {
  pub fn new<T: Any + Send + Sync>(state: T) -> Self {
    Self {
      state: Some(Arc::new(state)),
    }
  }

  pub fn from_arc(state: Arc<dyn Any + Send + Sync>) -> Self {
    Self { state: Some(state) }
  }

  /// A context without caller state.
  pub fn empty() -> Self {
    Self::default()
  }

  /// Borrow the caller state if it is a `T`.
  pub fn get<T: Any>(&self) -> Option<&T> {
    self.state.as_deref()?.downcast_ref::<T>()
  }

  pub fn is_empty(&self) -> bool {
    self.state.is_none()
  }
}

impl fmt::Debug for InvocationContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InvocationContext")
      .field("has_state", &self.state.is_some())
      .finish()
  }
}

/// Identity of the running task, handed to its function.
#[derive(Debug, Clone)]
pub struct TaskContext {
  pub execution_id: String,
  pub task_id: String,
  pub task_name: String,
  invocation: InvocationContext,
}

impl TaskContext {
  pub fn new(
    execution_id: impl Into<String>,
    task_id: impl Into<String>,
    task_name: impl Into<String>,
    invocation: InvocationContext,
  ) -> Self {
    Self {
      execution_id: execution_id.into(),
      task_id: task_id.into(),
      task_name: task_name.into(),
      invocation,
    }
  }

  pub fn invocation(&self) -> &InvocationContext {
    &self.invocation
  }

  /// Shorthand for `self.invocation().get::<T>()`.
  pub fn state<T: Any>(&self) -> Option<&T> {
    self.invocation.get::<T>()
  }
}

/// Completion handle given to callback-style tasks.
///
/// Every method consumes the handle, so a task reports at most once. Dropping
/// it without reporting is treated as a failure by the invoker.
#[derive(Debug)]
pub struct Completion {
  sender: oneshot::Sender<Result<Vec<Value>, TaskFailure>>,
}

impl Completion {
  pub(crate) fn channel() -> (Self, oneshot::Receiver<Result<Vec<Value>, TaskFailure>>) {
    let (sender, receiver) = oneshot::channel();
    (Self { sender }, receiver)
  }

  /// Report success with the given ordered results. An empty list means
  /// "completed without a value".
  pub fn ok<I>(self, results: I)
  where
    I: IntoIterator<Item = Value>,
  {
    self.finish(Ok(results.into_iter().collect()));
  }

  /// Report failure.
  pub fn err(self, error: impl Into<TaskFailure>) {
    self.finish(Err(error.into()));
  }

  pub fn finish(self, outcome: Result<Vec<Value>, TaskFailure>) {
    // The invoker may already be gone if the task body failed synchronously.
    let _ = self.sender.send(outcome);
  }
}

pub type CallbackBody =
  dyn Fn(TaskContext, Vec<Value>, Completion) -> Result<(), TaskFailure> + Send + Sync;

pub type DirectBody = dyn Fn(&TaskContext, Vec<Value>) -> Result<Value, TaskFailure> + Send + Sync;

#[derive(Clone)]
pub(crate) enum TaskBody {
  Callback(Arc<CallbackBody>),
  Direct(Arc<DirectBody>),
}

/// A task function handle.
///
/// Handles are compared by identity ([`TaskFn::same_as`]): clones of one
/// handle are the same function, two separately built handles are not.
#[derive(Clone)]
pub struct TaskFn {
  name: Option<String>,
  pub(crate) body: TaskBody,
}

impl TaskFn {
  /// Wrap a callback-style body.
  ///
  /// An `Err` returned by the body itself is the synchronous failure path
  /// (the equivalent of throwing before completing).
  pub fn callback<F>(body: F) -> Self
  where
    F: Fn(TaskContext, Vec<Value>, Completion) -> Result<(), TaskFailure> + Send + Sync + 'static,
  {
    Self {
      name: None,
      body: TaskBody::Callback(Arc::new(body)),
    }
  }

  /// Wrap a direct-style body.
  pub fn direct<F>(body: F) -> Self
  where
    F: Fn(&TaskContext, Vec<Value>) -> Result<Value, TaskFailure> + Send + Sync + 'static,
  {
    Self {
      name: None,
      body: TaskBody::Direct(Arc::new(body)),
    }
  }

  /// Give the function its own name, used to derive task names.
  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn kind(&self) -> InvokeKind {
    match self.body {
      TaskBody::Callback(_) => InvokeKind::Callback,
      TaskBody::Direct(_) => InvokeKind::Direct,
    }
  }

  /// Whether both handles wrap the same function body.
  pub fn same_as(&self, other: &TaskFn) -> bool {
    self.body_ptr() == other.body_ptr()
  }

  fn body_ptr(&self) -> *const () {
    match &self.body {
      TaskBody::Callback(body) => Arc::as_ptr(body) as *const (),
      TaskBody::Direct(body) => Arc::as_ptr(body) as *const (),
    }
  }
}

impl fmt::Debug for TaskFn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskFn")
      .field("name", &self.name)
      .field("kind", &self.kind())
      .finish()
  }
}
