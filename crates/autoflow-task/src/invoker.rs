//! Task invoker.
//!
//! Calls a task function in either invocation style and reduces whatever it
//! does (report through its completion, return, fail, panic, or forget to
//! report) to exactly one [`TaskOutcome`].

use serde_json::Value;
use tokio::task::JoinError;
use tracing::{debug, instrument, warn};

use crate::error::TaskFailure;
use crate::function::{Completion, InvocationContext, TaskBody, TaskContext, TaskFn};
use crate::result::TaskOutcome;

/// Input required to invoke a task.
#[derive(Debug, Clone)]
pub struct TaskInput {
  /// Run this task belongs to.
  pub execution_id: String,
  /// Unique id of this invocation.
  pub task_id: String,
  /// Canonical task name.
  pub task_name: String,
  /// Actual argument values, already read from the value store.
  pub args: Vec<Value>,
}

/// Executes task functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskInvoker;

impl TaskInvoker {
  pub fn new() -> Self {
    Self
  }

  /// Invoke `func` and wait for its outcome.
  ///
  /// The body runs on a spawned tokio task so that a panic surfaces as a
  /// failed outcome instead of tearing down the caller.
  #[instrument(
    name = "task_invoke",
    skip(self, func, input, invocation),
    fields(
      execution_id = %input.execution_id,
      task_id = %input.task_id,
      task = %input.task_name,
      kind = %func.kind(),
    )
  )]
  pub async fn execute(
    &self,
    func: &TaskFn,
    input: TaskInput,
    invocation: InvocationContext,
  ) -> TaskOutcome {
    let task_name = input.task_name.clone();
    let ctx = TaskContext::new(
      input.execution_id,
      input.task_id,
      input.task_name,
      invocation,
    );
    let args = input.args;

    let outcome = match func.body.clone() {
      TaskBody::Direct(body) => {
        let handle = tokio::spawn(async move { body(&ctx, args) });
        match handle.await {
          Ok(Ok(value)) => TaskOutcome::succeeded(vec![value]),
          Ok(Err(error)) => TaskOutcome::failed(error),
          Err(join_error) => TaskOutcome::failed(panicked(&task_name, join_error)),
        }
      }
      TaskBody::Callback(body) => {
        let (completion, receiver) = Completion::channel();
        let handle = tokio::spawn(async move { body(ctx, args, completion) });
        match handle.await {
          Err(join_error) => TaskOutcome::failed(panicked(&task_name, join_error)),
          Ok(Err(error)) => TaskOutcome::failed(error),
          Ok(Ok(())) => match receiver.await {
            Ok(Ok(results)) => TaskOutcome::succeeded(results),
            Ok(Err(error)) => TaskOutcome::failed(error),
            Err(_) => TaskOutcome::failed(format!(
              "task '{}' dropped its completion without reporting a result",
              task_name
            )),
          },
        }
      }
    };

    match &outcome.error {
      None => debug!(results = outcome.results.len(), "task body finished"),
      Some(error) => debug!(error = %error, "task body failed"),
    }

    outcome
  }
}

fn panicked(task_name: &str, error: JoinError) -> TaskFailure {
  warn!(task = %task_name, error = %error, "task body panicked");
  TaskFailure::new(format!("task panicked: {}", error))
}
