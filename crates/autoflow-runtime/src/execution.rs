//! Flow execution.
//!
//! Each run is driven by one scheduler loop that owns the run's value store
//! and task states. Task bodies run on their own tokio tasks and report back
//! over a channel, so completions are applied strictly one at a time, and
//! events go out in that same order.

use std::collections::HashMap;
use std::time::Instant;

use autoflow_graph::{OutputMode, TaskSpec, VarPath};
use autoflow_task::{InvocationContext, TaskInput, TaskOutcome};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::error::FlowError;
use crate::events::{FlowEvent, TaskRecord};
use crate::flow::Flow;
use crate::store::ValueStore;

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct FlowResult {
  pub execution_id: String,
  /// Values of the requested output paths, in request order.
  pub values: Vec<Value>,
  /// Every variable of the run as it stood when the outputs became available.
  pub variables: ValueStore,
}

/// A handle to a flow run.
///
/// Call `.wait()` to run it and get the result.
pub struct FlowExecution {
  flow: Flow,
  execution_id: String,
  invocation: InvocationContext,
  args: Vec<Value>,
}

impl FlowExecution {
  pub(crate) fn new(flow: Flow, invocation: InvocationContext, args: Vec<Value>) -> Self {
    Self {
      flow,
      execution_id: uuid::Uuid::new_v4().to_string(),
      invocation,
      args,
    }
  }

  pub fn execution_id(&self) -> &str {
    &self.execution_id
  }

  /// Run the flow to its outcome.
  ///
  /// The scheduler keeps running in the background after the outcome is
  /// known, until every launched task has reported, so late completions
  /// still produce events.
  #[instrument(
    name = "flow_execute",
    skip(self),
    fields(
      flow = %self.flow.name(),
      execution_id = %self.execution_id,
    )
  )]
  pub async fn wait(self) -> Result<FlowResult, FlowError> {
    let graph = self.flow.graph();
    if self.args.len() > graph.in_params.len() {
      let error = FlowError::TooManyArguments {
        expected: graph.in_params.len(),
        actual: self.args.len(),
      };
      warn!(error = %error, "flow_rejected");
      return Err(error);
    }

    let (result_tx, result_rx) = oneshot::channel();
    let run = Run::new(self, result_tx);
    tokio::spawn(run.drive().in_current_span());

    result_rx.await.unwrap_or(Err(FlowError::Aborted))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
  Pending,
  Running,
  Done,
}

/// A finished task reported back to the scheduler.
struct Completed {
  index: usize,
  record: TaskRecord,
}

type Outcome = Result<FlowResult, FlowError>;

/// Mutable state of one run, owned by its scheduler loop.
struct Run {
  flow: Flow,
  execution_id: String,
  invocation: InvocationContext,
  args: Vec<Value>,
  store: ValueStore,
  states: Vec<TaskState>,
  /// FirstSuccess: output path -> task that won it.
  winners: HashMap<VarPath, String>,
  running: usize,
  /// Taken when the outcome is delivered; `None` means the run is finished.
  outcome: Option<oneshot::Sender<Outcome>>,
  completions_tx: mpsc::UnboundedSender<Completed>,
  completions_rx: mpsc::UnboundedReceiver<Completed>,
}

impl Run {
  fn new(execution: FlowExecution, outcome: oneshot::Sender<Outcome>) -> Self {
    let graph = execution.flow.graph();
    let store = ValueStore::seed(&graph.in_params, execution.args.clone());
    let states = vec![TaskState::Pending; graph.tasks.len()];
    let (completions_tx, completions_rx) = mpsc::unbounded_channel();

    Self {
      flow: execution.flow,
      execution_id: execution.execution_id,
      invocation: execution.invocation,
      args: execution.args,
      store,
      states,
      winners: HashMap::new(),
      running: 0,
      outcome: Some(outcome),
      completions_tx,
      completions_rx,
    }
  }

  fn mode(&self) -> OutputMode {
    self.flow.graph().output.mode
  }

  fn is_finished(&self) -> bool {
    self.outcome.is_none()
  }

  async fn drive(mut self) {
    info!(args = ?self.args, "flow_started");
    self.flow.emit(&FlowEvent::FlowBegin {
      execution_id: self.execution_id.clone(),
      flow: self.flow.name().to_string(),
      args: self.args.clone(),
    });

    self.fire_ready();
    self.check_finished();

    while self.running > 0 {
      let Some(completed) = self.completions_rx.recv().await else {
        break;
      };
      self.running -= 1;
      self.complete(completed);
    }

    if !self.is_finished() {
      self.finish(Err(FlowError::Aborted));
    }
    debug!("scheduler_stopped");
  }

  /// Launch every pending task whose firing rule holds, in description order.
  fn fire_ready(&mut self) {
    if self.is_finished() {
      return;
    }

    let ready: Vec<usize> = self
      .flow
      .graph()
      .tasks
      .iter()
      .enumerate()
      .filter(|(index, task)| self.states[*index] == TaskState::Pending && self.is_ready(task))
      .map(|(index, _)| index)
      .collect();

    if !ready.is_empty() {
      debug!(ready = ready.len(), "firing ready tasks");
    }
    for index in ready {
      self.launch(index);
    }
  }

  fn is_ready(&self, task: &TaskSpec) -> bool {
    let graph = self.flow.graph();

    let ordered = task.after.iter().all(|name| {
      graph
        .task_index(name)
        .is_some_and(|index| self.states[index] == TaskState::Done)
    });
    let inputs = task.input_paths().all(|path| self.store.contains(path));
    let undecided = self.mode() != OutputMode::FirstSuccess
      || task.outputs.iter().all(|path| !self.winners.contains_key(path));

    ordered && inputs && undecided
  }

  fn launch(&mut self, index: usize) {
    self.states[index] = TaskState::Running;
    self.running += 1;

    let task = &self.flow.graph().tasks[index];
    let args: Vec<Value> = task.inputs.iter().map(|arg| self.store.read_arg(arg)).collect();
    let task_id = uuid::Uuid::new_v4().to_string();
    let task_name = task.name.clone();

    info!(task = %task_name, task_id = %task_id, "task_started");
    self.flow.emit(&FlowEvent::TaskBegin {
      execution_id: self.execution_id.clone(),
      flow: self.flow.name().to_string(),
      task_id: task_id.clone(),
      task: task_name.clone(),
      args: args.clone(),
    });

    let flow = self.flow.clone();
    let invocation = self.invocation.clone();
    let completions = self.completions_tx.clone();
    let execution_id = self.execution_id.clone();

    tokio::spawn(
      async move {
        let start_time = Utc::now();
        let started = Instant::now();
        let task = &flow.graph().tasks[index];

        let outcome = match flow.resolve(task, &invocation) {
          Ok(func) => {
            let input = TaskInput {
              execution_id,
              task_id: task_id.clone(),
              task_name: task_name.clone(),
              args: args.clone(),
            };
            flow.inner.invoker.execute(&func, input, invocation).await
          }
          Err(failure) => TaskOutcome::failed(failure),
        };

        let record = TaskRecord {
          id: task_id,
          name: task_name,
          args,
          start_time,
          end_time: Utc::now(),
          elapsed: started.elapsed(),
          error: outcome.error,
          results: outcome.results,
        };
        // Scheduler outlives every launched task
        let _ = completions.send(Completed { index, record });
      }
      .in_current_span(),
    );
  }

  /// Apply one task completion.
  fn complete(&mut self, Completed { index, record }: Completed) {
    self.states[index] = TaskState::Done;

    match &record.error {
      None => info!(
        task = %record.name,
        task_id = %record.id,
        results = record.results.len(),
        "task_completed"
      ),
      Some(failure) => error!(
        task = %record.name,
        task_id = %record.id,
        error = %failure,
        "task_failed"
      ),
    }

    self.flow.emit(&FlowEvent::TaskComplete {
      execution_id: self.execution_id.clone(),
      flow: self.flow.name().to_string(),
      record: record.clone(),
    });

    if self.is_finished() {
      debug!(task = %record.name, "late completion ignored");
      return;
    }

    match (record.error, self.mode()) {
      (Some(failure), OutputMode::AllProducers) => {
        self.finish(Err(FlowError::Task {
          task: record.name,
          source: failure,
        }));
        return;
      }
      (Some(_), OutputMode::FirstSuccess) => {}
      (None, mode) => self.write_results(index, &record.name, record.results, mode),
    }

    self.fire_ready();
    self.check_finished();
  }

  fn write_results(&mut self, index: usize, task_name: &str, results: Vec<Value>, mode: OutputMode) {
    let flow = self.flow.clone();
    let outputs = &flow.graph().tasks[index].outputs;

    match mode {
      OutputMode::AllProducers => {
        for (path, value) in outputs.iter().zip(results) {
          self.store.set(path, value);
        }
      }
      OutputMode::FirstSuccess => {
        let outcome = TaskOutcome::succeeded(results);
        if !outcome.has_value() {
          debug!(task = %task_name, "task produced no value");
          return;
        }
        for (path, value) in outputs.iter().zip(outcome.results) {
          if self.winners.contains_key(path) {
            continue;
          }
          self.winners.insert(path.clone(), task_name.to_string());
          self.store.set(path, value);
        }
      }
    }
  }

  fn output_available(&self, path: &VarPath) -> bool {
    match self.mode() {
      OutputMode::AllProducers => self.store.contains(path),
      OutputMode::FirstSuccess => {
        self.winners.contains_key(path)
          || (!self.flow.graph().produces(path) && self.store.contains(path))
      }
    }
  }

  fn check_finished(&mut self) {
    if self.is_finished() {
      return;
    }

    let graph = self.flow.graph();
    if graph.output.outputs.iter().all(|path| self.output_available(path)) {
      let values = graph
        .output
        .outputs
        .iter()
        .map(|path| self.store.get(path).cloned().unwrap_or(Value::Null))
        .collect();
      let result = FlowResult {
        execution_id: self.execution_id.clone(),
        values,
        variables: self.store.clone(),
      };
      self.finish(Ok(result));
    } else if self.running == 0 {
      let remaining = graph
        .tasks
        .iter()
        .zip(&self.states)
        .filter(|(_, state)| **state == TaskState::Pending)
        .map(|(task, _)| task.name.clone())
        .collect();
      self.finish(Err(FlowError::Deadlock { remaining }));
    }
  }

  /// Deliver the run's outcome. Later calls are ignored.
  fn finish(&mut self, outcome: Outcome) {
    let Some(sender) = self.outcome.take() else {
      return;
    };

    let flow = self.flow.name().to_string();
    match &outcome {
      Ok(result) => {
        info!(values = ?result.values, "flow_completed");
        self.flow.emit(&FlowEvent::FlowComplete {
          execution_id: self.execution_id.clone(),
          flow,
          values: result.values.clone(),
        });
      }
      Err(err) => {
        match err {
          FlowError::Deadlock { .. } => error!(error = %err, "flow_deadlocked"),
          _ => error!(error = %err, "flow_failed"),
        }
        self.flow.emit(&FlowEvent::FlowFailed {
          execution_id: self.execution_id.clone(),
          flow,
          error: err.to_string(),
        });
      }
    }

    // Caller may have stopped waiting
    let _ = sender.send(outcome);
  }
}
