//! Flow facade.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use autoflow_config::{FlowDef, FuncRef};
use autoflow_graph::{Graph, TaskSpec, validate};
use autoflow_task::{
  InvocationContext, Resolver, TaskFailure, TaskFn, TaskInvoker, resolve_function,
};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::collector::EventSource;
use crate::error::FlowError;
use crate::events::{EventHub, FlowEvent};
use crate::execution::FlowExecution;

/// Configuration for a flow.
#[derive(Clone, Default)]
pub struct FlowConfig {
  /// Extra hubs that receive this flow's events besides its own.
  pub event_hubs: Vec<Arc<EventHub>>,
  /// Scopes for deferred function names, searched after the flow's locals.
  pub resolvers: Vec<Arc<dyn Resolver>>,
}

impl FlowConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_event_hub(mut self, hub: Arc<EventHub>) -> Self {
    self.event_hubs.push(hub);
    self
  }

  /// Also publish to the process-wide hub.
  pub fn with_global_events(self) -> Self {
    self.with_event_hub(EventHub::global())
  }

  pub fn with_resolver(mut self, resolver: impl Resolver + 'static) -> Self {
    self.resolvers.push(Arc::new(resolver));
    self
  }
}

impl fmt::Debug for FlowConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FlowConfig")
      .field("event_hubs", &self.event_hubs)
      .field("resolvers", &self.resolvers.len())
      .finish()
  }
}

/// An invokable, validated flow.
///
/// Cheap to clone; clones share the graph and the event hub. Any number of
/// runs may execute concurrently.
#[derive(Clone)]
pub struct Flow {
  pub(crate) inner: Arc<FlowInner>,
}

pub(crate) struct FlowInner {
  pub(crate) graph: Graph,
  pub(crate) invoker: TaskInvoker,
  events: Arc<EventHub>,
  extra_hubs: Vec<Arc<EventHub>>,
  /// The graph's locals first, then the configured resolvers.
  scopes: Vec<Arc<dyn Resolver>>,
}

impl Flow {
  /// Wrap an already validated graph.
  pub fn new(graph: Graph) -> Self {
    Self::with_config(graph, FlowConfig::default())
  }

  pub fn with_config(graph: Graph, config: FlowConfig) -> Self {
    let mut scopes: Vec<Arc<dyn Resolver>> = Vec::with_capacity(config.resolvers.len() + 1);
    scopes.push(Arc::new(graph.locals.clone()));
    scopes.extend(config.resolvers);

    Self {
      inner: Arc::new(FlowInner {
        graph,
        invoker: TaskInvoker::new(),
        events: Arc::new(EventHub::new()),
        extra_hubs: config.event_hubs,
        scopes,
      }),
    }
  }

  /// Validate `def` and build a flow from it.
  ///
  /// # Errors
  /// Returns [`FlowError::Invalid`] carrying every validation error.
  pub fn build(def: FlowDef) -> Result<Self, FlowError> {
    Self::build_with_config(def, FlowConfig::default())
  }

  pub fn build_with_config(def: FlowDef, config: FlowConfig) -> Result<Self, FlowError> {
    let (graph, errors) = validate(def);
    if !errors.is_empty() {
      return Err(FlowError::Invalid {
        flow: graph.name,
        errors,
      });
    }
    Ok(Self::with_config(graph, config))
  }

  pub fn graph(&self) -> &Graph {
    &self.inner.graph
  }

  pub fn name(&self) -> &str {
    &self.inner.graph.name
  }

  /// This flow's own event hub.
  pub fn events(&self) -> &EventHub {
    &self.inner.events
  }

  /// Prepare a run. Call `.wait()` on the handle to execute it.
  pub fn execute(&self, invocation: InvocationContext, args: Vec<Value>) -> FlowExecution {
    FlowExecution::new(self.clone(), invocation, args)
  }

  /// Run the flow and return the requested output values in order.
  pub async fn invoke(
    &self,
    invocation: InvocationContext,
    args: Vec<Value>,
  ) -> Result<Vec<Value>, FlowError> {
    self
      .execute(invocation, args)
      .wait()
      .await
      .map(|result| result.values)
  }

  /// Run the flow in the background and hand the outcome to `callback`,
  /// exactly once.
  ///
  /// Must be called from within a tokio runtime.
  pub fn call<F>(&self, invocation: InvocationContext, args: Vec<Value>, callback: F) -> JoinHandle<()>
  where
    F: FnOnce(Result<Vec<Value>, FlowError>) + Send + 'static,
  {
    let execution = self.execute(invocation, args);
    tokio::spawn(async move {
      callback(execution.wait().await.map(|result| result.values));
    })
  }

  /// Find the function a task runs for this invocation.
  ///
  /// Resolvers are caller code; a panicking one fails the task like a
  /// panicking task body does.
  pub(crate) fn resolve(
    &self,
    task: &TaskSpec,
    invocation: &InvocationContext,
  ) -> Result<TaskFn, TaskFailure> {
    match &task.func {
      FuncRef::Handle(func) => Ok(func.clone()),
      FuncRef::Named(name) => panic::catch_unwind(AssertUnwindSafe(|| {
        resolve_function(name, task.invoke, &self.inner.scopes, invocation)
          .map_err(TaskFailure::from)
      }))
      .unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        warn!(task = %task.name, function = %name, error = %message, "resolver panicked");
        Err(TaskFailure::new(format!(
          "resolving function '{}' panicked: {}",
          name, message
        )))
      }),
    }
  }

  pub(crate) fn emit(&self, event: &FlowEvent) {
    self.inner.events.emit(event);
    for hub in &self.inner.extra_hubs {
      hub.emit(event);
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}

impl EventSource for Flow {
  fn event_hub(&self) -> &EventHub {
    self.events()
  }
}

impl fmt::Debug for Flow {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Flow")
      .field("graph", &self.inner.graph)
      .finish_non_exhaustive()
  }
}
