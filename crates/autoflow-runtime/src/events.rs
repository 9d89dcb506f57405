//! Flow lifecycle events and the hub that delivers them.
//!
//! Events are emitted by the scheduler of each run, in the same total order
//! in which it processes completions. Consumers subscribe to an [`EventHub`]
//! with an [`EventPattern`]; they may persist, stream or simply collect them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use autoflow_task::TaskFailure;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

pub const FLOW_BEGIN: &str = "flow.begin";
pub const FLOW_COMPLETE: &str = "flow.complete";
pub const FLOW_ERROR: &str = "flow.error";
pub const TASK_BEGIN: &str = "task.begin";
pub const TASK_COMPLETE: &str = "task.complete";

/// One finished task invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
  /// Unique id of this invocation.
  pub id: String,
  pub name: String,
  /// Actual argument values the task was called with.
  pub args: Vec<Value>,
  pub start_time: DateTime<Utc>,
  pub end_time: DateTime<Utc>,
  pub elapsed: Duration,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<TaskFailure>,
  pub results: Vec<Value>,
}

/// Events emitted during a flow run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FlowEvent {
  /// A run has started.
  FlowBegin {
    execution_id: String,
    flow: String,
    args: Vec<Value>,
  },

  /// A task has been launched.
  TaskBegin {
    execution_id: String,
    flow: String,
    task_id: String,
    task: String,
    args: Vec<Value>,
  },

  /// A task has finished, successfully or not.
  TaskComplete {
    execution_id: String,
    flow: String,
    record: TaskRecord,
  },

  /// A run delivered its outputs.
  FlowComplete {
    execution_id: String,
    flow: String,
    values: Vec<Value>,
  },

  /// A run failed.
  FlowFailed {
    execution_id: String,
    flow: String,
    error: String,
  },
}

impl FlowEvent {
  /// Dotted event name, e.g. `task.complete`.
  pub fn name(&self) -> &'static str {
    match self {
      FlowEvent::FlowBegin { .. } => FLOW_BEGIN,
      FlowEvent::TaskBegin { .. } => TASK_BEGIN,
      FlowEvent::TaskComplete { .. } => TASK_COMPLETE,
      FlowEvent::FlowComplete { .. } => FLOW_COMPLETE,
      FlowEvent::FlowFailed { .. } => FLOW_ERROR,
    }
  }

  pub fn execution_id(&self) -> &str {
    match self {
      FlowEvent::FlowBegin { execution_id, .. }
      | FlowEvent::TaskBegin { execution_id, .. }
      | FlowEvent::TaskComplete { execution_id, .. }
      | FlowEvent::FlowComplete { execution_id, .. }
      | FlowEvent::FlowFailed { execution_id, .. } => execution_id,
    }
  }

  pub fn flow(&self) -> &str {
    match self {
      FlowEvent::FlowBegin { flow, .. }
      | FlowEvent::TaskBegin { flow, .. }
      | FlowEvent::TaskComplete { flow, .. }
      | FlowEvent::FlowComplete { flow, .. }
      | FlowEvent::FlowFailed { flow, .. } => flow,
    }
  }

  /// The task record of a `task.complete` event.
  pub fn record(&self) -> Option<&TaskRecord> {
    match self {
      FlowEvent::TaskComplete { record, .. } => Some(record),
      _ => None,
    }
  }
}

/// Which event names a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPattern {
  /// `*`
  All,
  /// `task.*` matches `task.begin` and `task.complete`.
  Prefix(String),
  Exact(String),
}

impl EventPattern {
  pub fn parse(pattern: &str) -> Self {
    if pattern == "*" {
      EventPattern::All
    } else if let Some(prefix) = pattern.strip_suffix(".*") {
      EventPattern::Prefix(prefix.to_string())
    } else {
      EventPattern::Exact(pattern.to_string())
    }
  }

  pub fn matches(&self, name: &str) -> bool {
    match self {
      EventPattern::All => true,
      EventPattern::Prefix(prefix) => name
        .strip_prefix(prefix.as_str())
        .is_some_and(|rest| rest.starts_with('.')),
      EventPattern::Exact(exact) => exact == name,
    }
  }
}

impl From<&str> for EventPattern {
  fn from(pattern: &str) -> Self {
    EventPattern::parse(pattern)
  }
}

impl From<String> for EventPattern {
  fn from(pattern: String) -> Self {
    EventPattern::parse(&pattern)
  }
}

/// Receives flow events.
///
/// Listeners are called on the scheduler of the emitting run and should
/// return quickly; hand the event off to a channel for heavier work.
pub trait EventListener: Send + Sync {
  fn on_event(&self, event: &FlowEvent);
}

impl<F> EventListener for F
where
  F: Fn(&FlowEvent) + Send + Sync,
{
  fn on_event(&self, event: &FlowEvent) {
    self(event)
  }
}

/// A listener that forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
  // Unbounded so a slow consumer never stalls a scheduler.
  sender: mpsc::UnboundedSender<FlowEvent>,
}

impl ChannelListener {
  pub fn new(sender: mpsc::UnboundedSender<FlowEvent>) -> Self {
    Self { sender }
  }
}

impl EventListener for ChannelListener {
  fn on_event(&self, event: &FlowEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event.clone());
  }
}

/// Handle returned by [`EventHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
  id: SubscriptionId,
  pattern: EventPattern,
  listener: Arc<dyn EventListener>,
}

/// A registry of event listeners.
///
/// Safe to subscribe to and emit from concurrently. Every [`crate::Flow`] owns
/// one; further hubs (including [`EventHub::global`]) can be attached through
/// [`crate::FlowConfig`].
#[derive(Default)]
pub struct EventHub {
  subscriptions: RwLock<Vec<Subscription>>,
  next_id: AtomicU64,
}

impl EventHub {
  pub fn new() -> Self {
    Self::default()
  }

  /// The process-wide hub. Created on first use, never torn down.
  pub fn global() -> Arc<EventHub> {
    static GLOBAL: OnceLock<Arc<EventHub>> = OnceLock::new();
    GLOBAL.get_or_init(|| Arc::new(EventHub::new())).clone()
  }

  pub fn subscribe(
    &self,
    pattern: impl Into<EventPattern>,
    listener: impl EventListener + 'static,
  ) -> SubscriptionId {
    self.subscribe_arc(pattern.into(), Arc::new(listener))
  }

  pub fn subscribe_arc(
    &self,
    pattern: EventPattern,
    listener: Arc<dyn EventListener>,
  ) -> SubscriptionId {
    let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
    self
      .subscriptions
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .push(Subscription {
        id,
        pattern,
        listener,
      });
    id
  }

  /// Remove a subscription. Returns whether it existed.
  pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
    let mut subscriptions = self.subscriptions.write().unwrap_or_else(|e| e.into_inner());
    let before = subscriptions.len();
    subscriptions.retain(|subscription| subscription.id != id);
    subscriptions.len() != before
  }

  /// Deliver `event` to every matching listener, in subscription order.
  pub fn emit(&self, event: &FlowEvent) {
    // Listeners run outside the lock so they may (un)subscribe themselves.
    let listeners: Vec<Arc<dyn EventListener>> = self
      .subscriptions
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .iter()
      .filter(|subscription| subscription.pattern.matches(event.name()))
      .map(|subscription| subscription.listener.clone())
      .collect();

    for listener in listeners {
      listener.on_event(event);
    }
  }

  pub fn listener_count(&self) -> usize {
    self
      .subscriptions
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .len()
  }
}

impl fmt::Debug for EventHub {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EventHub")
      .field("listeners", &self.listener_count())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;

  fn flow_begin() -> FlowEvent {
    FlowEvent::FlowBegin {
      execution_id: "exec-1".to_string(),
      flow: "calc".to_string(),
      args: vec![],
    }
  }

  fn flow_failed() -> FlowEvent {
    FlowEvent::FlowFailed {
      execution_id: "exec-1".to_string(),
      flow: "calc".to_string(),
      error: "boom".to_string(),
    }
  }

  #[test]
  fn test_patterns() {
    assert!(EventPattern::parse("*").matches("task.complete"));
    assert!(EventPattern::parse("task.*").matches("task.begin"));
    assert!(!EventPattern::parse("task.*").matches("flow.begin"));
    assert!(!EventPattern::parse("task.*").matches("taskx.begin"));
    assert!(EventPattern::parse("flow.error").matches("flow.error"));
    assert!(!EventPattern::parse("flow.error").matches("flow.errors"));
  }

  #[test]
  fn test_emit_filters_by_pattern() {
    let hub = EventHub::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    hub.subscribe("flow.*", move |event: &FlowEvent| {
      sink.lock().unwrap().push(event.name());
    });
    let sink = seen.clone();
    hub.subscribe("flow.error", move |event: &FlowEvent| {
      sink.lock().unwrap().push(event.name());
    });

    hub.emit(&flow_begin());
    hub.emit(&flow_failed());

    assert_eq!(
      *seen.lock().unwrap(),
      vec!["flow.begin", "flow.error", "flow.error"]
    );
  }

  #[test]
  fn test_unsubscribe() {
    let hub = EventHub::new();
    let id = hub.subscribe("*", |_: &FlowEvent| {});

    assert_eq!(hub.listener_count(), 1);
    assert!(hub.unsubscribe(id));
    assert!(!hub.unsubscribe(id));
    assert_eq!(hub.listener_count(), 0);
  }

  #[tokio::test]
  async fn test_channel_listener() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let hub = EventHub::new();
    hub.subscribe("*", ChannelListener::new(tx));

    hub.emit(&flow_begin());

    let event = rx.recv().await.unwrap();
    assert_eq!(event, flow_begin());
    assert_eq!(event.execution_id(), "exec-1");
    assert_eq!(event.flow(), "calc");
  }

  #[test]
  fn test_event_serializes_with_tag() {
    let value = serde_json::to_value(flow_failed()).unwrap();
    assert_eq!(value["event"], "flow_failed");
    assert_eq!(value["error"], "boom");
  }

  #[test]
  fn test_global_hub_is_shared() {
    assert!(Arc::ptr_eq(&EventHub::global(), &EventHub::global()));
  }
}
