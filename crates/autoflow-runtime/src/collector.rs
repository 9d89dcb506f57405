use std::sync::{Arc, Mutex};

use crate::events::{EventHub, EventPattern, FlowEvent, SubscriptionId};

/// Something events can be captured from.
pub trait EventSource {
  fn event_hub(&self) -> &EventHub;
}

impl EventSource for EventHub {
  fn event_hub(&self) -> &EventHub {
    self
  }
}

impl EventSource for Arc<EventHub> {
  fn event_hub(&self) -> &EventHub {
    self
  }
}

/// Buffers matching events in arrival order for later inspection.
#[derive(Debug, Clone, Default)]
pub struct EventCollector {
  events: Arc<Mutex<Vec<FlowEvent>>>,
}

impl EventCollector {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start collecting events from `source` whose name matches `pattern`.
  pub fn capture(
    &self,
    source: &impl EventSource,
    pattern: impl Into<EventPattern>,
  ) -> SubscriptionId {
    let events = self.events.clone();
    source
      .event_hub()
      .subscribe(pattern, move |event: &FlowEvent| {
        events
          .lock()
          .unwrap_or_else(|e| e.into_inner())
          .push(event.clone());
      })
  }

  /// Collected events, oldest first.
  pub fn list(&self) -> Vec<FlowEvent> {
    self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }

  /// Names of the collected events, oldest first.
  pub fn names(&self) -> Vec<&'static str> {
    self
      .events
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .iter()
      .map(FlowEvent::name)
      .collect()
  }

  pub fn clear(&self) {
    self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
  }

  pub fn len(&self) -> usize {
    self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn begin(flow: &str) -> FlowEvent {
    FlowEvent::FlowBegin {
      execution_id: "exec".to_string(),
      flow: flow.to_string(),
      args: vec![],
    }
  }

  #[test]
  fn test_capture_in_arrival_order() {
    let hub = EventHub::new();
    let collector = EventCollector::new();
    collector.capture(&hub, "flow.begin");

    hub.emit(&begin("one"));
    hub.emit(&begin("two"));

    let flows: Vec<String> = collector.list().iter().map(|e| e.flow().to_string()).collect();
    assert_eq!(flows, vec!["one", "two"]);
    assert_eq!(collector.names(), vec!["flow.begin", "flow.begin"]);

    collector.clear();
    assert!(collector.is_empty());
  }

  #[test]
  fn test_capture_from_several_sources() {
    let first = Arc::new(EventHub::new());
    let second = EventHub::new();
    let collector = EventCollector::new();
    collector.capture(&first, "*");
    collector.capture(&second, "*");

    first.emit(&begin("a"));
    second.emit(&begin("b"));

    assert_eq!(collector.len(), 2);
  }
}
