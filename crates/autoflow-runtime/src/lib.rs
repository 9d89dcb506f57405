//! Flow runtime for autoflow.
//!
//! A [`Flow`] wraps a validated graph. Each run gets its own [`ValueStore`]
//! and a scheduler that launches every task whose inputs are present (and
//! whose `after` tasks are done), applies completions one at a time, and
//! delivers the requested outputs, a task error, or a deadlock exactly once.
//!
//! Lifecycle events are published to the flow's [`EventHub`] and to any hubs
//! attached through [`FlowConfig`].

mod collector;
mod error;
mod events;
mod execution;
mod flow;
mod store;

pub use collector::{EventCollector, EventSource};
pub use error::FlowError;
pub use events::{
  ChannelListener, EventHub, EventListener, EventPattern, FLOW_BEGIN, FLOW_COMPLETE, FLOW_ERROR,
  FlowEvent, SubscriptionId, TASK_BEGIN, TASK_COMPLETE, TaskRecord,
};
pub use execution::{FlowExecution, FlowResult};
pub use flow::{Flow, FlowConfig};
pub use store::ValueStore;
