//! Autoflow Config
//!
//! Serializable flow description types. These describe a flow as its author
//! wrote it: task names may be missing or clash, `after` references are
//! unresolved, argument strings are unparsed. The validator in
//! `autoflow-graph` turns a [`FlowDef`] into a canonical graph.
//!
//! Descriptions can be built in code (function handles and locals) or loaded
//! from JSON (functions referenced by name only).

mod flow;
mod input;
mod task;

pub use flow::{FlowDef, MODE_ALL_PRODUCERS, MODE_FIRST_SUCCESS, OutputDef};
pub use input::ArgDef;
pub use task::{AfterRef, FuncRef, TaskDef};
