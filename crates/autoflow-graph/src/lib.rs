//! Canonical flow graphs for autoflow.
//!
//! [`validate`] turns a raw [`autoflow_config::FlowDef`] into a [`Graph`]:
//! every task gets a unique name, argument descriptors become [`Arg`]s,
//! ordering constraints become task names, and unreachable variables are
//! reported as [`ValidationError`]s.

mod dependencies;
mod error;
mod graph;
mod path;
mod validate;

pub use dependencies::Dependencies;
pub use error::ValidationError;
pub use graph::{Graph, OutputMode, OutputSpec, TaskSpec};
pub use path::{Arg, VarPath, is_identifier};
pub use validate::validate;
