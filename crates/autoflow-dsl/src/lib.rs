//! Signature strings for autoflow.
//!
//! Compiles terse descriptions such as `"a, b, cb -> err, c"` into the raw
//! [`autoflow_config::FlowDef`] the validator consumes:
//!
//! ```ignore
//! let def = autoflow_dsl::flow("multiplyAdd", "a, b, cb -> err, m, s")
//!   .task(&multiply, "a, b, cb -> err, m")
//!   .task(&add, "m, a, cb -> err, s")
//!   .build()?;
//! ```

mod builder;
mod error;
mod signature;

pub use builder::{FlowBuilder, TaskOptions, flow, select_first};
pub use error::SignatureError;
pub use signature::{FlowSignature, TaskSignature, parse_flow_signature, parse_task_signature};
