//! Task functions and invocation for autoflow.
//!
//! This crate provides:
//! - [`TaskFn`], a task function handle in callback or direct style
//! - [`TaskInvoker`], which runs a function and reduces it to one [`TaskOutcome`]
//! - [`Resolver`] and [`Locals`] for tasks that name their function instead of
//!   holding it

mod error;
mod function;
mod invoker;
mod resolver;
mod result;

pub use error::{ResolveError, TaskFailure};
pub use function::{
  CallbackBody, Completion, DirectBody, InvocationContext, InvokeKind, TaskContext, TaskFn,
};
pub use invoker::{TaskInput, TaskInvoker};
pub use resolver::{Locals, Resolver, resolve_function};
pub use result::TaskOutcome;
