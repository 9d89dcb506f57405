//! Late-bound function lookup.
//!
//! Tasks may name their function instead of holding a handle. The name is
//! resolved once per invocation against an ordered list of lookup scopes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ResolveError;
use crate::function::{InvocationContext, InvokeKind, TaskFn};

/// A lookup scope for deferred function names.
pub trait Resolver: Send + Sync {
  /// Look up `name`. Returning `None` lets the next scope try.
  fn resolve(&self, name: &str, invocation: &InvocationContext) -> Option<TaskFn>;
}

impl<F> Resolver for F
where
  F: Fn(&str, &InvocationContext) -> Option<TaskFn> + Send + Sync,
{
  fn resolve(&self, name: &str, invocation: &InvocationContext) -> Option<TaskFn> {
    self(name, invocation)
  }
}

/// A plain name → function table.
///
/// Names may be dotted (`CONT.retObj`); [`Locals::namespace`] mounts a whole
/// table under such a prefix.
#[derive(Clone, Default)]
pub struct Locals {
  functions: BTreeMap<String, TaskFn>,
}

impl Locals {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, name: impl Into<String>, func: TaskFn) -> Option<TaskFn> {
    self.functions.insert(name.into(), func)
  }

  /// Builder form of [`Locals::insert`].
  pub fn with(mut self, name: impl Into<String>, func: TaskFn) -> Self {
    self.insert(name, func);
    self
  }

  /// Mount every entry of `scope` as `prefix.<name>`.
  pub fn namespace(mut self, prefix: &str, scope: Locals) -> Self {
    for (name, func) in scope.functions {
      self.functions.insert(format!("{}.{}", prefix, name), func);
    }
    self
  }

  pub fn get(&self, name: &str) -> Option<&TaskFn> {
    self.functions.get(name)
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.functions.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.functions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.functions.is_empty()
  }
}

impl Resolver for Locals {
  fn resolve(&self, name: &str, _invocation: &InvocationContext) -> Option<TaskFn> {
    self.get(name).cloned()
  }
}

impl fmt::Debug for Locals {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_set().entries(self.functions.keys()).finish()
  }
}

/// Resolve `name` against `scopes` in order.
///
/// The first scope that knows the name wins. The resolved function must be of
/// the `declared` invocation style.
pub fn resolve_function(
  name: &str,
  declared: InvokeKind,
  scopes: &[Arc<dyn Resolver>],
  invocation: &InvocationContext,
) -> Result<TaskFn, ResolveError> {
  let func = scopes
    .iter()
    .find_map(|scope| scope.resolve(name, invocation))
    .ok_or_else(|| ResolveError::NotFound {
      name: name.to_string(),
    })?;

  if func.kind() != declared {
    return Err(ResolveError::KindMismatch {
      name: name.to_string(),
      declared,
      actual: func.kind(),
    });
  }

  Ok(func)
}
