//! Task argument descriptors.
//!
//! An argument is either an expression string or a non-string JSON literal.
//! Expression strings are interpreted by the validator:
//!
//! ```json
//! ["a", "c.bar", "\"quoted text\"", "'single'", "42", "true", "null", 7, false]
//! ```
//!
//! - `"a"`, `"c.bar"` → variable paths read from the value store
//! - quoted strings, numbers, `true`, `false`, `null` → literal constants
//! - non-string JSON values → literal constants as-is

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgDef {
  /// A variable path or a literal written as text.
  Expr(String),
  /// A literal constant.
  Literal(Value),
}

impl ArgDef {
  pub fn literal(value: impl Into<Value>) -> Self {
    ArgDef::Literal(value.into())
  }
}

impl From<&str> for ArgDef {
  fn from(expr: &str) -> Self {
    ArgDef::Expr(expr.to_string())
  }
}

impl From<String> for ArgDef {
  fn from(expr: String) -> Self {
    ArgDef::Expr(expr)
  }
}

impl From<Value> for ArgDef {
  fn from(value: Value) -> Self {
    ArgDef::Literal(value)
  }
}
