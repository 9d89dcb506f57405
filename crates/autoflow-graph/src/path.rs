//! Variable paths and argument descriptors.

use std::fmt;
use std::str::FromStr;

use autoflow_config::ArgDef;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// A top-level identifier optionally followed by dotted field accesses,
/// e.g. `c` or `c.bar`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarPath {
  root: String,
  fields: Vec<String>,
}

impl VarPath {
  /// Parse a path. Returns `None` when any segment is not an identifier.
  pub fn parse(text: &str) -> Option<Self> {
    let mut segments = text.trim().split('.');
    let root = segments.next().filter(|s| is_identifier(s))?;
    let fields = segments
      .map(|s| is_identifier(s).then(|| s.to_string()))
      .collect::<Option<Vec<_>>>()?;

    Some(Self {
      root: root.to_string(),
      fields,
    })
  }

  pub fn root(&self) -> &str {
    &self.root
  }

  pub fn fields(&self) -> &[String] {
    &self.fields
  }

  pub fn is_nested(&self) -> bool {
    !self.fields.is_empty()
  }
}

/// `[A-Za-z_$][A-Za-z0-9_$]*`
pub fn is_identifier(text: &str) -> bool {
  let mut chars = text.chars();
  match chars.next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
    _ => return false,
  }
  chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

impl fmt::Display for VarPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.root)?;
    for field in &self.fields {
      write!(f, ".{}", field)?;
    }
    Ok(())
  }
}

impl FromStr for VarPath {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    VarPath::parse(s).ok_or_else(|| s.to_string())
  }
}

impl Serialize for VarPath {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// A canonical task argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Arg {
  Var(VarPath),
  Literal(Value),
}

impl Arg {
  /// Interpret an argument descriptor. The error carries the offending text.
  pub fn parse(def: &ArgDef) -> Result<Self, String> {
    match def {
      ArgDef::Literal(value) => Ok(Arg::Literal(value.clone())),
      ArgDef::Expr(expr) => parse_expr(expr),
    }
  }

  pub fn as_var(&self) -> Option<&VarPath> {
    match self {
      Arg::Var(path) => Some(path),
      Arg::Literal(_) => None,
    }
  }
}

fn parse_expr(expr: &str) -> Result<Arg, String> {
  let text = expr.trim();

  if let Some(quoted) = unquote(text) {
    return Ok(Arg::Literal(Value::String(quoted.to_string())));
  }

  match text {
    "true" => return Ok(Arg::Literal(Value::Bool(true))),
    "false" => return Ok(Arg::Literal(Value::Bool(false))),
    "null" => return Ok(Arg::Literal(Value::Null)),
    _ => {}
  }

  if text.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
    return serde_json::from_str::<serde_json::Number>(text)
      .map(|n| Arg::Literal(Value::Number(n)))
      .map_err(|_| expr.to_string());
  }

  VarPath::parse(text)
    .map(Arg::Var)
    .ok_or_else(|| expr.to_string())
}

fn unquote(text: &str) -> Option<&str> {
  ['"', '\''].into_iter().find_map(|quote| {
    text
      .strip_prefix(quote)
      .and_then(|rest| rest.strip_suffix(quote))
  })
}
