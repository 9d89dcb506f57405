//! Functions available by name to flows run from the command line.

use std::time::Duration;

use autoflow_task::{Locals, TaskFailure, TaskFn};
use serde_json::{Number, Value};

fn number(value: &Value) -> Result<f64, TaskFailure> {
  value
    .as_f64()
    .ok_or_else(|| TaskFailure::new(format!("expected a number, got {}", value)))
}

/// Keep integers integral when the result allows it.
fn to_value(n: f64) -> Value {
  if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
    Value::from(n as i64)
  } else {
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
  }
}

fn fold(args: &[Value], init: f64, op: fn(f64, f64) -> f64) -> Result<Value, TaskFailure> {
  let mut acc = init;
  for arg in args {
    acc = op(acc, number(arg)?);
  }
  Ok(to_value(acc))
}

fn text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// Callback function that completes immediately with one value.
fn immediate(body: fn(&[Value]) -> Result<Value, TaskFailure>) -> TaskFn {
  TaskFn::callback(move |_, args, done| {
    done.finish(body(&args).map(|value| vec![value]));
    Ok(())
  })
}

fn math() -> Locals {
  Locals::new()
    .with("add", immediate(|args| fold(args, 0.0, |a, b| a + b)))
    .with("multiply", immediate(|args| fold(args, 1.0, |a, b| a * b)))
    .with(
      "subtract",
      immediate(|args| match args.split_first() {
        Some((first, rest)) => fold(rest, number(first)?, |a, b| a - b),
        None => Ok(Value::from(0)),
      }),
    )
}

fn string() -> Locals {
  Locals::new()
    .with(
      "concat",
      immediate(|args| Ok(Value::String(args.iter().map(text).collect()))),
    )
    .with(
      "upper",
      immediate(|args| {
        let value = args.first().unwrap_or(&Value::Null);
        Ok(Value::String(text(value).to_uppercase()))
      }),
    )
}

fn util() -> Locals {
  let identity = TaskFn::direct(|_, args| Ok(args.into_iter().next().unwrap_or(Value::Null)));

  // delay(ms, value): completes with `value` after `ms` milliseconds.
  let delay = TaskFn::callback(|_, args, done| {
    let ms = args.first().and_then(Value::as_u64).unwrap_or(0);
    let value = args.get(1).cloned().unwrap_or(Value::Null);
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(ms)).await;
      done.ok([value]);
    });
    Ok(())
  });

  Locals::new().with("identity", identity).with("delay", delay)
}

/// Every builtin, mounted as `math.*`, `string.*` and `util.*`.
pub fn builtins() -> Locals {
  Locals::new()
    .namespace("math", math())
    .namespace("string", string())
    .namespace("util", util())
}
