//! Signature strings.
//!
//! A task signature lists inputs and outputs around an arrow:
//!
//! - `a, b, cb -> err, c`: callback style (trailing `cb` input or leading
//!   `err` output)
//! - `filedata -> returns html`: direct style returning one value
//! - `user, emailHtml -> custEmailHtml`: direct style as well; without a
//!   callback marker a task returns its result
//!
//! Inputs may be quoted string literals or numbers; the validator decides
//! what is a literal and what is a variable path.

use autoflow_task::InvokeKind;

use crate::error::SignatureError;

const CALLBACK_INPUTS: [&str; 2] = ["cb", "callback"];
const ERROR_OUTPUT: &str = "err";
const RETURNS: &str = "returns";

/// A compiled task signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSignature {
  pub inputs: Vec<String>,
  pub outputs: Vec<String>,
  pub kind: InvokeKind,
}

/// A compiled flow signature: input parameters and requested outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSignature {
  pub params: Vec<String>,
  pub outputs: Vec<String>,
}

struct Sides {
  inputs: Vec<String>,
  outputs: Vec<String>,
  callback: bool,
  returns: bool,
}

pub fn parse_task_signature(signature: &str) -> Result<TaskSignature, SignatureError> {
  let sides = parse_sides(signature)?;
  if sides.callback && sides.returns {
    return Err(SignatureError::ConflictingStyles {
      signature: signature.to_string(),
    });
  }

  let kind = if sides.callback {
    InvokeKind::Callback
  } else {
    InvokeKind::Direct
  };

  Ok(TaskSignature {
    inputs: sides.inputs,
    outputs: sides.outputs,
    kind,
  })
}

pub fn parse_flow_signature(signature: &str) -> Result<FlowSignature, SignatureError> {
  let sides = parse_sides(signature)?;
  // Flow results are always delivered through the final callback
  if sides.returns {
    return Err(SignatureError::ConflictingStyles {
      signature: signature.to_string(),
    });
  }

  Ok(FlowSignature {
    params: sides.inputs,
    outputs: sides.outputs,
  })
}

fn parse_sides(signature: &str) -> Result<Sides, SignatureError> {
  let arrow = find_arrow(signature)?.ok_or_else(|| SignatureError::MissingArrow {
    signature: signature.to_string(),
  })?;
  let mut inputs = split_list(&signature[..arrow], signature)?;
  let mut outputs = split_list(&signature[arrow + 2..], signature)?;

  let mut callback = false;
  if inputs
    .last()
    .is_some_and(|input| CALLBACK_INPUTS.contains(&input.as_str()))
  {
    inputs.pop();
    callback = true;
  }
  if outputs.first().is_some_and(|output| output == ERROR_OUTPUT) {
    outputs.remove(0);
    callback = true;
  }

  let returned = outputs.first().and_then(|output| strip_returns(output));
  let returns = returned.is_some();
  if let Some(name) = returned {
    if name.is_empty() {
      return Err(SignatureError::EmptyName {
        signature: signature.to_string(),
      });
    }
    outputs[0] = name;
  }
  if outputs.iter().skip(1).any(|output| strip_returns(output).is_some())
    || (returns && outputs.len() > 1)
  {
    return Err(SignatureError::MultipleReturns {
      signature: signature.to_string(),
    });
  }

  Ok(Sides {
    inputs,
    outputs,
    callback,
    returns,
  })
}

/// `returns x` -> `x`; a bare `returns` yields an empty name.
fn strip_returns(output: &str) -> Option<String> {
  let rest = output.strip_prefix(RETURNS)?;
  if rest.is_empty() || rest.starts_with(char::is_whitespace) {
    Some(rest.trim().to_string())
  } else {
    None
  }
}

/// Byte offset of the first `->` outside quotes.
fn find_arrow(signature: &str) -> Result<Option<usize>, SignatureError> {
  let mut quote: Option<char> = None;
  for (index, c) in signature.char_indices() {
    match quote {
      Some(open) if c == open => quote = None,
      Some(_) => {}
      None if c == '"' || c == '\'' => quote = Some(c),
      None if signature[index..].starts_with("->") => return Ok(Some(index)),
      None => {}
    }
  }

  if quote.is_some() {
    return Err(SignatureError::UnterminatedQuote {
      signature: signature.to_string(),
    });
  }
  Ok(None)
}

/// Split a comma separated list, keeping commas inside quotes.
fn split_list(text: &str, signature: &str) -> Result<Vec<String>, SignatureError> {
  if text.trim().is_empty() {
    return Ok(Vec::new());
  }

  let mut items = Vec::new();
  let mut current = String::new();
  let mut quote: Option<char> = None;

  for c in text.chars() {
    match quote {
      Some(open) => {
        current.push(c);
        if c == open {
          quote = None;
        }
      }
      None if c == ',' => items.push(take_item(&mut current, signature)?),
      None => {
        if c == '"' || c == '\'' {
          quote = Some(c);
        }
        current.push(c);
      }
    }
  }

  if quote.is_some() {
    return Err(SignatureError::UnterminatedQuote {
      signature: signature.to_string(),
    });
  }
  items.push(take_item(&mut current, signature)?);
  Ok(items)
}

fn take_item(current: &mut String, signature: &str) -> Result<String, SignatureError> {
  let item = std::mem::take(current).trim().to_string();
  if item.is_empty() {
    return Err(SignatureError::EmptyName {
      signature: signature.to_string(),
    });
  }
  Ok(item)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn test_callback_signature() {
    let sig = parse_task_signature("a, b, cb -> err, c").unwrap();
    assert_eq!(sig.inputs, strings(&["a", "b"]));
    assert_eq!(sig.outputs, strings(&["c"]));
    assert_eq!(sig.kind, InvokeKind::Callback);
  }

  #[test]
  fn test_err_output_alone_marks_callback() {
    let sig = parse_task_signature("uid -> err, user").unwrap();
    assert_eq!(sig.inputs, strings(&["uid"]));
    assert_eq!(sig.kind, InvokeKind::Callback);

    let sig = parse_task_signature("           -> err, emailmd").unwrap();
    assert!(sig.inputs.is_empty());
    assert_eq!(sig.outputs, strings(&["emailmd"]));
  }

  #[test]
  fn test_returns_signature() {
    let sig = parse_task_signature("filedata -> returns html").unwrap();
    assert_eq!(sig.inputs, strings(&["filedata"]));
    assert_eq!(sig.outputs, strings(&["html"]));
    assert_eq!(sig.kind, InvokeKind::Direct);
  }

  #[test]
  fn test_unmarked_signature_is_direct() {
    let sig = parse_task_signature("user, emailHtml -> custEmailHtml").unwrap();
    assert_eq!(sig.kind, InvokeKind::Direct);

    let sig = parse_task_signature("\"hello, world\" ->").unwrap();
    assert_eq!(sig.inputs, strings(&["\"hello, world\""]));
    assert!(sig.outputs.is_empty());
  }

  #[test]
  fn test_quoted_arrow_is_not_a_separator() {
    let sig = parse_task_signature("'a->b', x, cb -> err, y").unwrap();
    assert_eq!(sig.inputs, strings(&["'a->b'", "x"]));
  }

  #[test]
  fn test_flow_signature() {
    let sig = parse_flow_signature("a, b, cb -> err, m, s").unwrap();
    assert_eq!(sig.params, strings(&["a", "b"]));
    assert_eq!(sig.outputs, strings(&["m", "s"]));

    let sig = parse_flow_signature("cb -> err, result").unwrap();
    assert!(sig.params.is_empty());
  }

  #[test]
  fn test_errors() {
    let cases = [
      ("a, b", "MissingArrow"),
      ("'a, b -> c", "UnterminatedQuote"),
      ("a -> 'c", "UnterminatedQuote"),
      ("a, , b -> c", "EmptyName"),
      ("a -> returns", "EmptyName"),
      ("a -> returns b, c", "MultipleReturns"),
      ("a -> b, returns c", "MultipleReturns"),
      ("a, cb -> returns b", "ConflictingStyles"),
    ];

    for (signature, expected) in cases {
      let error = parse_task_signature(signature).unwrap_err();
      assert!(
        format!("{:?}", error).starts_with(expected),
        "{signature:?} gave {error:?}"
      );
    }

    assert!(matches!(
      parse_flow_signature("a -> returns b"),
      Err(SignatureError::ConflictingStyles { .. })
    ));
  }
}
