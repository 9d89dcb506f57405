//! Flow validation.
//!
//! Turns a raw [`FlowDef`] into a canonical [`Graph`], collecting every
//! structural problem along the way instead of stopping at the first one.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use autoflow_config::{AfterRef, FlowDef, FuncRef, TaskDef};
use autoflow_task::InvokeKind;
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::graph::{Graph, OutputMode, OutputSpec, TaskSpec};
use crate::path::{Arg, VarPath, is_identifier};

static FLOW_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Validate a flow description.
///
/// The graph is always returned so callers can inspect it, but it is only
/// safe to run when the error list is empty.
pub fn validate(def: FlowDef) -> (Graph, Vec<ValidationError>) {
  let mut errors = Vec::new();

  let name = def
    .name
    .unwrap_or_else(|| format!("flow_{}", FLOW_COUNTER.fetch_add(1, Ordering::Relaxed)));

  let mut in_params: Vec<String> = Vec::with_capacity(def.in_params.len());
  for param in def.in_params {
    if !is_identifier(&param) {
      errors.push(ValidationError::InvalidInParam {
        name: param.clone(),
      });
    }
    if in_params.contains(&param) {
      errors.push(ValidationError::DuplicateInParam { name: param });
      continue;
    }
    in_params.push(param);
  }

  let names = assign_task_names(&def.tasks, &mut errors);

  let tasks: Vec<TaskSpec> = def
    .tasks
    .iter()
    .zip(&names)
    .map(|(task, task_name)| TaskSpec {
      name: task_name.clone(),
      func: task.func.clone(),
      invoke: invoke_kind(task, task_name, &mut errors),
      inputs: parse_inputs(task, task_name, &mut errors),
      outputs: parse_paths(
        &task.outputs,
        &format!("outputs of task '{}'", task_name),
        &mut errors,
      ),
      after: normalize_after(task, task_name, &def.tasks, &names, &mut errors),
    })
    .collect();

  let mode = match def.output.mode.as_deref() {
    None => OutputMode::default(),
    Some(mode) => mode.parse::<OutputMode>().unwrap_or_else(|mode| {
      errors.push(ValidationError::UnknownMode { mode });
      OutputMode::default()
    }),
  };
  let output = OutputSpec {
    outputs: parse_paths(&def.output.outputs, "flow outputs", &mut errors),
    mode,
  };

  check_reachability(&in_params, &tasks, &output, &mut errors);

  for error in &errors {
    warn!(flow = %name, error = %error, "flow validation error");
  }
  debug!(
    flow = %name,
    tasks = tasks.len(),
    errors = errors.len(),
    "flow validated"
  );

  let graph = Graph {
    name,
    in_params,
    tasks,
    output,
    locals: def.locals,
  };

  (graph, errors)
}

/// Give every task a unique name.
///
/// Explicit names are kept unless already taken. An unnamed task takes its
/// function's name when free, else `<fn>_<index>`; anonymous functions get
/// `task_<index>`. Derived names never claim a name some task asked for
/// explicitly.
fn assign_task_names(tasks: &[TaskDef], errors: &mut Vec<ValidationError>) -> Vec<String> {
  let explicit: HashSet<&str> = tasks.iter().filter_map(|t| t.name.as_deref()).collect();
  let mut taken: HashSet<String> = HashSet::new();
  let mut names = Vec::with_capacity(tasks.len());

  for (index, task) in tasks.iter().enumerate() {
    let name = match task.name.as_deref() {
      Some(name) if !taken.contains(name) => name.to_string(),
      Some(name) => {
        let renamed = unique_name(format!("{}_{}", name, index), &taken, &explicit);
        errors.push(ValidationError::DuplicateTaskName {
          name: name.to_string(),
          index,
          renamed: renamed.clone(),
        });
        renamed
      }
      None => match task.func.derived_name().filter(|n| !n.trim().is_empty()) {
        Some(derived) if !taken.contains(derived) && !explicit.contains(derived) => {
          derived.to_string()
        }
        Some(derived) => unique_name(format!("{}_{}", derived, index), &taken, &explicit),
        None => unique_name(format!("task_{}", index), &taken, &explicit),
      },
    };

    taken.insert(name.clone());
    names.push(name);
  }

  names
}

fn unique_name(base: String, taken: &HashSet<String>, explicit: &HashSet<&str>) -> String {
  let free = |candidate: &str| !taken.contains(candidate) && !explicit.contains(candidate);
  if free(&base) {
    return base;
  }

  let mut n = 1;
  loop {
    let candidate = format!("{}_{}", base, n);
    if free(&candidate) {
      return candidate;
    }
    n += 1;
  }
}

fn invoke_kind(task: &TaskDef, name: &str, errors: &mut Vec<ValidationError>) -> InvokeKind {
  let declared = task.kind.as_deref().and_then(|kind| match kind.parse::<InvokeKind>() {
    Ok(kind) => Some(kind),
    Err(kind) => {
      errors.push(ValidationError::UnknownInvokeKind {
        task: name.to_string(),
        kind,
      });
      None
    }
  });

  match &task.func {
    FuncRef::Handle(func) => {
      let actual = func.kind();
      if let Some(declared) = declared.filter(|declared| *declared != actual) {
        errors.push(ValidationError::InvokeKindMismatch {
          task: name.to_string(),
          declared,
          actual,
        });
      }
      actual
    }
    FuncRef::Named(func_name) => {
      if func_name.trim().is_empty() {
        errors.push(ValidationError::EmptyFunctionName {
          task: name.to_string(),
        });
      }
      declared.unwrap_or_default()
    }
  }
}

fn parse_inputs(task: &TaskDef, name: &str, errors: &mut Vec<ValidationError>) -> Vec<Arg> {
  task
    .inputs
    .iter()
    .filter_map(|input| {
      Arg::parse(input)
        .map_err(|path| {
          errors.push(ValidationError::MalformedPath {
            location: format!("inputs of task '{}'", name),
            path,
          })
        })
        .ok()
    })
    .collect()
}

fn parse_paths(paths: &[String], location: &str, errors: &mut Vec<ValidationError>) -> Vec<VarPath> {
  paths
    .iter()
    .filter_map(|path| {
      let parsed = VarPath::parse(path);
      if parsed.is_none() {
        errors.push(ValidationError::MalformedPath {
          location: location.to_string(),
          path: path.clone(),
        });
      }
      parsed
    })
    .collect()
}

fn normalize_after(
  task: &TaskDef,
  name: &str,
  tasks: &[TaskDef],
  names: &[String],
  errors: &mut Vec<ValidationError>,
) -> Vec<String> {
  let mut after: Vec<String> = Vec::new();

  for reference in &task.after {
    let resolved = match reference {
      AfterRef::Name(target) if names.contains(target) => Some(target.clone()),
      AfterRef::Name(target) => {
        errors.push(ValidationError::UnknownAfterTask {
          task: name.to_string(),
          reference: target.clone(),
        });
        None
      }
      AfterRef::Func(func) => match tasks.iter().position(|t| t.func.is_handle(func)) {
        Some(index) => Some(names[index].clone()),
        None => {
          errors.push(ValidationError::UnknownAfterFunction {
            task: name.to_string(),
            function: func.name().unwrap_or("<anonymous>").to_string(),
          });
          None
        }
      },
      AfterRef::Position(position) => match names.get(*position) {
        Some(target) => Some(target.clone()),
        None => {
          errors.push(ValidationError::AfterPositionOutOfRange {
            task: name.to_string(),
            position: *position,
            len: names.len(),
          });
          None
        }
      },
    };

    if let Some(target) = resolved.filter(|target| !after.contains(target)) {
      after.push(target);
    }
  }

  after
}

/// Every variable read must be an input parameter or written by some task.
fn check_reachability(
  in_params: &[String],
  tasks: &[TaskSpec],
  output: &OutputSpec,
  errors: &mut Vec<ValidationError>,
) {
  let mut available: HashSet<&str> = in_params.iter().map(String::as_str).collect();
  available.extend(
    tasks
      .iter()
      .flat_map(|task| task.outputs.iter().map(VarPath::root)),
  );

  for task in tasks {
    for path in task.input_paths() {
      if !available.contains(path.root()) {
        errors.push(ValidationError::UnresolvedInput {
          task: task.name.clone(),
          variable: path.to_string(),
        });
      }
    }
  }

  for path in &output.outputs {
    if !available.contains(path.root()) {
      errors.push(ValidationError::UnresolvedOutput {
        variable: path.to_string(),
      });
    }
  }
}

#[cfg(test)]
mod tests {
  use autoflow_config::OutputDef;
  use autoflow_task::TaskFn;
  use serde_json::{Value, json};

  use super::*;

  fn cb(name: &str) -> TaskFn {
    TaskFn::callback(|_, _, done| {
      done.ok([]);
      Ok(())
    })
    .named(name)
  }

  fn ret(name: &str) -> TaskFn {
    TaskFn::direct(|_, _| Ok(Value::Null)).named(name)
  }

  fn multiply_add() -> FlowDef {
    FlowDef::new(["a", "b"])
      .task(TaskDef::new(&cb("multiply"), ["a", "b"], ["c"]))
      .task(TaskDef::new(&cb("add"), ["c", "b"], ["d"]))
      .output(OutputDef::all(["c", "d"]))
  }

  #[test]
  fn test_valid_flow_has_no_errors() {
    let (graph, errors) = validate(multiply_add());

    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert_eq!(graph.in_params, vec!["a", "b"]);
    assert_eq!(graph.tasks[0].name, "multiply");
    assert_eq!(graph.tasks[1].name, "add");
    assert_eq!(graph.tasks[1].invoke, InvokeKind::Callback);
    assert_eq!(graph.output.mode, OutputMode::AllProducers);
    assert!(graph.name.starts_with("flow_"));
  }

  #[test]
  fn test_unnamed_tasks_get_unique_names() {
    let multiply = cb("multiply");
    let def = FlowDef::new(["a", "b"])
      .task(TaskDef::new(&multiply, ["a", "b"], ["c"]))
      .task(TaskDef::new(&multiply, ["a", "b"], ["d"]).named("multiply"))
      .task(TaskDef::new(&cb("times"), ["a", "b"], ["e"]))
      .task(TaskDef::new(TaskFn::direct(|_, _| Ok(Value::Null)), ["a", "b"], ["f"]))
      .task(TaskDef::new(&multiply, ["a", "b"], ["g"]))
      .output(OutputDef::all(["c", "d", "e", "f", "g"]));

    let (graph, errors) = validate(def);

    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    let names: Vec<&str> = graph.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["multiply_0", "multiply", "times", "task_3", "multiply_4"]);
    assert_eq!(graph.tasks[3].invoke, InvokeKind::Direct);
  }

  #[test]
  fn test_explicit_duplicate_name_is_renamed_and_reported() {
    let def = FlowDef::new(["a"])
      .task(TaskDef::new("f", ["a"], ["b"]).named("step"))
      .task(TaskDef::new("g", ["b"], ["c"]).named("step"))
      .output(OutputDef::all(["c"]));

    let (graph, errors) = validate(def);

    assert_eq!(graph.tasks[1].name, "step_1");
    assert_eq!(
      errors,
      vec![ValidationError::DuplicateTaskName {
        name: "step".to_string(),
        index: 1,
        renamed: "step_1".to_string(),
      }]
    );
  }

  #[test]
  fn test_after_references_are_normalized() {
    let multiply = cb("multiply");
    let def = FlowDef::new(["a", "b"])
      .task(TaskDef::new(&multiply, ["a", "b"], ["c"]))
      .task(TaskDef::new(&cb("add"), ["a", "b"], ["d"]).after(&multiply))
      .task(
        TaskDef::new(&cb("sub"), ["a", "b"], ["e"])
          .after("add")
          .after(0usize)
          .after("multiply"),
      )
      .output(OutputDef::all(["c", "d", "e"]));

    let (graph, errors) = validate(def);

    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert_eq!(graph.tasks[1].after, vec!["multiply"]);
    assert_eq!(graph.tasks[2].after, vec!["add", "multiply"]);
  }

  #[test]
  fn test_bad_after_references() {
    let def = FlowDef::new(["a"])
      .task(
        TaskDef::new("f", ["a"], ["b"])
          .after("ghost")
          .after(7usize)
          .after(&cb("unused")),
      )
      .output(OutputDef::all(["b"]));

    let (_, errors) = validate(def);

    assert_eq!(
      errors,
      vec![
        ValidationError::UnknownAfterTask {
          task: "f".to_string(),
          reference: "ghost".to_string(),
        },
        ValidationError::AfterPositionOutOfRange {
          task: "f".to_string(),
          position: 7,
          len: 1,
        },
        ValidationError::UnknownAfterFunction {
          task: "f".to_string(),
          function: "unused".to_string(),
        },
      ]
    );
  }

  #[test]
  fn test_unresolved_variables() {
    let def = FlowDef::new(["a"])
      .task(TaskDef::new("f", ["a", "missing.field"], ["b"]))
      .output(OutputDef::all(["b", "nowhere"]));

    let (_, errors) = validate(def);

    assert_eq!(
      errors,
      vec![
        ValidationError::UnresolvedInput {
          task: "f".to_string(),
          variable: "missing.field".to_string(),
        },
        ValidationError::UnresolvedOutput {
          variable: "nowhere".to_string(),
        },
      ]
    );
  }

  #[test]
  fn test_nested_output_makes_root_available() {
    let def = FlowDef::new(["a"])
      .task(TaskDef::new("f", ["a"], ["c.bar"]))
      .task(TaskDef::new("g", ["c.bar"], ["d"]))
      .output(OutputDef::all(["c", "d"]));

    let (graph, errors) = validate(def);

    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert!(graph.tasks[0].outputs[0].is_nested());
  }

  #[test]
  fn test_kind_and_mode_errors() {
    let def = FlowDef::new(["a", "a"])
      .task(TaskDef::new(&ret("sum"), ["a"], ["b"]).with_kind(InvokeKind::Callback))
      .task(TaskDef {
        kind: Some("sometimes".to_string()),
        ..TaskDef::new("", ["a"], ["c"])
      })
      .output(OutputDef {
        outputs: vec!["b".to_string()],
        mode: Some("eventually".to_string()),
      });

    let (_, errors) = validate(def);

    assert!(errors.contains(&ValidationError::DuplicateInParam {
      name: "a".to_string()
    }));
    assert!(errors.contains(&ValidationError::InvokeKindMismatch {
      task: "sum".to_string(),
      declared: InvokeKind::Callback,
      actual: InvokeKind::Direct,
    }));
    assert!(errors.contains(&ValidationError::UnknownInvokeKind {
      task: "task_1".to_string(),
      kind: "sometimes".to_string(),
    }));
    assert!(errors.contains(&ValidationError::EmptyFunctionName {
      task: "task_1".to_string()
    }));
    assert!(errors.contains(&ValidationError::UnknownMode {
      mode: "eventually".to_string()
    }));
  }

  #[test]
  fn test_malformed_paths_and_literals() {
    let def = FlowDef::new(["a"])
      .task(TaskDef::new("f", ["a", "3", "'x'", "a..b"], ["b", "1x"]))
      .output(OutputDef::all(["b"]));

    let (graph, errors) = validate(def);

    assert_eq!(
      graph.tasks[0].inputs[1..],
      [Arg::Literal(json!(3)), Arg::Literal(json!("x"))]
    );
    assert_eq!(errors.len(), 2);
    assert!(errors.contains(&ValidationError::MalformedPath {
      location: "inputs of task 'f'".to_string(),
      path: "a..b".to_string(),
    }));
    assert!(errors.contains(&ValidationError::MalformedPath {
      location: "outputs of task 'f'".to_string(),
      path: "1x".to_string(),
    }));
  }

  #[test]
  fn test_first_success_aliases() {
    for mode in ["first_success", "finalcbFirst"] {
      let mut def = multiply_add();
      def.output.mode = Some(mode.to_string());
      let (graph, errors) = validate(def);
      assert!(errors.is_empty());
      assert_eq!(graph.output.mode, OutputMode::FirstSuccess);
    }
  }

  #[test]
  fn test_dependencies() {
    let (graph, _) = validate(multiply_add());
    let deps = graph.dependencies();

    assert_eq!(deps.entry_points(), ["multiply".to_string()]);
    assert_eq!(deps.downstream("multiply"), ["add".to_string()]);
    assert_eq!(deps.upstream("add"), ["multiply".to_string()]);
    assert!(deps.upstream("unknown").is_empty());
    assert_eq!(deps, graph.dependencies());
  }

  #[test]
  fn test_graph_serializes_for_introspection() {
    let (graph, _) = validate(multiply_add().named("calc"));

    let value = serde_json::to_value(&graph).unwrap();
    assert_eq!(value["name"], json!("calc"));
    assert_eq!(value["tasks"][1]["func"], json!("add"));
    assert_eq!(value["tasks"][1]["inputs"], json!([{ "var": "c" }, { "var": "b" }]));
    assert_eq!(value["output"]["mode"], json!("all_producers"));
  }

  #[test]
  fn test_validation_is_repeatable() {
    let multiply = cb("multiply");
    let def = FlowDef::new(["a", "b"])
      .task(TaskDef::new(&multiply, ["a", "b"], ["c"]))
      .task(TaskDef::new(&multiply, ["c", "b"], ["d.x"]))
      .task(TaskDef::new(&ret("sum"), ["d.x", "\"lit\""], ["e"]).after(&multiply))
      .task(TaskDef::new("named.fn", ["e"], ["f"]).after(1usize))
      .output(OutputDef::first_success(["c", "f"]));

    let (first, first_errors) = validate(def.clone());
    let (second, second_errors) = validate(def);

    assert!(first_errors.is_empty(), "unexpected errors: {:?}", first_errors);
    assert_eq!(first_errors, second_errors);

    let names = |graph: &Graph| -> Vec<String> {
      graph.tasks.iter().map(|task| task.name.clone()).collect()
    };
    let edges = |graph: &Graph| -> Vec<Vec<String>> {
      graph.tasks.iter().map(|task| task.after.clone()).collect()
    };
    assert_eq!(names(&first), vec!["multiply", "multiply_1", "sum", "named.fn"]);
    assert_eq!(names(&first), names(&second));
    assert_eq!(edges(&first), edges(&second));
    assert_eq!(edges(&first)[2], vec!["multiply"]);
    assert_eq!(edges(&first)[3], vec!["multiply_1"]);
    assert_eq!(
      serde_json::to_value(&first.tasks).unwrap(),
      serde_json::to_value(&second.tasks).unwrap()
    );
    assert_eq!(
      serde_json::to_value(&first.output).unwrap(),
      serde_json::to_value(&second.output).unwrap()
    );
    assert_ne!(first.name, second.name);
  }
}
