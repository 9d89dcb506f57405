//! Flow builder over signature strings.

use autoflow_config::{AfterRef, FlowDef, FuncRef, MODE_FIRST_SUCCESS, OutputDef, TaskDef};
use autoflow_task::Locals;
use tracing::debug;

use crate::error::SignatureError;
use crate::signature::{parse_flow_signature, parse_task_signature};

/// Extra per-task settings for [`FlowBuilder::task_with`].
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
  pub name: Option<String>,
  pub after: Vec<AfterRef>,
}

impl TaskOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn after(mut self, reference: impl Into<AfterRef>) -> Self {
    self.after.push(reference.into());
    self
  }
}

#[derive(Debug, Clone)]
struct PendingTask {
  func: FuncRef,
  signature: String,
  options: TaskOptions,
}

/// Collects tasks by signature; signatures are compiled in [`FlowBuilder::build`].
#[derive(Debug, Clone)]
pub struct FlowBuilder {
  name: Option<String>,
  signature: String,
  first_success: bool,
  tasks: Vec<PendingTask>,
  locals: Locals,
}

/// Start a flow that waits for every producer.
///
/// `signature` lists the flow's parameters and outputs, e.g.
/// `"a, b, cb -> err, m, s"`. An empty name lets the validator generate one.
pub fn flow(name: &str, signature: &str) -> FlowBuilder {
  FlowBuilder::new(name, signature, false)
}

/// Start a flow whose tasks are alternatives tried in order: each task runs
/// after the previous one, and the first successful producer of an output
/// wins.
pub fn select_first(name: &str, signature: &str) -> FlowBuilder {
  FlowBuilder::new(name, signature, true)
}

impl FlowBuilder {
  fn new(name: &str, signature: &str, first_success: bool) -> Self {
    let name = name.trim();
    Self {
      name: (!name.is_empty()).then(|| name.to_string()),
      signature: signature.to_string(),
      first_success,
      tasks: Vec::new(),
      locals: Locals::new(),
    }
  }

  pub fn task(self, func: impl Into<FuncRef>, signature: &str) -> Self {
    self.task_with(func, signature, TaskOptions::default())
  }

  pub fn task_with(mut self, func: impl Into<FuncRef>, signature: &str, options: TaskOptions) -> Self {
    self.tasks.push(PendingTask {
      func: func.into(),
      signature: signature.to_string(),
      options,
    });
    self
  }

  /// Functions for tasks that reference theirs by name.
  pub fn locals(mut self, locals: Locals) -> Self {
    self.locals = locals;
    self
  }

  /// Compile every signature into a raw flow description.
  pub fn build(self) -> Result<FlowDef, SignatureError> {
    let flow_sig = parse_flow_signature(&self.signature)?;

    let mut def = FlowDef::new(flow_sig.params).with_locals(self.locals);
    def.name = self.name;
    def.output = OutputDef {
      outputs: flow_sig.outputs,
      mode: self.first_success.then(|| MODE_FIRST_SUCCESS.to_string()),
    };

    for (index, pending) in self.tasks.into_iter().enumerate() {
      let sig = parse_task_signature(&pending.signature)?;

      let mut task = TaskDef::new(pending.func, sig.inputs, sig.outputs).with_kind(sig.kind);
      task.name = pending.options.name;
      task.after = pending.options.after;
      if self.first_success && index > 0 {
        task.after.push(AfterRef::Position(index - 1));
      }
      def.tasks.push(task);
    }

    debug!(
      flow = def.name.as_deref().unwrap_or("<unnamed>"),
      tasks = def.tasks.len(),
      "signatures compiled"
    );
    Ok(def)
  }
}
