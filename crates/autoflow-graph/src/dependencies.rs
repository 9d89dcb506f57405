use std::collections::HashMap;

use crate::graph::Graph;

/// Task-level dependency view of a [`Graph`].
///
/// A task depends on every producer of a variable it reads and on every task
/// it is ordered after. Used for introspection; the runner itself fires tasks
/// from the variable store, not from these edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependencies {
  /// task -> tasks that depend on it
  downstream: HashMap<String, Vec<String>>,
  /// task -> tasks it depends on
  upstream: HashMap<String, Vec<String>>,
  /// Tasks with no dependencies, in description order.
  entry_points: Vec<String>,
  edges: Vec<(String, String)>,
}

impl Dependencies {
  pub fn new(graph: &Graph) -> Self {
    let mut downstream: HashMap<String, Vec<String>> = HashMap::new();
    let mut upstream: HashMap<String, Vec<String>> = HashMap::new();
    let mut edges = Vec::new();

    for task in &graph.tasks {
      downstream.entry(task.name.clone()).or_default();
      upstream.entry(task.name.clone()).or_default();
    }

    for task in &graph.tasks {
      let producers = task
        .input_paths()
        .flat_map(|path| graph.producers_of(path.root()))
        .filter(|producer| *producer != task.name);
      let ordered = task.after.iter().map(String::as_str);

      let mut seen: Vec<&str> = Vec::new();
      for from in producers.chain(ordered) {
        if seen.contains(&from) {
          continue;
        }
        seen.push(from);

        downstream
          .entry(from.to_string())
          .or_default()
          .push(task.name.clone());
        upstream
          .entry(task.name.clone())
          .or_default()
          .push(from.to_string());
        edges.push((from.to_string(), task.name.clone()));
      }
    }

    let entry_points = graph
      .tasks
      .iter()
      .filter(|task| upstream.get(&task.name).is_none_or(|v| v.is_empty()))
      .map(|task| task.name.clone())
      .collect();

    Self {
      downstream,
      upstream,
      entry_points,
      edges,
    }
  }

  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  pub fn downstream(&self, task: &str) -> &[String] {
    self
      .downstream
      .get(task)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  pub fn upstream(&self, task: &str) -> &[String] {
    self
      .upstream
      .get(task)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// `(from, to)` pairs: `to` depends on `from`.
  pub fn edges(&self) -> &[(String, String)] {
    &self.edges
  }
}
