//! Level scheduling.

use std::collections::HashMap;

use crate::graph::DependencyGraph;

/// Partition `order` into levels of mutually independent nodes.
///
/// Level 0 holds nodes without dependencies; a node sits at level `k` when
/// its deepest dependency sits at level `k - 1`. Within a level nodes keep
/// their relative position from `order`.
///
/// `graph` must already be validated as acyclic.
pub fn compute_levels<'a>(graph: &'a DependencyGraph, order: &'a [String]) -> Vec<Vec<String>> {
  fn depth<'a>(node: &'a str, graph: &'a DependencyGraph, memo: &mut HashMap<&'a str, usize>) -> usize {
    if let Some(&known) = memo.get(node) {
      return known;
    }

    let value = graph
      .dependencies(node)
      .iter()
      .map(|dependency| depth(dependency, graph, memo) + 1)
      .max()
      .unwrap_or(0);

    memo.insert(node, value);
    value
  }

  let mut memo: HashMap<&str, usize> = HashMap::with_capacity(order.len());
  let mut levels: Vec<Vec<String>> = Vec::new();

  for node in order {
    let level = depth(node, graph, &mut memo);
    if levels.len() <= level {
      levels.resize_with(level + 1, Vec::new);
    }
    levels[level].push(node.clone());
  }

  levels
}
