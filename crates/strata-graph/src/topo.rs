//! Deterministic topological ordering.

use std::collections::HashMap;

use crate::error::{GraphError, GraphScope};
use crate::graph::{DependencyGraph, Mark};

/// Order the nodes of `graph` so every dependency precedes its dependents.
///
/// Depth-first post-order: a node is appended only after all of its
/// dependencies. Roots are taken in node insertion order and dependencies in
/// declaration order, so the output is identical across calls for an
/// unchanged graph.
///
/// Cycles are detected again here rather than trusted to earlier validation.
pub fn topological_sort(
  graph: &DependencyGraph,
  scope: &GraphScope,
) -> Result<Vec<String>, GraphError> {
  fn visit<'a>(
    node: &'a str,
    graph: &'a DependencyGraph,
    scope: &GraphScope,
    marks: &mut HashMap<&'a str, Mark>,
    order: &mut Vec<String>,
  ) -> Result<(), GraphError> {
    match marks.get(node) {
      Some(Mark::Done) => return Ok(()),
      Some(Mark::InProgress) => {
        return Err(GraphError::Cycle {
          scope: scope.clone(),
        });
      }
      None => {}
    }

    marks.insert(node, Mark::InProgress);

    for dependency in graph.dependencies(node) {
      if !graph.contains(dependency) {
        return Err(GraphError::MissingDependency {
          step: node.to_string(),
          dependency: dependency.clone(),
        });
      }
      visit(dependency, graph, scope, marks, order)?;
    }

    marks.insert(node, Mark::Done);
    order.push(node.to_string());
    Ok(())
  }

  let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(graph.len());
  let mut order = Vec::with_capacity(graph.len());

  for node in graph.nodes() {
    visit(node, graph, scope, &mut marks, &mut order)?;
  }

  Ok(order)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn graph(edges: &[(&str, &[&str])]) -> DependencyGraph {
    edges
      .iter()
      .map(|(name, deps)| (*name, deps.iter().copied()))
      .collect()
  }

  fn position(order: &[String], name: &str) -> usize {
    order.iter().position(|n| n == name).unwrap()
  }

  #[test]
  fn test_linear() {
    let g = graph(&[("c", &["b"]), ("b", &["a"]), ("a", &[])]);
    let order = topological_sort(&g, &GraphScope::Base).unwrap();
    assert_eq!(order, vec!["a", "b", "c"]);
  }

  #[test]
  fn test_diamond_follows_declaration_order() {
    let g = graph(&[("a", &[]), ("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])]);
    let order = topological_sort(&g, &GraphScope::Base).unwrap();
    assert_eq!(order, vec!["a", "b", "c", "d"]);

    // Swapping d's dependency order swaps b and c in the output.
    let g = graph(&[("d", &["c", "b"]), ("b", &["a"]), ("c", &["a"]), ("a", &[])]);
    let order = topological_sort(&g, &GraphScope::Base).unwrap();
    assert_eq!(order, vec!["a", "c", "b", "d"]);
  }

  #[test]
  fn test_every_edge_respected() {
    let g = graph(&[
      ("report", &["clean", "stats"]),
      ("stats", &["clean"]),
      ("clean", &["load"]),
      ("load", &[]),
      ("audit", &["load"]),
      ("publish", &["report", "audit"]),
    ]);
    let order = topological_sort(&g, &GraphScope::Base).unwrap();

    assert_eq!(order.len(), g.len());
    for (node, deps) in g.iter() {
      for dep in deps {
        assert!(
          position(&order, dep) < position(&order, node),
          "{} must precede {}",
          dep,
          node
        );
      }
    }
  }

  #[test]
  fn test_repeatable() {
    let g = graph(&[
      ("x", &["m", "n"]),
      ("n", &["k"]),
      ("m", &["k"]),
      ("k", &[]),
      ("solo", &[]),
    ]);
    let first = topological_sort(&g, &GraphScope::Base).unwrap();
    for _ in 0..10 {
      assert_eq!(topological_sort(&g, &GraphScope::Base).unwrap(), first);
    }
  }

  #[test]
  fn test_cycle_rejected() {
    let g = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
    let scope = GraphScope::Flow("f".to_string());
    assert_eq!(
      topological_sort(&g, &scope),
      Err(GraphError::Cycle { scope })
    );
  }

  #[test]
  fn test_dangling_dependency_rejected() {
    let g = graph(&[("a", &["ghost"])]);
    assert!(matches!(
      topological_sort(&g, &GraphScope::Base),
      Err(GraphError::MissingDependency { .. })
    ));
  }

  #[test]
  fn test_empty_graph() {
    let g = DependencyGraph::new();
    assert!(topological_sort(&g, &GraphScope::Base).unwrap().is_empty());
  }
}
