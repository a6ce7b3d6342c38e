//! Graph validation: reference integrity, acyclicity, and flow scoping.

use std::collections::{HashMap, HashSet};

use crate::error::{GraphError, GraphScope};
use crate::graph::{DependencyGraph, Mark};

/// Validate a base dependency graph.
///
/// Every dependency must name a node of the graph and the graph must be
/// acyclic.
pub fn validate(graph: &DependencyGraph) -> Result<(), GraphError> {
  validate_references(graph, graph.nodes())?;
  validate_acyclic(graph, &GraphScope::Base)
}

/// Validate a flow-local graph against the base graph it traverses.
///
/// Checks, in order:
/// 1. every step of the flow exists in the base graph
/// 2. every flow-local dependency is itself a step of the flow
/// 3. the flow-local graph is acyclic
pub fn validate_flow(
  flow: &str,
  flow_graph: &DependencyGraph,
  base_graph: &DependencyGraph,
) -> Result<(), GraphError> {
  for step in flow_graph.nodes() {
    if !base_graph.contains(step) {
      return Err(GraphError::UnknownStep {
        flow: flow.to_string(),
        step: step.to_string(),
      });
    }
  }

  for (step, dependencies) in flow_graph.iter() {
    if let Some(dependency) = dependencies.iter().find(|d| !flow_graph.contains(d)) {
      return Err(GraphError::FlowScope {
        flow: flow.to_string(),
        step: step.to_string(),
        dependency: dependency.clone(),
      });
    }
  }

  validate_acyclic(flow_graph, &GraphScope::Flow(flow.to_string()))
}

/// Check that every dependency in the graph is one of `known`.
pub fn validate_references<'a, I>(graph: &DependencyGraph, known: I) -> Result<(), GraphError>
where
  I: IntoIterator<Item = &'a str>,
{
  let known: HashSet<&str> = known.into_iter().collect();

  for (step, dependencies) in graph.iter() {
    for dependency in dependencies {
      if !known.contains(dependency.as_str()) {
        return Err(GraphError::MissingDependency {
          step: step.to_string(),
          dependency: dependency.clone(),
        });
      }
    }
  }

  Ok(())
}

/// Check for cycles using DFS.
///
/// Every unvisited node is used as a root so disconnected components are all
/// covered. Dependencies that are not nodes of the graph are ignored here;
/// [`validate_references`] reports those.
pub fn validate_acyclic(graph: &DependencyGraph, scope: &GraphScope) -> Result<(), GraphError> {
  fn dfs<'a>(node: &'a str, graph: &'a DependencyGraph, marks: &mut HashMap<&'a str, Mark>) -> bool {
    marks.insert(node, Mark::InProgress);

    for dependency in graph.dependencies(node) {
      match marks.get(dependency.as_str()) {
        Some(Mark::InProgress) => return true, // Back edge = cycle
        Some(Mark::Done) => {}
        None => {
          if dfs(dependency, graph, marks) {
            return true;
          }
        }
      }
    }

    marks.insert(node, Mark::Done);
    false
  }

  let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(graph.len());

  for node in graph.nodes() {
    if !marks.contains_key(node) && dfs(node, graph, &mut marks) {
      return Err(GraphError::Cycle {
        scope: scope.clone(),
      });
    }
  }

  Ok(())
}
