use indexmap::IndexMap;

/// Visit state used by the depth-first traversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mark {
  /// On the current traversal stack.
  InProgress,
  /// Fully visited.
  Done,
}

/// Dependency graph structure for validation and ordering.
///
/// Maps each step name to the ordered list of step names it depends on. Node
/// order and dependency order both follow insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
  adjacency: IndexMap<String, Vec<String>>,
}

impl DependencyGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a node with its dependencies.
  ///
  /// Re-inserting an existing node replaces its dependency list but keeps its
  /// original position. Returns the previous dependency list, if any.
  pub fn insert<N, D, S>(&mut self, name: N, dependencies: D) -> Option<Vec<String>>
  where
    N: Into<String>,
    D: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.adjacency.insert(
      name.into(),
      dependencies.into_iter().map(Into::into).collect(),
    )
  }

  /// Check if a node is part of the graph.
  pub fn contains(&self, name: &str) -> bool {
    self.adjacency.contains_key(name)
  }

  /// Get the dependencies of a node, in declaration order.
  pub fn dependencies(&self, name: &str) -> &[String] {
    self
      .adjacency
      .get(name)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Iterate node names in insertion order.
  pub fn nodes(&self) -> impl Iterator<Item = &str> {
    self.adjacency.keys().map(String::as_str)
  }

  /// Iterate `(node, dependencies)` pairs in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
    self
      .adjacency
      .iter()
      .map(|(node, deps)| (node.as_str(), deps.as_slice()))
  }

  pub fn len(&self) -> usize {
    self.adjacency.len()
  }

  pub fn is_empty(&self) -> bool {
    self.adjacency.is_empty()
  }
}

impl<N, D, S> FromIterator<(N, D)> for DependencyGraph
where
  N: Into<String>,
  D: IntoIterator<Item = S>,
  S: Into<String>,
{
  fn from_iter<I: IntoIterator<Item = (N, D)>>(iter: I) -> Self {
    let mut graph = DependencyGraph::new();
    for (name, dependencies) in iter {
      graph.insert(name, dependencies);
    }
    graph
  }
}
