use std::fmt;

use thiserror::Error;

/// Identifies which graph an error was found in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphScope {
  /// The base step dependency graph.
  Base,
  /// The flow-local graph of the named flow.
  Flow(String),
}

impl fmt::Display for GraphScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GraphScope::Base => write!(f, "base graph"),
      GraphScope::Flow(name) => write!(f, "flow '{}'", name),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("cycle detected in {scope}")]
  Cycle { scope: GraphScope },

  #[error("step '{step}' depends on unknown step '{dependency}'")]
  MissingDependency { step: String, dependency: String },

  #[error("flow '{flow}' references unknown step '{step}'")]
  UnknownStep { flow: String, step: String },

  #[error("step '{step}' in flow '{flow}' depends on '{dependency}', which is not part of the flow")]
  FlowScope {
    flow: String,
    step: String,
    dependency: String,
  },
}
