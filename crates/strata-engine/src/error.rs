//! Engine error types.

use strata_graph::GraphError;
use thiserror::Error;

/// Errors raised while declaring steps and flows or validating them at build
/// time.
#[derive(Debug, Error)]
pub enum DefinitionError {
  /// A step with this name was already declared.
  #[error("duplicate step: '{step}'")]
  DuplicateStep { step: String },

  /// A flow with this name was already registered.
  #[error("duplicate flow: '{flow}'")]
  DuplicateFlow { flow: String },

  /// A step was added twice to the same flow.
  #[error("duplicate step '{step}' in flow '{flow}'")]
  DuplicateFlowStep { flow: String, step: String },

  /// A step names a dependency that has not been declared yet.
  #[error("step '{step}' depends on undeclared step '{dependency}'")]
  MissingDependency { step: String, dependency: String },

  /// Graph validation failed (cycle, dangling reference, flow scope).
  #[error(transparent)]
  Graph(#[from] GraphError),
}

/// Errors that abort a single run.
#[derive(Debug, Error)]
pub enum ExecutionError {
  /// A step implementation or flow action failed.
  #[error("step '{step}' failed: {source}")]
  Step {
    step: String,
    #[source]
    source: anyhow::Error,
  },

  /// A deferred outcome was produced during blocking execution.
  #[error("step '{step}' returned a deferred outcome during blocking execution; use the async entry point")]
  ModeViolation { step: String },

  /// No flow with this name is registered.
  #[error("unknown flow: '{flow}'")]
  UnknownFlow { flow: String },

  /// The plan named a step that has no implementation or action.
  #[error("step '{step}' is not declared")]
  UnknownStep { step: String },

  /// A flow step ran before its container was populated by the build flow.
  #[error("no container value for step '{step}'")]
  MissingContainer { step: String },

  /// The task running a step panicked or was aborted.
  #[error("task for step '{step}' did not complete: {message}")]
  Join { step: String, message: String },

  /// The execution plan could not be computed.
  #[error("invalid graph: {0}")]
  Graph(#[from] GraphError),
}

impl ExecutionError {
  /// Name of the step the error is attributed to, if any.
  pub fn step(&self) -> Option<&str> {
    match self {
      ExecutionError::Step { step, .. }
      | ExecutionError::ModeViolation { step }
      | ExecutionError::UnknownStep { step }
      | ExecutionError::MissingContainer { step }
      | ExecutionError::Join { step, .. } => Some(step),
      ExecutionError::UnknownFlow { .. } | ExecutionError::Graph(_) => None,
    }
  }
}

/// Errors from building a workflow: either the definitions are invalid or the
/// initial build flow run failed.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("invalid workflow definition: {0}")]
  Definition(#[from] DefinitionError),

  #[error("initial build failed: {0}")]
  Execution(#[from] ExecutionError),
}

impl From<GraphError> for BuildError {
  fn from(err: GraphError) -> Self {
    BuildError::Definition(DefinitionError::Graph(err))
  }
}
