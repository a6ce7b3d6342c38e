//! Flow definitions and the execution kind tag.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use strata_graph::{DependencyGraph, GraphScope};

use crate::error::DefinitionError;
use crate::outcome::{FlowContext, Outcome};

/// A flow action: the step's current container value and the flow results
/// produced so far in the run, in; the step's flow result, out.
pub type ActionFn = Arc<dyn Fn(Value, &FlowContext) -> Outcome + Send + Sync>;

/// Which kind of run is executing.
///
/// The engine branches on this once per step: build runs call step
/// implementations and write the container store, flow runs call flow actions
/// and only read it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExecutionKind {
  /// The synthesized build flow over every step and the base graph.
  Build,
  /// A named user flow.
  Flow(String),
}

impl ExecutionKind {
  pub(crate) fn scope(&self) -> GraphScope {
    match self {
      ExecutionKind::Build => GraphScope::Base,
      ExecutionKind::Flow(name) => GraphScope::Flow(name.clone()),
    }
  }
}

impl fmt::Display for ExecutionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ExecutionKind::Build => write!(f, "build"),
      ExecutionKind::Flow(name) => write!(f, "{}", name),
    }
  }
}

/// A named flow: a subset of steps, a flow-local dependency graph over them,
/// and one action per step.
///
/// Only duplicate steps are rejected when a step is added. Step existence,
/// dependency scope and acyclicity are checked when the workflow is built.
///
/// ```ignore
/// let flow = FlowDef::new("describe")
///   .step("a", &[], |value, _ctx| Outcome::ready(format!("A is {}", value)))?
///   .step("b", &["a"], |value, ctx| {
///     Outcome::ready(format!("{} / B is {}", ctx.get_str("a").unwrap_or(""), value))
///   })?;
/// ```
#[derive(Clone)]
pub struct FlowDef {
  name: String,
  graph: DependencyGraph,
  actions: IndexMap<String, ActionFn>,
}

impl FlowDef {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      graph: DependencyGraph::new(),
      actions: IndexMap::new(),
    }
  }

  /// Add a step to the flow with its flow-local dependencies and action.
  pub fn step<F>(
    mut self,
    name: impl Into<String>,
    dependencies: &[&str],
    action: F,
  ) -> Result<Self, DefinitionError>
  where
    F: Fn(Value, &FlowContext) -> Outcome + Send + Sync + 'static,
  {
    let name = name.into();
    if self.actions.contains_key(&name) {
      return Err(DefinitionError::DuplicateFlowStep {
        flow: self.name,
        step: name,
      });
    }

    self.graph.insert(name.clone(), dependencies.iter().copied());
    self.actions.insert(name, Arc::new(action));
    Ok(self)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// The flow-local dependency graph.
  pub fn graph(&self) -> &DependencyGraph {
    &self.graph
  }

  pub fn step_names(&self) -> impl Iterator<Item = &str> {
    self.graph.nodes()
  }

  pub(crate) fn action(&self, step: &str) -> Option<&ActionFn> {
    self.actions.get(step)
  }
}

impl fmt::Debug for FlowDef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FlowDef")
      .field("name", &self.name)
      .field("graph", &self.graph)
      .finish_non_exhaustive()
  }
}
