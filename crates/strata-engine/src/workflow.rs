//! Built workflow instance.

use std::fmt;

use indexmap::IndexMap;
use strata_graph::{DependencyGraph, compute_levels, topological_sort};

use crate::config::EngineConfig;
use crate::container::ContainerStore;
use crate::error::ExecutionError;
use crate::execution::FlowRun;
use crate::flow::{ExecutionKind, FlowDef};
use crate::result::FlowOutput;
use crate::step::Step;

/// A validated workflow with populated containers.
///
/// Created by [`WorkflowBuilder::build`](crate::WorkflowBuilder::build), which
/// runs the build flow once. Afterwards any registered flow can be executed by
/// name, and [`refresh`](Workflow::refresh) recomputes every container.
pub struct Workflow {
  config: EngineConfig,
  steps: IndexMap<String, Step>,
  graph: DependencyGraph,
  flows: IndexMap<String, FlowDef>,
  containers: ContainerStore,
}

impl Workflow {
  pub(crate) fn new(
    config: EngineConfig,
    steps: IndexMap<String, Step>,
    graph: DependencyGraph,
    flows: IndexMap<String, FlowDef>,
  ) -> Self {
    Self {
      config,
      steps,
      graph,
      flows,
      containers: ContainerStore::new(),
    }
  }

  /// Execute a named flow in blocking mode.
  ///
  /// # Errors
  /// - [`ExecutionError::UnknownFlow`] if no such flow is registered
  /// - [`ExecutionError::ModeViolation`] if an action returns a deferred outcome
  /// - [`ExecutionError::Step`] if an action fails
  ///
  /// # Panics
  /// Actions run on the calling thread, so a panicking action unwinds into
  /// the caller. [`execute_async`](Workflow::execute_async) reports the same
  /// panic as [`ExecutionError::Join`] instead.
  pub fn execute(&self, flow: &str) -> Result<FlowOutput, ExecutionError> {
    let kind = self.user_flow(flow)?;
    FlowRun::new(self, kind).blocking()
  }

  /// Execute a named flow in concurrent mode.
  ///
  /// Must be polled within a tokio runtime; every step is spawned as a task.
  /// A panicking action surfaces as [`ExecutionError::Join`]. Dropping the
  /// returned future aborts the steps still running in the current level and
  /// starts no further ones.
  pub async fn execute_async(&self, flow: &str) -> Result<FlowOutput, ExecutionError> {
    let kind = self.user_flow(flow)?;
    FlowRun::new(self, kind).concurrent().await
  }

  /// Re-run the build flow in blocking mode, recomputing every container.
  ///
  /// Containers are overwritten one by one as their steps complete. If a step
  /// fails, containers of steps that already ran hold new values and the rest
  /// keep their previous ones.
  ///
  /// # Panics
  /// A panicking step implementation unwinds into the caller, unlike
  /// [`refresh_async`](Workflow::refresh_async), which reports it as
  /// [`ExecutionError::Join`].
  pub fn refresh(&self) -> Result<(), ExecutionError> {
    FlowRun::new(self, ExecutionKind::Build).blocking()?;
    Ok(())
  }

  /// Re-run the build flow in concurrent mode.
  ///
  /// Dropping the returned future (for example on a caller's timeout) aborts
  /// the steps still in flight; their containers keep their previous values.
  pub async fn refresh_async(&self) -> Result<(), ExecutionError> {
    FlowRun::new(self, ExecutionKind::Build).concurrent().await?;
    Ok(())
  }

  /// The container store. Values may be mutated in place through it.
  pub fn containers(&self) -> &ContainerStore {
    &self.containers
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// The base dependency graph.
  pub fn graph(&self) -> &DependencyGraph {
    &self.graph
  }

  pub fn step_names(&self) -> impl Iterator<Item = &str> {
    self.steps.keys().map(String::as_str)
  }

  /// Names of the registered user flows, in registration order.
  pub fn flow_names(&self) -> impl Iterator<Item = &str> {
    self.flows.keys().map(String::as_str)
  }

  /// The order a blocking run of `flow` would use. `None` selects the build
  /// flow.
  pub fn execution_order(&self, flow: Option<&str>) -> Result<Vec<String>, ExecutionError> {
    let kind = self.kind_for(flow)?;
    self.execution_order_for(&kind)
  }

  /// The levels a concurrent run of `flow` would use. `None` selects the
  /// build flow.
  pub fn execution_levels(
    &self,
    flow: Option<&str>,
  ) -> Result<Vec<Vec<String>>, ExecutionError> {
    let kind = self.kind_for(flow)?;
    self.execution_levels_for(&kind)
  }

  pub(crate) fn execution_order_for(
    &self,
    kind: &ExecutionKind,
  ) -> Result<Vec<String>, ExecutionError> {
    let graph = self.graph_for(kind)?;
    Ok(topological_sort(graph, &kind.scope())?)
  }

  pub(crate) fn execution_levels_for(
    &self,
    kind: &ExecutionKind,
  ) -> Result<Vec<Vec<String>>, ExecutionError> {
    let graph = self.graph_for(kind)?;
    let order = topological_sort(graph, &kind.scope())?;
    Ok(compute_levels(graph, &order))
  }

  pub(crate) fn step(&self, name: &str) -> Option<&Step> {
    self.steps.get(name)
  }

  pub(crate) fn flow(&self, name: &str) -> Result<&FlowDef, ExecutionError> {
    self
      .flows
      .get(name)
      .ok_or_else(|| ExecutionError::UnknownFlow {
        flow: name.to_string(),
      })
  }

  fn graph_for(&self, kind: &ExecutionKind) -> Result<&DependencyGraph, ExecutionError> {
    match kind {
      ExecutionKind::Build => Ok(&self.graph),
      ExecutionKind::Flow(name) => Ok(self.flow(name)?.graph()),
    }
  }

  fn user_flow(&self, name: &str) -> Result<ExecutionKind, ExecutionError> {
    self.flow(name)?;
    Ok(ExecutionKind::Flow(name.to_string()))
  }

  fn kind_for(&self, flow: Option<&str>) -> Result<ExecutionKind, ExecutionError> {
    match flow {
      Some(name) => self.user_flow(name),
      None => Ok(ExecutionKind::Build),
    }
  }
}

impl fmt::Debug for Workflow {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Workflow")
      .field("config", &self.config)
      .field("graph", &self.graph)
      .field("flows", &self.flows.keys().collect::<Vec<_>>())
      .field("containers", &self.containers)
      .finish()
  }
}
