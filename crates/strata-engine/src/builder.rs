//! Workflow construction.

use std::sync::Arc;

use indexmap::IndexMap;
use strata_graph::{DependencyGraph, validate, validate_flow};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::{BuildError, DefinitionError};
use crate::execution::FlowRun;
use crate::flow::{ExecutionKind, FlowDef};
use crate::outcome::{Outcome, StepInputs};
use crate::step::Step;
use crate::workflow::Workflow;

/// Collects step and flow declarations and builds a [`Workflow`].
///
/// Declaring a step rejects duplicate names and dependencies on steps that
/// have not been declared yet. Declaring a flow rejects duplicate flow names.
/// Everything else is validated by [`build`](WorkflowBuilder::build).
#[derive(Default)]
pub struct WorkflowBuilder {
  config: EngineConfig,
  steps: IndexMap<String, Step>,
  flows: IndexMap<String, FlowDef>,
}

impl WorkflowBuilder {
  pub fn new(config: EngineConfig) -> Self {
    Self {
      config,
      steps: IndexMap::new(),
      flows: IndexMap::new(),
    }
  }

  /// Declare a step.
  ///
  /// `dependencies` is the ordered list of steps whose container values are
  /// handed to `implementation`; each must already be declared.
  pub fn step<F>(
    &mut self,
    name: impl Into<String>,
    dependencies: &[&str],
    implementation: F,
  ) -> Result<&mut Self, DefinitionError>
  where
    F: Fn(StepInputs) -> Outcome + Send + Sync + 'static,
  {
    let name = name.into();
    if self.steps.contains_key(&name) {
      return Err(DefinitionError::DuplicateStep { step: name });
    }

    if let Some(missing) = dependencies.iter().find(|d| !self.steps.contains_key(**d)) {
      return Err(DefinitionError::MissingDependency {
        step: name,
        dependency: missing.to_string(),
      });
    }

    self.steps.insert(
      name.clone(),
      Step {
        name,
        dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
        implementation: Arc::new(implementation),
      },
    );
    Ok(self)
  }

  /// Register a flow.
  pub fn flow(&mut self, flow: FlowDef) -> Result<&mut Self, DefinitionError> {
    if self.flows.contains_key(flow.name()) {
      return Err(DefinitionError::DuplicateFlow {
        flow: flow.name().to_string(),
      });
    }

    self.flows.insert(flow.name().to_string(), flow);
    Ok(self)
  }

  /// Validate the base graph and every flow without running anything.
  ///
  /// Returns the base dependency graph.
  pub fn validate(&self) -> Result<DependencyGraph, DefinitionError> {
    let graph: DependencyGraph = self
      .steps
      .values()
      .map(|step| (step.name.as_str(), step.dependencies.iter().map(String::as_str)))
      .collect();

    validate(&graph)?;

    for flow in self.flows.values() {
      validate_flow(flow.name(), flow.graph(), &graph)?;
    }

    Ok(graph)
  }

  /// Validate everything and populate the containers with a blocking run of
  /// the build flow.
  pub fn build(self) -> Result<Workflow, BuildError> {
    let workflow = self.into_workflow()?;
    FlowRun::new(&workflow, ExecutionKind::Build).blocking()?;
    Ok(workflow)
  }

  /// Validate everything and populate the containers with a concurrent run of
  /// the build flow.
  pub async fn build_async(self) -> Result<Workflow, BuildError> {
    let workflow = self.into_workflow()?;
    FlowRun::new(&workflow, ExecutionKind::Build)
      .concurrent()
      .await?;
    Ok(workflow)
  }

  fn into_workflow(self) -> Result<Workflow, DefinitionError> {
    let graph = self.validate()?;

    info!(
      workflow_id = %self.config.workflow_id,
      workflow_name = %self.config.name,
      steps = self.steps.len(),
      flows = self.flows.len(),
      "workflow_validated"
    );

    Ok(Workflow::new(self.config, self.steps, graph, self.flows))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use strata_graph::GraphError;

  fn constant(value: &'static str) -> impl Fn(StepInputs) -> Outcome + Send + Sync + 'static {
    move |_| Outcome::ready(value)
  }

  #[test]
  fn test_duplicate_step() {
    let mut builder = WorkflowBuilder::default();
    builder.step("a", &[], constant("a")).unwrap();

    let err = builder.step("a", &[], constant("again")).err().unwrap();
    assert!(matches!(err, DefinitionError::DuplicateStep { ref step } if step == "a"));
  }

  #[test]
  fn test_dependency_must_be_declared_first() {
    let mut builder = WorkflowBuilder::default();
    let err = builder.step("b", &["a"], constant("b")).err().unwrap();

    assert!(matches!(
      err,
      DefinitionError::MissingDependency { ref step, ref dependency }
        if step == "b" && dependency == "a"
    ));
  }

  #[test]
  fn test_duplicate_flow() {
    let mut builder = WorkflowBuilder::default();
    builder.flow(FlowDef::new("report")).unwrap();

    let err = builder.flow(FlowDef::new("report")).err().unwrap();
    assert!(matches!(err, DefinitionError::DuplicateFlow { ref flow } if flow == "report"));
  }

  #[test]
  fn test_validate_returns_base_graph() {
    let mut builder = WorkflowBuilder::default();
    builder
      .step("a", &[], constant("a"))
      .unwrap()
      .step("b", &["a"], constant("b"))
      .unwrap();

    let graph = builder.validate().unwrap();
    assert_eq!(graph.nodes().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(graph.dependencies("b"), ["a"]);
  }

  #[test]
  fn test_flow_errors_surface_at_build() {
    let mut builder = WorkflowBuilder::default();
    builder.step("a", &[], constant("a")).unwrap();
    builder
      .flow(
        FlowDef::new("broken")
          .step("ghost", &[], |v, _| Outcome::ready(v))
          .unwrap(),
      )
      .unwrap();

    let err = builder.build().err().unwrap();
    assert!(matches!(
      err,
      BuildError::Definition(DefinitionError::Graph(GraphError::UnknownStep { .. }))
    ));
  }

  #[test]
  fn test_build_populates_containers() {
    let mut builder = WorkflowBuilder::new(EngineConfig::named("unit"));
    builder.step("a", &[], constant("a-data")).unwrap();

    let workflow = builder.build().unwrap();
    assert_eq!(workflow.containers().get("a"), Some(json!("a-data")));
    assert_eq!(workflow.config().name, "unit");
  }
}
