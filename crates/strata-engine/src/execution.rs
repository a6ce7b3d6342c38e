//! Flow execution.
//!
//! A [`FlowRun`] drives one run of either the build flow or a user flow, in
//! blocking or concurrent mode. Both modes resolve the plan from the graph of
//! the run's [`ExecutionKind`], then hand each step to a [`StepTask`] that
//! knows how to invoke and commit it.

use std::collections::HashMap;

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, instrument};

use crate::container::ContainerStore;
use crate::error::ExecutionError;
use crate::flow::{ActionFn, ExecutionKind};
use crate::outcome::{ActionResult, FlowContext, Outcome, StepInputs};
use crate::result::FlowOutput;
use crate::step::StepFn;
use crate::workflow::Workflow;

/// A single run of a flow against a workflow.
pub(crate) struct FlowRun<'a> {
  workflow: &'a Workflow,
  kind: ExecutionKind,
  execution_id: String,
}

impl<'a> FlowRun<'a> {
  pub(crate) fn new(workflow: &'a Workflow, kind: ExecutionKind) -> Self {
    Self {
      workflow,
      kind,
      execution_id: uuid::Uuid::new_v4().to_string(),
    }
  }

  /// Run every step one at a time in topological order.
  ///
  /// Never suspends. A deferred outcome aborts the run with
  /// [`ExecutionError::ModeViolation`].
  #[instrument(
    name = "flow_run",
    skip(self),
    fields(
      workflow_id = %self.workflow.config().workflow_id,
      execution_id = %self.execution_id,
      flow = %self.kind,
      mode = "blocking",
    )
  )]
  pub(crate) fn blocking(self) -> Result<FlowOutput, ExecutionError> {
    info!(execution_id = %self.execution_id, flow = %self.kind, "flow_started");

    let result = self.run_blocking();
    self.report(result)
  }

  /// Run the flow level by level, with every step of a level dispatched
  /// concurrently and the whole level joined before the next one starts.
  #[instrument(
    name = "flow_run",
    skip(self),
    fields(
      workflow_id = %self.workflow.config().workflow_id,
      execution_id = %self.execution_id,
      flow = %self.kind,
      mode = "concurrent",
    )
  )]
  pub(crate) async fn concurrent(self) -> Result<FlowOutput, ExecutionError> {
    info!(execution_id = %self.execution_id, flow = %self.kind, "flow_started");

    let result = self.run_concurrent().await;
    self.report(result)
  }

  fn run_blocking(&self) -> Result<FlowOutput, ExecutionError> {
    let order = self.workflow.execution_order_for(&self.kind)?;
    debug!(order = ?order, "execution order resolved");

    let mut completed = FlowContext::new();

    for step in &order {
      let mut task = self.prepare(step, &completed)?;
      let value = match task.start() {
        Outcome::Ready(result) => task.finish(result)?,
        Outcome::Deferred(_) => {
          error!(
            execution_id = %self.execution_id,
            step = %step,
            "step_failed: deferred outcome in blocking mode"
          );
          return Err(ExecutionError::ModeViolation { step: step.clone() });
        }
      };
      completed.insert(step.clone(), value);
    }

    Ok(self.output(completed))
  }

  async fn run_concurrent(&self) -> Result<FlowOutput, ExecutionError> {
    let levels = self.workflow.execution_levels_for(&self.kind)?;
    debug!(levels = ?levels, "execution levels resolved");

    let mut completed = FlowContext::new();

    for (index, level) in levels.iter().enumerate() {
      info!(
        execution_id = %self.execution_id,
        level = index,
        steps = ?level,
        "executing level"
      );

      // Prepare the whole level first so nothing is spawned for a level that
      // cannot start.
      let tasks = level
        .iter()
        .map(|step| self.prepare(step, &completed))
        .collect::<Result<Vec<_>, _>>()?;

      // Dropping the set aborts every task still running, so a caller that
      // gives up on the run stops all further container writes.
      let mut running = JoinSet::new();
      let mut spawned = HashMap::new();
      for (position, task) in tasks.into_iter().enumerate() {
        let handle = running.spawn(task.run().in_current_span());
        spawned.insert(handle.id(), position);
      }

      // Level barrier: every step settles before anything else happens.
      let mut settled: Vec<Option<Result<Value, ExecutionError>>> =
        level.iter().map(|_| None).collect();
      while let Some(joined) = running.join_next_with_id().await {
        match joined {
          Ok((id, result)) => {
            if let Some(&position) = spawned.get(&id) {
              settled[position] = Some(result);
            }
          }
          Err(e) => {
            let Some(&position) = spawned.get(&e.id()) else {
              continue;
            };
            let step = &level[position];
            error!(
              execution_id = %self.execution_id,
              step = %step,
              error = %e,
              "step_failed: task did not complete"
            );
            settled[position] = Some(Err(ExecutionError::Join {
              step: step.clone(),
              message: e.to_string(),
            }));
          }
        }
      }

      let mut failure = None;
      for (step, result) in level.iter().zip(settled) {
        match result {
          Some(Ok(value)) => completed.insert(step.clone(), value),
          Some(Err(e)) => {
            failure.get_or_insert(e);
          }
          None => {
            failure.get_or_insert(ExecutionError::Join {
              step: step.clone(),
              message: "task result was not collected".to_string(),
            });
          }
        }
      }

      if let Some(e) = failure {
        return Err(e);
      }
    }

    Ok(self.output(completed))
  }

  /// Assemble everything a step needs to run independently of the workflow.
  fn prepare(&self, step: &str, completed: &FlowContext) -> Result<StepTask, ExecutionError> {
    let containers = self.workflow.containers();

    let invocation = match &self.kind {
      ExecutionKind::Build => {
        let definition = self
          .workflow
          .step(step)
          .ok_or_else(|| ExecutionError::UnknownStep {
            step: step.to_string(),
          })?;

        let inputs = definition
          .dependencies
          .iter()
          .map(|dependency| {
            containers
              .get(dependency)
              .map(|value| (dependency.clone(), value))
              .ok_or_else(|| ExecutionError::MissingContainer {
                step: dependency.clone(),
              })
          })
          .collect::<Result<StepInputs, _>>()?;

        Invocation::Build {
          implementation: definition.implementation.clone(),
          inputs,
          containers: containers.clone(),
        }
      }
      ExecutionKind::Flow(name) => {
        let action = self
          .workflow
          .flow(name)?
          .action(step)
          .cloned()
          .ok_or_else(|| ExecutionError::UnknownStep {
            step: step.to_string(),
          })?;

        let value = containers
          .get(step)
          .ok_or_else(|| ExecutionError::MissingContainer {
            step: step.to_string(),
          })?;

        Invocation::Flow {
          action,
          value,
          context: completed.clone(),
        }
      }
    };

    Ok(StepTask {
      execution_id: self.execution_id.clone(),
      step: step.to_string(),
      invocation,
    })
  }

  fn output(&self, completed: FlowContext) -> FlowOutput {
    FlowOutput {
      execution_id: self.execution_id.clone(),
      results: completed.into_inner(),
      success: true,
    }
  }

  fn report(
    &self,
    result: Result<FlowOutput, ExecutionError>,
  ) -> Result<FlowOutput, ExecutionError> {
    match &result {
      Ok(output) => {
        info!(
          execution_id = %self.execution_id,
          steps_executed = output.results.len(),
          "flow_completed"
        );
      }
      Err(e) => {
        error!(
          execution_id = %self.execution_id,
          error = %e,
          "flow_failed"
        );
      }
    }

    result
  }
}

/// How a step is invoked, by execution kind.
enum Invocation {
  /// Call the step implementation and write its container.
  Build {
    implementation: StepFn,
    inputs: StepInputs,
    containers: ContainerStore,
  },
  /// Call the flow action on the current container value.
  Flow {
    action: ActionFn,
    value: Value,
    context: FlowContext,
  },
}

/// An owned, prepared step that can be sent to another task.
struct StepTask {
  execution_id: String,
  step: String,
  invocation: Invocation,
}

impl StepTask {
  /// Invoke the implementation or action. Can only be called once.
  fn start(&mut self) -> Outcome {
    info!(
      execution_id = %self.execution_id,
      step = %self.step,
      "step_started"
    );

    match &mut self.invocation {
      Invocation::Build {
        implementation,
        inputs,
        ..
      } => implementation(std::mem::take(inputs)),
      Invocation::Flow {
        action,
        value,
        context,
      } => action(std::mem::take(value), context),
    }
  }

  /// Commit a settled result: build steps write their container.
  fn finish(&self, result: ActionResult) -> Result<Value, ExecutionError> {
    match result {
      Ok(value) => {
        if let Invocation::Build { containers, .. } = &self.invocation {
          containers.insert(&self.step, value.clone());
        }

        info!(
          execution_id = %self.execution_id,
          step = %self.step,
          output = %value,
          "step_completed"
        );
        Ok(value)
      }
      Err(source) => {
        error!(
          execution_id = %self.execution_id,
          step = %self.step,
          error = %source,
          "step_failed"
        );
        Err(ExecutionError::Step {
          step: self.step.clone(),
          source,
        })
      }
    }
  }

  async fn run(mut self) -> Result<Value, ExecutionError> {
    let result = self.start().settle().await;
    self.finish(result)
  }
}
