//! Step definitions.

use std::fmt;
use std::sync::Arc;

use crate::outcome::{Outcome, StepInputs};

/// A step implementation: dependency values in, container value out.
pub type StepFn = Arc<dyn Fn(StepInputs) -> Outcome + Send + Sync>;

/// A declared step. Immutable once declared.
#[derive(Clone)]
pub(crate) struct Step {
  pub(crate) name: String,
  pub(crate) dependencies: Vec<String>,
  pub(crate) implementation: StepFn,
}

impl fmt::Debug for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Step")
      .field("name", &self.name)
      .field("dependencies", &self.dependencies)
      .finish_non_exhaustive()
  }
}
