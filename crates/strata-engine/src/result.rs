//! Run results.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowOutput {
  /// Unique execution ID.
  pub execution_id: String,
  /// Result of every step in the run, keyed by step name, in execution order
  /// (topological order, or level order for concurrent runs).
  /// For the build flow these are the freshly computed container values.
  pub results: IndexMap<String, Value>,
  /// Always `true` for a returned output; failed runs surface as errors.
  pub success: bool,
}

impl FlowOutput {
  pub fn get(&self, step: &str) -> Option<&Value> {
    self.results.get(step)
  }
}
