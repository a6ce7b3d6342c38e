use serde::{Deserialize, Serialize};

/// Configuration for a workflow instance.
///
/// Both fields are attached to every tracing span the engine emits for the
/// workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
  /// Identifier for this workflow instance. Generated when not provided.
  #[serde(default = "generate_workflow_id")]
  pub workflow_id: String,
  /// Human readable workflow name.
  #[serde(default = "default_name")]
  pub name: String,
}

impl EngineConfig {
  /// Config with the given name and a generated workflow id.
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      workflow_id: generate_workflow_id(),
      name: name.into(),
    }
  }
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self::named(default_name())
  }
}

fn generate_workflow_id() -> String {
  uuid::Uuid::new_v4().to_string()
}

fn default_name() -> String {
  "workflow".to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_defaults_from_empty_object() {
    let config: EngineConfig = serde_json::from_value(json!({})).unwrap();
    assert_eq!(config.name, "workflow");
    assert!(uuid::Uuid::parse_str(&config.workflow_id).is_ok());
  }

  #[test]
  fn test_explicit_values() {
    let config: EngineConfig =
      serde_json::from_value(json!({ "workflow_id": "wf-1", "name": "pipeline" })).unwrap();
    assert_eq!(config.workflow_id, "wf-1");
    assert_eq!(config.name, "pipeline");
  }

  #[test]
  fn test_named_generates_distinct_ids() {
    let a = EngineConfig::named("x");
    let b = EngineConfig::named("x");
    assert_ne!(a.workflow_id, b.workflow_id);
  }
}
