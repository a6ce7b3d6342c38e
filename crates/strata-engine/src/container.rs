//! Container store: the latest computed value of every step.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use serde_json::Value;

/// Shared store of step container values, keyed by step name.
///
/// Only build-flow execution writes entries. Callers may read values and may
/// mutate a value in place through [`ContainerStore::update`]; such changes
/// are visible to every later run, including flow actions that read the
/// container.
///
/// Cloning the store yields another handle to the same values.
#[derive(Debug, Clone, Default)]
pub struct ContainerStore {
  values: Arc<RwLock<IndexMap<String, Value>>>,
}

impl ContainerStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Get a copy of the current value for a step.
  pub fn get(&self, step: &str) -> Option<Value> {
    self.read().get(step).cloned()
  }

  pub fn contains(&self, step: &str) -> bool {
    self.read().contains_key(step)
  }

  /// Mutate a step's current value in place.
  ///
  /// Returns `None` if the step has no container value.
  pub fn update<F, R>(&self, step: &str, f: F) -> Option<R>
  where
    F: FnOnce(&mut Value) -> R,
  {
    self.write().get_mut(step).map(f)
  }

  /// Copy of all container values in first-write order.
  pub fn snapshot(&self) -> IndexMap<String, Value> {
    self.read().clone()
  }

  pub fn len(&self) -> usize {
    self.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.read().is_empty()
  }

  /// Overwrite a step's value. Reserved for build-flow execution.
  pub(crate) fn insert(&self, step: &str, value: Value) {
    self.write().insert(step.to_string(), value);
  }

  // A poisoned lock means an `update` closure panicked; the map is intact.
  fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, Value>> {
    self.values.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, Value>> {
    self.values.write().unwrap_or_else(|e| e.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_insert_overwrites_in_place() {
    let store = ContainerStore::new();
    store.insert("a", json!(1));
    store.insert("b", json!(2));
    store.insert("a", json!(3));

    let snapshot = store.snapshot();
    assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(snapshot["a"], json!(3));
  }

  #[test]
  fn test_update_is_visible_to_clones() {
    let store = ContainerStore::new();
    store.insert("cart", json!({ "items": [] }));

    let handle = store.clone();
    let len = handle.update("cart", |cart| {
      cart["items"].as_array_mut().unwrap().push(json!("apple"));
      cart["items"].as_array().unwrap().len()
    });

    assert_eq!(len, Some(1));
    assert_eq!(store.get("cart"), Some(json!({ "items": ["apple"] })));
  }

  #[test]
  fn test_update_missing_step() {
    let store = ContainerStore::new();
    assert_eq!(store.update("nope", |_| ()), None);
    assert!(store.is_empty());
  }
}
