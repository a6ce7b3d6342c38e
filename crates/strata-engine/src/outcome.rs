//! Values flowing into and out of step implementations and flow actions.

use std::fmt;
use std::future::Future;

use anyhow::Context as _;
use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a step implementation or flow action once it has completed.
pub type ActionResult = Result<Value, anyhow::Error>;

/// What a step implementation or flow action hands back to the engine.
///
/// A `Ready` outcome is accepted in both execution modes. A `Deferred`
/// outcome is only accepted by the concurrent entry points; blocking
/// execution rejects it with [`ExecutionError::ModeViolation`].
///
/// [`ExecutionError::ModeViolation`]: crate::ExecutionError::ModeViolation
pub enum Outcome {
  Ready(ActionResult),
  Deferred(BoxFuture<'static, ActionResult>),
}

impl Outcome {
  /// A completed, successful outcome.
  pub fn ready(value: impl Into<Value>) -> Self {
    Outcome::Ready(Ok(value.into()))
  }

  /// A completed, failed outcome.
  pub fn failed(error: impl Into<anyhow::Error>) -> Self {
    Outcome::Ready(Err(error.into()))
  }

  /// An outcome that completes when `future` does.
  pub fn deferred<F>(future: F) -> Self
  where
    F: Future<Output = ActionResult> + Send + 'static,
  {
    Outcome::Deferred(future.boxed())
  }

  pub fn is_deferred(&self) -> bool {
    matches!(self, Outcome::Deferred(_))
  }

  /// Wait for the outcome to complete.
  pub(crate) async fn settle(self) -> ActionResult {
    match self {
      Outcome::Ready(result) => result,
      Outcome::Deferred(future) => future.await,
    }
  }
}

impl From<Value> for Outcome {
  fn from(value: Value) -> Self {
    Outcome::Ready(Ok(value))
  }
}

impl From<ActionResult> for Outcome {
  fn from(result: ActionResult) -> Self {
    Outcome::Ready(result)
  }
}

impl fmt::Debug for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Outcome::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
      Outcome::Deferred(_) => f.write_str("Deferred(..)"),
    }
  }
}

/// Insertion-ordered map of step name to value.
///
/// Used as the input of step implementations ([`StepInputs`]: dependency name
/// to container value, in declared dependency order) and as the context of
/// flow actions ([`FlowContext`]: step name to flow result, in completion
/// order).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamedValues {
  values: IndexMap<String, Value>,
}

/// Dependency values handed to a step implementation.
pub type StepInputs = NamedValues;

/// Flow results accumulated so far in a flow run.
pub type FlowContext = NamedValues;

impl NamedValues {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.values.get(name)
  }

  /// Get a value as a string slice, if it is a JSON string.
  pub fn get_str(&self, name: &str) -> Option<&str> {
    self.values.get(name).and_then(Value::as_str)
  }

  /// Deserialize the value stored under `name`.
  pub fn parse<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
    let value = self
      .values
      .get(name)
      .with_context(|| format!("no value for '{}'", name))?;
    T::deserialize(value).with_context(|| format!("value for '{}' has an unexpected shape", name))
  }

  pub fn contains(&self, name: &str) -> bool {
    self.values.contains_key(name)
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.values.keys().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
    self.values.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn into_inner(self) -> IndexMap<String, Value> {
    self.values
  }

  pub(crate) fn insert(&mut self, name: impl Into<String>, value: Value) {
    self.values.insert(name.into(), value);
  }
}

impl From<IndexMap<String, Value>> for NamedValues {
  fn from(values: IndexMap<String, Value>) -> Self {
    Self { values }
  }
}

impl<K: Into<String>> FromIterator<(K, Value)> for NamedValues {
  fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
    Self {
      values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    }
  }
}
