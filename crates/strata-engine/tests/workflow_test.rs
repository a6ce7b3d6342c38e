//! Integration tests for building workflows and running the build flow.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde_json::json;
use strata_engine::{
  BuildError, EngineConfig, ExecutionError, FlowDef, GraphError, GraphScope, Outcome,
  WorkflowBuilder,
};

fn diamond_builder() -> WorkflowBuilder {
  let mut builder = WorkflowBuilder::new(EngineConfig::named("diamond"));
  builder
    .step("a", &[], |_| Outcome::ready("a"))
    .unwrap()
    .step("b", &["a"], |inputs| {
      Outcome::ready(format!("b-{}", inputs.get_str("a").unwrap()))
    })
    .unwrap()
    .step("c", &["a"], |inputs| {
      Outcome::ready(format!("c-{}", inputs.get_str("a").unwrap()))
    })
    .unwrap()
    .step("d", &["b", "c"], |inputs| {
      let deps: Vec<&str> = inputs.names().collect();
      assert_eq!(deps, vec!["b", "c"], "inputs follow declared dependency order");
      Outcome::ready(format!(
        "d-{}-{}",
        inputs.get_str("b").unwrap(),
        inputs.get_str("c").unwrap()
      ))
    })
    .unwrap();
  builder
}

#[test]
fn test_two_step_chain_populates_containers() {
  let mut builder = WorkflowBuilder::default();
  builder
    .step("a", &[], |_| Outcome::ready("a-data"))
    .unwrap()
    .step("b", &["a"], |inputs| {
      Outcome::ready(format!("b-{}", inputs.get_str("a").unwrap()))
    })
    .unwrap();

  let workflow = builder.build().unwrap();

  let containers = workflow.containers().snapshot();
  assert_eq!(containers.len(), 2);
  assert_eq!(containers["a"], json!("a-data"));
  assert_eq!(containers["b"], json!("b-a-data"));
}

#[test]
fn test_diamond_concatenation() {
  let workflow = diamond_builder().build().unwrap();

  assert_eq!(workflow.containers().get("b"), Some(json!("b-a")));
  assert_eq!(workflow.containers().get("c"), Some(json!("c-a")));
  assert_eq!(workflow.containers().get("d"), Some(json!("d-b-a-c-a")));
}

#[tokio::test]
async fn test_diamond_concatenation_concurrent_build() {
  let workflow = diamond_builder().build_async().await.unwrap();

  assert_eq!(workflow.containers().get("d"), Some(json!("d-b-a-c-a")));
}

#[test]
fn test_diamond_plan() {
  let workflow = diamond_builder().build().unwrap();

  assert_eq!(
    workflow.execution_order(None).unwrap(),
    vec!["a", "b", "c", "d"]
  );
  assert_eq!(
    workflow.execution_levels(None).unwrap(),
    vec![vec!["a"], vec!["b", "c"], vec!["d"]]
  );

  // Repeated planning is stable.
  for _ in 0..5 {
    assert_eq!(
      workflow.execution_order(None).unwrap(),
      vec!["a", "b", "c", "d"]
    );
  }
}

#[test]
fn test_refresh_recomputes_every_step() {
  let counter = Arc::new(AtomicU64::new(0));
  let mut builder = WorkflowBuilder::default();
  {
    let counter = counter.clone();
    builder
      .step("counter", &[], move |_| {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Outcome::ready(json!({ "count": count }))
      })
      .unwrap();
  }
  builder
    .step("doubled", &["counter"], |inputs| {
      let count = inputs.get("counter").unwrap()["count"].as_u64().unwrap();
      Outcome::ready(count * 2)
    })
    .unwrap();

  let workflow = builder.build().unwrap();
  assert_eq!(workflow.containers().get("counter"), Some(json!({ "count": 1 })));

  workflow.refresh().unwrap();
  assert_eq!(workflow.containers().get("counter"), Some(json!({ "count": 2 })));
  assert_eq!(workflow.containers().get("doubled"), Some(json!(4)));

  workflow.refresh().unwrap();
  assert_eq!(workflow.containers().get("counter"), Some(json!({ "count": 3 })));
  assert_eq!(workflow.containers().get("doubled"), Some(json!(6)));
}

#[tokio::test]
async fn test_refresh_async_recomputes() {
  let counter = Arc::new(AtomicU64::new(0));
  let mut builder = WorkflowBuilder::default();
  {
    let counter = counter.clone();
    builder
      .step("tick", &[], move |_| {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Outcome::deferred(async move { Ok(json!(count)) })
      })
      .unwrap();
  }

  let workflow = builder.build_async().await.unwrap();
  workflow.refresh_async().await.unwrap();

  assert_eq!(workflow.containers().get("tick"), Some(json!(2)));
}

#[test]
fn test_failed_refresh_leaves_later_containers_stale() {
  let counter = Arc::new(AtomicU64::new(0));
  let fail = Arc::new(AtomicBool::new(false));

  let mut builder = WorkflowBuilder::default();
  {
    let counter = counter.clone();
    builder
      .step("source", &[], move |_| {
        Outcome::ready(counter.fetch_add(1, Ordering::SeqCst) + 1)
      })
      .unwrap();
  }
  {
    let fail = fail.clone();
    builder
      .step("derived", &["source"], move |inputs| {
        if fail.load(Ordering::SeqCst) {
          return Outcome::failed(anyhow::anyhow!("downstream unavailable"));
        }
        Outcome::ready(inputs.get("source").cloned().unwrap())
      })
      .unwrap();
  }
  builder
    .step("report", &["derived"], |inputs| {
      Outcome::ready(format!("report-{}", inputs.get("derived").unwrap()))
    })
    .unwrap();

  let workflow = builder.build().unwrap();
  assert_eq!(workflow.containers().get("report"), Some(json!("report-1")));

  fail.store(true, Ordering::SeqCst);
  let err = workflow.refresh().unwrap_err();

  assert_eq!(err.step(), Some("derived"));
  assert!(err.to_string().contains("downstream unavailable"));
  // The step before the failure was recomputed, the rest kept their values.
  assert_eq!(workflow.containers().get("source"), Some(json!(2)));
  assert_eq!(workflow.containers().get("derived"), Some(json!(1)));
  assert_eq!(workflow.containers().get("report"), Some(json!("report-1")));
}

#[test]
fn test_failing_step_produces_no_workflow() {
  let mut builder = WorkflowBuilder::default();
  builder
    .step("a", &[], |_| Outcome::failed(anyhow::anyhow!("no input file")))
    .unwrap();

  let err = builder.build().unwrap_err();
  match err {
    BuildError::Execution(ExecutionError::Step { step, source }) => {
      assert_eq!(step, "a");
      assert_eq!(source.to_string(), "no input file");
    }
    other => panic!("unexpected error: {}", other),
  }
}

#[test]
fn test_deferred_step_rejected_by_blocking_build() {
  let mut builder = WorkflowBuilder::default();
  builder
    .step("a", &[], |_| Outcome::ready("a"))
    .unwrap()
    .step("slow", &["a"], |_| {
      Outcome::deferred(async { Ok(json!("later")) })
    })
    .unwrap();

  let err = builder.build().unwrap_err();
  assert!(matches!(
    err,
    BuildError::Execution(ExecutionError::ModeViolation { ref step }) if step == "slow"
  ));
}

#[test]
fn test_deferred_step_stops_blocking_refresh() {
  let runs = Arc::new(AtomicU64::new(0));
  let last_calls = Arc::new(AtomicU64::new(0));

  let mut builder = WorkflowBuilder::default();
  {
    let runs = runs.clone();
    builder
      .step("first", &[], move |_| {
        Outcome::ready(runs.fetch_add(1, Ordering::SeqCst) + 1)
      })
      .unwrap();
  }
  builder
    .step("middle", &["first"], |inputs| {
      let first = inputs.get("first").cloned().unwrap();
      if first == json!(1) {
        Outcome::ready(first)
      } else {
        Outcome::deferred(async move { Ok(first) })
      }
    })
    .unwrap();
  {
    let last_calls = last_calls.clone();
    builder
      .step("last", &["middle"], move |inputs| {
        last_calls.fetch_add(1, Ordering::SeqCst);
        Outcome::ready(format!("last-{}", inputs.get("middle").unwrap()))
      })
      .unwrap();
  }

  let workflow = builder.build().unwrap();
  assert_eq!(last_calls.load(Ordering::SeqCst), 1);

  let err = workflow.refresh().unwrap_err();

  assert!(matches!(err, ExecutionError::ModeViolation { ref step } if step == "middle"));
  assert_eq!(workflow.containers().get("first"), Some(json!(2)));
  assert_eq!(workflow.containers().get("middle"), Some(json!(1)));
  assert_eq!(workflow.containers().get("last"), Some(json!("last-1")));
  assert_eq!(last_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_deferred_step_accepted_by_concurrent_build() {
  let mut builder = WorkflowBuilder::default();
  builder
    .step("a", &[], |_| Outcome::ready("a"))
    .unwrap()
    .step("slow", &["a"], |inputs| {
      let a = inputs.get_str("a").unwrap().to_string();
      Outcome::deferred(async move { Ok(json!(format!("{}-later", a))) })
    })
    .unwrap();

  let workflow = builder.build_async().await.unwrap();
  assert_eq!(workflow.containers().get("slow"), Some(json!("a-later")));
}

#[test]
fn test_flow_cycle_prevents_build() {
  let mut builder = WorkflowBuilder::default();
  builder
    .step("a", &[], |_| Outcome::ready(1))
    .unwrap()
    .step("b", &["a"], |_| Outcome::ready(2))
    .unwrap();
  builder
    .flow(
      FlowDef::new("loop")
        .step("a", &["b"], |v, _| Outcome::ready(v))
        .unwrap()
        .step("b", &["a"], |v, _| Outcome::ready(v))
        .unwrap(),
    )
    .unwrap();

  let err = builder.build().unwrap_err();
  match err {
    BuildError::Definition(definition) => {
      assert_eq!(definition.to_string(), "cycle detected in flow 'loop'");
    }
    other => panic!("unexpected error: {}", other),
  }
}

#[test]
fn test_flow_scope_violation_prevents_build() {
  let mut builder = WorkflowBuilder::default();
  builder
    .step("a", &[], |_| Outcome::ready(1))
    .unwrap()
    .step("b", &["a"], |_| Outcome::ready(2))
    .unwrap();
  builder
    .flow(
      FlowDef::new("partial")
        .step("b", &["a"], |v, _| Outcome::ready(v))
        .unwrap(),
    )
    .unwrap();

  let err = builder.validate().unwrap_err();
  assert!(matches!(
    err,
    strata_engine::DefinitionError::Graph(GraphError::FlowScope { .. })
  ));
}

#[test]
fn test_validation_verdict_is_stable() {
  let builder = diamond_builder();
  let first = builder.validate().unwrap();
  for _ in 0..3 {
    assert_eq!(builder.validate().unwrap(), first);
  }
}

#[test]
fn test_cycle_error_names_scope() {
  let err = GraphError::Cycle {
    scope: GraphScope::Base,
  };
  assert_eq!(
    BuildError::from(err).to_string(),
    "invalid workflow definition: cycle detected in base graph"
  );
}

#[test]
fn test_container_mutation_is_observable() {
  let mut builder = WorkflowBuilder::default();
  builder
    .step("cart", &[], |_| Outcome::ready(json!({ "items": ["apple"] })))
    .unwrap();
  builder
    .flow(
      FlowDef::new("count")
        .step("cart", &[], |cart, _| {
          Outcome::ready(cart["items"].as_array().map(|i| i.len()).unwrap_or(0))
        })
        .unwrap(),
    )
    .unwrap();

  let workflow = builder.build().unwrap();
  assert_eq!(workflow.execute("count").unwrap().results["cart"], json!(1));

  workflow.containers().update("cart", |cart| {
    cart["items"].as_array_mut().unwrap().push(json!("pear"));
  });
  assert_eq!(workflow.execute("count").unwrap().results["cart"], json!(2));

  // A refresh replaces the mutated value with a recomputed one.
  workflow.refresh().unwrap();
  assert_eq!(workflow.execute("count").unwrap().results["cart"], json!(1));
}
