use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

use strata_engine::{EngineConfig, FlowContext, FlowDef, Outcome, StepInputs, WorkflowBuilder};

/// Strata - run dependency graphs of steps and flows
#[derive(Parser)]
#[command(name = "strata")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Log engine events at debug level
  #[arg(long, short, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the demo inventory workflow and run one of its flows
  Demo {
    /// Run steps of a level concurrently (steps simulate latency)
    #[arg(long)]
    concurrent: bool,

    /// Flow to run after the build; prints the containers when omitted
    #[arg(long)]
    flow: Option<String>,

    /// Number of refreshes to perform before running the flow
    #[arg(long, default_value_t = 0)]
    refreshes: u32,
  },

  /// Print the execution order and levels of the demo workflow
  Plan {
    /// Flow to plan; plans the build flow when omitted
    #[arg(long)]
    flow: Option<String>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match cli.command {
    Some(Commands::Demo {
      concurrent,
      flow,
      refreshes,
    }) => {
      if concurrent {
        run_demo_concurrent(flow, refreshes)?;
      } else {
        run_demo(flow, refreshes)?;
      }
    }
    Some(Commands::Plan { flow }) => {
      print_plan(flow)?;
    }
    None => {
      println!("strata - use --help to see available commands");
    }
  }

  Ok(())
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "strata=debug,strata_engine=debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .with_writer(std::io::stderr)
    .init();
}

fn run_demo(flow: Option<String>, refreshes: u32) -> Result<()> {
  let workflow = demo_workflow(None)?
    .build()
    .context("failed to build demo workflow")?;
  info!(workflow = %workflow.config().name, mode = "blocking", "demo workflow built");

  for _ in 0..refreshes {
    workflow.refresh().context("refresh failed")?;
  }

  let output = match flow {
    Some(name) => {
      let output = workflow
        .execute(&name)
        .with_context(|| format!("flow '{}' failed", name))?;
      serde_json::to_value(output.results)?
    }
    None => serde_json::to_value(workflow.containers().snapshot())?,
  };

  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}

fn run_demo_concurrent(flow: Option<String>, refreshes: u32) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    let workflow = demo_workflow(Some(Duration::from_millis(50)))?
      .build_async()
      .await
      .context("failed to build demo workflow")?;
    info!(workflow = %workflow.config().name, mode = "concurrent", "demo workflow built");

    for _ in 0..refreshes {
      workflow.refresh_async().await.context("refresh failed")?;
    }

    let output = match flow {
      Some(name) => {
        let output = workflow
          .execute_async(&name)
          .await
          .with_context(|| format!("flow '{}' failed", name))?;
        serde_json::to_value(output.results)?
      }
      None => serde_json::to_value(workflow.containers().snapshot())?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok::<_, anyhow::Error>(())
  })
}

fn print_plan(flow: Option<String>) -> Result<()> {
  let workflow = demo_workflow(None)?
    .build()
    .context("failed to build demo workflow")?;

  let order = workflow.execution_order(flow.as_deref())?;
  let levels = workflow.execution_levels(flow.as_deref())?;

  println!(
    "{}",
    serde_json::to_string_pretty(&json!({
      "flow": flow.as_deref().unwrap_or("build"),
      "order": order,
      "levels": levels,
    }))?
  );
  Ok(())
}

/// Wrap a computed value as an outcome, optionally delayed to mimic I/O.
fn respond(value: Value, latency: Option<Duration>) -> Outcome {
  match latency {
    Some(delay) => Outcome::deferred(async move {
      tokio::time::sleep(delay).await;
      Ok(value)
    }),
    None => Outcome::ready(value),
  }
}

/// Inventory demo:
///
/// ```text
/// catalog ──┬── valuation ──┐
///           └── restock ────┴── summary
/// ```
fn demo_workflow(latency: Option<Duration>) -> Result<WorkflowBuilder> {
  let mut builder = WorkflowBuilder::new(EngineConfig::named("inventory-demo"));

  builder
    .step("catalog", &[], move |_| {
      respond(
        json!([
          { "sku": "bolt", "price": 0.25, "qty": 400, "min": 500 },
          { "sku": "nut", "price": 0.1, "qty": 1200, "min": 500 },
          { "sku": "gear", "price": 12.5, "qty": 8, "min": 10 },
        ]),
        latency,
      )
    })?
    .step("valuation", &["catalog"], move |inputs: StepInputs| {
      let total: f64 = items(&inputs)
        .iter()
        .map(|item| item["price"].as_f64().unwrap_or(0.0) * item["qty"].as_f64().unwrap_or(0.0))
        .sum();
      respond(json!({ "total": total }), latency)
    })?
    .step("restock", &["catalog"], move |inputs: StepInputs| {
      let low: Vec<Value> = items(&inputs)
        .into_iter()
        .filter(|item| item["qty"].as_u64() < item["min"].as_u64())
        .map(|item| item["sku"].clone())
        .collect();
      respond(json!(low), latency)
    })?
    .step("summary", &["valuation", "restock"], move |inputs: StepInputs| {
      let total = inputs
        .get("valuation")
        .and_then(|v| v["total"].as_f64())
        .unwrap_or(0.0);
      let restock = inputs.get("restock").cloned().unwrap_or(Value::Null);
      respond(json!({ "stock_value": total, "restock": restock }), latency)
    })?;

  builder.flow(
    FlowDef::new("describe")
      .step("valuation", &[], |value: Value, _: &FlowContext| {
        Outcome::ready(format!("stock is worth {:.2}", value["total"].as_f64().unwrap_or(0.0)))
      })?
      .step("restock", &[], |value: Value, _: &FlowContext| {
        let count = value.as_array().map(Vec::len).unwrap_or(0);
        Outcome::ready(format!("{} item(s) need restocking", count))
      })?
      .step("summary", &["valuation", "restock"], |_: Value, ctx: &FlowContext| {
        Outcome::ready(format!(
          "{}; {}",
          ctx.get_str("valuation").unwrap_or("?"),
          ctx.get_str("restock").unwrap_or("?")
        ))
      })?,
  )?;

  builder.flow(
    FlowDef::new("audit").step("restock", &[], |value: Value, _: &FlowContext| {
      if value.as_array().is_some_and(|skus| skus.is_empty()) {
        Outcome::ready("nothing to reorder")
      } else {
        Outcome::failed(anyhow::anyhow!("reorder required for {}", value))
      }
    })?,
  )?;

  Ok(builder)
}

fn items(inputs: &StepInputs) -> Vec<Value> {
  inputs
    .get("catalog")
    .and_then(Value::as_array)
    .cloned()
    .unwrap_or_default()
}
