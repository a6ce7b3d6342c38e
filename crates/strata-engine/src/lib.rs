//! Strata Engine
//!
//! This crate provides the in-process execution engine for strata. Callers
//! declare named steps with explicit dependencies, plus optional named flows
//! that re-traverse a subset of those steps with context-aware actions.
//!
//! # Architecture
//!
//! ```text
//! WorkflowBuilder
//! ├── step(name, deps, implementation)  - eager duplicate/reference checks
//! ├── flow(FlowDef)                     - eager duplicate-name check
//! └── build() / build_async()           - validate graphs, run build flow once
//!
//! Workflow
//! ├── execute(flow)        - blocking, one step at a time in topological order
//! ├── execute_async(flow)  - concurrent, one level at a time
//! ├── refresh()            - re-run the build flow
//! └── containers()         - latest value of every step
//! ```
//!
//! The build flow is synthesized from the steps themselves: it runs every
//! step implementation over the base graph and is the only writer of the
//! container store. User flows read container values and produce results of
//! their own, returned per run.
//!
//! # Usage
//!
//! ```ignore
//! use strata_engine::{EngineConfig, FlowDef, Outcome, WorkflowBuilder};
//!
//! let mut builder = WorkflowBuilder::new(EngineConfig::named("example"));
//! builder
//!   .step("a", &[], |_| Outcome::ready("a-data"))?
//!   .step("b", &["a"], |inputs| {
//!     Outcome::ready(format!("b-{}", inputs.get_str("a").unwrap_or_default()))
//!   })?;
//! builder.flow(FlowDef::new("shout").step("b", &[], |value, _ctx| {
//!   Outcome::ready(value.as_str().unwrap_or_default().to_uppercase())
//! })?)?;
//!
//! let workflow = builder.build()?;
//! let output = workflow.execute("shout")?;
//! assert_eq!(output.results["b"], "B-A-DATA");
//! ```

mod builder;
mod config;
mod container;
mod error;
mod execution;
mod flow;
mod outcome;
mod result;
mod step;
mod workflow;

pub use builder::WorkflowBuilder;
pub use config::EngineConfig;
pub use container::ContainerStore;
pub use error::{BuildError, DefinitionError, ExecutionError};
pub use flow::{ActionFn, ExecutionKind, FlowDef};
pub use outcome::{ActionResult, FlowContext, NamedValues, Outcome, StepInputs};
pub use result::FlowOutput;
pub use step::StepFn;
pub use workflow::Workflow;

// Re-export graph types that appear in this crate's API.
pub use strata_graph::{DependencyGraph, GraphError, GraphScope};
