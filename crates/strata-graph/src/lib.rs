//! Strata Graph
//!
//! This crate holds the graph algorithms behind the strata engine. Every
//! graph is an insertion-ordered adjacency map from a step name to the
//! names it depends on, so all traversals here are reproducible run to run.
//!
//! - [`validate`] / [`validate_flow`] reject cycles, dangling references and
//!   flow dependencies that escape the flow's own step set
//! - [`topological_sort`] produces a dependency-respecting linear order
//! - [`compute_levels`] partitions that order into waves of steps that may
//!   run concurrently

mod error;
mod graph;
mod levels;
mod topo;
mod validate;

pub use error::{GraphError, GraphScope};
pub use graph::DependencyGraph;
pub use levels::compute_levels;
pub use topo::topological_sort;
pub use validate::{validate, validate_acyclic, validate_flow, validate_references};
