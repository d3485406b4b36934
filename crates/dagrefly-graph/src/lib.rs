//! DagRefly dependency graph
//!
//! Directed graph over artifact identities with bounded traversal, cycle
//! detection, grouped topological ordering and selection expansion.

pub mod graph;
pub mod selection;

pub use graph::{DependencyGraph, EdgeKind, GraphError, NodeId};
