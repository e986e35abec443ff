// src/dag/mod.rs

//! Task dependency graph.
//!
//! [`graph`] holds the parent/child adjacency over task ids and answers
//! reachability questions (descendants of a failed task, topological order).

pub mod graph;

pub use graph::TaskGraph;
