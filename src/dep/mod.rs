//! Dependency Builder
//!
//! Rule indexing and plan construction: rules in, DAG out.

pub mod builder;
pub mod types;

pub use builder::build_graph;
pub use types::{Command, DepGraph, DepNode, NodeId};
