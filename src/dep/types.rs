//! Dependency Graph Types
//!
//! Resolved nodes live in a single owning pool; edges are indices.
//! That keeps parent/child back references trivially serializable and
//! free of ownership cycles.

use serde::{Deserialize, Serialize};

use crate::loc::Loc;
use crate::sym::Symbol;

pub type NodeId = usize;

/// One expanded recipe line with its prefix flags stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub cmd: String,
    /// `@` prefix suppresses echoing.
    pub echo: bool,
    /// `-` prefix ignores the exit status.
    pub ignore_error: bool,
}

/// A resolved target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepNode {
    pub output: Symbol,
    pub commands: Vec<Command>,
    pub deps: Vec<NodeId>,
    pub order_onlys: Vec<NodeId>,
    pub parents: Vec<NodeId>,
    /// Inputs after pattern substitution, in rule order.
    pub actual_inputs: Vec<Symbol>,
    pub has_rule: bool,
    pub is_phony: bool,
    pub is_restat: bool,
    /// Snapshot of target-specific variables, expanded.
    pub rule_vars: Vec<(Symbol, String)>,
    pub loc: Option<Loc>,
}

impl DepNode {
    pub fn new(output: Symbol) -> Self {
        Self {
            output,
            commands: Vec::new(),
            deps: Vec::new(),
            order_onlys: Vec::new(),
            parents: Vec::new(),
            actual_inputs: Vec::new(),
            has_rule: false,
            is_phony: false,
            is_restat: false,
            rule_vars: Vec::new(),
            loc: None,
        }
    }
}

/// The resolved DAG plus the chosen root set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepGraph {
    pub nodes: Vec<DepNode>,
    pub roots: Vec<NodeId>,
}

impl DepGraph {
    pub fn node(&self, id: NodeId) -> &DepNode {
        &self.nodes[id]
    }

    /// `output: dep1 dep2 || oo1`: the shape tests and debug dumps
    /// print nodes in.
    pub fn format_node(&self, id: NodeId) -> String {
        let n = &self.nodes[id];
        let mut s = format!("{}:", n.output);
        for d in &n.deps {
            s.push(' ');
            s.push_str(self.nodes[*d].output.as_str());
        }
        if !n.order_onlys.is_empty() {
            s.push_str(" ||");
            for d in &n.order_onlys {
                s.push(' ');
                s.push_str(self.nodes[*d].output.as_str());
            }
        }
        s
    }

    /// Edge symmetry: every dep/order-only edge has a matching parent
    /// entry. Exposed for tests.
    pub fn check_edge_symmetry(&self) -> bool {
        for (id, n) in self.nodes.iter().enumerate() {
            for &c in n.deps.iter().chain(n.order_onlys.iter()) {
                if !self.nodes[c].parents.contains(&id) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sym::intern;

    #[test]
    fn test_format_node() {
        let mut g = DepGraph::default();
        let mut a = DepNode::new(intern("a"));
        let b = DepNode::new(intern("b"));
        let c = DepNode::new(intern("c"));
        a.deps.push(1);
        a.order_onlys.push(2);
        g.nodes = vec![a, b, c];
        assert_eq!(g.format_node(0), "a: b || c");
    }

    #[test]
    fn test_edge_symmetry_detects_missing_parent() {
        let mut g = DepGraph::default();
        let mut a = DepNode::new(intern("a"));
        a.deps.push(1);
        let b = DepNode::new(intern("b"));
        g.nodes = vec![a, b];
        assert!(!g.check_edge_symmetry());
        g.nodes[1].parents.push(0);
        assert!(g.check_edge_symmetry());
    }
}
