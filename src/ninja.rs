//! Ninja File Emission
//!
//! Walks the resolved DAG and renders one build statement per node.
//! Recipe lines are joined with ` && ` (or ` ; ` around ignored
//! errors), `$` is doubled, and commands past the response-file limit
//! are routed through an rspfile so the generated file stays loadable.

use std::fmt::Write as _;

use crate::dep::{Command, DepGraph, NodeId};

const RESPONSE_FILE_LIMIT: usize = 100_000;

pub struct NinjaGenerator {
    response_file_limit: usize,
}

impl Default for NinjaGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl NinjaGenerator {
    pub fn new() -> Self {
        Self {
            response_file_limit: RESPONSE_FILE_LIMIT,
        }
    }

    /// Lowered limit for tests.
    pub fn with_response_file_limit(limit: usize) -> Self {
        Self {
            response_file_limit: limit,
        }
    }

    /// Render the whole ninja file into a string.
    pub fn generate(&self, graph: &DepGraph) -> String {
        let mut out = String::new();
        out.push_str("# Generated by just-make, do not edit.\n\n");

        for (id, node) in graph.nodes.iter().enumerate() {
            if !node.has_rule && !node.is_phony {
                continue;
            }
            if node.commands.is_empty() {
                self.emit_phony_build(&mut out, graph, id);
                continue;
            }
            self.emit_rule_and_build(&mut out, graph, id);
        }

        if !graph.roots.is_empty() {
            let roots: Vec<&str> = graph
                .roots
                .iter()
                .map(|&r| graph.nodes[r].output.as_str())
                .collect();
            let escaped: Vec<String> = roots.iter().map(|r| escape_path(r)).collect();
            let _ = writeln!(out, "default {}", escaped.join(" "));
        }
        out
    }

    pub fn write_file(&self, path: &str, graph: &DepGraph) -> std::io::Result<()> {
        std::fs::write(path, self.generate(graph))
    }

    fn emit_phony_build(&self, out: &mut String, graph: &DepGraph, id: NodeId) {
        let node = &graph.nodes[id];
        let _ = write!(out, "build {}: phony", escape_path(node.output.as_str()));
        self.emit_edges(out, graph, id);
        out.push('\n');
    }

    fn emit_rule_and_build(&self, out: &mut String, graph: &DepGraph, id: NodeId) {
        let node = &graph.nodes[id];
        let command = join_commands(&node.commands);
        let _ = writeln!(out, "rule rule{}", id);
        if command.len() > self.response_file_limit {
            let _ = writeln!(out, " command = /bin/sh $out.rsp");
            let _ = writeln!(out, " rspfile = $out.rsp");
            let _ = writeln!(out, " rspfile_content = {}", command);
        } else {
            let _ = writeln!(out, " command = {}", command);
        }
        if node.is_restat {
            let _ = writeln!(out, " restat = 1");
        }
        let _ = write!(
            out,
            "build {}: rule{}",
            escape_path(node.output.as_str()),
            id
        );
        self.emit_edges(out, graph, id);
        out.push('\n');
    }

    fn emit_edges(&self, out: &mut String, graph: &DepGraph, id: NodeId) {
        let node = &graph.nodes[id];
        for &d in &node.deps {
            out.push(' ');
            out.push_str(&escape_path(graph.nodes[d].output.as_str()));
        }
        if !node.order_onlys.is_empty() {
            out.push_str(" ||");
            for &d in &node.order_onlys {
                out.push(' ');
                out.push_str(&escape_path(graph.nodes[d].output.as_str()));
            }
        }
    }
}

/// Join recipe lines. `-`-prefixed lines soften the separator around
/// themselves to `;`, and a trailing ignored line gains `; true` so
/// the joined command still exits zero.
fn join_commands(commands: &[Command]) -> String {
    let mut buf = String::new();
    for (i, c) in commands.iter().enumerate() {
        if i > 0 {
            let sep = if commands[i - 1].ignore_error || c.ignore_error {
                " ; "
            } else {
                " && "
            };
            buf.push_str(sep);
        }
        buf.push_str(&escape_command(&c.cmd));
    }
    if commands.last().is_some_and(|c| c.ignore_error) {
        buf.push_str(" ; true");
    }
    buf
}

/// `$` doubles; embedded newlines flatten to spaces.
fn escape_command(cmd: &str) -> String {
    cmd.replace('$', "$$").replace('\n', " ")
}

/// Ninja path escaping for spaces, colons, and dollars.
fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '$' => out.push_str("$$"),
            ' ' => out.push_str("$ "),
            ':' => out.push_str("$:"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dep::DepNode;
    use crate::sym::intern;

    fn cmd(s: &str) -> Command {
        Command {
            cmd: s.to_string(),
            echo: true,
            ignore_error: false,
        }
    }

    fn ignored(s: &str) -> Command {
        Command {
            cmd: s.to_string(),
            echo: true,
            ignore_error: true,
        }
    }

    fn simple_graph() -> DepGraph {
        let mut g = DepGraph::default();
        let mut a = DepNode::new(intern("a"));
        a.has_rule = true;
        a.commands.push(cmd("echo hi"));
        a.deps.push(1);
        a.order_onlys.push(2);
        let mut b = DepNode::new(intern("b"));
        b.parents.push(0);
        let mut c = DepNode::new(intern("c"));
        c.parents.push(0);
        g.nodes = vec![a, b, c];
        g.roots = vec![0];
        g
    }

    #[test]
    fn test_basic_emission() {
        let text = NinjaGenerator::new().generate(&simple_graph());
        assert!(text.contains("rule rule0\n command = echo hi\n"));
        assert!(text.contains("build a: rule0 b || c\n"));
        assert!(text.contains("default a\n"));
        // Leaves produce no build statements.
        assert!(!text.contains("build b:"));
    }

    #[test]
    fn test_join_with_and() {
        assert_eq!(
            join_commands(&[cmd("one"), cmd("two")]),
            "one && two"
        );
    }

    #[test]
    fn test_ignore_error_joins_with_semicolon() {
        assert_eq!(
            join_commands(&[ignored("rm -f x"), cmd("build x")]),
            "rm -f x ; build x"
        );
        assert_eq!(
            join_commands(&[cmd("one"), ignored("two")]),
            "one ; two ; true"
        );
    }

    #[test]
    fn test_dollar_escaping() {
        assert_eq!(join_commands(&[cmd("echo $PATH")]), "echo $$PATH");
    }

    #[test]
    fn test_newlines_flatten() {
        assert_eq!(join_commands(&[cmd("a\nb")]), "a b");
    }

    #[test]
    fn test_path_escaping() {
        assert_eq!(escape_path("a b:c$d"), "a$ b$:c$$d");
    }

    #[test]
    fn test_phony_node_without_commands() {
        let mut g = DepGraph::default();
        let mut all = DepNode::new(intern("all"));
        all.is_phony = true;
        all.deps.push(1);
        let mut x = DepNode::new(intern("x"));
        x.has_rule = true;
        x.commands.push(cmd("touch x"));
        x.parents.push(0);
        g.nodes = vec![all, x];
        g.roots = vec![0];
        let text = NinjaGenerator::new().generate(&g);
        assert!(text.contains("build all: phony x\n"));
        assert!(text.contains("build x: rule1\n"));
    }

    #[test]
    fn test_restat_flag() {
        let mut g = simple_graph();
        g.nodes[0].is_restat = true;
        let text = NinjaGenerator::new().generate(&g);
        assert!(text.contains(" restat = 1\n"));
    }

    #[test]
    fn test_response_file_for_long_commands() {
        let mut g = simple_graph();
        g.nodes[0].commands = vec![cmd(&"x".repeat(64))];
        let text = NinjaGenerator::with_response_file_limit(32).generate(&g);
        assert!(text.contains(" command = /bin/sh $out.rsp\n"));
        assert!(text.contains(" rspfile = $out.rsp\n"));
        assert!(text.contains(" rspfile_content = "));
    }
}
