//! Dependency Builder
//!
//! Resolves the collected rules against the file-system view into a
//! DAG of [`DepNode`]s. Three indexes are built once: merged explicit
//! rules by output, implicit rules binned by pattern shape (bare `%`,
//! by prefix, by reversed suffix, the fixed bins searched by
//! `partition_point`), and suffix rules by output extension. Rule
//! picking then walks targets recursively, binding target-specific and
//! automatic variables while recipes are expanded.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use indexmap::IndexMap;

use crate::ast::types::AssignOp;
use crate::dep::types::{Command, DepGraph, DepNode, NodeId};
use crate::eval::evaluator::{append_value, Evaluator};
use crate::eval::rule::{split_suffix_rule_name, Rule};
use crate::eval::types::{EvalError, Origin, TargetVar, Var, VarBody};
use crate::loc::Loc;
use crate::pattern::Pattern;
use crate::sym::{intern, Symbol};

/// Special targets that are recognized but have no effect here.
const UNSUPPORTED_SPECIAL_TARGETS: &[&str] = &[
    ".DEFAULT",
    ".PRECIOUS",
    ".INTERMEDIATE",
    ".SECONDARY",
    ".SECONDEXPANSION",
    ".IGNORE",
    ".LOW_RESOLUTION_TIME",
    ".SILENT",
    ".EXPORT_ALL_VARIABLES",
    ".NOTPARALLEL",
    ".ONESHELL",
    ".POSIX",
];

/// Build the resolved graph for the requested targets (or the default
/// target / all roots when none are given).
pub fn build_graph(
    ev: &mut Evaluator,
    requested: &[Symbol],
    gen_all_targets: bool,
) -> Result<DepGraph, EvalError> {
    let rules = ev.rules.clone();
    let index = RuleIndex::populate(ev, rules)?;

    let targets: Vec<Symbol> = if !requested.is_empty() {
        requested.to_vec()
    } else if gen_all_targets {
        index.root_outputs()
    } else {
        match index.default_target {
            Some(t) => vec![t],
            None => return Err(EvalError::new(Loc::builtin(), "No targets")),
        }
    };

    let mut builder = DepBuilder {
        index,
        pool: Vec::new(),
        done: HashMap::new(),
    };
    let mut roots = Vec::new();
    for t in &targets {
        if let Some(id) = builder.build_node(ev, *t, None)? {
            roots.push(id);
        }
    }
    Ok(DepGraph {
        nodes: builder.pool,
        roots,
    })
}

// ----------------------------------------------------------------------
// Rule indexing
// ----------------------------------------------------------------------

struct RuleIndex {
    explicit: IndexMap<Symbol, Rule>,
    implicit: Vec<Rule>,
    /// Indices into `implicit`, by pattern shape.
    nofix: Vec<usize>,
    by_prefix: Vec<(String, usize)>,
    by_suffix: Vec<(String, usize)>,
    /// Output extension -> (input extension, rule), in definition order.
    suffix_rules: HashMap<String, Vec<(String, Rule)>>,
    phony: HashSet<Symbol>,
    restat: HashSet<Symbol>,
    default_target: Option<Symbol>,
    /// Explicit outputs in definition order, for all-roots mode.
    output_order: Vec<Symbol>,
    all_inputs: HashSet<Symbol>,
}

impl RuleIndex {
    fn populate(ev: &mut Evaluator, rules: Vec<Rule>) -> Result<Self, EvalError> {
        let mut ix = RuleIndex {
            explicit: IndexMap::new(),
            implicit: Vec::new(),
            nofix: Vec::new(),
            by_prefix: Vec::new(),
            by_suffix: Vec::new(),
            suffix_rules: HashMap::new(),
            phony: HashSet::new(),
            restat: HashSet::new(),
            default_target: None,
            output_order: Vec::new(),
            all_inputs: HashSet::new(),
        };

        for rule in rules {
            if rule.is_suffix_rule {
                let name = rule.outputs[0].as_str();
                let (in_ext, out_ext) =
                    split_suffix_rule_name(name).expect("detected suffix rule splits");
                ix.suffix_rules
                    .entry(out_ext.to_string())
                    .or_default()
                    .push((in_ext.to_string(), rule));
                continue;
            }
            if rule.is_implicit() {
                let idx = ix.implicit.len();
                let pat = rule.output_patterns[0].as_str();
                let percent = pat.find('%').expect("validated implicit pattern");
                let (prefix, suffix) = (&pat[..percent], &pat[percent + 1..]);
                if !prefix.is_empty() {
                    ix.by_prefix.push((prefix.to_string(), idx));
                } else if !suffix.is_empty() {
                    ix.by_suffix.push((suffix.chars().rev().collect(), idx));
                } else {
                    ix.nofix.push(idx);
                }
                ix.all_inputs
                    .extend(rule.inputs.iter().chain(rule.order_only_inputs.iter()));
                ix.implicit.push(rule);
                continue;
            }

            let mut is_special = false;
            for output in rule.outputs.clone() {
                let name = output.as_str();
                match name {
                    ".PHONY" => {
                        ix.phony.extend(rule.inputs.iter().copied());
                        is_special = true;
                    }
                    ".KATI_RESTAT" => {
                        ix.restat.extend(rule.inputs.iter().copied());
                        is_special = true;
                    }
                    ".SUFFIXES" => {
                        if rule.inputs.is_empty() {
                            ix.suffix_rules.clear();
                        } else {
                            ev.diag.warning_loc(
                                rule.loc,
                                ".SUFFIXES with arguments is not supported",
                            );
                        }
                        is_special = true;
                    }
                    _ if UNSUPPORTED_SPECIAL_TARGETS.contains(&name) => {
                        ev.diag.warning_loc(
                            rule.loc,
                            format!("unsupported built-in target '{}' is ignored", name),
                        );
                        is_special = true;
                    }
                    _ => {
                        ix.merge_into_explicit(ev, output, &rule)?;
                        ix.output_order.push(output);
                    }
                }
            }
            if !is_special {
                if ix.default_target.is_none() {
                    if let Some(first) = rule.outputs.first() {
                        if !first.as_str().starts_with('.') {
                            ix.default_target = Some(*first);
                        }
                    }
                }
                ix.all_inputs
                    .extend(rule.inputs.iter().chain(rule.order_only_inputs.iter()));
            }
        }

        ix.by_prefix.sort();
        ix.by_suffix.sort();
        Ok(ix)
    }

    fn merge_into_explicit(
        &mut self,
        ev: &mut Evaluator,
        output: Symbol,
        rule: &Rule,
    ) -> Result<(), EvalError> {
        if !self.explicit.contains_key(&output) {
            self.explicit.insert(output, rule.clone());
            return Ok(());
        }
        let existing = self.explicit.get_mut(&output).expect("checked above");
        if existing.is_double_colon != rule.is_double_colon {
            return Err(EvalError::new(
                rule.loc,
                format!("target file '{}' has both : and :: entries", output),
            ));
        }
        if rule.is_double_colon {
            if !existing.output_patterns.is_empty()
                && !rule.output_patterns.is_empty()
                && existing.output_patterns != rule.output_patterns
            {
                return Err(EvalError::new(
                    rule.loc,
                    "two different output patterns on a double-colon target".to_string(),
                ));
            }
            existing.commands.extend(rule.commands.iter().cloned());
            existing.inputs.extend(rule.inputs.iter().copied());
            existing
                .order_only_inputs
                .extend(rule.order_only_inputs.iter().copied());
            return Ok(());
        }
        if !rule.commands.is_empty() {
            if !existing.commands.is_empty() {
                ev.diag.warning_loc(
                    rule.loc,
                    format!("overriding recipe for target '{}'", output),
                );
                ev.diag.warning_loc(
                    existing.loc,
                    format!("ignoring old recipe for target '{}'", output),
                );
            }
            existing.commands = rule.commands.clone();
            existing.cmd_lineno = rule.cmd_lineno;
            existing.loc = rule.loc;
            // The command-supplying rule's inputs take precedence.
            let mut inputs = rule.inputs.clone();
            inputs.extend(existing.inputs.iter().copied());
            existing.inputs = inputs;
        } else {
            existing.inputs.extend(rule.inputs.iter().copied());
        }
        existing
            .order_only_inputs
            .extend(rule.order_only_inputs.iter().copied());
        if !rule.output_patterns.is_empty() {
            existing.output_patterns = rule.output_patterns.clone();
        }
        Ok(())
    }

    /// Implicit rule candidates for a target, most recently defined
    /// first. The sorted bins bound the scan with a binary search.
    fn implicit_candidates(&self, target: &str) -> Vec<usize> {
        let mut out: Vec<usize> = self.nofix.clone();
        let end = self.by_prefix.partition_point(|(p, _)| p.as_str() <= target);
        for (p, idx) in &self.by_prefix[..end] {
            if target.starts_with(p.as_str()) {
                out.push(*idx);
            }
        }
        let rev: String = target.chars().rev().collect();
        let end = self.by_suffix.partition_point(|(s, _)| s.as_str() <= rev.as_str());
        for (s, idx) in &self.by_suffix[..end] {
            if rev.starts_with(s.as_str()) {
                out.push(*idx);
            }
        }
        out.sort_unstable();
        out.dedup();
        out.reverse();
        out
    }

    /// File existence as the rule picker sees it: a real file, an
    /// explicit-rule target, or a declared phony.
    fn exists(&self, ev: &Evaluator, sym: Symbol) -> bool {
        self.explicit.contains_key(&sym)
            || self.phony.contains(&sym)
            || ev.fs.exists(Path::new(sym.as_str()))
    }

    /// Outputs that appear in no rule's inputs: the roots, in
    /// definition order.
    fn root_outputs(&self) -> Vec<Symbol> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &o in &self.output_order {
            if seen.insert(o) && !self.all_inputs.contains(&o) {
                out.push(o);
            }
        }
        out
    }
}

// ----------------------------------------------------------------------
// Plan construction
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum NodeState {
    Building(NodeId),
    Done(NodeId),
}

/// A picked rule with inputs already substituted for the target.
struct Picked {
    rule: Rule,
    stem: Option<String>,
}

struct DepBuilder {
    index: RuleIndex,
    pool: Vec<DepNode>,
    done: HashMap<Symbol, NodeState>,
}

impl DepBuilder {
    fn build_node(
        &mut self,
        ev: &mut Evaluator,
        target: Symbol,
        needed_by: Option<NodeId>,
    ) -> Result<Option<NodeId>, EvalError> {
        match self.done.get(&target) {
            Some(NodeState::Building(_)) => {
                let by = needed_by
                    .map(|id| self.pool[id].output.as_str())
                    .unwrap_or("(top level)");
                ev.diag
                    .warning(format!("circular {} <- {} dependency dropped.", by, target));
                return Ok(None);
            }
            Some(NodeState::Done(id)) => {
                let id = *id;
                if let Some(p) = needed_by {
                    if !self.pool[id].parents.contains(&p) {
                        self.pool[id].parents.push(p);
                    }
                }
                return Ok(Some(id));
            }
            None => {}
        }

        let id = self.pool.len();
        self.pool.push(DepNode::new(target));
        self.done.insert(target, NodeState::Building(id));
        if let Some(p) = needed_by {
            self.pool[id].parents.push(p);
        }
        self.pool[id].is_phony = self.index.phony.contains(&target);
        self.pool[id].is_restat = self.index.restat.contains(&target);

        match self.pick_rule(ev, target) {
            Some(picked) => {
                self.pool[id].has_rule = true;
                self.pool[id].loc = Some(picked.rule.loc);
                self.pool[id].actual_inputs = picked.rule.inputs.clone();

                for &input in &picked.rule.inputs {
                    if let Some(cid) = self.build_node(ev, input, Some(id))? {
                        self.pool[id].deps.push(cid);
                    }
                }
                for &input in &picked.rule.order_only_inputs {
                    if let Some(cid) = self.build_node(ev, input, Some(id))? {
                        self.pool[id].order_onlys.push(cid);
                    }
                }
                let (commands, rule_vars) = self.expand_commands(ev, target, &picked)?;
                self.pool[id].commands = commands;
                self.pool[id].rule_vars = rule_vars;
            }
            None => {
                if needed_by.is_none()
                    && !self.index.phony.contains(&target)
                    && !ev.fs.exists(Path::new(target.as_str()))
                {
                    return Err(EvalError::new(
                        Loc::builtin(),
                        format!("No rule to make target '{}'", target),
                    ));
                }
                // A source file (or an assumed one): a leaf node.
                tracing::debug!(target = target.as_str(), "leaf without rule");
            }
        }

        self.done.insert(target, NodeState::Done(id));
        Ok(Some(id))
    }

    fn pick_rule(&self, ev: &mut Evaluator, target: Symbol) -> Option<Picked> {
        let explicit = self.index.explicit.get(&target);
        if let Some(er) = explicit {
            if !er.commands.is_empty() {
                return Some(self.finish_explicit(target, er));
            }
        }

        let target_str = target.as_str();
        for idx in self.index.implicit_candidates(target_str) {
            let rule = &self.index.implicit[idx];
            let pat = Pattern::new(rule.output_patterns[0].as_str());
            let Some(stem) = pat.matches(target_str) else {
                continue;
            };
            let inputs = substitute_inputs(&rule.inputs, stem);
            if !inputs.iter().all(|&i| self.index.exists(ev, i)) {
                continue;
            }
            let mut picked = rule.clone();
            picked.outputs = vec![target];
            picked.output_patterns.clear();
            picked.inputs = inputs;
            picked.order_only_inputs = substitute_inputs(&picked.order_only_inputs, stem);
            if let Some(er) = explicit {
                picked.inputs.extend(er.inputs.iter().copied());
                picked
                    .order_only_inputs
                    .extend(er.order_only_inputs.iter().copied());
            }
            return Some(Picked {
                rule: picked,
                stem: Some(stem.to_string()),
            });
        }

        if let Some(dot) = target_str.rfind('.') {
            if dot > 0 {
                let ext = &target_str[dot + 1..];
                if let Some(list) = self.index.suffix_rules.get(ext) {
                    for (in_ext, rule) in list.iter().rev() {
                        let input_name = format!("{}.{}", &target_str[..dot], in_ext);
                        let input = intern(&input_name);
                        if !self.index.exists(ev, input) {
                            continue;
                        }
                        let mut picked = rule.clone();
                        picked.outputs = vec![target];
                        picked.is_suffix_rule = true;
                        let mut inputs = vec![input];
                        inputs.extend(picked.inputs.iter().copied());
                        picked.inputs = inputs;
                        if let Some(er) = explicit {
                            picked.inputs.extend(er.inputs.iter().copied());
                            picked
                                .order_only_inputs
                                .extend(er.order_only_inputs.iter().copied());
                        }
                        return Some(Picked {
                            rule: picked,
                            stem: Some(target_str[..dot].to_string()),
                        });
                    }
                }
            }
        }

        explicit.map(|er| self.finish_explicit(target, er))
    }

    /// An explicit rule as picked for one of its outputs; a static
    /// pattern rule substitutes its inputs through the stem.
    fn finish_explicit(&self, target: Symbol, er: &Rule) -> Picked {
        let mut rule = er.clone();
        let stem = er
            .output_patterns
            .first()
            .and_then(|p| Pattern::new(p.as_str()).matches(target.as_str()))
            .map(str::to_string);
        if let Some(stem) = &stem {
            rule.inputs = substitute_inputs(&rule.inputs, stem);
            rule.order_only_inputs = substitute_inputs(&rule.order_only_inputs, stem);
        }
        Picked { rule, stem }
    }

    /// Bind target-specific and automatic variables, then expand the
    /// recipe. Returns the command list plus the target-variable
    /// snapshot.
    fn expand_commands(
        &self,
        ev: &mut Evaluator,
        target: Symbol,
        picked: &Picked,
    ) -> Result<(Vec<Command>, Vec<(Symbol, String)>), EvalError> {
        ev.vars.push_scope();
        let result = self.expand_commands_in_scope(ev, target, picked);
        ev.vars.pop_scope();
        result
    }

    fn expand_commands_in_scope(
        &self,
        ev: &mut Evaluator,
        target: Symbol,
        picked: &Picked,
    ) -> Result<(Vec<Command>, Vec<(Symbol, String)>), EvalError> {
        let tsvs: Vec<TargetVar> = ev.rule_vars.get(&target).cloned().unwrap_or_default();
        for tv in &tsvs {
            apply_target_var(ev, tv)?;
        }
        let mut rule_vars = Vec::new();
        for tv in &tsvs {
            if rule_vars.iter().any(|(n, _)| *n == tv.name) {
                continue;
            }
            let value = match ev.vars.lookup(tv.name).cloned() {
                Some(Var {
                    body: VarBody::Simple(s),
                    ..
                }) => s,
                Some(Var {
                    body: VarBody::Recursive(e),
                    ..
                }) => ev.eval_to_str(&e)?,
                None => String::new(),
            };
            rule_vars.push((tv.name, value));
        }

        self.bind_auto_vars(ev, target, picked);

        let mut commands = Vec::new();
        for value in &picked.rule.commands {
            let text = ev.eval_to_str(value)?;
            for line in text.split('\n') {
                if let Some(cmd) = parse_command_line(line) {
                    commands.push(cmd);
                }
            }
        }
        Ok((commands, rule_vars))
    }

    fn bind_auto_vars(&self, ev: &mut Evaluator, target: Symbol, picked: &Picked) {
        let inputs: Vec<&str> = picked.rule.inputs.iter().map(|s| s.as_str()).collect();

        let mut uniq: Vec<&str> = Vec::new();
        for i in &inputs {
            if !uniq.contains(i) {
                uniq.push(i);
            }
        }

        let target_mtime = ev.fs.stat(Path::new(target.as_str())).map(|s| s.mtime);
        let newer: Vec<&str> = inputs
            .iter()
            .filter(|i| match target_mtime {
                None => true,
                Some(t) => ev
                    .fs
                    .stat(Path::new(**i))
                    .is_some_and(|s| s.mtime > t),
            })
            .copied()
            .collect();

        let defs: [(&str, String); 6] = [
            ("@", target.as_str().to_string()),
            ("<", inputs.first().copied().unwrap_or("").to_string()),
            ("^", uniq.join(" ")),
            ("+", inputs.join(" ")),
            ("?", newer.join(" ")),
            ("*", picked.stem.clone().unwrap_or_default()),
        ];
        for (name, value) in defs {
            ev.vars
                .define_scoped(intern(name), Var::simple(value, Origin::Automatic));
        }
    }
}

/// Substitute each `%` input through the matched stem.
fn substitute_inputs(inputs: &[Symbol], stem: &str) -> Vec<Symbol> {
    inputs
        .iter()
        .map(|i| {
            let s = i.as_str();
            if s.contains('%') {
                intern(&s.replace('%', stem))
            } else {
                *i
            }
        })
        .collect()
}

/// Apply a target-specific assignment into the open scope. An append
/// rebuilds the variable in the scope, combining with the outer value.
fn apply_target_var(ev: &mut Evaluator, tv: &TargetVar) -> Result<(), EvalError> {
    let origin = if tv.directive.is_override {
        Origin::Override
    } else {
        Origin::File
    };
    match tv.op {
        AssignOp::ColonEq => {
            let v = ev.eval_to_str(&tv.rhs)?;
            ev.vars.define_scoped(tv.name, Var::simple(v, origin));
        }
        AssignOp::Eq => {
            ev.vars
                .define_scoped(tv.name, Var::recursive(tv.rhs.clone(), origin));
        }
        AssignOp::QuestionEq => {
            if ev.vars.lookup(tv.name).is_none() {
                ev.vars
                    .define_scoped(tv.name, Var::recursive(tv.rhs.clone(), origin));
            }
        }
        AssignOp::PlusEq => match ev.vars.lookup(tv.name).cloned() {
            None => {
                ev.vars
                    .define_scoped(tv.name, Var::recursive(tv.rhs.clone(), origin));
            }
            Some(old) => match old.body {
                VarBody::Recursive(e) => {
                    ev.vars.define_scoped(
                        tv.name,
                        Var::recursive(append_value(e, tv.rhs.clone()), origin),
                    );
                }
                VarBody::Simple(s) => {
                    let addition = ev.eval_to_str(&tv.rhs)?;
                    ev.vars
                        .define_scoped(tv.name, Var::simple(format!("{} {}", s, addition), origin));
                }
            },
        },
    }
    if tv.directive.is_export {
        ev.vars.set_exported(tv.name, true);
    }
    Ok(())
}

/// Strip recipe prefixes: `@` silences, `-` ignores errors, `+` forces
/// execution (meaningless for graph generation, just stripped).
fn parse_command_line(line: &str) -> Option<Command> {
    let mut rest = line.trim_start_matches([' ', '\t']);
    let mut echo = true;
    let mut ignore_error = false;
    loop {
        if let Some(r) = rest.strip_prefix('@') {
            echo = false;
            rest = r;
        } else if let Some(r) = rest.strip_prefix('-') {
            ignore_error = true;
            rest = r;
        } else if let Some(r) = rest.strip_prefix('+') {
            rest = r;
        } else {
            break;
        }
    }
    if rest.trim().is_empty() {
        return None;
    }
    Some(Command {
        cmd: rest.to_string(),
        echo,
        ignore_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::fs::FsCache;
    use crate::parser::parser::parse;
    use std::fs::File;
    use std::path::PathBuf;
    use std::sync::Arc;

    struct TreeGuard {
        _lock: std::sync::MutexGuard<'static, ()>,
        dir: tempfile::TempDir,
        saved_cwd: PathBuf,
    }

    fn enter_tree(files: &[&str]) -> TreeGuard {
        let lock = crate::test_support::lock_cwd();
        let dir = tempfile::tempdir().unwrap();
        for f in files {
            File::create(dir.path().join(f)).unwrap();
        }
        let saved_cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        TreeGuard {
            _lock: lock,
            dir,
            saved_cwd,
        }
    }

    impl Drop for TreeGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.saved_cwd);
            let _ = &self.dir;
        }
    }

    fn graph_for(src: &str, targets: &[&str]) -> (DepGraph, Evaluator) {
        let mut ev = Evaluator::new(Arc::new(FsCache::new()), Diagnostics::new(true), false);
        let mk = parse(src, "test.mk").unwrap();
        ev.eval_makefile(&mk).unwrap();
        let targets: Vec<Symbol> = targets.iter().map(|t| intern(t)).collect();
        let g = build_graph(&mut ev, &targets, false).unwrap();
        (g, ev)
    }

    fn cmds(g: &DepGraph, id: NodeId) -> Vec<&str> {
        g.nodes[id].commands.iter().map(|c| c.cmd.as_str()).collect()
    }

    #[test]
    fn test_explicit_rule_default_target() {
        let (g, _) = graph_for("a: b\n\techo hi\n", &[]);
        assert_eq!(g.roots.len(), 1);
        let a = &g.nodes[g.roots[0]];
        assert_eq!(a.output, intern("a"));
        assert!(a.has_rule);
        assert_eq!(g.format_node(g.roots[0]), "a: b");
        assert_eq!(cmds(&g, g.roots[0]), vec!["echo hi"]);
        // b is a leaf.
        let b = &g.nodes[a.deps[0]];
        assert!(!b.has_rule);
        assert!(b.commands.is_empty());
        assert!(g.check_edge_symmetry());
    }

    #[test]
    fn test_pattern_rule_resolution() {
        let _t = enter_tree(&["foo.c"]);
        let (g, _) = graph_for("%.o: %.c\n\tcc -c $<\n", &["foo.o"]);
        let n = &g.nodes[g.roots[0]];
        assert_eq!(g.format_node(g.roots[0]), "foo.o: foo.c");
        assert_eq!(n.actual_inputs, vec![intern("foo.c")]);
        assert_eq!(cmds(&g, g.roots[0]), vec!["cc -c foo.c"]);
    }

    #[test]
    fn test_pattern_rule_requires_existing_input() {
        let _t = enter_tree(&[]);
        let mut ev = Evaluator::new(Arc::new(FsCache::new()), Diagnostics::new(true), false);
        let mk = parse("%.o: %.c\n\tcc -c $<\n", "test.mk").unwrap();
        ev.eval_makefile(&mk).unwrap();
        let err = build_graph(&mut ev, &[intern("foo.o")], false).unwrap_err();
        assert!(err.msg.contains("No rule to make target 'foo.o'"));
    }

    #[test]
    fn test_last_pattern_rule_wins() {
        let _t = enter_tree(&["x.c"]);
        let (g, _) = graph_for(
            "%.o: %.c\n\tfirst $<\n%.o: %.c\n\tsecond $<\n",
            &["x.o"],
        );
        assert_eq!(cmds(&g, g.roots[0]), vec!["second x.c"]);
    }

    #[test]
    fn test_wildcard_objects_scenario() {
        let _t = enter_tree(&["a.c", "b.c"]);
        let (g, _) = graph_for(
            "SRC:=$(wildcard *.c)\nOBJ:=$(patsubst %.c,%.o,$(SRC))\nall: $(OBJ)\n%.o: %.c\n\tcc -c $<\n",
            &[],
        );
        let all = &g.nodes[g.roots[0]];
        assert_eq!(all.output, intern("all"));
        assert_eq!(all.deps.len(), 2);
        let mut deps: Vec<&str> = all
            .deps
            .iter()
            .map(|&d| g.nodes[d].output.as_str())
            .collect();
        deps.sort();
        assert_eq!(deps, vec!["a.o", "b.o"]);
    }

    #[test]
    fn test_circular_dependency_dropped() {
        let (g, ev) = graph_for("a: b\nb: a\n", &[]);
        let a = &g.nodes[g.roots[0]];
        assert_eq!(a.deps.len(), 1);
        let b = &g.nodes[a.deps[0]];
        // The back edge b -> a was dropped.
        assert!(b.deps.is_empty());
        assert!(ev
            .diag
            .warnings()
            .any(|w| w.message.contains("dependency dropped")));
        assert!(g.check_edge_symmetry());
    }

    #[test]
    fn test_circular_drop_is_deterministic() {
        let first = graph_for("a: b\nb: a\n", &[]).0;
        for _ in 0..3 {
            let again = graph_for("a: b\nb: a\n", &[]).0;
            assert_eq!(first.format_node(0), again.format_node(0));
            assert_eq!(first.nodes.len(), again.nodes.len());
        }
    }

    #[test]
    fn test_phony_and_restat() {
        let (g, _) = graph_for(".PHONY: all\n.KATI_RESTAT: all\nall: x\n\ttouch x\n", &[]);
        let all = &g.nodes[g.roots[0]];
        assert!(all.is_phony);
        assert!(all.is_restat);
    }

    #[test]
    fn test_double_colon_concatenates() {
        let (g, _) = graph_for("a:: x\n\tone\na:: y\n\ttwo\n", &[]);
        assert_eq!(cmds(&g, g.roots[0]), vec!["one", "two"]);
        assert_eq!(g.format_node(g.roots[0]), "a: x y");
    }

    #[test]
    fn test_colon_mix_is_error() {
        let mut ev = Evaluator::new(Arc::new(FsCache::new()), Diagnostics::new(true), false);
        let mk = parse("a: x\na:: y\n", "test.mk").unwrap();
        ev.eval_makefile(&mk).unwrap();
        let err = build_graph(&mut ev, &[], false).unwrap_err();
        assert!(err.msg.contains("both : and :: entries"));
    }

    #[test]
    fn test_duplicate_recipe_warns_last_wins() {
        let (g, ev) = graph_for("a:\n\told\na:\n\tnew\n", &[]);
        assert_eq!(cmds(&g, g.roots[0]), vec!["new"]);
        assert!(ev
            .diag
            .warnings()
            .any(|w| w.message.contains("overriding recipe for target 'a'")));
        assert!(ev
            .diag
            .warnings()
            .any(|w| w.message.contains("ignoring old recipe for target 'a'")));
    }

    #[test]
    fn test_static_pattern_rule() {
        let _t = enter_tree(&["a.c", "b.c"]);
        let (g, _) = graph_for("a.o b.o: %.o: %.c\n\tcc -c $< -o $@\n", &["b.o"]);
        assert_eq!(g.format_node(g.roots[0]), "b.o: b.c");
        assert_eq!(cmds(&g, g.roots[0]), vec!["cc -c b.c -o b.o"]);
    }

    #[test]
    fn test_suffix_rule() {
        let _t = enter_tree(&["util.c"]);
        let (g, _) = graph_for(".c.o:\n\tcc -c $<\n", &["util.o"]);
        assert_eq!(g.format_node(g.roots[0]), "util.o: util.c");
        assert_eq!(cmds(&g, g.roots[0]), vec!["cc -c util.c"]);
    }

    #[test]
    fn test_suffixes_clears_suffix_rules() {
        let _t = enter_tree(&["util.c"]);
        let mut ev = Evaluator::new(Arc::new(FsCache::new()), Diagnostics::new(true), false);
        let mk = parse(".c.o:\n\tcc -c $<\n.SUFFIXES:\n", "test.mk").unwrap();
        ev.eval_makefile(&mk).unwrap();
        let err = build_graph(&mut ev, &[intern("util.o")], false).unwrap_err();
        assert!(err.msg.contains("No rule to make target"));
    }

    #[test]
    fn test_unsupported_special_target_warns() {
        let (_, ev) = graph_for(".NOTPARALLEL:\nall:\n\ttrue\n", &[]);
        assert!(ev
            .diag
            .warnings()
            .any(|w| w.message.contains("unsupported built-in target '.NOTPARALLEL'")));
    }

    #[test]
    fn test_default_target_skips_dot_rules() {
        let (g, _) = graph_for(".PHONY: x\nreal:\n\ttrue\n", &[]);
        assert_eq!(g.nodes[g.roots[0]].output, intern("real"));
    }

    #[test]
    fn test_no_targets_error() {
        let mut ev = Evaluator::new(Arc::new(FsCache::new()), Diagnostics::new(true), false);
        let mk = parse("A := 1\n", "test.mk").unwrap();
        ev.eval_makefile(&mk).unwrap();
        let err = build_graph(&mut ev, &[], false).unwrap_err();
        assert_eq!(err.msg, "No targets");
    }

    #[test]
    fn test_gen_all_targets_roots() {
        let mut ev = Evaluator::new(Arc::new(FsCache::new()), Diagnostics::new(true), false);
        let mk = parse("a: b\nb:\n\ttrue\nc:\n\ttrue\n", "test.mk").unwrap();
        ev.eval_makefile(&mk).unwrap();
        let g = build_graph(&mut ev, &[], true).unwrap();
        let roots: Vec<&str> = g.roots.iter().map(|&r| g.nodes[r].output.as_str()).collect();
        assert_eq!(roots, vec!["a", "c"]);
    }

    #[test]
    fn test_order_only_deps() {
        let (g, _) = graph_for("a: b | c\n\ttrue\n", &[]);
        assert_eq!(g.format_node(g.roots[0]), "a: b || c");
        assert!(g.check_edge_symmetry());
    }

    #[test]
    fn test_target_specific_vars_in_commands() {
        let (g, _) = graph_for(
            "CFLAGS := -O2\na: CFLAGS += -g\na:\n\tcc $(CFLAGS)\nb:\n\tcc $(CFLAGS)\n",
            &["a", "b"],
        );
        assert_eq!(cmds(&g, g.roots[0]), vec!["cc -O2 -g"]);
        assert_eq!(cmds(&g, g.roots[1]), vec!["cc -O2"]);
        let a = &g.nodes[g.roots[0]];
        assert_eq!(a.rule_vars, vec![(intern("CFLAGS"), "-O2 -g".to_string())]);
    }

    #[test]
    fn test_auto_vars() {
        let (g, _) = graph_for("out: in1 in2 in1\n\tlink $@ $^ $+\n", &[]);
        assert_eq!(
            cmds(&g, g.roots[0]),
            vec!["link out in1 in2 in1 in2 in1"]
        );
    }

    #[test]
    fn test_command_prefixes() {
        let (g, _) = graph_for("a:\n\t@echo quiet\n\t-rm -f x\n\t@-+combo\n", &[]);
        let n = &g.nodes[g.roots[0]];
        assert!(!n.commands[0].echo);
        assert!(!n.commands[0].ignore_error);
        assert!(n.commands[1].ignore_error);
        assert!(n.commands[1].echo);
        assert!(!n.commands[2].echo);
        assert!(n.commands[2].ignore_error);
        assert_eq!(n.commands[2].cmd, "combo");
    }

    #[test]
    fn test_multiline_variable_becomes_commands() {
        let (g, _) = graph_for("define TWO\necho one\necho two\nendef\na:\n\t$(TWO)\n", &[]);
        assert_eq!(cmds(&g, g.roots[0]), vec!["echo one", "echo two"]);
    }

    #[test]
    fn test_diamond_shares_node() {
        let (g, _) = graph_for("a: b c\nb: d\nc: d\nd:\n\ttrue\n", &[]);
        let d_nodes: Vec<NodeId> = g
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.output == intern("d"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(d_nodes.len(), 1);
        assert_eq!(g.nodes[d_nodes[0]].parents.len(), 2);
    }
}
