//! Evaluator
//!
//! Executes the statement tree: expands expressions, maintains the
//! variable table, collects rules and target-specific variables, and
//! handles `include`, `export`, conditionals, and `$(eval)` fragments.
//! Everything the outside world contributes (files, environment,
//! globs, shell output) is recorded for the regeneration check.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::types::{
    AssignDirective, AssignOp, AssignStmt, CommandStmt, CondKind, ExportStmt, IfStmt, IncludeStmt,
    RuleSep, RuleStmt, Stmt, VpathStmt,
};
use crate::diag::Diagnostics;
use crate::eval::rule::{parse_rule_line, Rule};
use crate::eval::types::{EvalError, Origin, TargetVar, Var, VarBody};
use crate::eval::vars::VarTable;
use crate::expr::parser::parse_expr;
use crate::expr::sink::WordWriter;
use crate::expr::types::Value;
use crate::find::FindEmulator;
use crate::fs::{FsCache, GlobCache};
use crate::loc::Loc;
use crate::parser::parser::{parse, parse_eval_text, Makefile};
use crate::parser::types::{MAX_EVAL_DEPTH, MAX_INCLUDE_DEPTH};
use crate::pattern::Pattern;
use crate::regen::{time_ms, DirRecord, RegenRecorder, ShellKind};
use crate::shell;
use crate::sym::{intern, Symbol};

const MAX_CALL_DEPTH: usize = 256;

pub struct Evaluator {
    pub vars: VarTable,
    pub rules: Vec<Rule>,
    pub rule_vars: IndexMap<Symbol, Vec<TargetVar>>,
    pub diag: Diagnostics,
    pub fs: Arc<FsCache>,
    pub glob: GlobCache,
    pub regen: RegenRecorder,
    pub loc: Loc,
    pub makefile_list: Vec<Symbol>,
    pub use_find_emulator: bool,
    last_rule: Option<usize>,
    params: Vec<Vec<String>>,
    expanding: Vec<Symbol>,
    include_depth: usize,
    eval_depth: usize,
}

impl Evaluator {
    pub fn new(fs: Arc<FsCache>, diag: Diagnostics, use_find_emulator: bool) -> Self {
        Self {
            vars: VarTable::new(),
            rules: Vec::new(),
            rule_vars: IndexMap::new(),
            diag,
            fs,
            glob: GlobCache::new(),
            regen: RegenRecorder::new(),
            loc: Loc::builtin(),
            makefile_list: Vec::new(),
            use_find_emulator,
            last_rule: None,
            params: Vec::new(),
            expanding: Vec::new(),
            include_depth: 0,
            eval_depth: 0,
        }
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    /// Populate the table from the process environment. `SHELL` is
    /// deliberately not imported; the default below governs it.
    pub fn seed_environment(&mut self) {
        for (k, v) in std::env::vars() {
            if k == "SHELL" {
                continue;
            }
            self.vars
                .define_global(intern(&k), Var::simple(v, Origin::Environment));
        }
    }

    /// Built-in defaults and bookkeeping variables.
    pub fn seed_defaults(&mut self) {
        self.vars
            .define_global(intern("SHELL"), Var::simple("/bin/sh", Origin::Default));
        if let Ok(cwd) = std::env::current_dir() {
            self.vars.define_global(
                intern("CURDIR"),
                Var::simple(cwd.to_string_lossy(), Origin::File),
            );
        }
    }

    /// Apply `VAR=VALUE` bindings from the command line.
    pub fn seed_command_line(&mut self, defs: &[String]) -> Result<(), EvalError> {
        self.loc = Loc::builtin();
        for def in defs {
            let Some(eq) = def.find('=') else { continue };
            let (op, name_end) = match def[..eq].bytes().last() {
                Some(b':') => (AssignOp::ColonEq, eq - 1),
                Some(b'+') => (AssignOp::PlusEq, eq - 1),
                Some(b'?') => (AssignOp::QuestionEq, eq - 1),
                _ => (AssignOp::Eq, eq),
            };
            let name = def[..name_end].trim();
            if name.is_empty() {
                return Err(self.err("empty variable name"));
            }
            let rhs = parse_expr(self.loc, &def[eq + 1..])?;
            self.assign_var(intern(name), &rhs, op, Origin::CommandLine)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statement execution
    // ------------------------------------------------------------------

    pub fn eval_makefile(&mut self, mk: &Makefile) -> Result<(), EvalError> {
        for (loc, msg) in &mk.warnings {
            self.diag.warning_loc(*loc, msg);
        }
        self.eval_stmts(&mk.stmts)
    }

    pub fn eval_stmts(&mut self, stmts: &[Stmt]) -> Result<(), EvalError> {
        let saved = self.loc;
        for stmt in stmts {
            self.loc = stmt.loc();
            self.eval_stmt(stmt)?;
        }
        self.loc = saved;
        Ok(())
    }

    fn eval_stmt(&mut self, stmt: &Stmt) -> Result<(), EvalError> {
        match stmt {
            Stmt::Assign(s) => self.eval_assign(s),
            Stmt::Rule(s) => self.eval_rule(s),
            Stmt::Command(s) => self.eval_command(s),
            Stmt::If(s) => self.eval_if(s),
            Stmt::Include(s) => self.eval_include(s),
            Stmt::Export(s) => self.eval_export(s),
            Stmt::Vpath(s) => self.eval_vpath(s),
            Stmt::ParseError(s) => Err(EvalError::new(s.loc, s.msg.clone())),
        }
    }

    fn eval_assign(&mut self, s: &AssignStmt) -> Result<(), EvalError> {
        self.last_rule = None;
        let name_text = self.eval_to_str(&s.lhs)?;
        let name = name_text.trim();
        if name.is_empty() {
            return Err(self.err("empty variable name"));
        }
        let sym = intern(name);
        let origin = if s.directive.is_override {
            Origin::Override
        } else {
            Origin::File
        };
        self.assign_var(sym, &s.rhs, s.op, origin)?;
        if s.directive.is_export {
            self.vars.set_exported(sym, true);
        }
        Ok(())
    }

    /// Core assignment semantics shared by makefile assignments,
    /// command-line bindings, and target-specific variables.
    pub fn assign_var(
        &mut self,
        sym: Symbol,
        rhs: &Value,
        op: AssignOp,
        origin: Origin,
    ) -> Result<(), EvalError> {
        let var = match op {
            AssignOp::Eq => Var::recursive(rhs.clone(), origin),
            AssignOp::ColonEq => {
                let v = self.eval_to_str(rhs)?;
                Var::simple(v, origin)
            }
            AssignOp::QuestionEq => {
                // `?=` observes whether the name is defined, which may
                // come from the environment; record the read.
                if self.lookup_var(sym).is_some() {
                    return Ok(());
                }
                Var::recursive(rhs.clone(), origin)
            }
            AssignOp::PlusEq => match self.vars.lookup_global(sym).cloned() {
                None => Var::recursive(rhs.clone(), origin),
                Some(old) => {
                    if old.origin == Origin::Environment {
                        let value = old.string_value().into_owned();
                        self.regen.record_env(sym.as_str(), Some(&value));
                    }
                    match old.body {
                        VarBody::Recursive(old_expr) => {
                            Var::recursive(append_value(old_expr, rhs.clone()), origin)
                        }
                        VarBody::Simple(old_text) => {
                            let addition = self.eval_to_str(rhs)?;
                            Var::simple(format!("{} {}", old_text, addition), origin)
                        }
                    }
                }
            },
        };
        self.vars.define_global(sym, var);
        Ok(())
    }

    fn eval_rule(&mut self, r: &RuleStmt) -> Result<(), EvalError> {
        let lhs = self.eval_to_str(&r.lhs)?;
        if r.sep == RuleSep::Eq {
            return self.eval_target_specific_var(&lhs, r);
        }
        match parse_rule_line(self.loc, &lhs)? {
            None => {
                self.last_rule = None;
            }
            Some(mut rule) => {
                if let (RuleSep::Semicolon, Some(rhs)) = (r.sep, &r.rhs) {
                    rule.cmd_lineno = self.loc.line;
                    rule.commands.push(rhs.clone());
                }
                self.rules.push(rule);
                self.last_rule = Some(self.rules.len() - 1);
            }
        }
        Ok(())
    }

    /// `target...: NAME op VALUE`
    fn eval_target_specific_var(&mut self, lhs: &str, r: &RuleStmt) -> Result<(), EvalError> {
        let Some(colon) = lhs.find(':') else {
            return Err(self.err("missing separator"));
        };
        let targets_text = &lhs[..colon];
        let mut rest = &lhs[colon + 1..];
        if let Some(s) = rest.strip_prefix(':') {
            rest = s;
        }
        let mut words: Vec<&str> = rest.split_ascii_whitespace().collect();
        let mut directive = AssignDirective::default();
        while let Some(first) = words.first() {
            match *first {
                "override" => {
                    directive.is_override = true;
                    words.remove(0);
                }
                "export" => {
                    directive.is_export = true;
                    words.remove(0);
                }
                _ => break,
            }
        }
        let Some(name) = words.last() else {
            return Err(self.err("empty variable name"));
        };
        let name = intern(name);
        let op = r.op.unwrap_or(AssignOp::Eq);
        let rhs = r.rhs.clone().unwrap_or_else(|| Value::literal(""));
        for target in targets_text.split_ascii_whitespace() {
            self.rule_vars
                .entry(intern(target))
                .or_default()
                .push(TargetVar {
                    name,
                    op,
                    rhs: rhs.clone(),
                    directive,
                    loc: self.loc,
                });
        }
        self.last_rule = None;
        Ok(())
    }

    fn eval_command(&mut self, c: &CommandStmt) -> Result<(), EvalError> {
        match self.last_rule {
            Some(i) => {
                let rule = &mut self.rules[i];
                if rule.commands.is_empty() && rule.cmd_lineno == 0 {
                    rule.cmd_lineno = c.loc.line;
                }
                rule.commands.push(c.expr.clone());
                Ok(())
            }
            None => Err(self.err("commands commence before first target")),
        }
    }

    fn eval_if(&mut self, s: &IfStmt) -> Result<(), EvalError> {
        let taken = match s.kind {
            CondKind::Ifdef | CondKind::Ifndef => {
                let name_text = self.eval_to_str(&s.lhs)?;
                let sym = intern(name_text.trim());
                let defined = self
                    .lookup_var(sym)
                    .is_some_and(|v| !v.string_value().is_empty());
                defined == (s.kind == CondKind::Ifdef)
            }
            CondKind::Ifeq | CondKind::Ifneq => {
                let lhs = self.eval_to_str(&s.lhs)?;
                let rhs = self.eval_to_str(s.rhs.as_ref().expect("ifeq has rhs"))?;
                (lhs == rhs) == (s.kind == CondKind::Ifeq)
            }
        };
        if taken {
            self.eval_stmts(&s.true_stmts)
        } else {
            self.eval_stmts(&s.false_stmts)
        }
    }

    fn eval_include(&mut self, s: &IncludeStmt) -> Result<(), EvalError> {
        let text = self.eval_to_str(&s.expr)?;
        let files: Vec<String> = text.split_ascii_whitespace().map(str::to_string).collect();
        for file in files {
            self.eval_file(&file, s.should_exist)?;
        }
        Ok(())
    }

    /// Read, parse, and evaluate one makefile. Used for the top-level
    /// file and every include.
    pub fn eval_file(&mut self, fname: &str, should_exist: bool) -> Result<(), EvalError> {
        if self.include_depth >= MAX_INCLUDE_DEPTH {
            return Err(self.err(format!(
                "too many nested includes (>{})",
                MAX_INCLUDE_DEPTH
            )));
        }
        let bytes = match std::fs::read(fname) {
            Ok(b) => b,
            Err(e) => {
                self.regen.record_file(fname, None, None);
                if should_exist {
                    return Err(self.err(format!("{}: {}", fname, io_message(&e))));
                }
                return Ok(());
            }
        };
        let mtime = std::fs::metadata(fname).ok().and_then(|m| m.modified().ok());
        self.regen.record_file(fname, Some(&bytes), mtime);
        let content = String::from_utf8_lossy(&bytes);
        let mk = parse(&content, fname)?;

        self.makefile_list.push(intern(fname));
        self.update_makefile_list();

        let call_loc = self.loc;
        self.include_depth += 1;
        let result = self.eval_makefile(&mk);
        self.include_depth -= 1;
        result.map_err(|e| {
            if self.include_depth > 0 {
                e.with_frame(call_loc)
            } else {
                e
            }
        })
    }

    fn update_makefile_list(&mut self) {
        let joined = self
            .makefile_list
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        self.vars
            .define_global_forced(intern("MAKEFILE_LIST"), Var::simple(joined, Origin::File));
    }

    fn eval_export(&mut self, s: &ExportStmt) -> Result<(), EvalError> {
        let text = self.eval_to_str(&s.expr)?;
        for word in text.split_ascii_whitespace() {
            self.vars.set_exported(intern(word), s.is_export);
        }
        Ok(())
    }

    fn eval_vpath(&mut self, s: &VpathStmt) -> Result<(), EvalError> {
        let loc = s.loc;
        self.diag.warning_loc(loc, "vpath is not supported, ignoring");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expression expansion
    // ------------------------------------------------------------------

    pub fn eval_to_str(&mut self, v: &Value) -> Result<String, EvalError> {
        let mut out = String::new();
        self.eval_value(v, &mut out)?;
        Ok(out)
    }

    pub fn eval_value(&mut self, v: &Value, out: &mut String) -> Result<(), EvalError> {
        match v {
            Value::Literal(s) => {
                out.push_str(s);
                Ok(())
            }
            Value::Concat(parts) => {
                for p in parts {
                    self.eval_value(p, out)?;
                }
                Ok(())
            }
            Value::ParamRef(n) => {
                if let Some(p) = self.param(*n as usize) {
                    out.push_str(&p);
                }
                Ok(())
            }
            Value::VarRef { name, .. } => {
                let n = self.eval_to_str(name)?;
                self.expand_var_named(&n, out)
            }
            Value::SubstRef {
                name, pat, subst, ..
            } => {
                let n = self.eval_to_str(name)?;
                let pat_text = self.eval_to_str(pat)?;
                let subst_text = self.eval_to_str(subst)?;
                let mut val = String::new();
                self.expand_var_named(&n, &mut val)?;
                let pattern = Pattern::new(&pat_text);
                let mut w = WordWriter::new(out);
                for word in val.split_ascii_whitespace() {
                    w.maybe_add_space();
                    pattern.append_subst_ref(word, &subst_text, w.out);
                }
                Ok(())
            }
            Value::Func(call) => (call.f.func)(self, &call.args, out),
        }
    }

    fn param(&self, n: usize) -> Option<String> {
        if n == 0 {
            return None;
        }
        self.params.last().and_then(|p| p.get(n - 1)).cloned()
    }

    /// Expand one variable reference by (already expanded) name.
    fn expand_var_named(&mut self, name: &str, out: &mut String) -> Result<(), EvalError> {
        // Positional parameters of the innermost `call`.
        if !name.is_empty()
            && name.bytes().all(|b| b.is_ascii_digit())
            && !self.params.is_empty()
        {
            let n: usize = name.parse().unwrap_or(0);
            if let Some(p) = self.param(n) {
                out.push_str(&p);
            }
            return Ok(());
        }
        // `$(@D)` / `$(@F)` style automatic variants.
        if let Some(result) = self.expand_auto_variant(name)? {
            out.push_str(&result);
            return Ok(());
        }
        let sym = intern(name);
        let Some(var) = self.lookup_var(sym) else {
            return Ok(());
        };
        match var.body {
            VarBody::Simple(s) => {
                out.push_str(&s);
                Ok(())
            }
            VarBody::Recursive(expr) => {
                if self.expanding.contains(&sym) {
                    return Err(self.err(format!(
                        "Recursive variable '{}' references itself (eventually)",
                        name
                    )));
                }
                self.expanding.push(sym);
                let result = self.eval_value(&expr, out);
                self.expanding.pop();
                result
            }
        }
    }

    /// Directory/file variants of automatic variables: two-character
    /// names like `@D`, `<F`.
    fn expand_auto_variant(&mut self, name: &str) -> Result<Option<String>, EvalError> {
        let b = name.as_bytes();
        if b.len() != 2
            || !matches!(b[0], b'@' | b'<' | b'^' | b'+' | b'?' | b'*')
            || !(b[1] == b'D' || b[1] == b'F')
        {
            return Ok(None);
        }
        let mut base = String::new();
        self.expand_var_named(&name[..1], &mut base)?;
        let mut out = String::new();
        let mut w = WordWriter::new(&mut out);
        for word in base.split_ascii_whitespace() {
            if b[1] == b'D' {
                w.write(dir_part(word));
            } else {
                w.write(file_part(word));
            }
        }
        Ok(Some(out))
    }

    /// Look a variable up, recording environment reads (and absent
    /// names) for the regeneration check.
    pub fn lookup_var(&mut self, sym: Symbol) -> Option<Var> {
        let found = self.vars.lookup(sym).cloned();
        match &found {
            Some(v) if v.origin == Origin::Environment => {
                let value = v.string_value().into_owned();
                self.regen.record_env(sym.as_str(), Some(&value));
            }
            None => {
                self.regen.record_env(sym.as_str(), None);
            }
            _ => {}
        }
        found
    }

    // ------------------------------------------------------------------
    // Services used by the function library
    // ------------------------------------------------------------------

    pub fn err(&self, msg: impl Into<String>) -> EvalError {
        EvalError::new(self.loc, msg)
    }

    pub fn push_params(&mut self, params: Vec<String>) -> Result<(), EvalError> {
        if self.params.len() >= MAX_CALL_DEPTH {
            return Err(self.err(format!("call nesting too deep (>{})", MAX_CALL_DEPTH)));
        }
        self.params.push(params);
        Ok(())
    }

    pub fn pop_params(&mut self) {
        self.params.pop().expect("pop_params without push_params");
    }

    pub fn wildcard(&mut self, pattern: &str) -> Vec<String> {
        let Evaluator { glob, fs, .. } = self;
        glob.glob(fs, pattern)
    }

    /// Re-parse and evaluate a `$(eval ...)` fragment in place.
    pub fn eval_text(&mut self, text: &str) -> Result<(), EvalError> {
        if self.eval_depth >= MAX_EVAL_DEPTH {
            return Err(self.err(format!("too many nested evals (>{})", MAX_EVAL_DEPTH)));
        }
        let call_loc = self.loc;
        let mk = parse_eval_text(text, call_loc)?;
        self.eval_depth += 1;
        let result = self.eval_makefile(&mk);
        self.eval_depth -= 1;
        result.map_err(|e| {
            if e.loc == call_loc {
                e
            } else {
                e.with_frame(call_loc)
            }
        })
    }

    /// `$(shell ...)`: optimizer first, real shell otherwise. Every
    /// command and its output lands in the regeneration log.
    pub fn shell_exec(&mut self, cmd: &str) -> Result<String, EvalError> {
        if let Some(rec) = shell::recognize(cmd) {
            match rec {
                shell::Recognized::Date { format } => {
                    let out = shell::frozen_date(format.as_deref());
                    self.regen.record_shell(cmd, &out, ShellKind::Date);
                    return Ok(out);
                }
                shell::Recognized::Rot13 { text } => {
                    let out = shell::rot13(&text);
                    self.regen.record_shell(cmd, &out, ShellKind::Plain);
                    return Ok(out);
                }
                shell::Recognized::Find(fc) if self.use_find_emulator => {
                    if let Some(res) = FindEmulator::new(&self.fs).find(&fc) {
                        let output = res.words.join(" ");
                        let read_dirs = res
                            .read_dirs
                            .iter()
                            .map(|d| DirRecord {
                                path: d.clone(),
                                mtime_ms: self
                                    .fs
                                    .dir_mtime(Path::new(d))
                                    .map(time_ms)
                                    .unwrap_or(0),
                                exists: self.fs.exists(Path::new(d)),
                            })
                            .collect();
                        let testdir = fc
                            .testdir
                            .as_ref()
                            .map(|t| (t.clone(), self.fs.is_dir(Path::new(t))));
                        self.regen
                            .record_shell(cmd, &output, ShellKind::Find { read_dirs, testdir });
                        return Ok(output);
                    }
                    tracing::debug!(cmd, "find emulator fell back to the real shell");
                }
                shell::Recognized::Find(_) => {}
            }
        }
        let shell_path = self.shell_path()?;
        let env = self.exported_env()?;
        let raw = shell::spawn_shell(&shell_path, cmd, &env);
        let out = shell::format_shell_output(&raw);
        self.regen.record_shell(cmd, &out, ShellKind::Plain);
        Ok(out)
    }

    /// The interpreter for shell commands, from `$(SHELL)`.
    pub fn shell_path(&mut self) -> Result<String, EvalError> {
        match self.lookup_var(intern("SHELL")) {
            Some(var) => {
                let path = match var.body {
                    VarBody::Simple(s) => s,
                    VarBody::Recursive(e) => self.eval_to_str(&e)?,
                };
                if path.is_empty() {
                    Ok("/bin/sh".to_string())
                } else {
                    Ok(path)
                }
            }
            None => Ok("/bin/sh".to_string()),
        }
    }

    /// Extra environment for spawned shells: the explicitly exported
    /// variables, expanded.
    fn exported_env(&mut self) -> Result<Vec<(String, String)>, EvalError> {
        let names: Vec<Symbol> = self.vars.exported_names().collect();
        let mut env = Vec::new();
        for sym in names {
            let Some(var) = self.vars.lookup(sym).cloned() else {
                continue;
            };
            let value = match var.body {
                VarBody::Simple(s) => s,
                VarBody::Recursive(e) => self.eval_to_str(&e)?,
            };
            env.push((sym.as_str().to_string(), value));
        }
        Ok(env)
    }
}

/// `old` + single space + `rhs`, flattened.
pub(crate) fn append_value(old: Value, rhs: Value) -> Value {
    match old {
        Value::Concat(mut parts) => {
            parts.push(Value::literal(" "));
            parts.push(rhs);
            Value::Concat(parts)
        }
        other => Value::Concat(vec![other, Value::literal(" "), rhs]),
    }
}

fn io_message(e: &std::io::Error) -> String {
    match e.kind() {
        std::io::ErrorKind::NotFound => "No such file or directory".to_string(),
        _ => e.to_string(),
    }
}

/// Directory part without the trailing slash; `.` when there is none.
fn dir_part(word: &str) -> &str {
    match word.rfind('/') {
        Some(0) => "/",
        Some(i) => &word[..i],
        None => ".",
    }
}

fn file_part(word: &str) -> &str {
    match word.rfind('/') {
        Some(i) => &word[i + 1..],
        None => word,
    }
}
