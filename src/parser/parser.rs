//! Makefile Statement Parser
//!
//! Consumes a byte buffer and produces the statement tree. The parser
//! is line-oriented and never expands anything: directives are
//! dispatched on the first word, everything else is classified as a
//! rule or an assignment by scanning for the first separator character
//! outside parentheses. Malformed lines become `Stmt::ParseError`
//! statements so the error is raised with its location when evaluation
//! reaches it.

use crate::ast::types::*;
use crate::expr::{parse_expr, Value};
use crate::loc::Loc;
use crate::parser::lines::{collapse_continuations, logical_lines, strip_comment};
use crate::parser::types::{ParseException, MAX_INPUT_SIZE};
use crate::sym::{intern, Symbol};

/// A parsed makefile: statements plus any informational warnings the
/// parser produced (extraneous `else` text and the like). Warnings are
/// surfaced through the diagnostic sink when the file is evaluated.
#[derive(Debug, Clone, Default)]
pub struct Makefile {
    pub stmts: Vec<Stmt>,
    pub warnings: Vec<(Loc, String)>,
}

/// Parse a whole makefile buffer.
pub fn parse(buf: &str, filename: &str) -> Result<Makefile, ParseException> {
    parse_buf(buf, intern(filename), 1)
}

/// Parse a fragment produced by `$(eval ...)`. Locations point at the
/// eval site so errors report the innermost position.
pub fn parse_eval_text(buf: &str, loc: Loc) -> Result<Makefile, ParseException> {
    parse_buf(buf, loc.filename, loc.line)
}

fn parse_buf(buf: &str, filename: Symbol, base_line: u32) -> Result<Makefile, ParseException> {
    if buf.len() > MAX_INPUT_SIZE {
        return Err(ParseException::new(
            Loc::new(filename, 1),
            format!("input exceeds maximum size ({} bytes)", MAX_INPUT_SIZE),
        ));
    }
    let mut p = Parser::new(filename);
    for line in logical_lines(buf) {
        let loc = Loc::new(filename, base_line + line.lineno - 1);
        p.parse_line(&line.text, loc);
    }
    p.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    NotAfterRule,
    AfterRule,
    MaybeAfterRule,
}

/// One open conditional. `true_stmts` is filled in when `else` is
/// seen; until then the true branch is the top statement sink.
#[derive(Debug)]
struct IfFrame {
    kind: CondKind,
    lhs: Value,
    rhs: Option<Value>,
    loc: Loc,
    true_stmts: Option<Vec<Stmt>>,
    /// Spawned by `else ifeq ...`: shares its parent's `endif`.
    chained: bool,
}

#[derive(Debug)]
struct DefineCapture {
    name: String,
    body: Vec<String>,
    nest: usize,
    directive: AssignDirective,
    loc: Loc,
}

struct Parser {
    filename: Symbol,
    state: ParserState,
    /// Statement sinks; the top receives new statements. Conditionals
    /// push one sink per open branch.
    sinks: Vec<Vec<Stmt>>,
    frames: Vec<IfFrame>,
    define: Option<DefineCapture>,
    warnings: Vec<(Loc, String)>,
}

impl Parser {
    fn new(filename: Symbol) -> Self {
        Self {
            filename,
            state: ParserState::NotAfterRule,
            sinks: vec![Vec::new()],
            frames: Vec::new(),
            define: None,
            warnings: Vec::new(),
        }
    }

    fn finish(mut self) -> Result<Makefile, ParseException> {
        if let Some(def) = &self.define {
            return Err(ParseException::new(
                def.loc,
                "missing 'endef', unterminated 'define'",
            ));
        }
        if let Some(frame) = self.frames.last() {
            return Err(ParseException::new(frame.loc, "missing 'endif'"));
        }
        let stmts = self.sinks.pop().unwrap_or_default();
        Ok(Makefile {
            stmts,
            warnings: self.warnings,
        })
    }

    fn out(&mut self) -> &mut Vec<Stmt> {
        self.sinks.last_mut().expect("sink stack never empty")
    }

    fn push_stmt(&mut self, stmt: Stmt) {
        self.out().push(stmt);
    }

    fn warn(&mut self, loc: Loc, msg: impl Into<String>) {
        self.warnings.push((loc, msg.into()));
    }

    fn parse_error(&mut self, loc: Loc, msg: impl Into<String>) {
        self.push_stmt(Stmt::ParseError(ParseErrorStmt {
            msg: msg.into(),
            loc,
        }));
    }

    /// Parse an expression, degrading a malformed one into an error
    /// statement instead of aborting the whole parse.
    fn expr_or_error(&mut self, s: &str, loc: Loc) -> Option<Value> {
        match parse_expr(loc, s) {
            Ok(v) => Some(v),
            Err(e) => {
                self.parse_error(loc, e.msg);
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Line dispatch
    // ------------------------------------------------------------------

    fn parse_line(&mut self, raw: &str, loc: Loc) {
        if self.define.is_some() {
            self.parse_define_line(raw);
            return;
        }

        // Recipe lines keep their bytes verbatim, comments and
        // continuations included.
        if let Some(cmd) = raw.strip_prefix('\t') {
            match self.state {
                ParserState::AfterRule | ParserState::MaybeAfterRule => {
                    if let Some(expr) = self.expr_or_error(cmd, loc) {
                        self.push_stmt(Stmt::Command(CommandStmt { expr, loc }));
                    }
                }
                ParserState::NotAfterRule => {
                    if !cmd.trim().is_empty() {
                        self.parse_error(loc, "commands commence before first target");
                    }
                }
            }
            return;
        }

        let line = strip_comment(&collapse_continuations(raw));
        let trimmed = line.trim_matches([' ', '\t']);
        if trimmed.is_empty() {
            self.state = ParserState::NotAfterRule;
            return;
        }

        if self.try_directive(trimmed, loc, AssignDirective::default()) {
            return;
        }
        self.parse_rule_or_assign(trimmed, loc, AssignDirective::default());
    }

    /// Returns true when the line was consumed as a directive.
    fn try_directive(&mut self, line: &str, loc: Loc, directive: AssignDirective) -> bool {
        let (word, rest) = split_first_word(line);
        match word {
            "include" | "-include" | "sinclude" => {
                if let Some(expr) = self.expr_or_error(rest, loc) {
                    self.push_stmt(Stmt::Include(IncludeStmt {
                        expr,
                        should_exist: word == "include",
                        loc,
                    }));
                }
                self.state = ParserState::MaybeAfterRule;
                true
            }
            "ifdef" | "ifndef" | "ifeq" | "ifneq" => {
                let kind = match word {
                    "ifdef" => CondKind::Ifdef,
                    "ifndef" => CondKind::Ifndef,
                    "ifeq" => CondKind::Ifeq,
                    _ => CondKind::Ifneq,
                };
                self.handle_if(kind, rest, loc, false);
                true
            }
            "else" => {
                self.handle_else(rest, loc);
                true
            }
            "endif" => {
                self.handle_endif(rest, loc);
                true
            }
            "define" => {
                self.define = Some(DefineCapture {
                    name: rest.trim().to_string(),
                    body: Vec::new(),
                    nest: 0,
                    directive,
                    loc,
                });
                self.state = ParserState::NotAfterRule;
                true
            }
            "endef" => {
                self.warn(loc, "extraneous 'endef'");
                true
            }
            "override" => {
                let dir = AssignDirective {
                    is_override: true,
                    ..directive
                };
                if rest.trim().is_empty() {
                    self.parse_error(loc, "invalid 'override' directive");
                } else if !self.try_directive(rest, loc, dir) {
                    self.parse_rule_or_assign(rest, loc, dir);
                }
                true
            }
            "export" => {
                let dir = AssignDirective {
                    is_export: true,
                    ..directive
                };
                let rest = rest.trim();
                if rest.is_empty() {
                    self.warn(loc, "'export' without variable names is not supported");
                } else if !self.try_directive(rest, loc, dir) {
                    match find_separator(rest) {
                        Some((_, Separator::Assign { .. })) => {
                            self.parse_rule_or_assign(rest, loc, dir);
                        }
                        _ => {
                            if let Some(expr) = self.expr_or_error(rest, loc) {
                                self.push_stmt(Stmt::Export(ExportStmt {
                                    expr,
                                    is_export: true,
                                    loc,
                                }));
                            }
                            self.state = ParserState::NotAfterRule;
                        }
                    }
                }
                true
            }
            "unexport" => {
                if let Some(expr) = self.expr_or_error(rest.trim(), loc) {
                    self.push_stmt(Stmt::Export(ExportStmt {
                        expr,
                        is_export: false,
                        loc,
                    }));
                }
                self.state = ParserState::NotAfterRule;
                true
            }
            "vpath" => {
                if let Some(expr) = self.expr_or_error(rest, loc) {
                    self.push_stmt(Stmt::Vpath(VpathStmt { expr, loc }));
                }
                self.state = ParserState::NotAfterRule;
                true
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Conditionals
    // ------------------------------------------------------------------

    fn handle_if(&mut self, kind: CondKind, rest: &str, loc: Loc, chained: bool) {
        let (lhs, rhs) = match kind {
            CondKind::Ifdef | CondKind::Ifndef => {
                match self.expr_or_error(rest.trim(), loc) {
                    Some(v) => (v, None),
                    None => return,
                }
            }
            CondKind::Ifeq | CondKind::Ifneq => match self.parse_cond_args(rest, loc) {
                Some((l, r)) => (l, Some(r)),
                None => return,
            },
        };
        self.frames.push(IfFrame {
            kind,
            lhs,
            rhs,
            loc,
            true_stmts: None,
            chained,
        });
        self.sinks.push(Vec::new());
    }

    /// `(lhs,rhs)` or `"lhs" "rhs"` / `'lhs' 'rhs'`.
    fn parse_cond_args(&mut self, rest: &str, loc: Loc) -> Option<(Value, Value)> {
        let rest = rest.trim();
        if let Some(inner) = rest.strip_prefix('(') {
            let close = match find_matching_paren(inner) {
                Some(i) => i,
                None => {
                    self.parse_error(loc, "invalid syntax in conditional");
                    return None;
                }
            };
            let body = &inner[..close];
            let after = inner[close + 1..].trim();
            if !after.is_empty() {
                self.warn(loc, "extraneous text after conditional directive");
            }
            let comma = match find_toplevel_comma(body) {
                Some(i) => i,
                None => {
                    self.parse_error(loc, "invalid syntax in conditional");
                    return None;
                }
            };
            let lhs = self.expr_or_error(&body[..comma], loc)?;
            let rhs = self.expr_or_error(&body[comma + 1..], loc)?;
            return Some((lhs, rhs));
        }
        // Quoted form.
        let (lhs_text, rest2) = read_quoted(rest)?;
        let rest2 = rest2.trim_start();
        let (rhs_text, tail) = read_quoted(rest2)?;
        if !tail.trim().is_empty() {
            self.warn(loc, "extraneous text after conditional directive");
        }
        let lhs = self.expr_or_error(lhs_text, loc)?;
        let rhs = self.expr_or_error(rhs_text, loc)?;
        Some((lhs, rhs))
    }

    fn handle_else(&mut self, rest: &str, loc: Loc) {
        match self.frames.last() {
            None => {
                self.warn(loc, "extraneous 'else'");
                return;
            }
            Some(frame) if frame.true_stmts.is_some() => {
                self.warn(loc, "only one 'else' per conditional");
                return;
            }
            Some(_) => {}
        }
        let true_stmts = self.sinks.pop().expect("sink for open conditional");
        self.frames
            .last_mut()
            .expect("frame checked above")
            .true_stmts = Some(true_stmts);
        self.sinks.push(Vec::new());

        let rest = rest.trim();
        if rest.is_empty() {
            return;
        }
        let (word, tail) = split_first_word(rest);
        let kind = match word {
            "ifdef" => Some(CondKind::Ifdef),
            "ifndef" => Some(CondKind::Ifndef),
            "ifeq" => Some(CondKind::Ifeq),
            "ifneq" => Some(CondKind::Ifneq),
            _ => None,
        };
        match kind {
            Some(kind) => self.handle_if(kind, tail, loc, true),
            None => self.warn(loc, "extraneous text after 'else' directive"),
        }
    }

    fn handle_endif(&mut self, rest: &str, loc: Loc) {
        if !rest.trim().is_empty() {
            self.warn(loc, "extraneous text after 'endif' directive");
        }
        if self.frames.is_empty() {
            self.warn(loc, "extraneous 'endif'");
            return;
        }
        // An `else ifeq` chain closes with its parent on one endif.
        loop {
            let chained = self.close_frame();
            if !chained {
                break;
            }
        }
    }

    fn close_frame(&mut self) -> bool {
        let frame = self.frames.pop().expect("caller checked frames");
        let (true_stmts, false_stmts) = match frame.true_stmts {
            Some(t) => (t, self.sinks.pop().expect("else sink")),
            None => (self.sinks.pop().expect("true sink"), Vec::new()),
        };
        self.push_stmt(Stmt::If(IfStmt {
            kind: frame.kind,
            lhs: frame.lhs,
            rhs: frame.rhs,
            true_stmts,
            false_stmts,
            loc: frame.loc,
        }));
        frame.chained
    }

    // ------------------------------------------------------------------
    // define / endef
    // ------------------------------------------------------------------

    fn parse_define_line(&mut self, raw: &str) {
        let stripped = strip_comment(raw);
        let trimmed = stripped.trim();
        let def = self.define.as_mut().expect("in define");
        if trimmed == "endef" {
            if def.nest == 0 {
                let def = self.define.take().expect("in define");
                self.finish_define(def);
                return;
            }
            def.nest -= 1;
        } else if split_first_word(trimmed).0 == "define" {
            def.nest += 1;
        }
        def.body.push(raw.to_string());
    }

    fn finish_define(&mut self, def: DefineCapture) {
        let body = def.body.join("\n");
        let loc = def.loc;
        let Some(lhs) = self.expr_or_error(&def.name, loc) else {
            return;
        };
        let Some(rhs) = self.expr_or_error(&body, loc) else {
            return;
        };
        self.push_stmt(Stmt::Assign(AssignStmt {
            lhs,
            rhs,
            op: AssignOp::Eq,
            directive: def.directive,
            loc,
        }));
        self.state = ParserState::NotAfterRule;
    }

    // ------------------------------------------------------------------
    // Rules and assignments
    // ------------------------------------------------------------------

    fn parse_rule_or_assign(&mut self, line: &str, loc: Loc, directive: AssignDirective) {
        match find_separator(line) {
            Some((pos, Separator::Assign { op, op_start })) => {
                let lhs_text = line[..op_start].trim_matches([' ', '\t']);
                let rhs_text = line[pos + 1..].trim_start_matches([' ', '\t']);
                if lhs_text.is_empty() {
                    self.parse_error(loc, "empty variable name");
                    return;
                }
                let Some(lhs) = self.expr_or_error(lhs_text, loc) else {
                    return;
                };
                let Some(rhs) = self.expr_or_error(rhs_text, loc) else {
                    return;
                };
                self.push_stmt(Stmt::Assign(AssignStmt {
                    lhs,
                    rhs,
                    op,
                    directive,
                    loc,
                }));
                self.state = ParserState::NotAfterRule;
            }
            Some((colon, Separator::Colon)) => self.parse_rule(line, colon, loc),
            Some((pos, Separator::Semicolon)) => {
                // No colon yet, but expansion may still produce one:
                // keep the split and let evaluation decide.
                let lhs_text = &line[..pos];
                let cmd_text = line[pos + 1..].trim_start_matches([' ', '\t']);
                let Some(lhs) = self.expr_or_error(lhs_text, loc) else {
                    return;
                };
                let Some(rhs) = self.expr_or_error(cmd_text, loc) else {
                    return;
                };
                self.push_stmt(Stmt::Rule(RuleStmt {
                    lhs,
                    sep: RuleSep::Semicolon,
                    rhs: Some(rhs),
                    op: None,
                    loc,
                }));
                self.state = ParserState::AfterRule;
            }
            None => {
                // Lines like `$(eval ...)` carry their structure inside
                // an expansion; classification happens after expansion,
                // and "missing separator" is raised there if the line
                // still has none.
                let Some(lhs) = self.expr_or_error(line, loc) else {
                    return;
                };
                self.push_stmt(Stmt::Rule(RuleStmt {
                    lhs,
                    sep: RuleSep::None,
                    rhs: None,
                    op: None,
                    loc,
                }));
                self.state = ParserState::AfterRule;
            }
        }
    }

    /// A rule line. The left-hand side is kept whole (the colon
    /// structure is re-discovered after expansion); only the inline
    /// command or target-specific assignment is split off here.
    fn parse_rule(&mut self, line: &str, colon: usize, loc: Loc) {
        let after = &line[colon + 1..];
        match find_rule_tail(after) {
            Some((off, RuleTail::Assign { op, op_start })) => {
                let lhs_text = line[..colon + 1 + op_start].trim_end_matches([' ', '\t']);
                let rhs_text = after[off + 1..].trim_start_matches([' ', '\t']);
                let Some(lhs) = self.expr_or_error(lhs_text, loc) else {
                    return;
                };
                let Some(rhs) = self.expr_or_error(rhs_text, loc) else {
                    return;
                };
                self.push_stmt(Stmt::Rule(RuleStmt {
                    lhs,
                    sep: RuleSep::Eq,
                    rhs: Some(rhs),
                    op: Some(op),
                    loc,
                }));
                self.state = ParserState::MaybeAfterRule;
            }
            Some((off, RuleTail::Semicolon)) => {
                let lhs_text = &line[..colon + 1 + off];
                let cmd_text = after[off + 1..].trim_start_matches([' ', '\t']);
                let Some(lhs) = self.expr_or_error(lhs_text, loc) else {
                    return;
                };
                let Some(rhs) = self.expr_or_error(cmd_text, loc) else {
                    return;
                };
                self.push_stmt(Stmt::Rule(RuleStmt {
                    lhs,
                    sep: RuleSep::Semicolon,
                    rhs: Some(rhs),
                    op: None,
                    loc,
                }));
                self.state = ParserState::AfterRule;
            }
            None => {
                let Some(lhs) = self.expr_or_error(line, loc) else {
                    return;
                };
                self.push_stmt(Stmt::Rule(RuleStmt {
                    lhs,
                    sep: RuleSep::None,
                    rhs: None,
                    op: None,
                    loc,
                }));
                self.state = ParserState::AfterRule;
            }
        }
    }
}

// ----------------------------------------------------------------------
// Separator scanning
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    /// Position is the `=`; `op_start` is where the operator text
    /// begins (`:=`, `+=`, `?=` start one byte earlier).
    Assign { op: AssignOp, op_start: usize },
    Colon,
    Semicolon,
}

/// Find the first of `:`, `=`, `;` outside parentheses/braces (which
/// also skips `$(...)` and `${...}` bodies).
fn find_separator(line: &str) -> Option<(usize, Separator)> {
    let bytes = line.as_bytes();
    let mut depth: usize = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'$' if i + 1 < bytes.len() => {
                // `$:` and friends reference a variable, not a separator.
                let next = bytes[i + 1];
                if next != b'(' && next != b'{' {
                    i += 2;
                    continue;
                }
            }
            b'(' | b'{' => depth += 1,
            b')' | b'}' => depth = depth.saturating_sub(1),
            b':' if depth == 0 => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'=' {
                    return Some((
                        i + 1,
                        Separator::Assign {
                            op: AssignOp::ColonEq,
                            op_start: i,
                        },
                    ));
                }
                return Some((i, Separator::Colon));
            }
            b'=' if depth == 0 => {
                let (op, op_start) = match i.checked_sub(1).map(|p| bytes[p]) {
                    Some(b'+') => (AssignOp::PlusEq, i - 1),
                    Some(b'?') => (AssignOp::QuestionEq, i - 1),
                    _ => (AssignOp::Eq, i),
                };
                return Some((i, Separator::Assign { op, op_start }));
            }
            b';' if depth == 0 => return Some((i, Separator::Semicolon)),
            _ => {}
        }
        i += 1;
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleTail {
    Assign { op: AssignOp, op_start: usize },
    Semicolon,
}

/// After the rule colon, find an inline command or a target-specific
/// assignment. Offsets are relative to the text after the colon.
fn find_rule_tail(after: &str) -> Option<(usize, RuleTail)> {
    let bytes = after.as_bytes();
    let mut depth: usize = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'$' if i + 1 < bytes.len() => {
                let next = bytes[i + 1];
                if next != b'(' && next != b'{' {
                    i += 2;
                    continue;
                }
            }
            b'(' | b'{' => depth += 1,
            b')' | b'}' => depth = depth.saturating_sub(1),
            b'=' if depth == 0 => {
                let (op, op_start) = match i.checked_sub(1).map(|p| bytes[p]) {
                    Some(b'+') => (AssignOp::PlusEq, i - 1),
                    Some(b'?') => (AssignOp::QuestionEq, i - 1),
                    Some(b':') => (AssignOp::ColonEq, i - 1),
                    _ => (AssignOp::Eq, i),
                };
                return Some((i, RuleTail::Assign { op, op_start }));
            }
            b';' if depth == 0 => return Some((i, RuleTail::Semicolon)),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split at the first run of spaces/tabs: `(first_word, rest)`.
fn split_first_word(s: &str) -> (&str, &str) {
    match s.find([' ', '\t']) {
        Some(i) => (&s[..i], s[i..].trim_start_matches([' ', '\t'])),
        None => (s, ""),
    }
}

/// Index of the `)` matching an already-consumed `(`.
fn find_matching_paren(s: &str) -> Option<usize> {
    let mut depth: usize = 0;
    for (i, c) in s.bytes().enumerate() {
        match c {
            b'(' => depth += 1,
            b')' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

/// Index of the first `,` not nested in parentheses.
fn find_toplevel_comma(s: &str) -> Option<usize> {
    let mut depth: usize = 0;
    for (i, c) in s.bytes().enumerate() {
        match c {
            b'(' | b'{' => depth += 1,
            b')' | b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Read a `"..."` or `'...'` token; returns (content, rest).
fn read_quoted(s: &str) -> Option<(&str, &str)> {
    let mut chars = s.char_indices();
    let (_, quote) = chars.next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    for (i, c) in chars {
        if c == quote {
            return Some((&s[1..i], &s[i + 1..]));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmts(src: &str) -> Vec<Stmt> {
        parse(src, "test.mk").unwrap().stmts
    }

    fn first(src: &str) -> Stmt {
        stmts(src).into_iter().next().expect("at least one stmt")
    }

    #[test]
    fn test_simple_assignment() {
        match first("CC := gcc\n") {
            Stmt::Assign(a) => {
                assert_eq!(a.lhs, Value::literal("CC"));
                assert_eq!(a.rhs, Value::literal("gcc"));
                assert_eq!(a.op, AssignOp::ColonEq);
            }
            s => panic!("Expected Assign, got {:?}", s),
        }
    }

    #[test]
    fn test_assignment_operators() {
        let ops = [
            ("A = 1", AssignOp::Eq),
            ("A := 1", AssignOp::ColonEq),
            ("A += 1", AssignOp::PlusEq),
            ("A ?= 1", AssignOp::QuestionEq),
        ];
        for (src, op) in ops {
            match first(src) {
                Stmt::Assign(a) => assert_eq!(a.op, op, "for {}", src),
                s => panic!("Expected Assign for {}, got {:?}", src, s),
            }
        }
    }

    #[test]
    fn test_rule_with_commands() {
        let got = stmts("a: b\n\techo hi\n");
        assert_eq!(got.len(), 2);
        match &got[0] {
            Stmt::Rule(r) => {
                assert_eq!(r.lhs.to_string(), "a: b");
                assert_eq!(r.sep, RuleSep::None);
            }
            s => panic!("Expected Rule, got {:?}", s),
        }
        match &got[1] {
            Stmt::Command(c) => assert_eq!(c.expr.to_string(), "echo hi"),
            s => panic!("Expected Command, got {:?}", s),
        }
    }

    #[test]
    fn test_rule_with_inline_command() {
        match first("a: b ; echo hi\n") {
            Stmt::Rule(r) => {
                assert_eq!(r.lhs.to_string(), "a: b ");
                assert_eq!(r.sep, RuleSep::Semicolon);
                assert_eq!(r.rhs.unwrap().to_string(), "echo hi");
            }
            s => panic!("Expected Rule, got {:?}", s),
        }
    }

    #[test]
    fn test_target_specific_variable() {
        match first("a: CFLAGS += -g\n") {
            Stmt::Rule(r) => {
                assert_eq!(r.sep, RuleSep::Eq);
                assert_eq!(r.op, Some(AssignOp::PlusEq));
                assert_eq!(r.lhs.to_string(), "a: CFLAGS");
                assert_eq!(r.rhs.unwrap().to_string(), "-g");
            }
            s => panic!("Expected Rule, got {:?}", s),
        }
    }

    #[test]
    fn test_double_colon_stays_in_lhs() {
        match first("a:: b\n") {
            Stmt::Rule(r) => assert_eq!(r.lhs.to_string(), "a:: b"),
            s => panic!("Expected Rule, got {:?}", s),
        }
    }

    #[test]
    fn test_commands_before_first_target() {
        match first("\techo nope\n") {
            Stmt::ParseError(e) => {
                assert!(e.msg.contains("commands commence before first target"));
            }
            s => panic!("Expected ParseError, got {:?}", s),
        }
    }

    #[test]
    fn test_recipe_context_ends_on_nonrecipe_line() {
        let got = stmts("a:\n\tcmd1\nX = 1\n\tcmd2\n");
        assert_eq!(got.len(), 4);
        assert!(matches!(&got[3], Stmt::ParseError(_)));
    }

    #[test]
    fn test_separatorless_line_defers_to_evaluation() {
        // Classification needs the expansion; the statement stays a
        // rule and "missing separator" is an evaluation-time error.
        match first("just some words\n") {
            Stmt::Rule(r) => {
                assert_eq!(r.sep, RuleSep::None);
                assert_eq!(r.lhs.to_string(), "just some words");
            }
            s => panic!("Expected Rule, got {:?}", s),
        }
        match first("$(eval X := 1)\n") {
            Stmt::Rule(r) => assert_eq!(r.sep, RuleSep::None),
            s => panic!("Expected Rule, got {:?}", s),
        }
    }

    #[test]
    fn test_ifeq_else_endif() {
        match first("ifeq ($(X),1)\nA := yes\nelse\nA := no\nendif\n") {
            Stmt::If(i) => {
                assert_eq!(i.kind, CondKind::Ifeq);
                assert_eq!(i.rhs.as_ref().unwrap(), &Value::literal("1"));
                assert_eq!(i.true_stmts.len(), 1);
                assert_eq!(i.false_stmts.len(), 1);
            }
            s => panic!("Expected If, got {:?}", s),
        }
    }

    #[test]
    fn test_ifeq_quoted_form() {
        match first("ifeq \"a\" 'b'\nendif\n") {
            Stmt::If(i) => {
                assert_eq!(i.lhs, Value::literal("a"));
                assert_eq!(i.rhs.unwrap(), Value::literal("b"));
            }
            s => panic!("Expected If, got {:?}", s),
        }
    }

    #[test]
    fn test_ifdef() {
        match first("ifdef DEBUG\nA := 1\nendif\n") {
            Stmt::If(i) => {
                assert_eq!(i.kind, CondKind::Ifdef);
                assert_eq!(i.lhs, Value::literal("DEBUG"));
                assert!(i.rhs.is_none());
                assert!(i.false_stmts.is_empty());
            }
            s => panic!("Expected If, got {:?}", s),
        }
    }

    #[test]
    fn test_else_if_chain_shares_endif() {
        let got = stmts("ifeq (a,a)\nA := 1\nelse ifeq (b,b)\nA := 2\nelse\nA := 3\nendif\n");
        assert_eq!(got.len(), 1);
        match &got[0] {
            Stmt::If(outer) => {
                assert_eq!(outer.true_stmts.len(), 1);
                assert_eq!(outer.false_stmts.len(), 1);
                match &outer.false_stmts[0] {
                    Stmt::If(inner) => {
                        assert_eq!(inner.true_stmts.len(), 1);
                        assert_eq!(inner.false_stmts.len(), 1);
                    }
                    s => panic!("Expected nested If, got {:?}", s),
                }
            }
            s => panic!("Expected If, got {:?}", s),
        }
    }

    #[test]
    fn test_nested_conditionals() {
        let got = stmts("ifdef A\nifdef B\nX := 1\nendif\nendif\n");
        assert_eq!(got.len(), 1);
        match &got[0] {
            Stmt::If(outer) => {
                assert_eq!(outer.true_stmts.len(), 1);
                assert!(matches!(&outer.true_stmts[0], Stmt::If(_)));
            }
            s => panic!("Expected If, got {:?}", s),
        }
    }

    #[test]
    fn test_unterminated_conditional_fails() {
        let err = parse("ifdef A\nX := 1\n", "t.mk").unwrap_err();
        assert!(err.msg.contains("missing 'endif'"));
    }

    #[test]
    fn test_define_endef() {
        match first("define R\nA := $(1)\nB := 2\nendef\n") {
            Stmt::Assign(a) => {
                assert_eq!(a.lhs, Value::literal("R"));
                assert_eq!(a.op, AssignOp::Eq);
                assert_eq!(a.rhs.to_string(), "A := $(1)\nB := 2");
            }
            s => panic!("Expected Assign, got {:?}", s),
        }
    }

    #[test]
    fn test_nested_define() {
        match first("define OUTER\ndefine INNER\nx\nendef\nendef\n") {
            Stmt::Assign(a) => {
                assert_eq!(a.rhs.to_string(), "define INNER\nx\nendef");
            }
            s => panic!("Expected Assign, got {:?}", s),
        }
    }

    #[test]
    fn test_unterminated_define_fails() {
        let err = parse("define R\nbody\n", "t.mk").unwrap_err();
        assert!(err.msg.contains("unterminated 'define'"));
    }

    #[test]
    fn test_include_variants() {
        match first("include a.mk b.mk\n") {
            Stmt::Include(i) => {
                assert!(i.should_exist);
                assert_eq!(i.expr.to_string(), "a.mk b.mk");
            }
            s => panic!("Expected Include, got {:?}", s),
        }
        match first("-include opt.mk\n") {
            Stmt::Include(i) => assert!(!i.should_exist),
            s => panic!("Expected Include, got {:?}", s),
        }
        match first("sinclude opt.mk\n") {
            Stmt::Include(i) => assert!(!i.should_exist),
            s => panic!("Expected Include, got {:?}", s),
        }
    }

    #[test]
    fn test_override_export_prefixes() {
        match first("override export A = 1\n") {
            Stmt::Assign(a) => {
                assert!(a.directive.is_override);
                assert!(a.directive.is_export);
            }
            s => panic!("Expected Assign, got {:?}", s),
        }
    }

    #[test]
    fn test_export_names() {
        match first("export PATH HOME\n") {
            Stmt::Export(e) => {
                assert!(e.is_export);
                assert_eq!(e.expr.to_string(), "PATH HOME");
            }
            s => panic!("Expected Export, got {:?}", s),
        }
    }

    #[test]
    fn test_unexport() {
        match first("unexport PATH\n") {
            Stmt::Export(e) => assert!(!e.is_export),
            s => panic!("Expected Export, got {:?}", s),
        }
    }

    #[test]
    fn test_export_assignment() {
        match first("export A := 1\n") {
            Stmt::Assign(a) => {
                assert!(a.directive.is_export);
                assert_eq!(a.op, AssignOp::ColonEq);
            }
            s => panic!("Expected Assign, got {:?}", s),
        }
    }

    #[test]
    fn test_comment_stripping() {
        match first("A = 1 # a comment\n") {
            Stmt::Assign(a) => assert_eq!(a.rhs, Value::literal("1 ")),
            s => panic!("Expected Assign, got {:?}", s),
        }
    }

    #[test]
    fn test_recipe_keeps_comment_bytes() {
        let got = stmts("a:\n\techo '#' not a comment\n");
        match &got[1] {
            Stmt::Command(c) => {
                assert_eq!(c.expr.to_string(), "echo '#' not a comment");
            }
            s => panic!("Expected Command, got {:?}", s),
        }
    }

    #[test]
    fn test_continuation_in_statement() {
        match first("SRCS = a.c \\\n       b.c\n") {
            Stmt::Assign(a) => assert_eq!(a.rhs, Value::literal("a.c  b.c")),
            s => panic!("Expected Assign, got {:?}", s),
        }
    }

    #[test]
    fn test_recipe_preserves_continuation() {
        let got = stmts("a:\n\techo one \\\n\ttwo\n");
        match &got[1] {
            Stmt::Command(c) => {
                assert!(c.expr.to_string().contains("\\\n"));
            }
            s => panic!("Expected Command, got {:?}", s),
        }
    }

    #[test]
    fn test_eval_fragment_locations() {
        let loc = Loc::new(intern("outer.mk"), 42);
        let mk = parse_eval_text("A := 1\nB := 2\n", loc).unwrap();
        assert_eq!(mk.stmts[0].loc().line, 42);
        assert_eq!(mk.stmts[1].loc().line, 43);
        assert_eq!(mk.stmts[0].loc().filename, intern("outer.mk"));
    }

    #[test]
    fn test_vpath_parses() {
        assert!(matches!(first("vpath %.c src\n"), Stmt::Vpath(_)));
    }

    #[test]
    fn test_assignment_rhs_in_parens_not_separator() {
        match first("A := $(subst :,;,x:y)\n") {
            Stmt::Assign(a) => assert_eq!(a.op, AssignOp::ColonEq),
            s => panic!("Expected Assign, got {:?}", s),
        }
    }
}
