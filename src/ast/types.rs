//! Statement Tree
//!
//! The parser turns a makefile into a sequence of statements. Nothing
//! is expanded at parse time: every piece of text that may contain `$`
//! references is kept as a lazy [`Value`].

use crate::expr::Value;
use crate::loc::Loc;

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=` deferred (recursive) assignment
    Eq,
    /// `:=` immediate assignment
    ColonEq,
    /// `+=` append
    PlusEq,
    /// `?=` assign only when undefined
    QuestionEq,
}

/// `override` / `export` prefixes attached to an assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignDirective {
    pub is_override: bool,
    pub is_export: bool,
}

/// `NAME op VALUE`
#[derive(Debug, Clone, PartialEq)]
pub struct AssignStmt {
    pub lhs: Value,
    pub rhs: Value,
    pub op: AssignOp,
    pub directive: AssignDirective,
    pub loc: Loc,
}

/// What followed the rule separator on a rule line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSep {
    /// Nothing after the target/input list.
    None,
    /// `targets: inputs ; first-command`
    Semicolon,
    /// `targets: NAME op VALUE`: a target-specific variable.
    Eq,
}

/// A rule header line. The left-hand side stays unexpanded; targets,
/// inputs, and patterns are split out after expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleStmt {
    pub lhs: Value,
    pub sep: RuleSep,
    /// Inline command (`Semicolon`) or assignment value (`Eq`).
    pub rhs: Option<Value>,
    /// Operator of a target-specific assignment, for `Eq`.
    pub op: Option<AssignOp>,
    pub loc: Loc,
}

/// A tab-prefixed recipe line.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandStmt {
    pub expr: Value,
    pub loc: Loc,
}

/// Conditional directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondKind {
    Ifdef,
    Ifndef,
    Ifeq,
    Ifneq,
}

/// `ifdef`/`ifeq`/... with both branches.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub kind: CondKind,
    pub lhs: Value,
    /// Second operand of `ifeq`/`ifneq`; absent for `ifdef`/`ifndef`.
    pub rhs: Option<Value>,
    pub true_stmts: Vec<Stmt>,
    pub false_stmts: Vec<Stmt>,
    pub loc: Loc,
}

/// `include` / `-include` / `sinclude`
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeStmt {
    pub expr: Value,
    /// False for `-include`/`sinclude`: missing files are fine.
    pub should_exist: bool,
    pub loc: Loc,
}

/// `export NAMES...` / `unexport NAMES...`
#[derive(Debug, Clone, PartialEq)]
pub struct ExportStmt {
    pub expr: Value,
    pub is_export: bool,
    pub loc: Loc,
}

/// `vpath ...`: accepted by the grammar, ignored with a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct VpathStmt {
    pub expr: Value,
    pub loc: Loc,
}

/// A malformed construct. Parsing keeps going; the error aborts the
/// run when evaluation reaches this statement, so fragments evaluated
/// via `eval` report the innermost location.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseErrorStmt {
    pub msg: String,
    pub loc: Loc,
}

/// Union of all statement kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign(AssignStmt),
    Rule(RuleStmt),
    Command(CommandStmt),
    If(IfStmt),
    Include(IncludeStmt),
    Export(ExportStmt),
    Vpath(VpathStmt),
    ParseError(ParseErrorStmt),
}

impl Stmt {
    pub fn loc(&self) -> Loc {
        match self {
            Stmt::Assign(s) => s.loc,
            Stmt::Rule(s) => s.loc,
            Stmt::Command(s) => s.loc,
            Stmt::If(s) => s.loc,
            Stmt::Include(s) => s.loc,
            Stmt::Export(s) => s.loc,
            Stmt::Vpath(s) => s.loc,
            Stmt::ParseError(s) => s.loc,
        }
    }
}
