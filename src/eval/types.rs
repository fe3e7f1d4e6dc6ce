//! Evaluator Types
//!
//! Variables with flavors and origins, target-specific assignment
//! records, and the evaluation error type.

use std::borrow::Cow;
use std::fmt;

use crate::ast::types::{AssignDirective, AssignOp};
use crate::expr::Value;
use crate::loc::Loc;
use crate::parser::types::ParseException;
use crate::sym::Symbol;

/// Where a variable's current value came from. Stronger origins win
/// conflicting assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Undefined,
    File,
    CommandLine,
    Environment,
    Override,
    Automatic,
    Default,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Undefined => "undefined",
            Origin::File => "file",
            Origin::CommandLine => "command line",
            Origin::Environment => "environment",
            Origin::Override => "override",
            Origin::Automatic => "automatic",
            Origin::Default => "default",
        }
    }

    /// Assignment precedence: an incoming assignment with strictly
    /// lower strength than the existing definition is dropped.
    pub fn strength(self) -> u8 {
        match self {
            Origin::Override => 3,
            Origin::CommandLine => 2,
            _ => 1,
        }
    }
}

/// Whether a variable holds a pre-expanded string or a deferred
/// expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Undefined,
    Simple,
    Recursive,
}

impl Flavor {
    pub fn as_str(self) -> &'static str {
        match self {
            Flavor::Undefined => "undefined",
            Flavor::Simple => "simple",
            Flavor::Recursive => "recursive",
        }
    }
}

/// A variable's payload.
#[derive(Debug, Clone, PartialEq)]
pub enum VarBody {
    /// `:=`: expanded at assignment time.
    Simple(String),
    /// `=`: the expression is kept and expanded on reference.
    Recursive(Value),
}

/// A defined variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub body: VarBody,
    pub origin: Origin,
}

impl Var {
    pub fn simple(value: impl Into<String>, origin: Origin) -> Self {
        Self {
            body: VarBody::Simple(value.into()),
            origin,
        }
    }

    pub fn recursive(expr: Value, origin: Origin) -> Self {
        Self {
            body: VarBody::Recursive(expr),
            origin,
        }
    }

    pub fn flavor(&self) -> Flavor {
        match self.body {
            VarBody::Simple(_) => Flavor::Simple,
            VarBody::Recursive(_) => Flavor::Recursive,
        }
    }

    /// The definition as text: the stored string for a simple variable,
    /// the unexpanded expression for a recursive one. This is what
    /// `ifdef` tests and `$(value ...)` returns.
    pub fn string_value(&self) -> Cow<'_, str> {
        match &self.body {
            VarBody::Simple(s) => Cow::Borrowed(s),
            VarBody::Recursive(v) => Cow::Owned(v.to_string()),
        }
    }
}

/// A target-specific variable assignment collected from `target: NAME
/// op VALUE` lines, applied while the target's commands are expanded.
#[derive(Debug, Clone)]
pub struct TargetVar {
    pub name: Symbol,
    pub op: AssignOp,
    pub rhs: Value,
    pub directive: AssignDirective,
    pub loc: Loc,
}

/// A fatal evaluation problem. Carries the innermost location plus the
/// chain of enclosing `include`/`eval` sites.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub loc: Loc,
    pub msg: String,
    pub chain: Vec<Loc>,
}

impl EvalError {
    pub fn new(loc: Loc, msg: impl Into<String>) -> Self {
        Self {
            loc,
            msg: msg.into(),
            chain: Vec::new(),
        }
    }

    /// Record an enclosing location while the error propagates out of
    /// an included file or an `eval` fragment.
    pub fn with_frame(mut self, loc: Loc) -> Self {
        self.chain.push(loc);
        self
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: *** {}.", self.loc, self.msg)?;
        for loc in &self.chain {
            write!(f, "\n{}: included from here", loc)?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

impl From<ParseException> for EvalError {
    fn from(e: ParseException) -> Self {
        EvalError::new(e.loc, e.msg)
    }
}
