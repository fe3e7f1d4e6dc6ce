//! Expression Values
//!
//! The lazy expression representation produced by the parser. A value
//! is immutable once parsed and knows how to write its expansion into a
//! byte sink given an evaluator; evaluation lives in
//! `eval::evaluator`, dispatch tables in `functions`.

use std::fmt;

use crate::functions::FuncInfo;

/// Which bracket introduced a variable reference. Kept so values can be
/// rendered back into source-shaped text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParenKind {
    /// `$(NAME)`
    Paren,
    /// `${NAME}`
    Brace,
    /// `$N` single-character reference
    Bare,
}

impl ParenKind {
    pub fn open(self) -> &'static str {
        match self {
            ParenKind::Paren => "$(",
            ParenKind::Brace => "${",
            ParenKind::Bare => "$",
        }
    }

    pub fn close(self) -> &'static str {
        match self {
            ParenKind::Paren => ")",
            ParenKind::Brace => "}",
            ParenKind::Bare => "",
        }
    }
}

/// A parsed function call: identity resolved against the static name
/// table at parse time, plus the ordered argument values.
#[derive(Debug, Clone)]
pub struct FuncCall {
    pub f: &'static FuncInfo,
    pub args: Vec<Value>,
}

impl PartialEq for FuncCall {
    fn eq(&self, other: &Self) -> bool {
        self.f.name == other.f.name && self.args == other.args
    }
}

/// The lazy expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Literal bytes, already free of `$` escapes.
    Literal(String),
    /// Concatenation of sub-values, evaluated in order.
    Concat(Vec<Value>),
    /// `$(NAME)` / `${NAME}` / `$N`; the name is itself a value.
    VarRef { name: Box<Value>, paren: ParenKind },
    /// `$1` .. `$9` inside a `call` body.
    ParamRef(u8),
    /// `$(NAME:pat=subst)`
    SubstRef {
        name: Box<Value>,
        pat: Box<Value>,
        subst: Box<Value>,
        paren: ParenKind,
    },
    /// `$(func args...)`
    Func(FuncCall),
}

impl Value {
    /// Shorthand used throughout the parser.
    pub fn literal(s: impl Into<String>) -> Value {
        Value::Literal(s.into())
    }

    /// Collapse a parsed sequence: zero parts become an empty literal,
    /// a single part is returned as-is.
    pub fn from_parts(mut parts: Vec<Value>) -> Value {
        match parts.len() {
            0 => Value::Literal(String::new()),
            1 => parts.pop().unwrap(),
            _ => Value::Concat(parts),
        }
    }

    /// A literal's bytes, when this value is one.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Value::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// True when expanding this value cannot touch the variable table,
    /// the file system, or the shell.
    pub fn is_literal_only(&self) -> bool {
        match self {
            Value::Literal(_) => true,
            Value::Concat(parts) => parts.iter().all(Value::is_literal_only),
            _ => false,
        }
    }
}

// Values render back into source-shaped text. This is what `$(value X)`
// falls back to when no raw text was retained, and what the
// canonicalizer tests round-trip through.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(s) => f.write_str(s),
            Value::Concat(parts) => {
                for p in parts {
                    write!(f, "{}", p)?;
                }
                Ok(())
            }
            Value::VarRef { name, paren } => {
                write!(f, "{}{}{}", paren.open(), name, paren.close())
            }
            Value::ParamRef(n) => write!(f, "$({})", n),
            Value::SubstRef {
                name,
                pat,
                subst,
                paren,
            } => write!(
                f,
                "{}{}:{}={}{}",
                paren.open(),
                name,
                pat,
                subst,
                paren.close()
            ),
            Value::Func(call) => {
                write!(f, "$({}", call.f.name)?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i == 0 {
                        write!(f, " {}", arg)?;
                    } else {
                        write!(f, ",{}", arg)?;
                    }
                }
                write!(f, ")")
            }
        }
    }
}
