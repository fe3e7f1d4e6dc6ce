//! Built-in Function Library
//!
//! The closed set of text, file-name, conditional, and control
//! functions available inside `$(...)`. The parser resolves names
//! against [`lookup`] at parse time, so a `Value::Func` already knows
//! its implementation; arity is enforced there too.

pub mod cond;
pub mod file;
pub mod misc;
pub mod text;

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

use crate::eval::evaluator::Evaluator;
use crate::eval::types::EvalError;
use crate::expr::types::Value;

/// Implementation signature: evaluate into the output buffer.
pub type FuncImpl = fn(&mut Evaluator, &[Value], &mut String) -> Result<(), EvalError>;

/// One table entry.
pub struct FuncInfo {
    pub name: &'static str,
    pub func: FuncImpl,
    /// Maximum argument count; commas beyond it join the final
    /// argument. 0 means unlimited.
    pub arity: u8,
    pub min_arity: u8,
    /// Trim whitespace around every argument (`and`, `or`).
    pub trim_space: bool,
    /// Trim trailing whitespace of the first argument (`if`).
    pub trim_right_space_1st: bool,
}

impl fmt::Debug for FuncInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncInfo").field("name", &self.name).finish()
    }
}

macro_rules! entry {
    ($name:expr, $func:path, $arity:expr, $min:expr) => {
        entry!($name, $func, $arity, $min, false, false)
    };
    ($name:expr, $func:path, $arity:expr, $min:expr, $trim:expr, $trim1st:expr) => {
        FuncInfo {
            name: $name,
            func: $func,
            arity: $arity,
            min_arity: $min,
            trim_space: $trim,
            trim_right_space_1st: $trim1st,
        }
    };
}

/// The function table. Closed: unknown names are variable references.
pub static FUNCS: &[FuncInfo] = &[
    // Text
    entry!("subst", text::f_subst, 3, 3),
    entry!("patsubst", text::f_patsubst, 3, 3),
    entry!("strip", text::f_strip, 1, 1),
    entry!("findstring", text::f_findstring, 2, 2),
    entry!("filter", text::f_filter, 2, 2),
    entry!("filter-out", text::f_filter_out, 2, 2),
    entry!("sort", text::f_sort, 1, 1),
    entry!("word", text::f_word, 2, 2),
    entry!("wordlist", text::f_wordlist, 3, 3),
    entry!("words", text::f_words, 1, 1),
    entry!("firstword", text::f_firstword, 1, 1),
    entry!("lastword", text::f_lastword, 1, 1),
    // File names
    entry!("dir", file::f_dir, 1, 1),
    entry!("notdir", file::f_notdir, 1, 1),
    entry!("suffix", file::f_suffix, 1, 1),
    entry!("basename", file::f_basename, 1, 1),
    entry!("addsuffix", file::f_addsuffix, 2, 2),
    entry!("addprefix", file::f_addprefix, 2, 2),
    entry!("join", file::f_join, 2, 2),
    entry!("wildcard", file::f_wildcard, 1, 1),
    entry!("realpath", file::f_realpath, 1, 1),
    entry!("abspath", file::f_abspath, 1, 1),
    // Conditionals
    entry!("if", cond::f_if, 3, 2, false, true),
    entry!("and", cond::f_and, 0, 1, true, false),
    entry!("or", cond::f_or, 0, 1, true, false),
    // Misc / control
    entry!("value", misc::f_value, 1, 1),
    entry!("eval", misc::f_eval, 1, 1),
    entry!("shell", misc::f_shell, 1, 1),
    entry!("call", misc::f_call, 0, 1),
    entry!("foreach", misc::f_foreach, 3, 3),
    entry!("origin", misc::f_origin, 1, 1),
    entry!("flavor", misc::f_flavor, 1, 1),
    entry!("info", misc::f_info, 1, 1),
    entry!("warning", misc::f_warning, 1, 1),
    entry!("error", misc::f_error, 1, 1),
];

lazy_static! {
    static ref FUNC_MAP: HashMap<&'static str, &'static FuncInfo> =
        FUNCS.iter().map(|f| (f.name, f)).collect();
}

/// Resolve a function name. Used by the expression parser.
pub fn lookup(name: &str) -> Option<&'static FuncInfo> {
    FUNC_MAP.get(name).copied()
}

/// Split expansion results into words on ASCII whitespace.
pub fn word_split(s: &str) -> impl Iterator<Item = &str> {
    s.split_ascii_whitespace()
}
