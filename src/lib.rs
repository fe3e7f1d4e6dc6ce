//! just-make - A simulated make environment
//!
//! This library parses a POSIX-style makefile dialect, evaluates it
//! into a resolved dependency graph, and emits a ninja-style build
//! file, with a regeneration cache that skips re-evaluation when
//! nothing changed.

pub mod ast;
pub mod dep;
pub mod diag;
pub mod eval;
pub mod expr;
pub mod find;
pub mod fs;
pub mod functions;
pub mod loc;
pub mod make;
pub mod ninja;
pub mod parser;
pub mod pattern;
pub mod regen;
pub mod shell;
pub mod sym;

pub use ast::types::Stmt;
pub use dep::{DepGraph, DepNode};
pub use eval::Evaluator;
pub use expr::{parse_expr, Value};
pub use make::{Make, MakeOptions, RunResult};
pub use parser::{parse, ParseException};
pub use sym::{intern, Symbol};

/// Serializes tests that change the process working directory.
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Mutex, MutexGuard};

    lazy_static::lazy_static! {
        static ref CWD_LOCK: Mutex<()> = Mutex::new(());
    }

    pub fn lock_cwd() -> MutexGuard<'static, ()> {
        CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }
}
