//! Evaluator
//!
//! Variable table, rule collection, and statement execution.

pub mod evaluator;
pub mod rule;
pub mod types;
pub mod vars;

pub use evaluator::Evaluator;
pub use rule::{parse_rule_line, Rule};
pub use types::{EvalError, Flavor, Origin, TargetVar, Var, VarBody};
pub use vars::VarTable;
