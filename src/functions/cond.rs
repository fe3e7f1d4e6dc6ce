//! Conditional Functions
//!
//! `if`, `and`, `or`. Branches are values, not strings: only the
//! branch that is taken gets evaluated, so side effects in the other
//! branch never happen.

use crate::eval::evaluator::Evaluator;
use crate::eval::types::EvalError;
use crate::expr::types::Value;

pub fn f_if(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let cond = ev.eval_to_str(&args[0])?;
    if !cond.is_empty() {
        ev.eval_value(&args[1], out)?;
    } else if let Some(else_branch) = args.get(2) {
        ev.eval_value(else_branch, out)?;
    }
    Ok(())
}

/// Short-circuit conjunction: empty expansion stops evaluation; the
/// result is the last expansion when every argument was non-empty.
pub fn f_and(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let mut last = String::new();
    for arg in args {
        last = ev.eval_to_str(arg)?;
        if last.is_empty() {
            return Ok(());
        }
    }
    out.push_str(&last);
    Ok(())
}

/// Short-circuit disjunction: the first non-empty expansion wins.
pub fn f_or(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    for arg in args {
        let v = ev.eval_to_str(arg)?;
        if !v.is_empty() {
            out.push_str(&v);
            return Ok(());
        }
    }
    Ok(())
}
