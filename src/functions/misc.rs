//! Control and Introspection Functions
//!
//! `call`, `foreach`, `eval`, `shell`, variable introspection, and the
//! diagnostic trio.

use crate::eval::evaluator::Evaluator;
use crate::eval::types::{EvalError, Origin, Var, VarBody};
use crate::expr::sink::WordWriter;
use crate::expr::types::Value;
use crate::functions::word_split;
use crate::sym::intern;

/// `$(value NAME)`: the unexpanded definition of a recursive
/// variable, or the stored string of a simple one.
pub fn f_value(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let name = ev.eval_to_str(&args[0])?;
    if let Some(var) = ev.lookup_var(intern(name.trim())) {
        out.push_str(&var.string_value());
    }
    Ok(())
}

/// `$(eval TEXT)`: re-parse the expansion as a makefile fragment and
/// evaluate it in place. Expands to nothing.
pub fn f_eval(ev: &mut Evaluator, args: &[Value], _out: &mut String) -> Result<(), EvalError> {
    let text = ev.eval_to_str(&args[0])?;
    ev.eval_text(&text)
}

pub fn f_shell(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let cmd = ev.eval_to_str(&args[0])?;
    let result = ev.shell_exec(&cmd)?;
    out.push_str(&result);
    Ok(())
}

/// `$(call NAME,ARG1,...)`: bind positional parameters and expand
/// NAME's definition.
pub fn f_call(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let name = ev.eval_to_str(&args[0])?;
    let name = name.trim();
    let mut params = Vec::with_capacity(args.len() - 1);
    for arg in &args[1..] {
        params.push(ev.eval_to_str(arg)?);
    }
    let Some(var) = ev.lookup_var(intern(name)) else {
        return Ok(());
    };
    match var.body {
        VarBody::Simple(s) => {
            out.push_str(&s);
            Ok(())
        }
        VarBody::Recursive(expr) => {
            ev.push_params(params)?;
            let result = ev.eval_value(&expr, out);
            ev.pop_params();
            result
        }
    }
}

/// `$(foreach VAR,LIST,BODY)`: bind VAR to each word of LIST and
/// join the expansions of BODY with single spaces.
pub fn f_foreach(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let name = intern(ev.eval_to_str(&args[0])?.trim());
    let list = ev.eval_to_str(&args[1])?;
    let mut w = WordWriter::new(out);
    for word in word_split(&list) {
        ev.vars.push_scope();
        ev.vars
            .define_scoped(name, Var::simple(word, Origin::Automatic));
        w.maybe_add_space();
        let result = ev.eval_value(&args[2], w.out);
        ev.vars.pop_scope();
        result?;
    }
    Ok(())
}

pub fn f_origin(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let name = ev.eval_to_str(&args[0])?;
    let origin = match ev.lookup_var(intern(name.trim())) {
        Some(var) => var.origin.as_str(),
        None => Origin::Undefined.as_str(),
    };
    out.push_str(origin);
    Ok(())
}

pub fn f_flavor(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let name = ev.eval_to_str(&args[0])?;
    let flavor = match ev.lookup_var(intern(name.trim())) {
        Some(var) => var.flavor().as_str(),
        None => "undefined",
    };
    out.push_str(flavor);
    Ok(())
}

pub fn f_info(ev: &mut Evaluator, args: &[Value], _out: &mut String) -> Result<(), EvalError> {
    let msg = ev.eval_to_str(&args[0])?;
    ev.diag.info(msg);
    Ok(())
}

pub fn f_warning(ev: &mut Evaluator, args: &[Value], _out: &mut String) -> Result<(), EvalError> {
    let msg = ev.eval_to_str(&args[0])?;
    let loc = ev.loc;
    ev.diag.warning(format!("{}: {}", loc, msg));
    Ok(())
}

/// `$(error MSG)`: abort evaluation with the message.
pub fn f_error(ev: &mut Evaluator, args: &[Value], _out: &mut String) -> Result<(), EvalError> {
    let msg = ev.eval_to_str(&args[0])?;
    Err(ev.err(msg))
}
