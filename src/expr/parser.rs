//! Expression Parser
//!
//! Turns raw makefile text into [`Value`] trees. `$(...)` and `${...}`
//! references are resolved structurally here: function names are looked
//! up in the static table at parse time, substitution references are
//! split into name/pattern/replacement, and everything else becomes a
//! variable reference whose name is itself a value.

use crate::expr::types::{FuncCall, ParenKind, Value};
use crate::functions::{self, FuncInfo};
use crate::loc::Loc;
use crate::parser::types::ParseException;

/// Parse a whole string into a value. The input must already be a
/// single logical line (continuations joined, comments handled by the
/// line reader).
pub fn parse_expr(loc: Loc, s: &str) -> Result<Value, ParseException> {
    let mut pos = 0;
    let v = parse_expr_impl(loc, s, &[], &mut pos)?;
    Ok(v)
}

/// Parse until end of input or an unnested terminator character.
/// `pos` is advanced to the terminator (not past it).
fn parse_expr_impl(
    loc: Loc,
    s: &str,
    terms: &[u8],
    pos: &mut usize,
) -> Result<Value, ParseException> {
    let bytes = s.as_bytes();
    let mut parts: Vec<Value> = Vec::new();
    let mut literal_start = *pos;
    let mut paren_depth: usize = 0;

    macro_rules! flush_literal {
        () => {
            if literal_start < *pos {
                parts.push(Value::Literal(s[literal_start..*pos].to_string()));
            }
        };
    }

    while *pos < bytes.len() {
        let c = bytes[*pos];
        if c == b'$' {
            flush_literal!();
            parts.push(parse_dollar(loc, s, pos)?);
            literal_start = *pos;
            continue;
        }
        if paren_depth == 0 && terms.contains(&c) {
            break;
        }
        match c {
            b'(' | b'{' => paren_depth += 1,
            b')' | b'}' => paren_depth = paren_depth.saturating_sub(1),
            _ => {}
        }
        *pos += 1;
    }
    flush_literal!();
    Ok(Value::from_parts(parts))
}

/// Parse one `$`-introduced reference. `pos` points at the `$` on
/// entry and past the whole reference on return.
fn parse_dollar(loc: Loc, s: &str, pos: &mut usize) -> Result<Value, ParseException> {
    let bytes = s.as_bytes();
    debug_assert_eq!(bytes[*pos], b'$');

    if *pos + 1 >= bytes.len() {
        // A trailing dollar stands for itself.
        *pos += 1;
        return Ok(Value::literal("$"));
    }
    let c = bytes[*pos + 1];
    match c {
        b'$' => {
            *pos += 2;
            Ok(Value::literal("$"))
        }
        b'(' | b'{' => {
            let paren = if c == b'(' {
                ParenKind::Paren
            } else {
                ParenKind::Brace
            };
            let cp = if c == b'(' { b')' } else { b'}' };
            *pos += 2;
            parse_paren_ref(loc, s, pos, paren, cp)
        }
        b'1'..=b'9' => {
            *pos += 2;
            Ok(Value::ParamRef(c - b'0'))
        }
        _ => {
            // A single-character reference; the character may be
            // multi-byte.
            let ch = s[*pos + 1..].chars().next().expect("length checked");
            *pos += 1 + ch.len_utf8();
            Ok(Value::VarRef {
                name: Box::new(Value::literal(ch.to_string())),
                paren: ParenKind::Bare,
            })
        }
    }
}

/// Parse the body of `$(...)` / `${...}` after the opening bracket.
fn parse_paren_ref(
    loc: Loc,
    s: &str,
    pos: &mut usize,
    paren: ParenKind,
    cp: u8,
) -> Result<Value, ParseException> {
    let bytes = s.as_bytes();
    let name = parse_expr_impl(loc, s, &[cp, b':', b' ', b'\t'], pos)?;
    if *pos >= bytes.len() {
        return Err(ParseException::new(loc, "unterminated variable reference"));
    }
    match bytes[*pos] {
        b if b == cp => {
            *pos += 1;
            Ok(Value::VarRef {
                name: Box::new(name),
                paren,
            })
        }
        b' ' | b'\t' => {
            // A space after a literal head that names a function makes
            // this a call; otherwise the space is part of the name.
            if let Some(f) = name.as_literal().and_then(functions::lookup) {
                return parse_func(loc, f, s, pos, cp).map(Value::Func);
            }
            let mut tail_parts = vec![name, Value::literal(" ")];
            *pos += 1;
            let rest = parse_expr_impl(loc, s, &[cp], pos)?;
            if *pos >= bytes.len() {
                return Err(ParseException::new(loc, "unterminated variable reference"));
            }
            *pos += 1;
            tail_parts.push(rest);
            Ok(Value::VarRef {
                name: Box::new(Value::from_parts(tail_parts)),
                paren,
            })
        }
        b':' => {
            *pos += 1;
            let pat = parse_expr_impl(loc, s, &[cp, b'='], pos)?;
            if *pos >= bytes.len() {
                return Err(ParseException::new(loc, "unterminated variable reference"));
            }
            if bytes[*pos] == b'=' {
                *pos += 1;
                let subst = parse_expr_impl(loc, s, &[cp], pos)?;
                if *pos >= bytes.len() {
                    return Err(ParseException::new(loc, "unterminated variable reference"));
                }
                *pos += 1;
                return Ok(Value::SubstRef {
                    name: Box::new(name),
                    pat: Box::new(pat),
                    subst: Box::new(subst),
                    paren,
                });
            }
            // Plain `:` inside the name.
            *pos += 1;
            Ok(Value::VarRef {
                name: Box::new(Value::from_parts(vec![name, Value::literal(":"), pat])),
                paren,
            })
        }
        _ => unreachable!("terminator set covers all break characters"),
    }
}

/// Parse the arguments of a recognized function call. `pos` points at
/// the whitespace that followed the function name.
fn parse_func(
    loc: Loc,
    f: &'static FuncInfo,
    s: &str,
    pos: &mut usize,
    cp: u8,
) -> Result<FuncCall, ParseException> {
    let bytes = s.as_bytes();
    while *pos < bytes.len() && (bytes[*pos] == b' ' || bytes[*pos] == b'\t') {
        *pos += 1;
    }

    let mut args: Vec<Value> = Vec::new();
    loop {
        // Once the declared arity is reached, commas lose their
        // meaning and belong to the final argument.
        let at_max = f.arity != 0 && args.len() + 1 == f.arity as usize;
        let terms: &[u8] = if at_max { &[cp] } else { &[cp, b','] };

        if f.trim_space {
            while *pos < bytes.len() && (bytes[*pos] == b' ' || bytes[*pos] == b'\t') {
                *pos += 1;
            }
        }
        let mut arg = parse_expr_impl(loc, s, terms, pos)?;
        if f.trim_space || (f.trim_right_space_1st && args.is_empty()) {
            arg = trim_right_value(arg);
        }
        args.push(arg);

        if *pos >= bytes.len() {
            return Err(ParseException::new(
                loc,
                format!(
                    "unterminated call to function '{}': missing '{}'",
                    f.name, cp as char
                ),
            ));
        }
        let term = bytes[*pos];
        *pos += 1;
        if term == cp {
            break;
        }
    }

    if args.len() < f.min_arity as usize {
        return Err(ParseException::new(
            loc,
            format!(
                "insufficient number of arguments ({}) to function '{}'",
                args.len(),
                f.name
            ),
        ));
    }
    Ok(FuncCall { f, args })
}

/// Drop trailing ASCII whitespace from the literal tail of a value.
fn trim_right_value(v: Value) -> Value {
    match v {
        Value::Literal(s) => Value::Literal(s.trim_end_matches([' ', '\t']).to_string()),
        Value::Concat(mut parts) => {
            while let Some(last) = parts.pop() {
                match last {
                    Value::Literal(s) => {
                        let t = s.trim_end_matches([' ', '\t']);
                        if !t.is_empty() {
                            parts.push(Value::Literal(t.to_string()));
                            break;
                        }
                        // Entirely whitespace: keep trimming.
                    }
                    other => {
                        parts.push(other);
                        break;
                    }
                }
            }
            Value::from_parts(parts)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Loc {
        Loc::new(crate::sym::intern("test.mk"), 1)
    }

    fn parse(s: &str) -> Value {
        parse_expr(loc(), s).unwrap()
    }

    #[test]
    fn test_plain_literal() {
        assert_eq!(parse("hello world"), Value::literal("hello world"));
    }

    #[test]
    fn test_dollar_dollar() {
        assert_eq!(parse("a$$b"), Value::literal("a$b"));
    }

    #[test]
    fn test_simple_var_ref() {
        match parse("$(CC)") {
            Value::VarRef { name, paren } => {
                assert_eq!(*name, Value::literal("CC"));
                assert_eq!(paren, ParenKind::Paren);
            }
            v => panic!("Expected VarRef, got {:?}", v),
        }
    }

    #[test]
    fn test_brace_and_bare_refs() {
        assert!(matches!(
            parse("${OUT}"),
            Value::VarRef {
                paren: ParenKind::Brace,
                ..
            }
        ));
        match parse("$@") {
            Value::VarRef { name, paren } => {
                assert_eq!(*name, Value::literal("@"));
                assert_eq!(paren, ParenKind::Bare);
            }
            v => panic!("Expected VarRef, got {:?}", v),
        }
    }

    #[test]
    fn test_param_ref() {
        assert_eq!(parse("$1"), Value::ParamRef(1));
        assert_eq!(parse("$9"), Value::ParamRef(9));
    }

    #[test]
    fn test_nested_ref_in_name() {
        match parse("$($(V))") {
            Value::VarRef { name, .. } => {
                assert!(matches!(*name, Value::VarRef { .. }));
            }
            v => panic!("Expected VarRef, got {:?}", v),
        }
    }

    #[test]
    fn test_subst_ref() {
        match parse("$(SRC:%.c=%.o)") {
            Value::SubstRef { name, pat, subst, .. } => {
                assert_eq!(*name, Value::literal("SRC"));
                assert_eq!(*pat, Value::literal("%.c"));
                assert_eq!(*subst, Value::literal("%.o"));
            }
            v => panic!("Expected SubstRef, got {:?}", v),
        }
    }

    #[test]
    fn test_colon_without_equals_stays_in_name() {
        match parse("$(a:b)") {
            Value::VarRef { name, .. } => {
                assert_eq!(name.to_string(), "a:b");
            }
            v => panic!("Expected VarRef, got {:?}", v),
        }
    }

    #[test]
    fn test_function_call_parses() {
        match parse("$(subst a,b,abc)") {
            Value::Func(call) => {
                assert_eq!(call.f.name, "subst");
                assert_eq!(call.args.len(), 3);
                assert_eq!(call.args[0], Value::literal("a"));
                assert_eq!(call.args[2], Value::literal("abc"));
            }
            v => panic!("Expected Func, got {:?}", v),
        }
    }

    #[test]
    fn test_excess_commas_fold_into_last_arg() {
        match parse("$(subst a,b,c,d,e)") {
            Value::Func(call) => {
                assert_eq!(call.args.len(), 3);
                assert_eq!(call.args[2], Value::literal("c,d,e"));
            }
            v => panic!("Expected Func, got {:?}", v),
        }
    }

    #[test]
    fn test_function_name_without_space_is_var() {
        // `$(subst)` is a reference to a variable named "subst".
        assert!(matches!(parse("$(subst)"), Value::VarRef { .. }));
    }

    #[test]
    fn test_insufficient_arguments() {
        let err = parse_expr(loc(), "$(subst a)").unwrap_err();
        assert!(
            err.msg
                .contains("insufficient number of arguments (1) to function 'subst'"),
            "unexpected message: {}",
            err.msg
        );
    }

    #[test]
    fn test_unterminated_reference() {
        let err = parse_expr(loc(), "$(FOO").unwrap_err();
        assert!(err.msg.contains("unterminated variable reference"));
    }

    #[test]
    fn test_var_with_space_in_name() {
        // Not a function: the space joins the rest into the name.
        match parse("$(not-a-func b)") {
            Value::VarRef { name, .. } => {
                assert_eq!(name.to_string(), "not-a-func b");
            }
            v => panic!("Expected VarRef, got {:?}", v),
        }
    }

    #[test]
    fn test_literal_parens_inside_args() {
        match parse("$(filter %.c,(a).c)") {
            Value::Func(call) => {
                assert_eq!(call.args[1], Value::literal("(a).c"));
            }
            v => panic!("Expected Func, got {:?}", v),
        }
    }

    #[test]
    fn test_if_condition_right_trimmed() {
        match parse("$(if $(X) ,yes,no)") {
            Value::Func(call) => {
                assert!(matches!(call.args[0], Value::VarRef { .. }));
            }
            v => panic!("Expected Func, got {:?}", v),
        }
    }

    #[test]
    fn test_display_round_trip() {
        for src in [
            "plain",
            "$(CC) -c $<",
            "$(SRC:%.c=%.o)",
            "$(subst a,b,abc)",
            "${OUT}/bin",
        ] {
            let v = parse(src);
            let reparsed = parse(&v.to_string());
            assert_eq!(v, reparsed, "round-trip failed for {}", src);
        }
    }
}
