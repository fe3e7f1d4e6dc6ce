//! Rule Line Parsing
//!
//! A rule statement's left-hand side is expanded first and then split
//! here into outputs, patterns, inputs, and order-only inputs. Pattern
//! rules, static pattern rules, double-colon rules, and suffix rules
//! are all recognized from the expanded text.

use crate::eval::types::EvalError;
use crate::expr::Value;
use crate::loc::Loc;
use crate::sym::{intern, Symbol};

/// A collected rule, not yet resolved against the file system.
#[derive(Debug, Clone)]
pub struct Rule {
    pub outputs: Vec<Symbol>,
    pub output_patterns: Vec<Symbol>,
    pub inputs: Vec<Symbol>,
    pub order_only_inputs: Vec<Symbol>,
    pub commands: Vec<Value>,
    pub is_double_colon: bool,
    pub is_suffix_rule: bool,
    pub loc: Loc,
    /// Line number of the first recipe line, for diagnostics.
    pub cmd_lineno: u32,
}

impl Rule {
    fn new(loc: Loc) -> Self {
        Self {
            outputs: Vec::new(),
            output_patterns: Vec::new(),
            inputs: Vec::new(),
            order_only_inputs: Vec::new(),
            commands: Vec::new(),
            is_double_colon: false,
            is_suffix_rule: false,
            loc,
            cmd_lineno: 0,
        }
    }

    /// Whether this is an implicit (pattern) rule.
    pub fn is_implicit(&self) -> bool {
        self.outputs.is_empty() && !self.output_patterns.is_empty()
    }
}

/// Parse an expanded rule line (`a b: c | d`). Returns `None` when the
/// expansion left no targets at all.
pub fn parse_rule_line(loc: Loc, line: &str) -> Result<Option<Rule>, EvalError> {
    let Some(colon) = line.find(':') else {
        if line.trim().is_empty() {
            return Ok(None);
        }
        return Err(EvalError::new(loc, "missing separator"));
    };

    let mut rule = Rule::new(loc);
    let before = &line[..colon];
    let mut after = &line[colon + 1..];
    if let Some(rest) = after.strip_prefix(':') {
        rule.is_double_colon = true;
        after = rest;
    }

    let outputs: Vec<&str> = before.split_ascii_whitespace().collect();
    if outputs.is_empty() {
        return Ok(None);
    }

    // A second colon introduces a static pattern rule:
    //   targets : target-pattern : prereq-patterns
    let (patterns_text, inputs_text) = match after.find(':') {
        Some(i) => (Some(&after[..i]), &after[i + 1..]),
        None => (None, after),
    };

    if let Some(pats) = patterns_text {
        for pat in pats.split_ascii_whitespace() {
            check_single_percent(loc, pat)?;
            rule.output_patterns.push(intern(pat));
        }
        if rule.output_patterns.is_empty() {
            return Err(EvalError::new(loc, "missing target pattern"));
        }
        if rule.output_patterns.len() > 1 {
            return Err(EvalError::new(loc, "multiple target patterns"));
        }
        for o in &outputs {
            rule.outputs.push(intern(o));
        }
    } else {
        // A `%` in the targets makes this an implicit rule.
        let with_percent = outputs.iter().filter(|o| o.contains('%')).count();
        if with_percent == outputs.len() {
            for o in &outputs {
                check_single_percent(loc, o)?;
                rule.output_patterns.push(intern(o));
            }
        } else if with_percent > 0 {
            return Err(EvalError::new(loc, "mixed implicit and normal rules"));
        } else {
            for o in &outputs {
                rule.outputs.push(intern(o));
            }
        }
    }

    // Inputs, with `|` separating order-only inputs.
    let (norm, order_only) = match inputs_text.find('|') {
        Some(i) => (&inputs_text[..i], &inputs_text[i + 1..]),
        None => (inputs_text, ""),
    };
    for w in norm.split_ascii_whitespace() {
        rule.inputs.push(intern(w));
    }
    for w in order_only.split_ascii_whitespace() {
        rule.order_only_inputs.push(intern(w));
    }

    rule.is_suffix_rule = detect_suffix_rule(&rule);
    Ok(Some(rule))
}

fn check_single_percent(loc: Loc, pat: &str) -> Result<(), EvalError> {
    match pat.bytes().filter(|&b| b == b'%').count() {
        0 => Err(EvalError::new(loc, "target pattern contains no '%'")),
        1 => Ok(()),
        _ => Err(EvalError::new(loc, "target pattern contains multiple '%'")),
    }
}

/// `.c.o: ...`: a single output that is two extensions glued
/// together. The dependency builder turns it into an implicit rule
/// indexed by the output extension.
fn detect_suffix_rule(rule: &Rule) -> bool {
    if rule.outputs.len() != 1 || !rule.output_patterns.is_empty() {
        return false;
    }
    let name = rule.outputs[0].as_str();
    if !name.starts_with('.') || name.contains('/') || name.contains('%') {
        return false;
    }
    // Exactly two dots: the leading one plus the separator.
    name.bytes().filter(|&b| b == b'.').count() == 2 && !name.ends_with('.')
}

/// Split `.c.o` into (input extension, output extension).
pub fn split_suffix_rule_name(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix('.')?;
    let dot = rest.find('.')?;
    let input = &rest[..dot];
    let output = &rest[dot + 1..];
    if input.is_empty() || output.is_empty() {
        return None;
    }
    Some((input, output))
}
