//! File Name Functions
//!
//! Path slicing, prefix/suffix attachment, and the file-system-backed
//! `wildcard`/`realpath`/`abspath`.

use crate::eval::evaluator::Evaluator;
use crate::eval::types::EvalError;
use crate::expr::sink::WordWriter;
use crate::expr::types::Value;
use crate::functions::word_split;

pub fn f_dir(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let text = ev.eval_to_str(&args[0])?;
    let mut w = WordWriter::new(out);
    for word in word_split(&text) {
        match word.rfind('/') {
            Some(i) => w.write(&word[..=i]),
            None => w.write("./"),
        }
    }
    Ok(())
}

pub fn f_notdir(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let text = ev.eval_to_str(&args[0])?;
    let mut w = WordWriter::new(out);
    for word in word_split(&text) {
        match word.rfind('/') {
            Some(i) => w.write(&word[i + 1..]),
            None => w.write(word),
        }
    }
    Ok(())
}

/// The extension of each word, dot included; words without one
/// contribute nothing.
pub fn f_suffix(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let text = ev.eval_to_str(&args[0])?;
    let mut w = WordWriter::new(out);
    for word in word_split(&text) {
        if let Some(suf) = find_suffix(word) {
            w.write(suf);
        }
    }
    Ok(())
}

pub fn f_basename(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let text = ev.eval_to_str(&args[0])?;
    let mut w = WordWriter::new(out);
    for word in word_split(&text) {
        match find_suffix(word) {
            Some(suf) => w.write(&word[..word.len() - suf.len()]),
            None => w.write(word),
        }
    }
    Ok(())
}

/// The dot-suffix of the basename part, if any.
fn find_suffix(word: &str) -> Option<&str> {
    let base_start = word.rfind('/').map(|i| i + 1).unwrap_or(0);
    let base = &word[base_start..];
    base.rfind('.').map(|i| &base[i..])
}

pub fn f_addsuffix(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let suffix = ev.eval_to_str(&args[0])?;
    let text = ev.eval_to_str(&args[1])?;
    let mut w = WordWriter::new(out);
    for word in word_split(&text) {
        w.maybe_add_space();
        w.out.push_str(word);
        w.out.push_str(&suffix);
    }
    Ok(())
}

pub fn f_addprefix(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let prefix = ev.eval_to_str(&args[0])?;
    let text = ev.eval_to_str(&args[1])?;
    let mut w = WordWriter::new(out);
    for word in word_split(&text) {
        w.maybe_add_space();
        w.out.push_str(&prefix);
        w.out.push_str(word);
    }
    Ok(())
}

/// Pairwise concatenation; leftover words of the longer list pass
/// through unchanged.
pub fn f_join(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let a_text = ev.eval_to_str(&args[0])?;
    let b_text = ev.eval_to_str(&args[1])?;
    let a: Vec<&str> = word_split(&a_text).collect();
    let b: Vec<&str> = word_split(&b_text).collect();
    let mut w = WordWriter::new(out);
    for i in 0..a.len().max(b.len()) {
        w.maybe_add_space();
        if let Some(x) = a.get(i) {
            w.out.push_str(x);
        }
        if let Some(y) = b.get(i) {
            w.out.push_str(y);
        }
    }
    Ok(())
}

pub fn f_wildcard(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let text = ev.eval_to_str(&args[0])?;
    let mut w = WordWriter::new(out);
    for pattern in word_split(&text) {
        for hit in ev.wildcard(pattern) {
            w.write(&hit);
        }
    }
    Ok(())
}

/// Resolve each word through the file system; words that do not
/// resolve are dropped.
pub fn f_realpath(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let text = ev.eval_to_str(&args[0])?;
    let mut w = WordWriter::new(out);
    for word in word_split(&text) {
        match std::fs::canonicalize(word) {
            Ok(path) => w.write(&path.to_string_lossy()),
            Err(e) => {
                tracing::debug!(word, error = %e, "realpath dropped word");
            }
        }
    }
    Ok(())
}

pub fn f_abspath(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let text = ev.eval_to_str(&args[0])?;
    let cwd = std::env::current_dir().unwrap_or_default();
    let mut w = WordWriter::new(out);
    for word in word_split(&text) {
        w.write(&abspath(&cwd.to_string_lossy(), word));
    }
    Ok(())
}

/// Lexically absolutize: no symlink resolution, `.` and `..` folded.
fn abspath(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", cwd, path)
    };
    let mut parts: Vec<&str> = Vec::new();
    for comp in joined.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    let mut out = String::from("/");
    out.push_str(&parts.join("/"));
    out
}
