//! Text Functions
//!
//! `subst`, `patsubst`, word selection, filtering, and sorting.

use crate::eval::evaluator::Evaluator;
use crate::eval::types::EvalError;
use crate::expr::sink::WordWriter;
use crate::expr::types::Value;
use crate::functions::word_split;
use crate::pattern::Pattern;

pub fn f_subst(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let from = ev.eval_to_str(&args[0])?;
    let to = ev.eval_to_str(&args[1])?;
    let text = ev.eval_to_str(&args[2])?;
    if from.is_empty() {
        out.push_str(&text);
        return Ok(());
    }
    out.push_str(&text.replace(&from, &to));
    Ok(())
}

pub fn f_patsubst(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let pat_text = ev.eval_to_str(&args[0])?;
    let repl = ev.eval_to_str(&args[1])?;
    let text = ev.eval_to_str(&args[2])?;
    let pat = Pattern::new(&pat_text);
    let mut w = WordWriter::new(out);
    for word in word_split(&text) {
        w.maybe_add_space();
        pat.append_subst(word, &repl, w.out);
    }
    Ok(())
}

pub fn f_strip(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let text = ev.eval_to_str(&args[0])?;
    let mut w = WordWriter::new(out);
    for word in word_split(&text) {
        w.write(word);
    }
    Ok(())
}

pub fn f_findstring(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let needle = ev.eval_to_str(&args[0])?;
    let haystack = ev.eval_to_str(&args[1])?;
    if haystack.contains(&needle) {
        out.push_str(&needle);
    }
    Ok(())
}

fn filter_impl(
    ev: &mut Evaluator,
    args: &[Value],
    out: &mut String,
    keep_matching: bool,
) -> Result<(), EvalError> {
    let pats_text = ev.eval_to_str(&args[0])?;
    let text = ev.eval_to_str(&args[1])?;
    let pats: Vec<Pattern> = word_split(&pats_text).map(Pattern::new).collect();
    let mut w = WordWriter::new(out);
    for word in word_split(&text) {
        let matched = pats.iter().any(|p| p.matches(word).is_some());
        if matched == keep_matching {
            w.write(word);
        }
    }
    Ok(())
}

pub fn f_filter(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    filter_impl(ev, args, out, true)
}

pub fn f_filter_out(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    filter_impl(ev, args, out, false)
}

/// Lexicographic sort with duplicate removal.
pub fn f_sort(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let text = ev.eval_to_str(&args[0])?;
    let mut words: Vec<&str> = word_split(&text).collect();
    words.sort_unstable();
    words.dedup();
    let mut w = WordWriter::new(out);
    for word in words {
        w.write(word);
    }
    Ok(())
}

fn parse_index(ev: &Evaluator, text: &str, func: &str, which: &str) -> Result<i64, EvalError> {
    text.trim().parse::<i64>().map_err(|_| {
        ev.err(format!(
            "non-numeric {} argument to '{}' function: '{}'",
            which, func, text
        ))
    })
}

pub fn f_word(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let n_text = ev.eval_to_str(&args[0])?;
    let text = ev.eval_to_str(&args[1])?;
    let n = parse_index(ev, &n_text, "word", "first")?;
    if n <= 0 {
        return Err(ev.err("first argument to 'word' function must be greater than 0"));
    }
    if let Some(word) = word_split(&text).nth(n as usize - 1) {
        out.push_str(word);
    }
    Ok(())
}

pub fn f_wordlist(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let s_text = ev.eval_to_str(&args[0])?;
    let e_text = ev.eval_to_str(&args[1])?;
    let text = ev.eval_to_str(&args[2])?;
    let s = parse_index(ev, &s_text, "wordlist", "first")?;
    let e = parse_index(ev, &e_text, "wordlist", "second")?;
    if s <= 0 {
        return Err(ev.err(format!(
            "invalid first argument to 'wordlist' function: '{}'",
            s_text
        )));
    }
    if e < s {
        return Ok(());
    }
    let mut w = WordWriter::new(out);
    for word in word_split(&text)
        .skip(s as usize - 1)
        .take((e - s + 1) as usize)
    {
        w.write(word);
    }
    Ok(())
}

pub fn f_words(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let text = ev.eval_to_str(&args[0])?;
    out.push_str(&word_split(&text).count().to_string());
    Ok(())
}

pub fn f_firstword(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let text = ev.eval_to_str(&args[0])?;
    if let Some(word) = word_split(&text).next() {
        out.push_str(word);
    }
    Ok(())
}

pub fn f_lastword(ev: &mut Evaluator, args: &[Value], out: &mut String) -> Result<(), EvalError> {
    let text = ev.eval_to_str(&args[0])?;
    if let Some(word) = word_split(&text).last() {
        out.push_str(word);
    }
    Ok(())
}
