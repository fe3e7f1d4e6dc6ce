//! Shell Optimizer
//!
//! Pattern-matches recurring shell fragments inside `$(shell ...)` and
//! substitutes native implementations with byte-identical output. The
//! template set is closed: find/findleaves invocations are routed to
//! the find emulator, `date` is frozen to a captured timestamp, and
//! the rot13 `echo | tr` translator is computed in-process. Anything
//! else keeps its real shell semantics.

use lazy_static::lazy_static;
use regex_lite::Regex;

use crate::find::{parse_find_command, FindCommand};

/// What a command line was recognized as.
#[derive(Debug, Clone, PartialEq)]
pub enum Recognized {
    /// A whitelisted find/findleaves command.
    Find(FindCommand),
    /// `date` or `date +FORMAT`: output depends on wall-clock time.
    Date { format: Option<String> },
    /// `echo TEXT | tr 'a-zA-Z' 'n-za-mN-ZA-M'`
    Rot13 { text: String },
}

lazy_static! {
    static ref DATE_RE: Regex =
        Regex::new(r"^date(?:\s+'?\+([^']*)'?)?\s*$").unwrap();
    static ref ROT13_RE: Regex = Regex::new(
        r"^echo\s+(?:'([^']*)'|\x22([^\x22]*)\x22|(\S+))\s*\|\s*tr\s+'?a-zA-Z'?\s+'?n-za-mN-ZA-M'?\s*$"
    )
    .unwrap();
}

/// Try every recognizer against an expanded shell command.
pub fn recognize(cmd: &str) -> Option<Recognized> {
    let cmd = cmd.trim();
    if let Some(caps) = DATE_RE.captures(cmd) {
        let format = caps.get(1).map(|m| m.as_str().to_string());
        // Unknown conversion specifiers go to the real `date`.
        if format.as_deref().map_or(true, is_safe_date_format) {
            return Some(Recognized::Date { format });
        }
        return None;
    }
    if let Some(caps) = ROT13_RE.captures(cmd) {
        let text = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        return Some(Recognized::Rot13 { text });
    }
    parse_find_command(cmd).map(Recognized::Find)
}

/// The rot13 transliteration `tr a-zA-Z n-za-mN-ZA-M` performs.
pub fn rot13(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a' + 13) % 26) + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A' + 13) % 26) + b'A') as char,
            other => other,
        })
        .collect()
}

/// The strftime conversions the frozen formatter supports; the same
/// set both `date` and the time formatter agree on.
fn is_safe_date_format(fmt: &str) -> bool {
    let bytes = fmt.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let Some(&spec) = bytes.get(i + 1) else {
                return false;
            };
            if !b"YmdHMSjyaAbBeFTsn%".contains(&spec) {
                return false;
            }
            i += 2;
        } else {
            i += 1;
        }
    }
    true
}

/// Format the frozen timestamp a recognized `date` command yields.
/// Every evaluation inside one run sees the same instant.
pub fn frozen_date(format: Option<&str>) -> String {
    let now = chrono::Local::now();
    let fmt = format.unwrap_or("%a %b %e %H:%M:%S %Z %Y");
    now.format(fmt).to_string()
}
