//! Line Reader
//!
//! Joins physical lines into logical lines and strips comments. A
//! physical line ending in an unescaped backslash continues on the next
//! line. The joined text keeps the raw `\<newline>` sequences so that
//! recipe lines and `define` bodies can preserve them verbatim; for
//! ordinary statement lines [`collapse_continuations`] folds each
//! continuation into a single space.

/// One logical line: raw text (continuations embedded) plus the
/// 1-based number of its first physical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub text: String,
    pub lineno: u32,
}

/// Split a buffer into logical lines. Trailing `\r` of each physical
/// line is dropped.
pub fn logical_lines(buf: &str) -> Vec<LogicalLine> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut start_line: u32 = 0;
    let mut lineno: u32 = 0;

    for physical in buf.split('\n') {
        lineno += 1;
        let physical = physical.strip_suffix('\r').unwrap_or(physical);
        if cur.is_empty() {
            start_line = lineno;
        } else {
            cur.push('\n');
        }
        cur.push_str(physical);
        if ends_with_continuation(&cur) {
            continue;
        }
        out.push(LogicalLine {
            text: std::mem::take(&mut cur),
            lineno: start_line,
        });
    }
    // A dangling backslash at end of input still yields a line.
    if !cur.is_empty() {
        out.push(LogicalLine {
            text: cur,
            lineno: start_line,
        });
    }
    // `split` yields one empty trailing piece for a final newline;
    // drop the phantom empty line it creates.
    if buf.ends_with('\n') && out.last().is_some_and(|l| l.text.is_empty()) {
        out.pop();
    }
    out
}

/// True when the line ends with an odd run of backslashes.
fn ends_with_continuation(s: &str) -> bool {
    let mut backslashes = 0;
    for c in s.bytes().rev() {
        if c == b'\\' {
            backslashes += 1;
        } else {
            break;
        }
    }
    backslashes % 2 == 1
}

/// Fold `\<newline>` plus following indentation into a single space,
/// the treatment ordinary statement lines get. Recipe lines skip this.
pub fn collapse_continuations(s: &str) -> String {
    if !s.contains('\n') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(idx) = rest.find("\\\n") {
        out.push_str(&rest[..idx]);
        out.push(' ');
        rest = rest[idx + 2..].trim_start_matches([' ', '\t']);
    }
    out.push_str(rest);
    out
}

/// Strip a trailing comment. A `#` begins a comment unless it is
/// escaped with a backslash or sits inside parentheses or braces opened
/// on this logical line; `\#` collapses to a literal `#`.
pub fn strip_comment(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut depth: usize = 0;
    let mut i = 0;
    let mut chunk_start = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() && bytes[i + 1] == b'#' => {
                out.push_str(&s[chunk_start..i]);
                out.push('#');
                i += 2;
                chunk_start = i;
                continue;
            }
            b'#' if depth == 0 => {
                out.push_str(&s[chunk_start..i]);
                return out;
            }
            b'(' | b'{' => depth += 1,
            b')' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    out.push_str(&s[chunk_start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(buf: &str) -> Vec<(String, u32)> {
        logical_lines(buf)
            .into_iter()
            .map(|l| (l.text, l.lineno))
            .collect()
    }

    #[test]
    fn test_simple_lines() {
        assert_eq!(
            lines("a\nb\n"),
            vec![("a".to_string(), 1), ("b".to_string(), 2)]
        );
    }

    #[test]
    fn test_continuation_joins_and_numbers() {
        let got = lines("a \\\nb\nc\n");
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], ("a \\\nb".to_string(), 1));
        assert_eq!(got[1], ("c".to_string(), 3));
    }

    #[test]
    fn test_double_backslash_is_not_continuation() {
        let got = lines("a \\\\\nb\n");
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn test_crlf() {
        assert_eq!(lines("a\r\nb\r\n"), vec![("a".into(), 1), ("b".into(), 2)]);
    }

    #[test]
    fn test_no_trailing_newline() {
        assert_eq!(lines("a"), vec![("a".to_string(), 1)]);
    }

    #[test]
    fn test_collapse_continuations() {
        assert_eq!(collapse_continuations("a \\\n  b"), "a  b");
        assert_eq!(collapse_continuations("plain"), "plain");
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("a = b # comment"), "a = b ");
        assert_eq!(strip_comment("a = b"), "a = b");
    }

    #[test]
    fn test_escaped_hash_survives() {
        assert_eq!(strip_comment("a = b\\#c"), "a = b#c");
    }

    #[test]
    fn test_hash_inside_parens_kept() {
        assert_eq!(
            strip_comment("a = $(shell echo '#') # real"),
            "a = $(shell echo '#') "
        );
    }
}
