//! `%` Pattern Matching
//!
//! The wildcard patterns used by pattern rules, `patsubst`, and
//! substitution references. A pattern is split at its first `%` into a
//! prefix and a suffix; a word matches when it starts with the prefix
//! and ends with the suffix, and the bytes in between are the stem.

/// A parsed `%` pattern. Borrows the pattern text.
#[derive(Debug, Clone, Copy)]
pub struct Pattern<'a> {
    pat: &'a str,
    percent: Option<usize>,
}

impl<'a> Pattern<'a> {
    pub fn new(pat: &'a str) -> Self {
        Self {
            pat,
            percent: pat.find('%'),
        }
    }

    /// Whether the pattern contains a `%` at all. Patterns without one
    /// only match the exact word.
    pub fn has_percent(&self) -> bool {
        self.percent.is_some()
    }

    /// Match `word`, returning the stem on success. For a pattern with
    /// no `%` the stem of an exact match is the empty string.
    pub fn matches(&self, word: &'a str) -> Option<&'a str> {
        match self.percent {
            Some(idx) => {
                let prefix = &self.pat[..idx];
                let suffix = &self.pat[idx + 1..];
                if word.len() >= prefix.len() + suffix.len()
                    && word.starts_with(prefix)
                    && word.ends_with(suffix)
                {
                    Some(&word[prefix.len()..word.len() - suffix.len()])
                } else {
                    None
                }
            }
            None => {
                if word == self.pat {
                    Some("")
                } else {
                    None
                }
            }
        }
    }

    /// Append `word` transformed by this pattern and `subst` to `out`.
    /// On a match, every `%` in `subst` is replaced by the stem; on a
    /// mismatch the word is appended unchanged.
    pub fn append_subst(&self, word: &str, subst: &str, out: &mut String) {
        match self.matches(word) {
            Some(stem) => {
                if subst.contains('%') {
                    let mut first = true;
                    for part in subst.split('%') {
                        if !first {
                            out.push_str(stem);
                        }
                        out.push_str(part);
                        first = false;
                    }
                } else {
                    out.push_str(subst);
                }
            }
            None => out.push_str(word),
        }
    }

    /// The substitution-reference variant: a pattern without `%` is a
    /// suffix replacement, i.e. `$(V:.c=.o)` behaves as `%.c=%.o`.
    pub fn append_subst_ref(&self, word: &str, subst: &str, out: &mut String) {
        if self.has_percent() {
            self.append_subst(word, subst, out);
        } else {
            let pat = format!("%{}", self.pat);
            let repl = format!("%{}", subst);
            Pattern::new(&pat).append_subst(word, &repl, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subst(pat: &str, repl: &str, word: &str) -> String {
        let mut out = String::new();
        Pattern::new(pat).append_subst(word, repl, &mut out);
        out
    }

    #[test]
    fn test_match_stem() {
        assert_eq!(Pattern::new("%.c").matches("foo.c"), Some("foo"));
        assert_eq!(Pattern::new("src/%.c").matches("src/a.c"), Some("a"));
        assert_eq!(Pattern::new("%.c").matches("foo.o"), None);
    }

    #[test]
    fn test_match_requires_room_for_fixes() {
        // The stem may be empty, but prefix and suffix may not overlap.
        assert_eq!(Pattern::new("a%a").matches("aa"), Some(""));
        assert_eq!(Pattern::new("aa%aa").matches("aaa"), None);
    }

    #[test]
    fn test_exact_match_without_percent() {
        assert_eq!(Pattern::new("foo").matches("foo"), Some(""));
        assert_eq!(Pattern::new("foo").matches("foo.c"), None);
    }

    #[test]
    fn test_subst() {
        assert_eq!(subst("%.c", "%.o", "foo.c"), "foo.o");
        assert_eq!(subst("%.c", "%.o", "foo.h"), "foo.h");
        assert_eq!(subst("%.c", "obj/%.o", "a.c"), "obj/a.o");
    }

    #[test]
    fn test_subst_without_percent_in_replacement() {
        assert_eq!(subst("%.c", "fixed", "foo.c"), "fixed");
    }

    #[test]
    fn test_subst_ref_suffix_mode() {
        let mut out = String::new();
        Pattern::new(".c").append_subst_ref("foo.c", ".o", &mut out);
        assert_eq!(out, "foo.o");
    }

    #[test]
    fn test_subst_ref_percent_mode() {
        let mut out = String::new();
        Pattern::new("%.c").append_subst_ref("foo.c", "%.o", &mut out);
        assert_eq!(out, "foo.o");
    }
}
