//! Wildcard Expansion
//!
//! `$(wildcard ...)` globbing driven by the directory cache. Each
//! pattern component is matched against its directory's entries in
//! listing order, so results come back in a stable, cache-consistent
//! order rather than sorted. Results are memoized per pattern.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use indexmap::IndexMap;

use crate::fs::cache::FsCache;

fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        // `*` must not match a leading dot, as fnmatch(FNM_PERIOD).
        require_literal_leading_dot: true,
    }
}

fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Memoized glob results, keyed by the exact pattern text.
#[derive(Default)]
pub struct GlobCache {
    cache: IndexMap<String, Vec<String>>,
}

impl GlobCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn glob(&mut self, fs: &FsCache, pattern: &str) -> Vec<String> {
        if let Some(hit) = self.cache.get(pattern) {
            return hit.clone();
        }
        let results = glob_walk(fs, pattern);
        self.cache.insert(pattern.to_string(), results.clone());
        results
    }

    /// All patterns expanded so far with their results, in first-use
    /// order. The regeneration stamp records this.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.cache.iter().map(|(p, r)| (p.as_str(), r.as_slice()))
    }
}

fn glob_walk(fs: &FsCache, pattern: &str) -> Vec<String> {
    if !has_wildcard(pattern) {
        // A literal word survives exactly when it names something.
        if !pattern.is_empty() && fs.exists(Path::new(pattern)) {
            return vec![pattern.to_string()];
        }
        return vec![];
    }

    let (base, components): (PathBuf, Vec<&str>) = if let Some(rest) = pattern.strip_prefix('/') {
        (PathBuf::from("/"), rest.split('/').collect())
    } else {
        (PathBuf::from("."), pattern.split('/').collect())
    };

    let mut results = Vec::new();
    walk(fs, &base, "", &components, &mut results);
    results
}

/// Recursive component-wise walk. `prefix` is the already-matched part
/// of the pattern, spelled the way the pattern spelled it (no `./`
/// normalization creeps into the output).
fn walk(fs: &FsCache, dir: &Path, prefix: &str, components: &[&str], results: &mut Vec<String>) {
    let Some((&comp, rest)) = components.split_first() else {
        return;
    };
    let is_last = rest.is_empty();

    // Empty components come from `//` or a trailing slash.
    if comp.is_empty() {
        if is_last {
            if fs.is_dir(dir) {
                results.push(prefix.to_string());
            }
        } else {
            walk(fs, dir, prefix, rest, results);
        }
        return;
    }

    let joined = |prefix: &str, name: &str| -> String {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        }
    };

    if !has_wildcard(comp) {
        let sub = dir.join(comp);
        let path = joined(prefix, comp);
        if is_last {
            if fs.exists(&sub) {
                results.push(path);
            }
        } else {
            walk(fs, &sub, &path, rest, results);
        }
        return;
    }

    let Ok(pat) = Pattern::new(comp) else {
        return;
    };
    let Ok(entries) = fs.read_dir(dir) else {
        return;
    };
    for entry in &entries {
        if !pat.matches_with(&entry.name, match_options()) {
            continue;
        }
        let path = joined(prefix, &entry.name);
        if is_last {
            results.push(path);
        } else {
            walk(fs, &dir.join(&entry.name), &path, rest, results);
        }
    }
}
