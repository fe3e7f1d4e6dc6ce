//! Find Emulator
//!
//! Walks the cached directory tree instead of spawning `find`. The
//! condition tree is evaluated per entry exactly as find does it:
//! left to right with short-circuit and/or, `-prune` cutting off
//! descent, `-print` emitting the path. Output order is directory
//! listing order, preorder, which matches a find run over the same
//! tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glob::Pattern;

use crate::find::types::{FindCommand, FindCond, FindKind};
use crate::fs::cache::FsCache;
use crate::fs::types::{Dirent, FileId, FileKind, SymlinkState};

/// Outcome of an emulated run: the produced words plus every directory
/// that was read, for the regeneration check.
#[derive(Debug, Default, Clone)]
pub struct FindResult {
    pub words: Vec<String>,
    pub read_dirs: Vec<String>,
}

pub struct FindEmulator<'a> {
    fs: &'a FsCache,
}

impl<'a> FindEmulator<'a> {
    pub fn new(fs: &'a FsCache) -> Self {
        Self { fs }
    }

    /// Run the command against the cache. `None` means the command
    /// cannot be emulated faithfully (paths escaping the tree) and the
    /// caller must fall back to a real shell.
    pub fn find(&self, fc: &FindCommand) -> Option<FindResult> {
        for dir in &fc.finddirs {
            if !is_safe_path(dir) {
                return None;
            }
        }
        if let Some(chdir) = &fc.chdir {
            if !is_safe_path(chdir) {
                return None;
            }
        }

        let mut result = FindResult::default();

        if let Some(testdir) = &fc.testdir {
            if !self.fs.is_dir(Path::new(testdir)) {
                // The guard failed; the command produces nothing.
                return Some(result);
            }
        }
        let base = match &fc.chdir {
            Some(chdir) => {
                let p = PathBuf::from(chdir);
                if !self.fs.is_dir(&p) {
                    // `cd` failed; with stderr redirected the output
                    // is simply empty.
                    return Some(result);
                }
                p
            }
            None => PathBuf::from("."),
        };

        match fc.kind {
            FindKind::Find => {
                for dir in &fc.finddirs {
                    self.walk_find(fc, &base, dir, 0, &mut HashSet::new(), &mut result);
                }
            }
            FindKind::FindLeaves => {
                for dir in &fc.finddirs {
                    self.walk_findleaves(fc, &base, dir, 0, &mut HashSet::new(), &mut result);
                }
            }
        }
        Some(result)
    }

    fn walk_find(
        &self,
        fc: &FindCommand,
        base: &Path,
        path: &str,
        depth: usize,
        visited: &mut HashSet<FileId>,
        result: &mut FindResult,
    ) {
        let full = base.join(path);
        let Some(info) = self.fs.lstat(&full) else {
            return;
        };
        let kind = info.kind;
        let resolved = if kind == FileKind::Symlink {
            match self.fs.stat(&full) {
                Some(target) => SymlinkState::Resolved(target.kind),
                None => SymlinkState::Broken(ENOENT),
            }
        } else {
            SymlinkState::NotSymlink
        };
        let entry = Dirent {
            name: base_name(path).to_string(),
            id: info.id,
            kind,
            resolved,
        };
        self.visit(fc, base, path, &entry, depth, visited, result);
    }

    /// Evaluate the condition for one entry and descend if it is a
    /// directory (or a followed symlink to one).
    #[allow(clippy::too_many_arguments)]
    fn visit(
        &self,
        fc: &FindCommand,
        base: &Path,
        path: &str,
        entry: &Dirent,
        depth: usize,
        visited: &mut HashSet<FileId>,
        result: &mut FindResult,
    ) {
        let mut pruned = false;
        let in_depth = fc.min_depth.map_or(true, |m| depth >= m)
            && fc.max_depth.map_or(true, |m| depth <= m);
        let matched = match &fc.cond {
            Some(cond) => {
                let print_in_tree = cond.has_print();
                let matched = eval_cond(cond, fc, entry, in_depth, path, result, &mut pruned);
                // Without an explicit -print, truth prints.
                !print_in_tree && matched
            }
            None => true,
        };
        if matched && in_depth {
            result.words.push(path.to_string());
        }

        let descend = match entry.kind {
            FileKind::Dir => true,
            FileKind::Symlink if fc.follows_symlinks => {
                matches!(entry.resolved, SymlinkState::Resolved(FileKind::Dir))
            }
            _ => false,
        };
        if !descend || pruned {
            return;
        }
        if fc.max_depth.is_some_and(|m| depth >= m) {
            return;
        }
        // Symlink loops terminate on the identity of the directory.
        if !visited.insert(entry.id) {
            return;
        }

        let full = base.join(path);
        result.read_dirs.push(path.to_string());
        if let Ok(entries) = self.fs.read_dir(&full) {
            for child in &entries {
                let child_path = join_path(path, &child.name);
                self.visit(fc, base, &child_path, child, depth + 1, visited, result);
            }
        }
        visited.remove(&entry.id);
    }

    fn walk_findleaves(
        &self,
        fc: &FindCommand,
        base: &Path,
        path: &str,
        depth: usize,
        visited: &mut HashSet<FileId>,
        result: &mut FindResult,
    ) {
        let full = base.join(path);
        let Some(info) = self.fs.stat(&full) else {
            return;
        };
        if info.kind != FileKind::Dir {
            return;
        }
        if !visited.insert(info.id) {
            return;
        }
        result.read_dirs.push(path.to_string());
        let Ok(entries) = self.fs.read_dir(&full) else {
            visited.remove(&info.id);
            return;
        };

        let filename = fc.filename.as_deref().unwrap_or("");
        let min_depth = fc.min_depth.unwrap_or(0);
        let found = entries
            .iter()
            .any(|e| e.name == filename && e.kind != FileKind::Dir);
        if found && depth >= min_depth {
            // A leaf: emit and do not descend further.
            result.words.push(join_path(path, filename));
            visited.remove(&info.id);
            return;
        }
        for child in &entries {
            if fc.prunes.iter().any(|p| p == &child.name) {
                continue;
            }
            let is_dir = child.kind == FileKind::Dir
                || matches!(child.resolved, SymlinkState::Resolved(FileKind::Dir));
            if !is_dir {
                continue;
            }
            let child_path = join_path(path, &child.name);
            self.walk_findleaves(fc, base, &child_path, depth + 1, visited, result);
        }
        visited.remove(&info.id);
    }
}

/// One condition-tree evaluation for one entry.
fn eval_cond(
    cond: &FindCond,
    fc: &FindCommand,
    entry: &Dirent,
    in_depth: bool,
    path: &str,
    result: &mut FindResult,
    pruned: &mut bool,
) -> bool {
    match cond {
        FindCond::Name(pat) => Pattern::new(pat)
            .map(|p| p.matches(&entry.name))
            .unwrap_or(false),
        FindCond::Type(t) => {
            let kind = if fc.follows_symlinks && entry.kind == FileKind::Symlink {
                match entry.resolved {
                    SymlinkState::Resolved(k) => k,
                    _ => entry.kind,
                }
            } else {
                entry.kind
            };
            kind.type_char() == Some(*t)
        }
        FindCond::Not(c) => !eval_cond(c, fc, entry, in_depth, path, result, pruned),
        FindCond::And(a, b) => {
            eval_cond(a, fc, entry, in_depth, path, result, pruned)
                && eval_cond(b, fc, entry, in_depth, path, result, pruned)
        }
        FindCond::Or(a, b) => {
            eval_cond(a, fc, entry, in_depth, path, result, pruned)
                || eval_cond(b, fc, entry, in_depth, path, result, pruned)
        }
        FindCond::Prune => {
            if entry.kind == FileKind::Dir {
                *pruned = true;
            }
            true
        }
        FindCond::Print => {
            if in_depth {
                result.words.push(path.to_string());
            }
            true
        }
    }
}

/// Paths must stay inside the tree for the cache to be authoritative.
fn is_safe_path(p: &str) -> bool {
    if p.starts_with('/') {
        return false;
    }
    !p.split('/').any(|c| c == "..")
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn join_path(dir: &str, name: &str) -> String {
    if dir == "." {
        format!("./{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

const ENOENT: i32 = 2;
