//! Stamp File
//!
//! Serializes the resolved graph together with every recorded outside
//! observation. A later run loads the stamp, re-checks each record
//! kind, and either reuses the graph or falls back to a full
//! re-evaluation. Writes are atomic: temp file plus rename.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dep::DepGraph;
use crate::eval::Evaluator;
use crate::fs::{FsCache, GlobCache};
use crate::regen::{time_ms, FileRecord, FileState, ShellKind, ShellRecord};
use crate::shell;

/// Bumped whenever the stamp layout changes; part of the file name,
/// so a mismatched version simply never gets found.
pub const STAMP_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobRecord {
    pub pattern: String,
    pub results: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Stamp {
    pub version: u32,
    pub command_line: Vec<String>,
    /// The interpreter evaluation used for `$(shell ...)`.
    pub shell_path: String,
    pub files: Vec<FileRecord>,
    pub envs: Vec<(String, Option<String>)>,
    pub globs: Vec<GlobRecord>,
    pub shells: Vec<ShellRecord>,
    pub graph: DepGraph,
}

/// Stamp file name, derived from the makefile and the requested
/// roots: `.{makefile}-{targets}.jm_stamp.v{N}`.
pub fn stamp_path(makefile: &str, targets: &[String]) -> PathBuf {
    let base = Path::new(makefile)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Makefile".to_string());
    let mut name = format!(".{}", base);
    for t in targets {
        name.push('-');
        name.push_str(&t.replace('/', "_"));
    }
    name.push_str(&format!(".jm_stamp.v{}", STAMP_VERSION));
    PathBuf::from(name)
}

/// Assemble the stamp from an evaluator that just finished and its
/// resolved graph.
pub fn build_stamp(
    ev: &Evaluator,
    graph: DepGraph,
    command_line: &[String],
    shell_path: String,
) -> Stamp {
    let mut envs: Vec<(String, Option<String>)> = ev
        .regen
        .envs
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    // The interpreter path is an input of every recorded shell run.
    if !envs.iter().any(|(k, _)| k == "SHELL") {
        envs.push(("SHELL".to_string(), std::env::var("SHELL").ok()));
    }
    Stamp {
        version: STAMP_VERSION,
        command_line: command_line.to_vec(),
        shell_path,
        files: ev.regen.files.values().cloned().collect(),
        envs,
        globs: ev
            .glob
            .iter()
            .map(|(p, r)| GlobRecord {
                pattern: p.to_string(),
                results: r.to_vec(),
            })
            .collect(),
        shells: ev.regen.shells.clone(),
        graph,
    }
}

/// Atomic save: write a temp file next to the target, then rename.
pub fn save(path: &Path, stamp: &Stamp) -> std::io::Result<()> {
    let json = serde_json::to_vec(stamp)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
}

/// Load the stamp and re-check every record. `None` means a full
/// re-evaluation is needed.
pub fn load_if_fresh(path: &Path, command_line: &[String]) -> Option<Stamp> {
    let bytes = std::fs::read(path).ok()?;
    let stamp: Stamp = serde_json::from_slice(&bytes).ok()?;
    if stamp.version != STAMP_VERSION {
        tracing::debug!("stamp version mismatch");
        return None;
    }
    if stamp.command_line != command_line {
        tracing::debug!("command line changed");
        return None;
    }
    if is_fresh(&stamp) {
        Some(stamp)
    } else {
        None
    }
}

fn is_fresh(stamp: &Stamp) -> bool {
    for f in &stamp.files {
        match f.state {
            FileState::Inconsistent => {
                tracing::debug!(path = %f.path, "file was inconsistent");
                return false;
            }
            FileState::Exists => {
                let Ok(bytes) = std::fs::read(&f.path) else {
                    tracing::debug!(path = %f.path, "recorded file disappeared");
                    return false;
                };
                if blake3::hash(&bytes).to_hex().to_string() != f.hash {
                    tracing::debug!(path = %f.path, "file content changed");
                    return false;
                }
            }
            FileState::NotExists => {
                if Path::new(&f.path).exists() {
                    tracing::debug!(path = %f.path, "previously missing file appeared");
                    return false;
                }
            }
        }
    }

    for (name, recorded) in &stamp.envs {
        let current = std::env::var(name).ok();
        if current.as_deref() != recorded.as_deref() {
            tracing::debug!(name, "environment variable changed");
            return false;
        }
    }

    let fs = FsCache::new();
    let mut globs = GlobCache::new();
    for g in &stamp.globs {
        if globs.glob(&fs, &g.pattern) != g.results {
            tracing::debug!(pattern = %g.pattern, "wildcard result changed");
            return false;
        }
    }

    for s in &stamp.shells {
        if !shell_record_fresh(&fs, &stamp.shell_path, s) {
            return false;
        }
    }
    true
}

fn shell_record_fresh(fs: &FsCache, shell_path: &str, record: &ShellRecord) -> bool {
    match &record.kind {
        // Frozen output; replaying would always differ.
        ShellKind::Date => true,
        ShellKind::Find { read_dirs, testdir } => {
            if let Some((dir, existed)) = testdir {
                if fs.is_dir(Path::new(dir)) != *existed {
                    tracing::debug!(dir, "tested directory changed");
                    return false;
                }
            }
            for d in read_dirs {
                let now = fs.dir_mtime(Path::new(&d.path));
                let fresh = match (now, d.exists) {
                    (Some(t), true) => time_ms(t) == d.mtime_ms,
                    (None, false) => true,
                    _ => false,
                };
                if !fresh {
                    tracing::debug!(path = %d.path, "watched directory changed");
                    return false;
                }
            }
            true
        }
        ShellKind::Plain => {
            let raw = shell::spawn_shell(shell_path, &record.command, &[]);
            let out = shell::format_shell_output(&raw);
            if out != record.output {
                tracing::debug!(command = %record.command, "shell output changed");
                return false;
            }
            true
        }
    }
}
