//! Directory Cache
//!
//! Caches directory listings and lstat results for the whole run.
//! Listings keep the order the directory returned them in; that order
//! is what `$(wildcard)` and the find emulator expose, so it must be
//! stable for a given tree. Symlink targets are resolved lazily and
//! re-attempted until a fixed point; entries that never resolve carry
//! the errno observed.
//!
//! Interior locking is coarse: one mutex over the whole cache. The
//! pipeline is single-threaded, the lock just keeps the type Send+Sync
//! so it can sit behind an `Arc` shared with the find emulator.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::fs::types::{Dirent, FileId, FileKind, FsError, StatInfo, SymlinkState};

#[derive(Default)]
struct Inner {
    dirs: HashMap<PathBuf, Result<Vec<Dirent>, FsError>>,
    lstats: HashMap<PathBuf, Option<StatInfo>>,
    stats: HashMap<PathBuf, Option<StatInfo>>,
}

/// The process-wide file system cache.
#[derive(Default)]
pub struct FsCache {
    inner: Mutex<Inner>,
}

impl FsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// List a directory, in directory order. Results are cached,
    /// including failures.
    pub fn read_dir(&self, path: &Path) -> Result<Vec<Dirent>, FsError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(cached) = inner.dirs.get(path) {
            return cached.clone();
        }
        let listed = list_dir(path);
        if let Ok(entries) = &listed {
            let resolved = resolve_symlinks(path, entries.clone());
            inner.dirs.insert(path.to_path_buf(), Ok(resolved.clone()));
            return Ok(resolved);
        }
        inner.dirs.insert(path.to_path_buf(), listed.clone());
        listed
    }

    /// lstat with caching: symlinks are reported as symlinks.
    pub fn lstat(&self, path: &Path) -> Option<StatInfo> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(cached) = inner.lstats.get(path) {
            return *cached;
        }
        let info = std::fs::symlink_metadata(path).ok().map(stat_info);
        inner.lstats.insert(path.to_path_buf(), info);
        info
    }

    /// stat with caching: symlinks followed.
    pub fn stat(&self, path: &Path) -> Option<StatInfo> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(cached) = inner.stats.get(path) {
            return *cached;
        }
        let info = std::fs::metadata(path).ok().map(stat_info);
        inner.stats.insert(path.to_path_buf(), info);
        info
    }

    /// Whether the path resolves to anything.
    pub fn exists(&self, path: &Path) -> bool {
        self.stat(path).is_some()
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        self.stat(path).is_some_and(|s| s.kind == FileKind::Dir)
    }

    /// lstat mtime, used by the regeneration check for watched
    /// directories.
    pub fn dir_mtime(&self, path: &Path) -> Option<SystemTime> {
        self.lstat(path).map(|s| s.mtime)
    }
}

fn stat_info(md: std::fs::Metadata) -> StatInfo {
    #[cfg(unix)]
    let id = {
        use std::os::unix::fs::MetadataExt;
        FileId {
            dev: md.dev(),
            ino: md.ino(),
        }
    };
    #[cfg(not(unix))]
    let id = FileId::default();
    StatInfo {
        id,
        kind: FileKind::from_file_type(md.file_type()),
        mtime: md.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    }
}

/// Read one directory in listing order, lstat-ing each entry.
fn list_dir(path: &Path) -> Result<Vec<Dirent>, FsError> {
    let rd = std::fs::read_dir(path)
        .map_err(|e| FsError::from_io(&e, "scandir", &path.to_string_lossy()))?;
    let mut entries = Vec::new();
    for entry in rd {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        let Ok(md) = std::fs::symlink_metadata(entry.path()) else {
            continue;
        };
        let info = stat_info(md);
        let resolved = if info.kind == FileKind::Symlink {
            SymlinkState::Unresolved
        } else {
            SymlinkState::NotSymlink
        };
        entries.push(Dirent {
            name,
            id: info.id,
            kind: info.kind,
            resolved,
        });
    }
    Ok(entries)
}

/// Resolve symlink entries until nothing changes. stat() collapses
/// chains, so in practice one pass settles everything that can settle;
/// entries whose target is missing keep the errno.
fn resolve_symlinks(dir: &Path, mut entries: Vec<Dirent>) -> Vec<Dirent> {
    loop {
        let mut changed = false;
        for e in entries.iter_mut() {
            if e.resolved != SymlinkState::Unresolved {
                continue;
            }
            match std::fs::metadata(dir.join(&e.name)) {
                Ok(md) => {
                    e.resolved = SymlinkState::Resolved(FileKind::from_file_type(md.file_type()));
                    changed = true;
                }
                Err(err) => {
                    e.resolved = SymlinkState::Broken(err.raw_os_error().unwrap_or(0));
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    entries
}
