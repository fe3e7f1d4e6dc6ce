//! Regeneration Cache
//!
//! Records everything evaluation observed from the outside world so a
//! later run can decide whether the cached graph is still valid.

pub mod cache;

use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use cache::{build_stamp, load_if_fresh, save, stamp_path, Stamp, STAMP_VERSION};

/// Observed state of a build-description file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileState {
    Exists,
    NotExists,
    /// Read more than once with different contents during one run;
    /// always considered stale.
    Inconsistent,
}

/// One makefile read during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    /// blake3 of the contents, hex; empty for missing files.
    pub hash: String,
    pub mtime_ms: u64,
    pub state: FileState,
}

/// A directory the find emulator read, with the timestamp seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirRecord {
    pub path: String,
    pub mtime_ms: u64,
    pub exists: bool,
}

/// How to re-check one recorded `$(shell ...)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShellKind {
    /// Re-execute and compare output.
    Plain,
    /// Wall-clock dependent; never replayed, the frozen output stands.
    Date,
    /// Emulated find: compare the watched directories instead of
    /// re-running anything.
    Find {
        read_dirs: Vec<DirRecord>,
        /// `test -d DIR` guard and whether it passed.
        testdir: Option<(String, bool)>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellRecord {
    pub command: String,
    pub output: String,
    pub kind: ShellKind,
}

/// Accumulates records during one evaluation.
#[derive(Debug, Default)]
pub struct RegenRecorder {
    pub files: IndexMap<String, FileRecord>,
    /// Environment reads: value at first read, `None` for names that
    /// were looked up but not set.
    pub envs: IndexMap<String, Option<String>>,
    pub shells: Vec<ShellRecord>,
}

impl RegenRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_file(&mut self, path: &str, content: Option<&[u8]>, mtime: Option<SystemTime>) {
        let (hash, state) = match content {
            Some(bytes) => (blake3::hash(bytes).to_hex().to_string(), FileState::Exists),
            None => (String::new(), FileState::NotExists),
        };
        if let Some(prev) = self.files.get_mut(path) {
            if prev.hash != hash || prev.state != state {
                prev.state = FileState::Inconsistent;
            }
            return;
        }
        self.files.insert(
            path.to_string(),
            FileRecord {
                path: path.to_string(),
                hash,
                mtime_ms: mtime.map(time_ms).unwrap_or(0),
                state,
            },
        );
    }

    /// First read wins: the stamp stores the value evaluation saw.
    pub fn record_env(&mut self, name: &str, value: Option<&str>) {
        if !self.envs.contains_key(name) {
            self.envs
                .insert(name.to_string(), value.map(str::to_string));
        }
    }

    pub fn record_shell(&mut self, command: &str, output: &str, kind: ShellKind) {
        self.shells.push(ShellRecord {
            command: command.to_string(),
            output: output.to_string(),
            kind,
        });
    }
}

/// Milliseconds since the epoch, saturating.
pub fn time_ms(t: SystemTime) -> u64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_file_states() {
        let mut r = RegenRecorder::new();
        r.record_file("Makefile", Some(b"all:\n"), Some(SystemTime::now()));
        r.record_file("missing.mk", None, None);
        assert_eq!(r.files["Makefile"].state, FileState::Exists);
        assert!(!r.files["Makefile"].hash.is_empty());
        assert_eq!(r.files["missing.mk"].state, FileState::NotExists);
    }

    #[test]
    fn test_rereading_changed_content_is_inconsistent() {
        let mut r = RegenRecorder::new();
        r.record_file("a.mk", Some(b"one"), None);
        r.record_file("a.mk", Some(b"two"), None);
        assert_eq!(r.files["a.mk"].state, FileState::Inconsistent);
    }

    #[test]
    fn test_env_first_read_wins() {
        let mut r = RegenRecorder::new();
        r.record_env("PATH", Some("/bin"));
        r.record_env("PATH", Some("/other"));
        assert_eq!(r.envs["PATH"].as_deref(), Some("/bin"));
    }

    #[test]
    fn test_env_absent_recorded() {
        let mut r = RegenRecorder::new();
        r.record_env("UNSET_THING", None);
        assert_eq!(r.envs["UNSET_THING"], None);
    }
}
