//! File System Types
//!
//! Core types for the directory cache: file identities, entry kinds,
//! symlink resolution states, and the error taxonomy.

use std::time::SystemTime;

use thiserror::Error;

/// File system errors
#[derive(Error, Debug, Clone)]
pub enum FsError {
    #[error("ENOENT: no such file or directory, {operation} '{path}'")]
    NotFound { path: String, operation: String },

    #[error("ENOTDIR: not a directory, {operation} '{path}'")]
    NotDirectory { path: String, operation: String },

    #[error("EACCES: permission denied, {operation} '{path}'")]
    PermissionDenied { path: String, operation: String },

    #[error("ELOOP: too many levels of symbolic links, {operation} '{path}'")]
    SymlinkLoop { path: String, operation: String },

    #[error("{message}")]
    Other { message: String },
}

impl FsError {
    pub fn from_io(e: &std::io::Error, operation: &str, path: &str) -> Self {
        let path = path.to_string();
        let operation = operation.to_string();
        match e.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound { path, operation },
            std::io::ErrorKind::PermissionDenied => FsError::PermissionDenied { path, operation },
            _ => FsError::Other {
                message: format!("{}: {} '{}'", e, operation, path),
            },
        }
    }
}

/// Identity of a file: device and inode numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileId {
    pub dev: u64,
    pub ino: u64,
}

/// What an entry is, from its lstat mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Dir,
    Symlink,
    Block,
    Char,
    Fifo,
    Socket,
    Unknown,
}

impl FileKind {
    pub fn from_file_type(ft: std::fs::FileType) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            if ft.is_block_device() {
                return FileKind::Block;
            }
            if ft.is_char_device() {
                return FileKind::Char;
            }
            if ft.is_fifo() {
                return FileKind::Fifo;
            }
            if ft.is_socket() {
                return FileKind::Socket;
            }
        }
        if ft.is_dir() {
            FileKind::Dir
        } else if ft.is_symlink() {
            FileKind::Symlink
        } else if ft.is_file() {
            FileKind::Regular
        } else {
            FileKind::Unknown
        }
    }

    /// The `find -type` letter for this kind.
    pub fn type_char(self) -> Option<char> {
        match self {
            FileKind::Regular => Some('f'),
            FileKind::Dir => Some('d'),
            FileKind::Symlink => Some('l'),
            FileKind::Block => Some('b'),
            FileKind::Char => Some('c'),
            FileKind::Fifo => Some('p'),
            FileKind::Socket => Some('s'),
            FileKind::Unknown => None,
        }
    }
}

/// Deferred symlink resolution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymlinkState {
    /// The entry is not a symlink.
    NotSymlink,
    /// Resolution has not been attempted (or not yet succeeded).
    Unresolved,
    /// What the link ultimately points at.
    Resolved(FileKind),
    /// Resolution failed; the observed errno.
    Broken(i32),
}

/// One cached directory entry, in directory-listing order.
#[derive(Debug, Clone)]
pub struct Dirent {
    pub name: String,
    pub id: FileId,
    /// lstat kind: symlinks stay symlinks here.
    pub kind: FileKind,
    /// Resolved kind for symlinks.
    pub resolved: SymlinkState,
}

/// Cached lstat/stat result.
#[derive(Debug, Clone, Copy)]
pub struct StatInfo {
    pub id: FileId,
    pub kind: FileKind,
    pub mtime: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_chars() {
        assert_eq!(FileKind::Regular.type_char(), Some('f'));
        assert_eq!(FileKind::Dir.type_char(), Some('d'));
        assert_eq!(FileKind::Symlink.type_char(), Some('l'));
        assert_eq!(FileKind::Fifo.type_char(), Some('p'));
    }

    #[test]
    fn test_fs_error_messages() {
        let e = FsError::NotFound {
            path: "a/b".into(),
            operation: "scandir".into(),
        };
        assert_eq!(
            e.to_string(),
            "ENOENT: no such file or directory, scandir 'a/b'"
        );
    }
}
