//! File System Cache
//!
//! Directory listings, stat results, and wildcard expansion, cached
//! for the lifetime of the run.

pub mod cache;
pub mod glob;
pub mod types;

pub use cache::FsCache;
pub use glob::GlobCache;
pub use types::{Dirent, FileId, FileKind, FsError, StatInfo, SymlinkState};
