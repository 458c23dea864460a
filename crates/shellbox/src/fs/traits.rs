//! Filesystem trait definitions.
//!
//! # POSIX semantics contract
//!
//! Implementations MUST enforce these semantics:
//!
//! 1. **One name, one kind**: a path names a file, a directory or a symlink,
//!    never more than one at a time.
//! 2. **Type-safe writes**: `write_file`/`append_file` fail with `IsDir` on a
//!    directory path.
//! 3. **Parent requirement**: creating operations require the parent directory
//!    to exist (except `mkdir` with `recursive`).
//! 4. **All-or-nothing**: each call is observable atomically; `rename` never
//!    leaves both names or neither.
//! 5. **Permission model**: mode bits are checked against the synthetic
//!    uid/gid on open and on traversal (execute on directories); uid 0
//!    bypasses all checks.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::Result;

/// Kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Symlink,
}

impl FileType {
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }
}

/// Stat information for a filesystem entry.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub file_type: FileType,
    pub size: u64,
    /// 12-bit permission mode (e.g. `0o644`).
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// Hard link count; directories report 1.
    pub nlink: u32,
    pub modified: SystemTime,
    pub accessed: SystemTime,
    pub created: SystemTime,
}

/// One entry of a directory listing.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub metadata: Metadata,
}

/// Async virtual filesystem contract.
///
/// Paths are interpreted against the filesystem root; callers resolve
/// cwd-relative paths before invoking. Relative components (`.`/`..`) are
/// folded lexically, then symlinks are followed up to
/// [`SYMLINK_MAX_DEPTH`](super::SYMLINK_MAX_DEPTH).
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read a file's full contents, following symlinks.
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create or truncate a file with the given contents.
    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()>;

    /// Append to a file, creating it if absent.
    async fn append_file(&self, path: &Path, content: &[u8]) -> Result<()>;

    /// Truncate or extend (zero-filled) a file to `size` bytes.
    async fn truncate(&self, path: &Path, size: u64) -> Result<()>;

    /// Create a directory; with `recursive`, create missing parents too.
    async fn mkdir(&self, path: &Path, recursive: bool) -> Result<()>;

    /// Remove an empty directory.
    async fn rmdir(&self, path: &Path) -> Result<()>;

    /// Remove a file or symlink (never a directory).
    async fn unlink(&self, path: &Path) -> Result<()>;

    /// Remove a file or directory tree recursively.
    async fn remove_tree(&self, path: &Path) -> Result<()>;

    /// Atomically rename `from` to `to`, replacing a compatible target.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Copy a file's contents to a new or existing file.
    async fn copy(&self, from: &Path, to: &Path) -> Result<()>;

    /// Create a hard link to an existing file. Directory links are refused.
    async fn hard_link(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Create a symlink at `link` pointing at `target` (not required to exist).
    async fn symlink(&self, target: &Path, link: &Path) -> Result<()>;

    /// Read a symlink's target.
    async fn read_link(&self, path: &Path) -> Result<PathBuf>;

    /// Change permission bits. Only the owner or root may chmod.
    async fn chmod(&self, path: &Path, mode: u32) -> Result<()>;

    /// Set the modification time.
    async fn utimes(&self, path: &Path, mtime: SystemTime) -> Result<()>;

    /// Stat, following symlinks.
    async fn stat(&self, path: &Path) -> Result<Metadata>;

    /// Stat without following a final symlink.
    async fn lstat(&self, path: &Path) -> Result<Metadata>;

    /// List a directory in insertion order.
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Whether the path resolves to anything.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Canonicalise: fold `.`/`..`, follow symlinks, return the real path.
    async fn resolve(&self, path: &Path) -> Result<PathBuf>;

    /// Current file-creation umask.
    fn umask(&self) -> u32 {
        super::DEFAULT_UMASK
    }

    /// Replace the file-creation umask (low nine bits).
    fn set_umask(&self, _umask: u32) {}
}
