//! The filesystem operation set served to the kernel-facing dispatcher.

use crate::error::VfsResult;
use crate::inode::EntryKind;

/// Attributes reported by `getattr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttrs {
    /// Entry kind.
    pub kind: EntryKind,
    /// Type bits OR-ed with permission bits.
    pub mode: u32,
    /// Owning user.
    pub uid: u32,
    /// Owning group.
    pub gid: u32,
    /// Link count.
    pub nlink: u32,
    /// Size in bytes.
    pub size: u64,
}

/// Path-based filesystem operations.
///
/// All paths are absolute and `/`-delimited. Every call is synchronous and
/// may be issued concurrently from several dispatcher threads.
pub trait FsOperations: Send + Sync {
    /// Report attributes of the entry at `path`.
    fn getattr(&self, path: &str) -> VfsResult<FileAttrs>;

    /// List a directory: `.`, `..`, child directories, then child files.
    fn readdir(&self, path: &str) -> VfsResult<Vec<String>>;

    /// Create a directory.
    fn mkdir(&self, path: &str, mode: u32) -> VfsResult<()>;

    /// Remove a directory and everything beneath it.
    fn rmdir(&self, path: &str) -> VfsResult<()>;

    /// Create an empty regular file.
    fn create(&self, path: &str, mode: u32) -> VfsResult<()>;

    /// Verify that a file entry exists.
    fn open(&self, path: &str) -> VfsResult<()>;

    /// Read up to `size` bytes at `offset`.
    fn read(&self, path: &str, size: usize, offset: u64) -> VfsResult<Vec<u8>>;

    /// Write `data` at `offset`, growing the file as needed.
    fn write(&self, path: &str, data: &[u8], offset: u64) -> VfsResult<usize>;

    /// Remove a file, hardlink or symlink entry.
    fn unlink(&self, path: &str) -> VfsResult<()>;

    /// Move an entry. Only `flags == 0` is supported.
    fn rename(&self, from: &str, to: &str, flags: u32) -> VfsResult<()>;

    /// Create a hardlink `to` sharing the content of file `from`.
    fn link(&self, from: &str, to: &str) -> VfsResult<()>;

    /// Create a symlink at `link_path` whose text is `target`.
    fn symlink(&self, target: &str, link_path: &str) -> VfsResult<()>;

    /// Read a symlink's target text.
    fn readlink(&self, path: &str) -> VfsResult<String>;

    /// Replace permission bits.
    fn chmod(&self, path: &str, mode: u32) -> VfsResult<()>;

    /// Change owner; `u32::MAX` leaves an id unchanged.
    fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()>;

    /// Resize a file's content, zero-filling on growth.
    fn truncate(&self, path: &str, size: u64) -> VfsResult<()>;

    /// Succeed iff an entry exists at `path`.
    fn access(&self, path: &str) -> VfsResult<()>;
}
