//! Node primitives for the in-memory tree.
//!
//! This module provides the data structures for representing directories,
//! files, hardlink aliases and symlinks, plus the shared content arena.

mod content;
mod dir;
mod file;
mod table;
mod types;

pub use content::{ContentArena, ContentId, ContentRecord};
pub use dir::DirNode;
pub use file::{FileBody, FileNode};
pub use table::NameTable;
pub use types::{
    EntryKind, Named, NodeMeta, DEFAULT_DIR_PERMS, MAX_NAME_LEN, PERM_MASK, SYMLINK_PERMS,
    S_IFDIR, S_IFLNK, S_IFMT, S_IFREG,
};
