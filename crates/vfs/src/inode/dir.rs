//! Directory node implementation.

use super::file::FileNode;
use super::table::NameTable;
use super::types::{EntryKind, Named, NodeMeta, S_IFDIR, S_IFLNK, SYMLINK_PERMS};

/// Directory node owning its child directories and files.
///
/// Dropping a directory drops its whole subtree. Content records referenced
/// by files in the subtree must be released first; see `Tree::rmdir`.
#[derive(Debug)]
pub struct DirNode {
    /// Directory name (empty for the root).
    name: String,
    /// Mode and ownership.
    meta: NodeMeta,
    /// Child directories in insertion order.
    dirs: NameTable<DirNode>,
    /// Child files in insertion order.
    files: NameTable<FileNode>,
    /// Set only for a symlink-to-directory; children are then unused.
    link_target: Option<String>,
}

impl DirNode {
    /// Create an empty directory.
    ///
    /// # Arguments
    /// * `name` - Directory name
    /// * `mode` - Requested permission bits; the directory bit is added
    /// * `uid` - Owning user
    /// * `gid` - Owning group
    pub fn new(name: String, mode: u32, uid: u32, gid: u32) -> Self {
        Self {
            name,
            meta: NodeMeta::new(S_IFDIR, mode, uid, gid),
            dirs: NameTable::new(),
            files: NameTable::new(),
            link_target: None,
        }
    }

    /// Create a symlink-to-directory placeholder.
    pub fn symlink(name: String, target: String, uid: u32, gid: u32) -> Self {
        Self {
            name,
            meta: NodeMeta::new(S_IFLNK, SYMLINK_PERMS, uid, gid),
            dirs: NameTable::new(),
            files: NameTable::new(),
            link_target: Some(target),
        }
    }

    /// Mode and ownership.
    pub fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    /// Mode and ownership for mutation.
    pub fn meta_mut(&mut self) -> &mut NodeMeta {
        &mut self.meta
    }

    /// Child directories.
    pub fn dirs(&self) -> &NameTable<DirNode> {
        &self.dirs
    }

    /// Child directories for mutation.
    pub fn dirs_mut(&mut self) -> &mut NameTable<DirNode> {
        &mut self.dirs
    }

    /// Child files.
    pub fn files(&self) -> &NameTable<FileNode> {
        &self.files
    }

    /// Child files for mutation.
    pub fn files_mut(&mut self) -> &mut NameTable<FileNode> {
        &mut self.files
    }

    /// Symlink target, if this node is a directory symlink.
    pub fn link_target(&self) -> Option<&str> {
        self.link_target.as_deref()
    }

    /// Entry kind as reported to callers.
    pub fn kind(&self) -> EntryKind {
        if self.link_target.is_some() {
            EntryKind::Symlink
        } else {
            EntryKind::Directory
        }
    }

    /// Whether any child, file or directory, already uses `name`.
    pub fn has_child(&self, name: &str) -> bool {
        self.files.contains(name) || self.dirs.contains(name)
    }

    /// Number of direct children.
    pub fn child_count(&self) -> usize {
        self.files.len() + self.dirs.len()
    }

    /// Sum of the byte lengths of all direct child names.
    pub fn child_name_bytes(&self) -> u64 {
        let files: usize = self.files.iter().map(|f| f.name().len()).sum();
        let dirs: usize = self.dirs.iter().map(|d| d.name().len()).sum();
        (files + dirs) as u64
    }

    /// Visit every file in this subtree, depth first.
    pub fn for_each_file<F: FnMut(&FileNode)>(&self, f: &mut F) {
        for file in self.files.iter() {
            f(file);
        }
        for dir in self.dirs.iter() {
            dir.for_each_file(f);
        }
    }

    /// Visit every directory below this one, depth first.
    pub fn for_each_dir<F: FnMut(&DirNode)>(&self, f: &mut F) {
        for dir in self.dirs.iter() {
            f(dir);
            dir.for_each_dir(f);
        }
    }
}

impl Named for DirNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}
