//! File node implementation.

use super::content::ContentId;
use super::types::{EntryKind, Named, NodeMeta, S_IFLNK, SYMLINK_PERMS};

/// What a file entry stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileBody {
    /// The entry created the content record.
    Owning(ContentId),
    /// A hardlink alias sharing another entry's content record.
    Alias(ContentId),
    /// A symbolic link to a file; only the target text is stored.
    Symlink(String),
}

impl FileBody {
    /// Content record referenced by this body, if any.
    pub fn content_id(&self) -> Option<ContentId> {
        match self {
            FileBody::Owning(id) | FileBody::Alias(id) => Some(*id),
            FileBody::Symlink(_) => None,
        }
    }
}

/// File node: a named entry inside a directory's file table.
#[derive(Debug)]
pub struct FileNode {
    /// File name.
    name: String,
    /// Mode and ownership.
    meta: NodeMeta,
    /// Content reference or symlink target.
    body: FileBody,
}

impl FileNode {
    /// Create a file node.
    ///
    /// # Arguments
    /// * `name` - File name
    /// * `meta` - Mode and ownership
    /// * `body` - Content reference or symlink target
    pub fn new(name: String, meta: NodeMeta, body: FileBody) -> Self {
        Self { name, meta, body }
    }

    /// Create a symlink-to-file entry.
    pub fn symlink(name: String, target: String, uid: u32, gid: u32) -> Self {
        Self {
            name,
            meta: NodeMeta::new(S_IFLNK, SYMLINK_PERMS, uid, gid),
            body: FileBody::Symlink(target),
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

    /// What this entry stores.
    pub fn body(&self) -> &FileBody {
        &self.body
    }

    /// Content record referenced by this entry, if any.
    pub fn content_id(&self) -> Option<ContentId> {
        self.body.content_id()
    }

    /// Symlink target, if this entry is a symlink.
    pub fn link_target(&self) -> Option<&str> {
        match &self.body {
            FileBody::Symlink(target) => Some(target),
            _ => None,
        }
    }

    /// Entry kind as reported to callers.
    pub fn kind(&self) -> EntryKind {
        match self.body {
            FileBody::Symlink(_) => EntryKind::Symlink,
            _ => EntryKind::File,
        }
    }

    /// Whether this entry is a hardlink alias.
    pub fn is_alias(&self) -> bool {
        matches!(self.body, FileBody::Alias(_))
    }
}

impl Named for FileNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}
