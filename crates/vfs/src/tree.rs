//! Tree operations over the in-memory node hierarchy.
//!
//! `Tree` is single-threaded; [`crate::engine::TreeEngine`] wraps it in a lock.
//! Every method resolves its path from the root on each call.

use tracing::debug;

use crate::error::{VfsError, VfsResult};
use crate::inode::{
    ContentArena, ContentId, ContentRecord, DirNode, EntryKind, FileBody, FileNode, Named,
    NodeMeta, DEFAULT_DIR_PERMS, S_IFREG,
};
use crate::ops::FileAttrs;
use crate::path::{self, SplitPath};

/// The whole filesystem: root directory plus the content arena.
#[derive(Debug)]
pub struct Tree {
    root: DirNode,
    content: ContentArena,
    uid: u32,
    gid: u32,
}

impl Tree {
    /// Create a tree holding only the root directory.
    ///
    /// # Arguments
    /// * `uid` - Owner stamped on the root and on new nodes
    /// * `gid` - Group stamped on the root and on new nodes
    pub fn new(uid: u32, gid: u32) -> Self {
        Self {
            root: DirNode::new(String::new(), DEFAULT_DIR_PERMS, uid, gid),
            content: ContentArena::new(),
            uid,
            gid,
        }
    }

    /// The root directory.
    pub fn root(&self) -> &DirNode {
        &self.root
    }

    /// The content arena.
    pub fn content(&self) -> &ContentArena {
        &self.content
    }

    // ========================================================================
    // Read operations
    // ========================================================================

    /// Report attributes of the entry at `path`.
    pub fn getattr(&self, path: &str) -> VfsResult<FileAttrs> {
        let Some(split) = SplitPath::parse(path) else {
            return Ok(dir_attrs(&self.root));
        };
        let parent: &DirNode = path::walk(&self.root, &split.parents)?;
        if let Some(dir) = parent.dirs().get(split.name) {
            return Ok(dir_attrs(dir));
        }
        match parent.files().get(split.name) {
            Some(file) => self.file_attrs(file),
            None => Err(VfsError::NotFound(path.to_string())),
        }
    }

    /// List a directory.
    pub fn readdir(&self, path: &str) -> VfsResult<Vec<String>> {
        let dir: &DirNode = self.dir(path)?;
        let mut names: Vec<String> = Vec::with_capacity(dir.child_count() + 2);
        names.push(".".to_string());
        names.push("..".to_string());
        names.extend(dir.dirs().names());
        names.extend(dir.files().names());
        Ok(names)
    }

    /// Read a symlink's target, or an empty string for a non-link entry.
    pub fn readlink(&self, path: &str) -> VfsResult<String> {
        let Some(split) = SplitPath::parse(path) else {
            return Ok(String::new());
        };
        let parent: &DirNode = path::walk(&self.root, &split.parents)?;
        if let Some(file) = parent.files().get(split.name) {
            return Ok(file.link_target().unwrap_or_default().to_string());
        }
        match parent.dirs().get(split.name) {
            Some(dir) => Ok(dir.link_target().unwrap_or_default().to_string()),
            None => Err(VfsError::NotFound(path.to_string())),
        }
    }

    /// Verify that a file entry exists.
    pub fn open(&self, path: &str) -> VfsResult<()> {
        self.file(path).map(|_| ())
    }

    /// Read up to `size` bytes at `offset`, following hardlink aliases.
    pub fn read(&self, path: &str, size: usize, offset: u64) -> VfsResult<Vec<u8>> {
        let id: ContentId = self.content_id(path)?;
        Ok(self.record(id)?.read_at(offset, size))
    }

    /// Succeed iff an entry exists at `path`.
    pub fn access(&self, path: &str) -> VfsResult<()> {
        let Some(split) = SplitPath::parse(path) else {
            return Ok(());
        };
        let parent: &DirNode = path::walk(&self.root, &split.parents)?;
        if parent.has_child(split.name) {
            Ok(())
        } else {
            Err(VfsError::NotFound(path.to_string()))
        }
    }

    // ========================================================================
    // Directory mutation
    // ========================================================================

    /// Create a directory.
    pub fn mkdir(&mut self, path: &str, mode: u32) -> VfsResult<()> {
        let split: SplitPath<'_> =
            SplitPath::parse(path).ok_or_else(|| VfsError::AlreadyExists(path.to_string()))?;
        let (uid, gid) = (self.uid, self.gid);
        let parent: &mut DirNode = path::walk_mut(&mut self.root, &split.parents)?;
        split.check_name_len()?;
        if parent.has_child(split.name) {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }
        parent
            .dirs_mut()
            .insert(DirNode::new(split.name.to_string(), mode, uid, gid))
            .map_err(|_| VfsError::AlreadyExists(path.to_string()))
    }

    /// Remove a directory and its whole subtree.
    ///
    /// Every file beneath it gives up its reference on its content record, so
    /// content still linked from outside the subtree survives.
    pub fn rmdir(&mut self, path: &str) -> VfsResult<()> {
        let split: SplitPath<'_> = SplitPath::parse(path)
            .ok_or_else(|| VfsError::InvalidArgument("cannot remove root".to_string()))?;
        let parent: &mut DirNode = path::walk_mut(&mut self.root, &split.parents)?;
        let is_real_dir: bool = parent
            .dirs()
            .get(split.name)
            .is_some_and(|d| d.link_target().is_none());
        if !is_real_dir {
            return Err(VfsError::NotFound(path.to_string()));
        }
        let removed: DirNode = parent
            .dirs_mut()
            .remove(split.name)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))?;

        let mut ids: Vec<ContentId> = Vec::new();
        removed.for_each_file(&mut |f| ids.extend(f.content_id()));
        let mut reclaimed: usize = 0;
        for id in ids {
            if self.content.release(id) == Some(0) {
                reclaimed += 1;
            }
        }
        debug!("rmdir {}: reclaimed {} content records", path, reclaimed);
        Ok(())
    }

    /// Move an entry to a new parent and name.
    pub fn rename(&mut self, from: &str, to: &str, flags: u32) -> VfsResult<()> {
        if flags != 0 {
            return Err(VfsError::InvalidArgument(format!(
                "unsupported rename flags {:#x}",
                flags
            )));
        }
        let src: SplitPath<'_> = SplitPath::parse(from)
            .ok_or_else(|| VfsError::InvalidArgument("cannot rename root".to_string()))?;
        let dst: SplitPath<'_> =
            SplitPath::parse(to).ok_or_else(|| VfsError::AlreadyExists(to.to_string()))?;

        let src_parent: &DirNode = path::walk(&self.root, &src.parents)?;
        let dst_parent: &DirNode = path::walk(&self.root, &dst.parents)?;
        dst.check_name_len()?;
        if dst_parent.has_child(dst.name) {
            return Err(VfsError::AlreadyExists(to.to_string()));
        }

        // Files win the tie-break if both tables somehow hold the name.
        let is_file: bool = if src_parent.files().contains(src.name) {
            true
        } else if src_parent.dirs().contains(src.name) {
            false
        } else {
            return Err(VfsError::NotFound(from.to_string()));
        };

        if !is_file && path::is_within(&dst.parents, &src.all()) {
            return Err(VfsError::InvalidArgument(format!(
                "cannot move {} beneath itself",
                from
            )));
        }

        let new_name: String = dst.name.to_string();
        let src_parent: &mut DirNode = path::walk_mut(&mut self.root, &src.parents)?;
        if is_file {
            let mut file: FileNode = src_parent
                .files_mut()
                .remove(src.name)
                .ok_or_else(|| VfsError::NotFound(from.to_string()))?;
            file.set_name(new_name);
            let dst_parent: &mut DirNode = path::walk_mut(&mut self.root, &dst.parents)?;
            dst_parent
                .files_mut()
                .insert(file)
                .map_err(|_| VfsError::AlreadyExists(to.to_string()))
        } else {
            let mut dir: DirNode = src_parent
                .dirs_mut()
                .remove(src.name)
                .ok_or_else(|| VfsError::NotFound(from.to_string()))?;
            dir.set_name(new_name);
            let dst_parent: &mut DirNode = path::walk_mut(&mut self.root, &dst.parents)?;
            dst_parent
                .dirs_mut()
                .insert(dir)
                .map_err(|_| VfsError::AlreadyExists(to.to_string()))
        }
    }

    /// Create a hardlink `to` that shares the content of file `from`.
    ///
    /// Aliases never chain: linking to an alias targets the same record.
    pub fn link(&mut self, from: &str, to: &str) -> VfsResult<()> {
        let src: SplitPath<'_> = SplitPath::parse(from)
            .ok_or_else(|| VfsError::InvalidArgument("cannot link a directory".to_string()))?;
        let dst: SplitPath<'_> =
            SplitPath::parse(to).ok_or_else(|| VfsError::AlreadyExists(to.to_string()))?;

        let src_parent: &DirNode = path::walk(&self.root, &src.parents)?;
        let dst_parent: &DirNode = path::walk(&self.root, &dst.parents)?;
        dst.check_name_len()?;
        if dst_parent.has_child(dst.name) {
            return Err(VfsError::AlreadyExists(to.to_string()));
        }

        let source: &FileNode = match src_parent.files().get(src.name) {
            Some(file) => file,
            None if src_parent.dirs().contains(src.name) => {
                return Err(VfsError::InvalidArgument(format!(
                    "cannot hardlink directory {}",
                    from
                )))
            }
            None => return Err(VfsError::NotFound(from.to_string())),
        };

        let alias: FileNode = match source.body() {
            FileBody::Owning(id) | FileBody::Alias(id) => {
                FileNode::new(dst.name.to_string(), *source.meta(), FileBody::Alias(*id))
            }
            FileBody::Symlink(target) => FileNode::new(
                dst.name.to_string(),
                *source.meta(),
                FileBody::Symlink(target.clone()),
            ),
        };
        if let Some(id) = alias.content_id() {
            let count: Option<u32> = self.content.acquire(id);
            debug!("link {} -> {}: content {} now has {:?} links", to, from, id.get(), count);
        }

        let dst_parent: &mut DirNode = path::walk_mut(&mut self.root, &dst.parents)?;
        dst_parent
            .files_mut()
            .insert(alias)
            .map_err(|_| VfsError::AlreadyExists(to.to_string()))
    }

    /// Create a symlink at `link_path` storing `target` verbatim.
    ///
    /// The target is not required to exist. If it names an existing directory,
    /// relative targets being read from the link's own parent, the link is
    /// placed among the parent's directories, otherwise among its files.
    pub fn symlink(&mut self, target: &str, link_path: &str) -> VfsResult<()> {
        let dst: SplitPath<'_> = SplitPath::parse(link_path)
            .ok_or_else(|| VfsError::AlreadyExists(link_path.to_string()))?;
        let points_at_dir: bool = self.names_directory(&dst.parents, target);
        let (uid, gid) = (self.uid, self.gid);

        let parent: &mut DirNode = path::walk_mut(&mut self.root, &dst.parents)?;
        dst.check_name_len()?;
        if parent.has_child(dst.name) {
            return Err(VfsError::AlreadyExists(link_path.to_string()));
        }

        let name: String = dst.name.to_string();
        let inserted: bool = if points_at_dir {
            parent
                .dirs_mut()
                .insert(DirNode::symlink(name, target.to_string(), uid, gid))
                .is_ok()
        } else {
            parent
                .files_mut()
                .insert(FileNode::symlink(name, target.to_string(), uid, gid))
                .is_ok()
        };
        if inserted {
            Ok(())
        } else {
            Err(VfsError::AlreadyExists(link_path.to_string()))
        }
    }

    /// Remove a file, hardlink or symlink entry.
    ///
    /// The content record is reclaimed only when no other name refers to it,
    /// whichever name was created first.
    pub fn unlink(&mut self, path: &str) -> VfsResult<()> {
        let split: SplitPath<'_> =
            SplitPath::parse(path).ok_or_else(|| VfsError::NotFound(path.to_string()))?;
        let parent: &mut DirNode = path::walk_mut(&mut self.root, &split.parents)?;

        if let Some(file) = parent.files_mut().remove(split.name) {
            if let Some(id) = file.content_id() {
                let remaining: Option<u32> = self.content.release(id);
                debug!("unlink {}: content {} has {:?} links left", path, id.get(), remaining);
            }
            return Ok(());
        }

        let is_dir_link: bool = parent
            .dirs()
            .get(split.name)
            .is_some_and(|d| d.link_target().is_some());
        if is_dir_link {
            parent.dirs_mut().remove(split.name);
            return Ok(());
        }
        Err(VfsError::NotFound(path.to_string()))
    }

    /// Replace the permission bits of any entry, keeping its type bits.
    pub fn chmod(&mut self, path: &str, mode: u32) -> VfsResult<()> {
        self.meta_mut(path)?.set_permissions(mode);
        Ok(())
    }

    /// Change the owner of any entry.
    pub fn chown(&mut self, path: &str, uid: u32, gid: u32) -> VfsResult<()> {
        self.meta_mut(path)?.set_owner(uid, gid);
        Ok(())
    }

    // ========================================================================
    // File content
    // ========================================================================

    /// Create an empty owning file.
    pub fn create(&mut self, path: &str, mode: u32) -> VfsResult<()> {
        let split: SplitPath<'_> =
            SplitPath::parse(path).ok_or_else(|| VfsError::AlreadyExists(path.to_string()))?;
        let (uid, gid) = (self.uid, self.gid);
        let parent: &mut DirNode = path::walk_mut(&mut self.root, &split.parents)?;
        split.check_name_len()?;
        if parent.has_child(split.name) {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }

        let id: ContentId = self.content.allocate();
        let file: FileNode = FileNode::new(
            split.name.to_string(),
            NodeMeta::new(S_IFREG, mode, uid, gid),
            FileBody::Owning(id),
        );
        if parent.files_mut().insert(file).is_err() {
            self.content.release(id);
            return Err(VfsError::AlreadyExists(path.to_string()));
        }
        Ok(())
    }

    /// Write `data` at `offset`, following hardlink aliases.
    pub fn write(&mut self, path: &str, data: &[u8], offset: u64) -> VfsResult<usize> {
        let id: ContentId = self.content_id(path)?;
        self.record_mut(id)?.write_at(offset, data)
    }

    /// Resize a file's content.
    pub fn truncate(&mut self, path: &str, size: u64) -> VfsResult<()> {
        let id: ContentId = self.content_id(path)?;
        self.record_mut(id)?.resize(size)
    }

    /// Set a file's content if it is still empty.
    ///
    /// # Returns
    /// `true` if the content was set, `false` if the file already had data.
    pub fn fill_if_empty(&mut self, path: &str, data: Vec<u8>) -> VfsResult<bool> {
        let id: ContentId = self.content_id(path)?;
        let record: &mut ContentRecord = self.record_mut(id)?;
        if record.size() > 0 {
            return Ok(false);
        }
        record.replace(data);
        Ok(true)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Resolve `path` to a directory, the root included.
    fn dir(&self, path: &str) -> VfsResult<&DirNode> {
        let Some(split) = SplitPath::parse(path) else {
            return Ok(&self.root);
        };
        let parent: &DirNode = path::walk(&self.root, &split.parents)?;
        parent
            .dirs()
            .get(split.name)
            .filter(|d| d.link_target().is_none())
            .ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    /// Resolve `path` to a file entry.
    fn file(&self, path: &str) -> VfsResult<&FileNode> {
        let split: SplitPath<'_> =
            SplitPath::parse(path).ok_or_else(|| VfsError::NotFound(path.to_string()))?;
        let parent: &DirNode = path::walk(&self.root, &split.parents)?;
        parent
            .files()
            .get(split.name)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    /// Content record behind the file at `path`.
    fn content_id(&self, path: &str) -> VfsResult<ContentId> {
        self.file(path)?
            .content_id()
            .ok_or_else(|| VfsError::InvalidArgument(format!("{} is a symlink", path)))
    }

    fn record(&self, id: ContentId) -> VfsResult<&ContentRecord> {
        self.content
            .get(id)
            .ok_or_else(|| VfsError::NotFound(format!("content record {}", id.get())))
    }

    fn record_mut(&mut self, id: ContentId) -> VfsResult<&mut ContentRecord> {
        self.content
            .get_mut(id)
            .ok_or_else(|| VfsError::NotFound(format!("content record {}", id.get())))
    }

    /// Metadata of the entry at `path`, the root included.
    fn meta_mut(&mut self, path: &str) -> VfsResult<&mut NodeMeta> {
        let Some(split) = SplitPath::parse(path) else {
            return Ok(self.root.meta_mut());
        };
        let parent: &mut DirNode = path::walk_mut(&mut self.root, &split.parents)?;
        if parent.dirs().contains(split.name) {
            return parent
                .dirs_mut()
                .get_mut(split.name)
                .map(DirNode::meta_mut)
                .ok_or_else(|| VfsError::NotFound(path.to_string()));
        }
        parent
            .files_mut()
            .get_mut(split.name)
            .map(FileNode::meta_mut)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    /// Whether `target`, read from the directory at `base`, names a directory.
    fn names_directory(&self, base: &[&str], target: &str) -> bool {
        let Some(resolved) = path::link_target_path(base, target) else {
            return false;
        };
        if path::is_root(&resolved) {
            return true;
        }
        path::resolve(&self.root, &resolved)
            .ok()
            .and_then(|(parent, name)| parent.dirs().get(name))
            .is_some_and(|d| d.kind() == EntryKind::Directory)
    }

    fn file_attrs(&self, file: &FileNode) -> VfsResult<FileAttrs> {
        let meta: &NodeMeta = file.meta();
        let Some(id) = file.content_id() else {
            return Ok(symlink_attrs(meta));
        };
        let record: &ContentRecord = self.record(id)?;
        Ok(FileAttrs {
            kind: EntryKind::File,
            mode: meta.mode,
            uid: meta.uid,
            gid: meta.gid,
            nlink: record.link_count(),
            size: record.size(),
        })
    }
}

/// Directory attributes: two links plus one per child, size is the sum of
/// child-name lengths.
fn dir_attrs(dir: &DirNode) -> FileAttrs {
    let meta: &NodeMeta = dir.meta();
    if dir.link_target().is_some() {
        return symlink_attrs(meta);
    }
    FileAttrs {
        kind: EntryKind::Directory,
        mode: meta.mode,
        uid: meta.uid,
        gid: meta.gid,
        nlink: 2 + dir.child_count() as u32,
        size: dir.child_name_bytes(),
    }
}

/// Symlinks report one link and size 1 whatever their target.
fn symlink_attrs(meta: &NodeMeta) -> FileAttrs {
    FileAttrs {
        kind: EntryKind::Symlink,
        mode: meta.mode,
        uid: meta.uid,
        gid: meta.gid,
        nlink: 1,
        size: 1,
    }
}
