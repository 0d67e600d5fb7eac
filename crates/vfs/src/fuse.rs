//! FUSE filesystem implementation.
//!
//! The kernel addresses entries by inode number while [`FsOperations`] is
//! path based. [`PathRegistry`] bridges the two: every lookup registers the
//! child path, mutations re-key or forget registered paths so later calls
//! resolve against the current tree.
//!
//! No file handles are kept; `open` and `create` hand out handle 0 and every
//! read or write resolves its path again.
//!
//! [`FsOperations`]: crate::ops::FsOperations
//! [`PathRegistry`]: crate::registry::PathRegistry

#[cfg(feature = "fuse")]
mod impl_fuse {
    use std::ffi::OsStr;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    use fuser::{
        FileAttr, FileType, Filesystem, KernelConfig, MountOption, ReplyAttr, ReplyCreate,
        ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite,
        Request, TimeOrNow,
    };
    use tracing::{debug, info};

    use crate::error::VfsError;
    use crate::inode::{EntryKind, MAX_NAME_LEN, PERM_MASK};
    use crate::ops::{FileAttrs, FsOperations};
    use crate::options::VfsOptions;
    use crate::registry::{PathRegistry, ROOT_INO};

    /// Block size reported in attributes and statfs.
    const BLOCK_SIZE: u32 = 512;

    /// Map an entry kind onto the kernel file type.
    pub(crate) fn fuse_kind(kind: EntryKind) -> FileType {
        match kind {
            EntryKind::File => FileType::RegularFile,
            EntryKind::Directory => FileType::Directory,
            EntryKind::Symlink => FileType::Symlink,
        }
    }

    /// Build kernel attributes for `ino`. The tree keeps no timestamps, so
    /// every time field reports `time`.
    pub(crate) fn fuse_attr(ino: u64, attrs: &FileAttrs, time: SystemTime) -> FileAttr {
        FileAttr {
            ino,
            size: attrs.size,
            blocks: attrs.size.div_ceil(BLOCK_SIZE as u64),
            atime: time,
            mtime: time,
            ctime: time,
            crtime: time,
            kind: fuse_kind(attrs.kind),
            perm: (attrs.mode & PERM_MASK) as u16,
            nlink: attrs.nlink,
            uid: attrs.uid,
            gid: attrs.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    /// Kernel adapter over any [`FsOperations`] implementation.
    pub struct DirSpiderFs {
        ops: Arc<dyn FsOperations>,
        registry: PathRegistry,
        attr_ttl: Duration,
        entry_ttl: Duration,
        fs_name: String,
        mounted_at: SystemTime,
    }

    impl DirSpiderFs {
        /// Create an adapter.
        ///
        /// # Arguments
        /// * `ops` - Engine serving the operations
        /// * `options` - Supplies cache lifetimes and the filesystem name
        pub fn new(ops: Arc<dyn FsOperations>, options: &VfsOptions) -> Self {
            Self {
                ops,
                registry: PathRegistry::new(),
                attr_ttl: options.kernel_cache.attr_ttl(),
                entry_ttl: options.kernel_cache.entry_ttl(),
                fs_name: options.fs_name.clone(),
                mounted_at: SystemTime::now(),
            }
        }

        fn path_of(&self, ino: u64) -> Result<String, i32> {
            self.registry.get_path(ino).ok_or(libc::ENOENT)
        }

        fn child_of(&self, parent: u64, name: &OsStr) -> Result<String, i32> {
            let name: &str = name.to_str().ok_or(libc::EINVAL)?;
            self.registry.child_path(parent, name).ok_or(libc::ENOENT)
        }

        /// Attributes of `path`, registering it if needed.
        fn stat(&self, path: &str) -> Result<FileAttr, i32> {
            let attrs: FileAttrs = self.ops.getattr(path).map_err(|e| e.errno())?;
            let ino: u64 = self.registry.get_or_create(path);
            Ok(fuse_attr(ino, &attrs, self.mounted_at))
        }

        fn reply_entry(&self, path: &str, reply: ReplyEntry) {
            match self.stat(path) {
                Ok(attr) => reply.entry(&self.entry_ttl, &attr, 0),
                Err(errno) => reply.error(errno),
            }
        }

        fn reply_empty(result: Result<(), VfsError>, reply: ReplyEmpty) {
            match result {
                Ok(()) => reply.ok(),
                Err(e) => reply.error(e.errno()),
            }
        }

        /// Apply the changes of a setattr call in order: mode, owner, size.
        fn apply_setattr(
            &self,
            path: &str,
            mode: Option<u32>,
            uid: Option<u32>,
            gid: Option<u32>,
            size: Option<u64>,
        ) -> Result<(), VfsError> {
            if let Some(mode) = mode {
                self.ops.chmod(path, mode)?;
            }
            if uid.is_some() || gid.is_some() {
                self.ops
                    .chown(path, uid.unwrap_or(u32::MAX), gid.unwrap_or(u32::MAX))?;
            }
            if let Some(size) = size {
                self.ops.truncate(path, size)?;
            }
            Ok(())
        }

        /// Parent directory of a registered path.
        fn parent_ino(&self, path: &str) -> u64 {
            match path.rfind('/') {
                Some(0) | None => ROOT_INO,
                Some(i) => self.registry.get_or_create(&path[..i]),
            }
        }
    }

    impl Filesystem for DirSpiderFs {
        fn init(
            &mut self,
            _req: &Request<'_>,
            _config: &mut KernelConfig,
        ) -> Result<(), libc::c_int> {
            info!("{} mounted", self.fs_name);
            Ok(())
        }

        fn destroy(&mut self) {
            info!("{} unmounted", self.fs_name);
        }

        fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
            match self.child_of(parent, name) {
                Ok(path) => self.reply_entry(&path, reply),
                Err(errno) => reply.error(errno),
            }
        }

        fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
            match self.path_of(ino).and_then(|p| self.stat(&p)) {
                Ok(attr) => reply.attr(&self.attr_ttl, &attr),
                Err(errno) => reply.error(errno),
            }
        }

        fn setattr(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            mode: Option<u32>,
            uid: Option<u32>,
            gid: Option<u32>,
            size: Option<u64>,
            _atime: Option<TimeOrNow>,
            _mtime: Option<TimeOrNow>,
            _ctime: Option<SystemTime>,
            _fh: Option<u64>,
            _crtime: Option<SystemTime>,
            _chgtime: Option<SystemTime>,
            _bkuptime: Option<SystemTime>,
            _flags: Option<u32>,
            reply: ReplyAttr,
        ) {
            let path: String = match self.path_of(ino) {
                Ok(p) => p,
                Err(errno) => {
                    reply.error(errno);
                    return;
                }
            };
            if let Err(e) = self.apply_setattr(&path, mode, uid, gid, size) {
                reply.error(e.errno());
                return;
            }
            match self.stat(&path) {
                Ok(attr) => reply.attr(&self.attr_ttl, &attr),
                Err(errno) => reply.error(errno),
            }
        }

        fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
            match self.path_of(ino) {
                Ok(path) => match self.ops.readlink(&path) {
                    Ok(target) => reply.data(target.as_bytes()),
                    Err(e) => reply.error(e.errno()),
                },
                Err(errno) => reply.error(errno),
            }
        }

        fn mkdir(
            &mut self,
            _req: &Request<'_>,
            parent: u64,
            name: &OsStr,
            mode: u32,
            umask: u32,
            reply: ReplyEntry,
        ) {
            let path: String = match self.child_of(parent, name) {
                Ok(p) => p,
                Err(errno) => {
                    reply.error(errno);
                    return;
                }
            };
            match self.ops.mkdir(&path, mode & !umask) {
                Ok(()) => self.reply_entry(&path, reply),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
            let path: String = match self.child_of(parent, name) {
                Ok(p) => p,
                Err(errno) => {
                    reply.error(errno);
                    return;
                }
            };
            let result: Result<(), VfsError> = self.ops.unlink(&path);
            if result.is_ok() {
                self.registry.remove_subtree(&path);
            }
            Self::reply_empty(result, reply);
        }

        fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
            let path: String = match self.child_of(parent, name) {
                Ok(p) => p,
                Err(errno) => {
                    reply.error(errno);
                    return;
                }
            };
            let result: Result<(), VfsError> = self.ops.rmdir(&path);
            if result.is_ok() {
                let forgotten: usize = self.registry.remove_subtree(&path);
                debug!("rmdir {} forgot {} inodes", path, forgotten);
            }
            Self::reply_empty(result, reply);
        }

        fn symlink(
            &mut self,
            _req: &Request<'_>,
            parent: u64,
            link_name: &OsStr,
            target: &Path,
            reply: ReplyEntry,
        ) {
            let path: String = match self.child_of(parent, link_name) {
                Ok(p) => p,
                Err(errno) => {
                    reply.error(errno);
                    return;
                }
            };
            let Some(target) = target.to_str() else {
                reply.error(libc::EINVAL);
                return;
            };
            match self.ops.symlink(target, &path) {
                Ok(()) => self.reply_entry(&path, reply),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn rename(
            &mut self,
            _req: &Request<'_>,
            parent: u64,
            name: &OsStr,
            newparent: u64,
            newname: &OsStr,
            flags: u32,
            reply: ReplyEmpty,
        ) {
            let paths: Result<(String, String), i32> = self
                .child_of(parent, name)
                .and_then(|from| Ok((from, self.child_of(newparent, newname)?)));
            let (from, to) = match paths {
                Ok(p) => p,
                Err(errno) => {
                    reply.error(errno);
                    return;
                }
            };
            let result: Result<(), VfsError> = self.ops.rename(&from, &to, flags);
            if result.is_ok() {
                self.registry.rename_subtree(&from, &to);
            }
            Self::reply_empty(result, reply);
        }

        fn link(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            newparent: u64,
            newname: &OsStr,
            reply: ReplyEntry,
        ) {
            let paths: Result<(String, String), i32> = self
                .path_of(ino)
                .and_then(|from| Ok((from, self.child_of(newparent, newname)?)));
            let (from, to) = match paths {
                Ok(p) => p,
                Err(errno) => {
                    reply.error(errno);
                    return;
                }
            };
            match self.ops.link(&from, &to) {
                Ok(()) => self.reply_entry(&to, reply),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
            match self.path_of(ino) {
                Ok(path) => match self.ops.open(&path) {
                    Ok(()) => reply.opened(0, 0),
                    Err(e) => reply.error(e.errno()),
                },
                Err(errno) => reply.error(errno),
            }
        }

        fn read(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            _fh: u64,
            offset: i64,
            size: u32,
            _flags: i32,
            _lock_owner: Option<u64>,
            reply: ReplyData,
        ) {
            if offset < 0 {
                reply.error(libc::EINVAL);
                return;
            }
            let result: Result<Vec<u8>, i32> = self.path_of(ino).and_then(|path| {
                self.ops
                    .read(&path, size as usize, offset as u64)
                    .map_err(|e| e.errno())
            });
            match result {
                Ok(data) => reply.data(&data),
                Err(errno) => reply.error(errno),
            }
        }

        fn write(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            _fh: u64,
            offset: i64,
            data: &[u8],
            _write_flags: u32,
            _flags: i32,
            _lock_owner: Option<u64>,
            reply: ReplyWrite,
        ) {
            if offset < 0 {
                reply.error(libc::EINVAL);
                return;
            }
            let result: Result<usize, i32> = self.path_of(ino).and_then(|path| {
                self.ops
                    .write(&path, data, offset as u64)
                    .map_err(|e| e.errno())
            });
            match result {
                Ok(written) => reply.written(written as u32),
                Err(errno) => reply.error(errno),
            }
        }

        fn release(
            &mut self,
            _req: &Request<'_>,
            _ino: u64,
            _fh: u64,
            _flags: i32,
            _lock_owner: Option<u64>,
            _flush: bool,
            reply: ReplyEmpty,
        ) {
            reply.ok();
        }

        fn fsync(
            &mut self,
            _req: &Request<'_>,
            _ino: u64,
            _fh: u64,
            _datasync: bool,
            reply: ReplyEmpty,
        ) {
            reply.ok();
        }

        fn readdir(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            _fh: u64,
            offset: i64,
            mut reply: ReplyDirectory,
        ) {
            let path: String = match self.path_of(ino) {
                Ok(p) => p,
                Err(errno) => {
                    reply.error(errno);
                    return;
                }
            };
            let names: Vec<String> = match self.ops.readdir(&path) {
                Ok(n) => n,
                Err(e) => {
                    reply.error(e.errno());
                    return;
                }
            };

            let skip: usize = usize::try_from(offset).unwrap_or(0);
            for (i, name) in names.iter().enumerate().skip(skip) {
                let (entry_ino, kind) = match name.as_str() {
                    "." => (ino, FileType::Directory),
                    ".." => (self.parent_ino(&path), FileType::Directory),
                    _ => {
                        let Some(child) = self.registry.child_path(ino, name) else {
                            continue;
                        };
                        // Entries removed since the listing was taken are skipped.
                        let Ok(attrs) = self.ops.getattr(&child) else {
                            continue;
                        };
                        (self.registry.get_or_create(&child), fuse_kind(attrs.kind))
                    }
                };
                if reply.add(entry_ino, (i + 1) as i64, kind, name) {
                    break;
                }
            }
            reply.ok();
        }

        fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
            let files: u64 = self.registry.len() as u64;
            reply.statfs(0, 0, 0, files, 0, BLOCK_SIZE, MAX_NAME_LEN as u32, BLOCK_SIZE);
        }

        fn access(&mut self, _req: &Request<'_>, ino: u64, _mask: i32, reply: ReplyEmpty) {
            match self.path_of(ino) {
                Ok(path) => Self::reply_empty(self.ops.access(&path), reply),
                Err(errno) => reply.error(errno),
            }
        }

        fn create(
            &mut self,
            _req: &Request<'_>,
            parent: u64,
            name: &OsStr,
            mode: u32,
            umask: u32,
            _flags: i32,
            reply: ReplyCreate,
        ) {
            let path: String = match self.child_of(parent, name) {
                Ok(p) => p,
                Err(errno) => {
                    reply.error(errno);
                    return;
                }
            };
            if let Err(e) = self.ops.create(&path, mode & !umask) {
                reply.error(e.errno());
                return;
            }
            match self.stat(&path) {
                Ok(attr) => reply.created(&self.entry_ttl, &attr, 0, 0, 0),
                Err(errno) => reply.error(errno),
            }
        }
    }

    fn mount_options(fs_name: &str) -> Vec<MountOption> {
        vec![
            MountOption::FSName(fs_name.to_string()),
            MountOption::AutoUnmount,
            MountOption::DefaultPermissions,
        ]
    }

    /// Mount the filesystem and serve it until unmounted.
    ///
    /// # Arguments
    /// * `fs` - The adapter to mount
    /// * `mountpoint` - Path to mount at
    pub fn mount(fs: DirSpiderFs, mountpoint: &Path) -> Result<(), VfsError> {
        let options: Vec<MountOption> = mount_options(&fs.fs_name);
        fuser::mount2(fs, mountpoint, &options).map_err(|e| VfsError::MountFailed(e.to_string()))
    }

    /// Mount the filesystem on a background thread.
    ///
    /// # Arguments
    /// * `fs` - The adapter to mount
    /// * `mountpoint` - Path to mount at
    ///
    /// # Returns
    /// Background session handle; dropping it unmounts.
    pub fn spawn_mount(
        fs: DirSpiderFs,
        mountpoint: &Path,
    ) -> Result<fuser::BackgroundSession, VfsError> {
        let options: Vec<MountOption> = mount_options(&fs.fs_name);
        fuser::spawn_mount2(fs, mountpoint, &options)
            .map_err(|e| VfsError::MountFailed(e.to_string()))
    }

}

#[cfg(feature = "fuse")]
pub use impl_fuse::{mount, spawn_mount, DirSpiderFs};
