//! Core node types, mode bits and traits.

/// Longest permitted entry name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// File type mask.
pub const S_IFMT: u32 = 0o170_000;
/// Directory type bit.
pub const S_IFDIR: u32 = 0o040_000;
/// Regular file type bit.
pub const S_IFREG: u32 = 0o100_000;
/// Symbolic link type bit.
pub const S_IFLNK: u32 = 0o120_000;

/// Permission bits (including setuid/setgid/sticky).
pub const PERM_MASK: u32 = 0o7777;

/// Default directory permissions (rwxr-xr-x).
pub const DEFAULT_DIR_PERMS: u32 = 0o755;

/// Symlink permissions (always 0o777 - target determines access).
pub const SYMLINK_PERMS: u32 = 0o777;

/// Type of tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file (owning or aliasing).
    File,
    /// Directory.
    Directory,
    /// Symbolic link, to either a file or a directory.
    Symlink,
}

impl EntryKind {
    /// Derive the entry kind from the type bits of a mode.
    pub fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFDIR => EntryKind::Directory,
            S_IFLNK => EntryKind::Symlink,
            _ => EntryKind::File,
        }
    }
}

/// Owner and permission metadata carried by every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMeta {
    /// Type bits OR-ed with permission bits.
    pub mode: u32,
    /// Owning user.
    pub uid: u32,
    /// Owning group.
    pub gid: u32,
}

impl NodeMeta {
    /// Create metadata with the given type bit OR-ed into `mode`.
    ///
    /// # Arguments
    /// * `type_bit` - One of `S_IFDIR`, `S_IFREG`, `S_IFLNK`
    /// * `mode` - Requested mode; any type bits it carries are discarded
    /// * `uid` - Owning user
    /// * `gid` - Owning group
    pub fn new(type_bit: u32, mode: u32, uid: u32, gid: u32) -> Self {
        Self {
            mode: type_bit | (mode & PERM_MASK),
            uid,
            gid,
        }
    }

    /// Replace the permission bits, keeping the type bits.
    pub fn set_permissions(&mut self, mode: u32) {
        self.mode = (self.mode & S_IFMT) | (mode & PERM_MASK);
    }

    /// Update owner; `u32::MAX` leaves the corresponding id unchanged.
    pub fn set_owner(&mut self, uid: u32, gid: u32) {
        if uid != u32::MAX {
            self.uid = uid;
        }
        if gid != u32::MAX {
            self.gid = gid;
        }
    }
}

/// Anything stored in a name table.
pub trait Named {
    /// The entry name, unique within its directory.
    fn name(&self) -> &str;

    /// Rename the entry in place.
    fn set_name(&mut self, name: String);
}
