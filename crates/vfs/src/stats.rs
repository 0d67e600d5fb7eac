//! Statistics snapshot of the tree.

use std::fmt;

use crate::inode::{DirNode, EntryKind};
use crate::tree::Tree;

/// Counts of live entries and content held by a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Directories below the root (directory symlinks excluded).
    pub directories: usize,
    /// File entries, hardlink aliases included.
    pub files: usize,
    /// File and directory symlinks.
    pub symlinks: usize,
    /// Live content records.
    pub content_records: usize,
    /// Bytes held across all content records.
    pub content_bytes: u64,
    /// Seconds since the engine was initialized.
    pub uptime_secs: u64,
}

impl TreeStats {
    /// Walk `tree` and count its entries.
    ///
    /// # Arguments
    /// * `tree` - Tree to inspect
    /// * `uptime_secs` - Engine uptime to record in the snapshot
    pub fn collect(tree: &Tree, uptime_secs: u64) -> Self {
        let mut stats: TreeStats = TreeStats {
            content_records: tree.content().len(),
            content_bytes: tree.content().total_bytes(),
            uptime_secs,
            ..TreeStats::default()
        };
        count_files(tree.root(), &mut stats);
        tree.root().for_each_dir(&mut |dir| match dir.kind() {
            EntryKind::Symlink => stats.symlinks += 1,
            _ => stats.directories += 1,
        });
        stats
    }
}

fn count_files(root: &DirNode, stats: &mut TreeStats) {
    root.for_each_file(&mut |file| match file.kind() {
        EntryKind::Symlink => stats.symlinks += 1,
        _ => stats.files += 1,
    });
}

impl fmt::Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dirs, {} files, {} symlinks, {} content records ({} bytes), up {}s",
            self.directories,
            self.files,
            self.symlinks,
            self.content_records,
            self.content_bytes,
            self.uptime_secs
        )
    }
}
