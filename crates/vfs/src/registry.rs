//! Bidirectional path↔inode registry for the kernel adapter.
//!
//! The tree is addressed by path, the kernel by inode number. Numbers are
//! handed out lazily the first time a path is looked up and are never reused.
//! Paths are stored normalized: absolute, single slashes, no trailing slash.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::path;

/// Inode number of the root directory.
pub const ROOT_INO: u64 = 1;

/// Bidirectional path↔inode map.
///
/// Backed by `DashMap` so dispatcher threads can look up concurrently.
pub struct PathRegistry {
    path_to_ino: DashMap<String, u64>,
    ino_to_path: DashMap<u64, String>,
    next_ino: AtomicU64,
}

impl PathRegistry {
    /// Create a registry holding only the root.
    pub fn new() -> Self {
        let registry: PathRegistry = Self {
            path_to_ino: DashMap::new(),
            ino_to_path: DashMap::new(),
            next_ino: AtomicU64::new(ROOT_INO + 1),
        };
        registry.path_to_ino.insert("/".to_string(), ROOT_INO);
        registry.ino_to_path.insert(ROOT_INO, "/".to_string());
        registry
    }

    fn normalize(path: &str) -> String {
        path::join(&path::segments(path))
    }

    /// Get or allocate the inode for `path`.
    pub fn get_or_create(&self, path: &str) -> u64 {
        let normalized: String = Self::normalize(path);
        if let Some(ino) = self.path_to_ino.get(&normalized) {
            return *ino;
        }
        *self
            .path_to_ino
            .entry(normalized.clone())
            .or_insert_with(|| {
                let ino: u64 = self.next_ino.fetch_add(1, Ordering::Relaxed);
                self.ino_to_path.insert(ino, normalized);
                ino
            })
    }

    /// Inode for `path`, if registered.
    pub fn get(&self, path: &str) -> Option<u64> {
        self.path_to_ino.get(&Self::normalize(path)).map(|r| *r)
    }

    /// Path for `ino`, if registered.
    pub fn get_path(&self, ino: u64) -> Option<String> {
        self.ino_to_path.get(&ino).map(|r| r.clone())
    }

    /// Path of `name` inside the directory `parent`.
    ///
    /// # Returns
    /// `None` if `parent` is unknown.
    pub fn child_path(&self, parent: u64, name: &str) -> Option<String> {
        let parent_path: String = self.get_path(parent)?;
        if parent_path == "/" {
            Some(format!("/{}", name))
        } else {
            Some(format!("{}/{}", parent_path, name))
        }
    }

    /// Forget `path` and everything registered beneath it.
    ///
    /// # Returns
    /// Number of paths forgotten.
    pub fn remove_subtree(&self, path: &str) -> usize {
        let root: String = Self::normalize(path);
        if root == "/" {
            return 0;
        }
        let doomed: Vec<String> = self.subtree(&root);
        for p in &doomed {
            if let Some((_, ino)) = self.path_to_ino.remove(p) {
                self.ino_to_path.remove(&ino);
            }
        }
        doomed.len()
    }

    /// Re-key `from` and everything beneath it under `to`, keeping inodes.
    ///
    /// # Returns
    /// Number of paths moved.
    pub fn rename_subtree(&self, from: &str, to: &str) -> usize {
        let from: String = Self::normalize(from);
        let to: String = Self::normalize(to);
        if from == "/" || to == "/" {
            return 0;
        }
        self.remove_subtree(&to);

        let moved: Vec<String> = self.subtree(&from);
        for old in &moved {
            let new: String = format!("{}{}", to, &old[from.len()..]);
            if let Some((_, ino)) = self.path_to_ino.remove(old) {
                self.path_to_ino.insert(new.clone(), ino);
                self.ino_to_path.insert(ino, new);
            }
        }
        moved.len()
    }

    /// Registered paths equal to `root` or beneath it.
    fn subtree(&self, root: &str) -> Vec<String> {
        let prefix: String = format!("{}/", root);
        self.path_to_ino
            .iter()
            .filter(|e| e.key() == root || e.key().starts_with(&prefix))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Number of registered paths, the root included.
    pub fn len(&self) -> usize {
        self.path_to_ino.len()
    }

    /// Always false: the root is permanently registered.
    pub fn is_empty(&self) -> bool {
        self.path_to_ino.is_empty()
    }
}

impl Default for PathRegistry {
    fn default() -> Self {
        Self::new()
    }
}
