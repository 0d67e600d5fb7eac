//! Path resolution from the root.
//!
//! Paths are absolute and `/`-delimited; empty segments are discarded. A path
//! with no segments names the root, which has no parent and must be handled
//! by the caller before resolving.

use crate::error::{VfsError, VfsResult};
use crate::inode::{DirNode, MAX_NAME_LEN};

/// A non-root path split into its parent segments and final name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPath<'p> {
    /// Segments leading to the parent directory.
    pub parents: Vec<&'p str>,
    /// Final segment.
    pub name: &'p str,
}

impl<'p> SplitPath<'p> {
    /// Split `path`, returning `None` when it names the root.
    pub fn parse(path: &'p str) -> Option<Self> {
        let mut segments: Vec<&'p str> = segments(path);
        let name: &'p str = segments.pop()?;
        Some(Self {
            parents: segments,
            name,
        })
    }

    /// Whether the parent directory is the root.
    pub fn parent_is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// All segments, parents first.
    pub fn all(&self) -> Vec<&'p str> {
        let mut all: Vec<&'p str> = self.parents.clone();
        all.push(self.name);
        all
    }

    /// Fail with `NameTooLong` if the final segment exceeds the bound.
    pub fn check_name_len(&self) -> VfsResult<()> {
        if self.name.len() > MAX_NAME_LEN {
            return Err(VfsError::NameTooLong(self.name.to_string()));
        }
        Ok(())
    }
}

/// Split a path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Whether `path` names the root.
pub fn is_root(path: &str) -> bool {
    path.split('/').all(str::is_empty)
}

/// Walk from `root` through `parents`, returning the directory reached.
///
/// Only real directories are descended into; a file or directory symlink in
/// an intermediate position fails with `NotFound`.
pub fn walk<'t>(root: &'t DirNode, parents: &[&str]) -> VfsResult<&'t DirNode> {
    let mut current: &'t DirNode = root;
    for segment in parents {
        current = current
            .dirs()
            .get(segment)
            .filter(|d| d.link_target().is_none())
            .ok_or_else(|| VfsError::NotFound(join(parents)))?;
    }
    Ok(current)
}

/// Mutable counterpart of [`walk`].
pub fn walk_mut<'t>(root: &'t mut DirNode, parents: &[&str]) -> VfsResult<&'t mut DirNode> {
    let mut current: &'t mut DirNode = root;
    for segment in parents {
        current = current
            .dirs_mut()
            .get_mut(segment)
            .filter(|d| d.link_target().is_none())
            .ok_or_else(|| VfsError::NotFound(join(parents)))?;
    }
    Ok(current)
}

/// Resolve `path` to its parent directory and final segment.
pub fn resolve<'t, 'p>(root: &'t DirNode, path: &'p str) -> VfsResult<(&'t DirNode, &'p str)> {
    let split: SplitPath<'p> =
        SplitPath::parse(path).ok_or_else(|| VfsError::InvalidArgument("/".to_string()))?;
    let parent: &'t DirNode = walk(root, &split.parents)?;
    Ok((parent, split.name))
}

/// Join segments back into an absolute path.
pub fn join(segments: &[&str]) -> String {
    let mut out: String = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Lexically resolve a symlink target as seen from the directory `base`.
///
/// Absolute targets start from the root, relative ones from `base`. `.` is
/// dropped and `..` pops a segment, stopping at the root. Returns `None` for
/// an empty target.
pub fn link_target_path<'p>(base: &[&'p str], target: &'p str) -> Option<String> {
    if target.is_empty() {
        return None;
    }
    let mut resolved: Vec<&'p str> = if target.starts_with('/') {
        Vec::new()
    } else {
        base.to_vec()
    };
    for segment in segments(target) {
        match segment {
            "." => {}
            ".." => {
                resolved.pop();
            }
            name => resolved.push(name),
        }
    }
    Some(join(&resolved))
}

/// Whether `inner` equals `outer` or lies beneath it.
pub fn is_within(inner: &[&str], outer: &[&str]) -> bool {
    inner.len() >= outer.len() && inner[..outer.len()] == *outer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::Named;

    fn sample_tree() -> DirNode {
        let mut b: DirNode = DirNode::new("b".to_string(), 0o755, 0, 0);
        b.dirs_mut()
            .insert(DirNode::new("c".to_string(), 0o755, 0, 0))
            .unwrap();
        let mut a: DirNode = DirNode::new("a".to_string(), 0o755, 0, 0);
        a.dirs_mut().insert(b).unwrap();
        a.dirs_mut()
            .insert(DirNode::symlink("s".to_string(), "/a/b".to_string(), 0, 0))
            .unwrap();
        let mut root: DirNode = DirNode::new(String::new(), 0o755, 0, 0);
        root.dirs_mut().insert(a).unwrap();
        root
    }

    #[test]
    fn test_segments_discard_empty() {
        assert_eq!(segments("/a//b/"), vec!["a", "b"]);
        assert!(segments("/").is_empty());
        assert!(segments("").is_empty());
    }

    #[test]
    fn test_is_root() {
        assert!(is_root("/"));
        assert!(is_root("//"));
        assert!(is_root(""));
        assert!(!is_root("/a"));
    }

    #[test]
    fn test_split_path() {
        let split: SplitPath<'_> = SplitPath::parse("/a/b/c").unwrap();
        assert_eq!(split.parents, vec!["a", "b"]);
        assert_eq!(split.name, "c");
        assert!(!split.parent_is_root());
        assert_eq!(split.all(), vec!["a", "b", "c"]);
        assert!(SplitPath::parse("/").is_none());
        assert!(SplitPath::parse("/x").unwrap().parent_is_root());
    }

    #[test]
    fn test_name_len_bound() {
        let ok: String = format!("/{}", "n".repeat(MAX_NAME_LEN));
        let long: String = format!("/{}", "n".repeat(MAX_NAME_LEN + 1));
        assert!(SplitPath::parse(&ok).unwrap().check_name_len().is_ok());
        assert!(matches!(
            SplitPath::parse(&long).unwrap().check_name_len(),
            Err(VfsError::NameTooLong(_))
        ));
    }

    #[test]
    fn test_resolve_nested() {
        let root: DirNode = sample_tree();
        let (parent, name) = resolve(&root, "/a/b/c").unwrap();
        assert_eq!(parent.name(), "b");
        assert_eq!(name, "c");

        let (parent, name) = resolve(&root, "/missing").unwrap();
        assert_eq!(parent.name(), "");
        assert_eq!(name, "missing");
    }

    #[test]
    fn test_resolve_missing_intermediate() {
        let root: DirNode = sample_tree();
        assert!(matches!(resolve(&root, "/a/x/c"), Err(VfsError::NotFound(_))));
    }

    #[test]
    fn test_resolve_does_not_descend_symlink() {
        let root: DirNode = sample_tree();
        assert!(matches!(resolve(&root, "/a/s/c"), Err(VfsError::NotFound(_))));
    }

    #[test]
    fn test_walk_mut() {
        let mut root: DirNode = sample_tree();
        let dir: &mut DirNode = walk_mut(&mut root, &["a", "b"]).unwrap();
        dir.meta_mut().set_permissions(0o700);
        assert_eq!(walk(&root, &["a", "b"]).unwrap().meta().mode & 0o777, 0o700);
    }

    #[test]
    fn test_link_target_path() {
        assert_eq!(link_target_path(&["a", "b"], "/x/y"), Some("/x/y".to_string()));
        assert_eq!(link_target_path(&["a", "b"], "c"), Some("/a/b/c".to_string()));
        assert_eq!(link_target_path(&["a", "b"], "../c"), Some("/a/c".to_string()));
        assert_eq!(link_target_path(&["a"], "./../../.."), Some("/".to_string()));
        assert_eq!(link_target_path(&[], "."), Some("/".to_string()));
        assert_eq!(link_target_path(&["a"], ""), None);
    }

    #[test]
    fn test_join_and_within() {
        assert_eq!(join(&["a", "b"]), "/a/b");
        assert_eq!(join(&[]), "/");
        assert!(is_within(&["a", "b"], &["a"]));
        assert!(is_within(&["a"], &["a"]));
        assert!(!is_within(&["ab"], &["a"]));
        assert!(!is_within(&["a"], &["a", "b"]));
    }
}
