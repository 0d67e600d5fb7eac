//! Integration tests for hardlink sharing and content reclamation.

use dirspider_vfs::{FsOperations, TreeEngine, TreeStats, VfsError, VfsOptions};

fn engine() -> TreeEngine {
    TreeEngine::init(VfsOptions::default(), None).unwrap()
}

#[test]
fn test_write_through_alias_is_visible() {
    let fs: TreeEngine = engine();
    fs.create("/a", 0o644).unwrap();
    fs.link("/a", "/b").unwrap();

    fs.write("/b", b"shared", 0).unwrap();
    assert_eq!(fs.read("/a", 6, 0).unwrap(), b"shared".to_vec());

    fs.write("/a", b"S", 0).unwrap();
    assert_eq!(fs.read("/b", 6, 0).unwrap(), b"Shared".to_vec());
}

#[test]
fn test_original_unlinked_first_keeps_content() {
    let fs: TreeEngine = engine();
    fs.create("/a", 0o644).unwrap();
    fs.write("/a", b"keep me", 0).unwrap();
    fs.link("/a", "/b").unwrap();

    fs.unlink("/a").unwrap();
    assert_eq!(fs.read("/b", 7, 0).unwrap(), b"keep me".to_vec());
    assert_eq!(fs.getattr("/b").unwrap().nlink, 1);
    assert_eq!(fs.stats().content_records, 1);

    fs.unlink("/b").unwrap();
    assert!(matches!(fs.read("/b", 7, 0), Err(VfsError::NotFound(_))));
    let stats: TreeStats = fs.stats();
    assert_eq!(stats.content_records, 0);
    assert_eq!(stats.content_bytes, 0);
}

#[test]
fn test_alias_unlinked_first_keeps_content() {
    let fs: TreeEngine = engine();
    fs.create("/a", 0o644).unwrap();
    fs.write("/a", b"data", 0).unwrap();
    fs.link("/a", "/b").unwrap();

    fs.unlink("/b").unwrap();
    assert_eq!(fs.getattr("/a").unwrap().nlink, 1);
    assert_eq!(fs.read("/a", 4, 0).unwrap(), b"data".to_vec());
}

#[test]
fn test_link_count_tracks_every_name() {
    let fs: TreeEngine = engine();
    fs.mkdir("/d", 0o755).unwrap();
    fs.create("/d/f", 0o644).unwrap();
    fs.link("/d/f", "/l1").unwrap();
    fs.link("/l1", "/d/l2").unwrap();
    fs.link("/d/l2", "/l3").unwrap();

    for path in ["/d/f", "/l1", "/d/l2", "/l3"] {
        assert_eq!(fs.getattr(path).unwrap().nlink, 4, "{}", path);
    }
    assert_eq!(fs.stats().content_records, 1);

    fs.unlink("/l1").unwrap();
    assert_eq!(fs.getattr("/d/f").unwrap().nlink, 3);
}

#[test]
fn test_rmdir_drops_only_inner_names() {
    let fs: TreeEngine = engine();
    fs.mkdir("/d", 0o755).unwrap();
    fs.create("/d/inner", 0o644).unwrap();
    fs.write("/d/inner", b"survivor", 0).unwrap();
    fs.link("/d/inner", "/d/inner2").unwrap();
    fs.link("/d/inner", "/outer").unwrap();

    fs.rmdir("/d").unwrap();

    assert_eq!(fs.getattr("/outer").unwrap().nlink, 1);
    assert_eq!(fs.read("/outer", 8, 0).unwrap(), b"survivor".to_vec());
}

#[test]
fn test_rename_keeps_link() {
    let fs: TreeEngine = engine();
    fs.mkdir("/x", 0o755).unwrap();
    fs.create("/a", 0o644).unwrap();
    fs.link("/a", "/b").unwrap();

    fs.rename("/b", "/x/b", 0).unwrap();
    fs.write("/x/b", b"moved", 0).unwrap();
    assert_eq!(fs.read("/a", 5, 0).unwrap(), b"moved".to_vec());
    assert_eq!(fs.getattr("/a").unwrap().nlink, 2);
}

#[test]
fn test_truncate_through_alias() {
    let fs: TreeEngine = engine();
    fs.create("/a", 0o644).unwrap();
    fs.write("/a", b"0123456789", 0).unwrap();
    fs.link("/a", "/b").unwrap();

    fs.truncate("/b", 3).unwrap();
    assert_eq!(fs.getattr("/a").unwrap().size, 3);
}

#[test]
fn test_alias_metadata_is_independent() {
    let fs: TreeEngine = engine();
    fs.create("/a", 0o644).unwrap();
    fs.link("/a", "/b").unwrap();
    fs.chmod("/b", 0o600).unwrap();

    assert_eq!(fs.getattr("/a").unwrap().mode & 0o777, 0o644);
    assert_eq!(fs.getattr("/b").unwrap().mode & 0o777, 0o600);
}

#[test]
fn test_link_errors() {
    let fs: TreeEngine = engine();
    fs.create("/a", 0o644).unwrap();
    fs.create("/b", 0o644).unwrap();
    fs.mkdir("/d", 0o755).unwrap();

    assert!(matches!(fs.link("/a", "/b"), Err(VfsError::AlreadyExists(_))));
    assert!(matches!(fs.link("/a", "/d"), Err(VfsError::AlreadyExists(_))));
    assert!(matches!(fs.link("/d", "/e"), Err(VfsError::InvalidArgument(_))));
    assert!(matches!(fs.link("/missing", "/e"), Err(VfsError::NotFound(_))));
    assert!(matches!(fs.link("/a", "/nope/e"), Err(VfsError::NotFound(_))));
    assert_eq!(fs.getattr("/a").unwrap().nlink, 1);
}

#[test]
fn test_link_to_symlink_copies_link() {
    let fs: TreeEngine = engine();
    fs.symlink("/target", "/s").unwrap();
    fs.link("/s", "/s2").unwrap();
    assert_eq!(fs.readlink("/s2").unwrap(), "/target");
    assert_eq!(fs.stats().content_records, 0);
}
