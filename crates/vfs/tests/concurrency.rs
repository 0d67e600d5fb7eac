//! Integration tests for concurrent access from many dispatcher threads.

use std::sync::Arc;
use std::thread;

use async_trait::async_trait;

use dirspider_vfs::{
    ContentProvider, FsOperations, SearchHit, TreeEngine, TreeStats, VfsError, VfsOptions,
};

const THREADS: usize = 8;
const FILES_PER_THREAD: usize = 32;

fn shared_engine() -> Arc<TreeEngine> {
    Arc::new(TreeEngine::init(VfsOptions::default(), None).unwrap())
}

#[test]
fn test_parallel_creates_in_private_dirs() {
    let fs: Arc<TreeEngine> = shared_engine();

    let handles: Vec<thread::JoinHandle<()>> = (0..THREADS)
        .map(|t| {
            let fs: Arc<TreeEngine> = fs.clone();
            thread::spawn(move || {
                let dir: String = format!("/t{}", t);
                fs.mkdir(&dir, 0o755).unwrap();
                for i in 0..FILES_PER_THREAD {
                    let path: String = format!("{}/f{}", dir, i);
                    fs.create(&path, 0o644).unwrap();
                    fs.write(&path, path.as_bytes(), 0).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats: TreeStats = fs.stats();
    assert_eq!(stats.directories, THREADS);
    assert_eq!(stats.files, THREADS * FILES_PER_THREAD);
    for t in 0..THREADS {
        let path: String = format!("/t{}/f7", t);
        assert_eq!(fs.read(&path, 64, 0).unwrap(), path.as_bytes().to_vec());
    }
}

#[test]
fn test_racing_mkdir_has_one_winner() {
    let fs: Arc<TreeEngine> = shared_engine();

    let handles: Vec<thread::JoinHandle<Result<(), VfsError>>> = (0..THREADS)
        .map(|_| {
            let fs: Arc<TreeEngine> = fs.clone();
            thread::spawn(move || fs.mkdir("/contested", 0o755))
        })
        .collect();
    let results: Vec<Result<(), VfsError>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, VfsError::AlreadyExists(_))));
}

#[test]
fn test_appends_to_shared_file_do_not_interleave() {
    let fs: Arc<TreeEngine> = shared_engine();
    fs.create("/log", 0o644).unwrap();

    // Each thread owns a fixed 16-byte slot.
    let handles: Vec<thread::JoinHandle<()>> = (0..THREADS)
        .map(|t| {
            let fs: Arc<TreeEngine> = fs.clone();
            thread::spawn(move || {
                let line: Vec<u8> = format!("thread {:>8}\n", t).into_bytes();
                assert_eq!(line.len(), 16);
                fs.write("/log", &line, (t * 16) as u64).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let body: Vec<u8> = fs.read("/log", 4096, 0).unwrap();
    assert_eq!(body.len(), THREADS * 16);
    for t in 0..THREADS {
        let expected: String = format!("thread {:>8}\n", t);
        assert_eq!(&body[t * 16..(t + 1) * 16], expected.as_bytes());
    }
}

#[test]
fn test_readers_see_whole_renames() {
    let fs: Arc<TreeEngine> = shared_engine();
    fs.create("/ping", 0o644).unwrap();
    fs.write("/ping", b"ball", 0).unwrap();

    let mover: thread::JoinHandle<()> = {
        let fs: Arc<TreeEngine> = fs.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                fs.rename("/ping", "/pong", 0).unwrap();
                fs.rename("/pong", "/ping", 0).unwrap();
            }
        })
    };
    let watcher: thread::JoinHandle<()> = {
        let fs: Arc<TreeEngine> = fs.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                let names: Vec<String> = fs.readdir("/").unwrap();
                let visible: usize = names
                    .iter()
                    .filter(|n| *n == "ping" || *n == "pong")
                    .count();
                assert_eq!(visible, 1, "{:?}", names);
            }
        })
    };
    mover.join().unwrap();
    watcher.join().unwrap();

    assert_eq!(fs.read("/ping", 4, 0).unwrap(), b"ball".to_vec());
}

#[test]
fn test_links_and_unlinks_balance() {
    let fs: Arc<TreeEngine> = shared_engine();
    fs.create("/origin", 0o644).unwrap();
    fs.write("/origin", b"x", 0).unwrap();

    let handles: Vec<thread::JoinHandle<()>> = (0..THREADS)
        .map(|t| {
            let fs: Arc<TreeEngine> = fs.clone();
            thread::spawn(move || {
                let name: String = format!("/alias{}", t);
                for _ in 0..50 {
                    fs.link("/origin", &name).unwrap();
                    fs.unlink(&name).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(fs.getattr("/origin").unwrap().nlink, 1);
    assert_eq!(fs.stats().content_records, 1);
}

/// Provider that answers every query with the query itself.
struct EchoProvider;

#[async_trait]
impl ContentProvider for EchoProvider {
    async fn search(&self, _context: &str, query: &str) -> Result<Vec<SearchHit>, VfsError> {
        Ok(vec![SearchHit::new(query, "about:blank")])
    }
}

#[test]
fn test_parallel_provisioning() {
    let fs: Arc<TreeEngine> =
        Arc::new(TreeEngine::init(VfsOptions::default(), Some(Arc::new(EchoProvider))).unwrap());
    fs.mkdir("/root", 0o755).unwrap();

    let handles: Vec<thread::JoinHandle<()>> = (0..THREADS)
        .map(|t| {
            let fs: Arc<TreeEngine> = fs.clone();
            thread::spawn(move || {
                fs.mkdir(&format!("/root/topic{}", t), 0o755).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    fs.flush_provisioning();

    for t in 0..THREADS {
        let body: Vec<u8> = fs
            .read(&format!("/root/topic{}/results.txt", t), 4096, 0)
            .unwrap();
        assert_eq!(body, format!("root topic{}\nabout:blank\n", t).into_bytes());
    }
}
