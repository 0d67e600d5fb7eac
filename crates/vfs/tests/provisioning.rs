//! Integration tests for content provisioning of new entries.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use dirspider_vfs::{
    ContentProvider, FsOperations, ProvisionOptions, SearchHit, TreeEngine, VfsError, VfsOptions,
};

/// Provider that records every lookup and answers with one hit naming the query.
#[derive(Default)]
struct RecordingProvider {
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingProvider {
    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ContentProvider for RecordingProvider {
    async fn search(&self, context: &str, query: &str) -> Result<Vec<SearchHit>, VfsError> {
        self.calls
            .lock()
            .push((context.to_string(), query.to_string()));
        Ok(vec![SearchHit::new(
            format!("About {}", query),
            format!("https://example.org/{}", query.replace(' ', "_")),
        )])
    }
}

/// Provider that always fails.
struct BrokenProvider;

#[async_trait]
impl ContentProvider for BrokenProvider {
    async fn search(&self, _context: &str, _query: &str) -> Result<Vec<SearchHit>, VfsError> {
        Err(VfsError::ProviderFailed("connection refused".to_string()))
    }
}

/// Provider that never answers in time.
struct StalledProvider;

#[async_trait]
impl ContentProvider for StalledProvider {
    async fn search(&self, _context: &str, _query: &str) -> Result<Vec<SearchHit>, VfsError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}

fn engine_with(provider: Arc<dyn ContentProvider>, options: VfsOptions) -> TreeEngine {
    TreeEngine::init(options, Some(provider)).unwrap()
}

#[test]
fn test_nested_mkdir_queries_full_path() {
    let provider: Arc<RecordingProvider> = Arc::new(RecordingProvider::default());
    let fs: TreeEngine = engine_with(provider.clone(), VfsOptions::default());

    fs.mkdir("/science", 0o755).unwrap();
    fs.mkdir("/science/physics", 0o755).unwrap();
    fs.mkdir("/science/physics/quantum", 0o755).unwrap();
    fs.flush_provisioning();

    assert_eq!(
        provider.calls(),
        vec![
            ("science".to_string(), "science physics".to_string()),
            (
                "science physics".to_string(),
                "science physics quantum".to_string()
            ),
        ]
    );
    let body: Vec<u8> = fs
        .read("/science/physics/quantum/results.txt", 4096, 0)
        .unwrap();
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "About science physics quantum\nhttps://example.org/science_physics_quantum\n"
    );
}

#[test]
fn test_create_queries_file_name() {
    let provider: Arc<RecordingProvider> = Arc::new(RecordingProvider::default());
    let fs: TreeEngine = engine_with(provider.clone(), VfsOptions::default());

    fs.mkdir("/a", 0o755).unwrap();
    fs.mkdir("/a/b", 0o755).unwrap();
    fs.create("/a/b/topic", 0o644).unwrap();
    fs.flush_provisioning();

    assert_eq!(
        provider.calls().last().cloned(),
        Some(("a b".to_string(), "topic".to_string()))
    );
    assert_eq!(
        fs.read("/a/b/topic", 4096, 0).unwrap(),
        b"About topic\nhttps://example.org/topic\n".to_vec()
    );
}

#[test]
fn test_top_level_entries_skip_provider() {
    let provider: Arc<RecordingProvider> = Arc::new(RecordingProvider::default());
    let fs: TreeEngine = engine_with(provider.clone(), VfsOptions::default());

    fs.mkdir("/top", 0o755).unwrap();
    fs.create("/file", 0o644).unwrap();

    assert_eq!(fs.pending_provisions(), 0);
    assert!(provider.calls().is_empty());
    assert_eq!(fs.getattr("/file").unwrap().size, 0);
}

#[test]
fn test_custom_separator_and_placeholder() {
    let provider: Arc<RecordingProvider> = Arc::new(RecordingProvider::default());
    let options: VfsOptions = VfsOptions::default().with_provisioning(
        ProvisionOptions::default()
            .with_separator("+")
            .with_placeholder_name("hits.md"),
    );
    let fs: TreeEngine = engine_with(provider.clone(), options);

    fs.mkdir("/x", 0o755).unwrap();
    fs.mkdir("/x/y", 0o755).unwrap();
    fs.flush_provisioning();

    assert_eq!(provider.calls(), vec![("x".to_string(), "x+y".to_string())]);
    assert_eq!(fs.readdir("/x/y").unwrap(), vec![".", "..", "hits.md"]);
}

#[test]
fn test_provider_failure_leaves_empty_content() {
    let fs: TreeEngine = engine_with(Arc::new(BrokenProvider), VfsOptions::default());

    fs.mkdir("/a", 0o755).unwrap();
    fs.mkdir("/a/b", 0o755).unwrap();
    fs.create("/a/f", 0o644).unwrap();
    fs.flush_provisioning();

    assert_eq!(fs.getattr("/a/b/results.txt").unwrap().size, 0);
    assert_eq!(fs.getattr("/a/f").unwrap().size, 0);
}

#[test]
fn test_provider_timeout_leaves_empty_content() {
    let options: VfsOptions = VfsOptions::default()
        .with_provisioning(ProvisionOptions::default().with_timeout_secs(0));
    let fs: TreeEngine = engine_with(Arc::new(StalledProvider), options);

    fs.mkdir("/a", 0o755).unwrap();
    fs.create("/a/f", 0o644).unwrap();
    fs.flush_provisioning();
    assert_eq!(fs.getattr("/a/f").unwrap().size, 0);
}

#[test]
fn test_placeholder_is_an_ordinary_file() {
    let provider: Arc<RecordingProvider> = Arc::new(RecordingProvider::default());
    let fs: TreeEngine = engine_with(provider, VfsOptions::default());

    fs.mkdir("/a", 0o755).unwrap();
    fs.mkdir("/a/b", 0o755).unwrap();
    fs.flush_provisioning();
    fs.write("/a/b/results.txt", b"mine", 0).unwrap();
    assert_eq!(fs.read("/a/b/results.txt", 4, 0).unwrap(), b"mine".to_vec());

    fs.unlink("/a/b/results.txt").unwrap();
    fs.rmdir("/a/b").unwrap();
    assert_eq!(fs.readdir("/a").unwrap(), vec![".", ".."]);
}

#[test]
fn test_teardown_stops_provider() {
    let provider: Arc<RecordingProvider> = Arc::new(RecordingProvider::default());
    let fs: TreeEngine = engine_with(provider.clone(), VfsOptions::default());
    fs.mkdir("/a", 0o755).unwrap();
    fs.mkdir("/a/b", 0o755).unwrap();
    fs.flush_provisioning();

    let stats = fs.teardown();
    assert_eq!(stats.directories, 2);
    assert_eq!(stats.files, 1);
    assert_eq!(provider.calls().len(), 1);
}

/// Provider that answers after a delay, naming the query as the title.
struct DelayedProvider {
    delay: Duration,
}

#[async_trait]
impl ContentProvider for DelayedProvider {
    async fn search(&self, _context: &str, query: &str) -> Result<Vec<SearchHit>, VfsError> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![SearchHit::new(query, "l")])
    }
}

fn delayed_engine() -> TreeEngine {
    engine_with(
        Arc::new(DelayedProvider {
            delay: Duration::from_secs(1),
        }),
        VfsOptions::default(),
    )
}

#[test]
fn test_tree_stays_usable_while_lookup_runs() {
    let fs: TreeEngine = delayed_engine();
    fs.mkdir("/a", 0o755).unwrap();

    let started: Instant = Instant::now();
    fs.mkdir("/a/b", 0o755).unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(fs.pending_provisions(), 1);

    // The placeholder exists right away with empty content.
    assert_eq!(fs.getattr("/a/b/results.txt").unwrap().size, 0);

    let started: Instant = Instant::now();
    fs.create("/unrelated", 0o644).unwrap();
    fs.write("/unrelated", b"x", 0).unwrap();
    assert_eq!(fs.readdir("/a").unwrap(), vec![".", "..", "b"]);
    assert!(started.elapsed() < Duration::from_millis(500));

    fs.flush_provisioning();
    assert_eq!(fs.pending_provisions(), 0);
    assert_eq!(
        fs.read("/a/b/results.txt", 4096, 0).unwrap(),
        b"a b\nl\n".to_vec()
    );
}

#[test]
fn test_lookup_runs_off_the_calling_thread() {
    let fs: Arc<TreeEngine> = Arc::new(delayed_engine());
    fs.mkdir("/a", 0o755).unwrap();

    let worker: thread::JoinHandle<()> = {
        let fs: Arc<TreeEngine> = fs.clone();
        thread::spawn(move || fs.create("/a/f", 0o644).unwrap())
    };
    worker.join().unwrap();

    let started: Instant = Instant::now();
    assert_eq!(fs.getattr("/a/f").unwrap().size, 0);
    fs.mkdir("/elsewhere", 0o755).unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));

    fs.flush_provisioning();
    assert_eq!(fs.read("/a/f", 4096, 0).unwrap(), b"f\nl\n".to_vec());
}

#[test]
fn test_write_before_lookup_finishes_wins() {
    let fs: TreeEngine = delayed_engine();
    fs.mkdir("/a", 0o755).unwrap();
    fs.create("/a/f", 0o644).unwrap();
    fs.write("/a/f", b"mine", 0).unwrap();

    fs.flush_provisioning();
    assert_eq!(fs.read("/a/f", 4096, 0).unwrap(), b"mine".to_vec());
}

#[test]
fn test_removed_target_is_not_resurrected() {
    let fs: TreeEngine = delayed_engine();
    fs.mkdir("/a", 0o755).unwrap();
    fs.mkdir("/a/b", 0o755).unwrap();
    fs.rmdir("/a/b").unwrap();

    fs.flush_provisioning();
    assert!(matches!(
        fs.getattr("/a/b/results.txt"),
        Err(VfsError::NotFound(_))
    ));
    assert_eq!(fs.stats().content_records, 0);
}

#[test]
fn test_teardown_abandons_pending_lookups() {
    let fs: TreeEngine = engine_with(Arc::new(StalledProvider), VfsOptions::default());
    fs.mkdir("/a", 0o755).unwrap();
    fs.create("/a/f", 0o644).unwrap();
    assert_eq!(fs.pending_provisions(), 1);

    let started: Instant = Instant::now();
    let stats = fs.teardown();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(stats.files, 1);
}
