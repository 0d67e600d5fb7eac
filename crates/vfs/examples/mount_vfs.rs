//! Example: Mount an empty in-memory tree as a FUSE filesystem.
//!
//! Usage:
//!   cargo run -p dirspider-vfs --example mount_vfs -- <mountpoint> [options]
//!
//! Options:
//!   --hits <path>      JSON table of canned search hits, keyed by query
//!   --options <path>   JSON file with VfsOptions overrides
//!   --stats            Print tree statistics every 2s
//!
//! Example:
//!   RUST_LOG=dirspider_vfs=debug cargo run -p dirspider-vfs --example mount_vfs -- \
//!       ~/spider --hits /tmp/hits.json --stats
//!
//! With `{"music jazz": [{"title": "Jazz", "link": "https://en.wikipedia.org/wiki/Jazz"}]}`
//! in hits.json, `mkdir -p ~/spider/music/jazz` produces
//! `~/spider/music/jazz/results.txt` holding that hit.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dirspider_vfs::{
    ContentProvider, DirSpiderFs, StaticContentProvider, TreeEngine, TreeStats, VfsOptions,
};
use tracing_subscriber::EnvFilter;

/// CLI arguments for the mount_vfs example.
struct CliArgs {
    mountpoint: PathBuf,
    hits_path: Option<PathBuf>,
    options_path: Option<PathBuf>,
    show_stats: bool,
}

impl CliArgs {
    /// Parse CLI arguments.
    ///
    /// # Returns
    /// Parsed CLI arguments or None if help was requested or args invalid.
    fn parse() -> Option<Self> {
        let args: Vec<String> = std::env::args().collect();
        let program: &str = args.first().map(String::as_str).unwrap_or("mount_vfs");

        if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
            Self::print_usage(program);
            return None;
        }

        let mut mountpoint: Option<PathBuf> = None;
        let mut hits_path: Option<PathBuf> = None;
        let mut options_path: Option<PathBuf> = None;
        let mut show_stats: bool = false;

        let mut i: usize = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--stats" => show_stats = true,
                "--hits" => {
                    i += 1;
                    hits_path = Some(PathBuf::from(args.get(i)?));
                }
                "--options" => {
                    i += 1;
                    options_path = Some(PathBuf::from(args.get(i)?));
                }
                arg if !arg.starts_with('-') && mountpoint.is_none() => {
                    mountpoint = Some(PathBuf::from(arg));
                }
                _ => {
                    eprintln!("Unknown option: {}", args[i]);
                    Self::print_usage(program);
                    return None;
                }
            }
            i += 1;
        }

        Some(Self {
            mountpoint: mountpoint?,
            hits_path,
            options_path,
            show_stats,
        })
    }

    /// Print usage information.
    ///
    /// # Arguments
    /// * `program` - Program name for usage message
    fn print_usage(program: &str) {
        eprintln!("Usage: {} <mountpoint> [options]", program);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  --hits <path>      JSON table of canned search hits, keyed by query");
        eprintln!("  --options <path>   JSON file with VfsOptions overrides");
        eprintln!("  --stats            Print tree statistics every 2s");
    }
}

/// Expand tilde in path to home directory.
///
/// # Arguments
/// * `path` - Path that may start with ~
///
/// # Returns
/// Expanded path, or the input if no home directory is known.
fn expand_tilde(path: PathBuf) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path,
    }
}

/// Spawn a background thread that prints stats periodically.
///
/// # Arguments
/// * `engine` - Engine to query
/// * `running` - Atomic flag to control thread lifetime
/// * `interval_secs` - Interval between stats updates
fn spawn_stats_thread(
    engine: Arc<TreeEngine>,
    running: Arc<AtomicBool>,
    interval_secs: u64,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while running.load(Ordering::SeqCst) {
            let stats: TreeStats = engine.stats();
            println!("[stats] {}", stats);
            thread::sleep(Duration::from_secs(interval_secs));
        }
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: CliArgs = match CliArgs::parse() {
        Some(a) => a,
        None => std::process::exit(1),
    };
    let mountpoint: PathBuf = expand_tilde(args.mountpoint.clone());

    let options: VfsOptions = match &args.options_path {
        Some(path) => VfsOptions::from_json(&std::fs::read_to_string(path)?)?,
        None => VfsOptions::default(),
    };

    let provider: Option<Arc<dyn ContentProvider>> = match &args.hits_path {
        Some(path) => {
            let table: StaticContentProvider =
                StaticContentProvider::from_json(&std::fs::read_to_string(path)?)?;
            println!("Loaded {} canned queries from {}", table.len(), path.display());
            Some(Arc::new(table))
        }
        None => None,
    };

    if !mountpoint.exists() {
        std::fs::create_dir_all(&mountpoint)?;
    }

    let engine: Arc<TreeEngine> = Arc::new(TreeEngine::init(options.clone(), provider)?);

    let running: Arc<AtomicBool> = Arc::new(AtomicBool::new(true));
    let r: Arc<AtomicBool> = running.clone();
    ctrlc::set_handler(move || {
        println!("\nReceived SIGINT, unmounting...");
        r.store(false, Ordering::SeqCst);
    })?;

    println!("Mounting {} at: {}", options.fs_name, mountpoint.display());
    let fs: DirSpiderFs = DirSpiderFs::new(engine.clone(), &options);
    let session = dirspider_vfs::spawn_mount(fs, &mountpoint)?;

    let stats_handle: Option<thread::JoinHandle<()>> = if args.show_stats {
        Some(spawn_stats_thread(engine.clone(), running.clone(), 2))
    } else {
        println!("Press Ctrl+C to unmount and exit.");
        None
    };

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    drop(session);
    if let Some(handle) = stats_handle {
        let _ = handle.join();
    }

    match Arc::try_unwrap(engine) {
        Ok(engine) => println!("Unmounted: {}", engine.teardown()),
        Err(engine) => println!("Unmounted: {}", engine.stats()),
    }

    Ok(())
}
