//! Thread-safe engine serving [`FsOperations`].
//!
//! One `parking_lot::RwLock` guards the whole tree. Read operations share it,
//! mutations hold it exclusively for their full duration. Provider lookups for
//! new entries are handed to a background runtime and `mkdir`/`create` return
//! at once. A finished lookup takes the lock itself and fills the target only
//! if it still exists and is still empty, so the new entry is visible with
//! empty content until then. [`TreeEngine::flush_provisioning`] waits for
//! outstanding lookups.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::content::{ContentProvider, Provisioner};
use crate::error::VfsResult;
use crate::ops::{FileAttrs, FsOperations};
use crate::options::VfsOptions;
use crate::path::{self, SplitPath};
use crate::stats::TreeStats;
use crate::tree::Tree;

/// Permission bits of the placeholder file in a provisioned directory.
const PLACEHOLDER_PERMS: u32 = 0o644;

/// A pending provider lookup computed under the lock.
#[derive(Debug)]
struct ProvisionJob {
    /// File that receives the rendered hits.
    target: String,
    context: String,
    query: String,
}

/// The filesystem engine.
pub struct TreeEngine {
    tree: Arc<RwLock<Tree>>,
    provisioner: Option<Provisioner>,
    options: VfsOptions,
    start_time: Instant,
}

impl TreeEngine {
    /// Construct the root and, if a provider is given and provisioning is
    /// enabled, start the provider runtime.
    ///
    /// # Arguments
    /// * `options` - Engine configuration
    /// * `provider` - Optional content source for new entries
    ///
    /// # Returns
    /// The engine, or an IO error if the provider runtime could not start.
    pub fn init(
        options: VfsOptions,
        provider: Option<Arc<dyn ContentProvider>>,
    ) -> VfsResult<Self> {
        let provisioner: Option<Provisioner> = match provider {
            Some(provider) if options.provisioning.enabled => {
                Some(Provisioner::new(provider, &options.provisioning)?)
            }
            _ => None,
        };
        info!(
            "initialized tree owned by {}:{} (provisioning {})",
            options.owner.uid,
            options.owner.gid,
            if provisioner.is_some() { "on" } else { "off" }
        );
        Ok(Self {
            tree: Arc::new(RwLock::new(Tree::new(options.owner.uid, options.owner.gid))),
            provisioner,
            options,
            start_time: Instant::now(),
        })
    }

    /// Abandon outstanding lookups, stop the provider runtime and free the tree.
    ///
    /// # Returns
    /// Statistics of the tree as it was just before being freed.
    pub fn teardown(self) -> TreeStats {
        if let Some(provisioner) = &self.provisioner {
            provisioner.shutdown();
            provisioner.wait_idle();
        }
        let stats: TreeStats = self.stats();
        info!("tearing down tree: {}", stats);
        stats
    }

    /// Snapshot entry and content counts.
    pub fn stats(&self) -> TreeStats {
        let uptime: u64 = self.start_time.elapsed().as_secs();
        TreeStats::collect(&self.tree.read(), uptime)
    }

    /// Active configuration.
    pub fn options(&self) -> &VfsOptions {
        &self.options
    }

    /// Whether new entries consult the provider.
    pub fn is_provisioning(&self) -> bool {
        self.provisioner.is_some()
    }

    /// Number of provider lookups not yet applied.
    pub fn pending_provisions(&self) -> usize {
        self.provisioner.as_ref().map_or(0, Provisioner::pending)
    }

    /// Block until every outstanding provider lookup has been applied or
    /// given up.
    pub fn flush_provisioning(&self) {
        if let Some(provisioner) = &self.provisioner {
            provisioner.wait_idle();
        }
    }

    /// Start a lookup; its result is applied from the provider runtime.
    fn provision(&self, job: ProvisionJob) {
        let Some(provisioner) = &self.provisioner else {
            return;
        };
        let tree: Arc<RwLock<Tree>> = Arc::clone(&self.tree);
        let target: String = job.target;
        provisioner.spawn(job.context, job.query, move |data| {
            match tree.write().fill_if_empty(&target, data) {
                Ok(true) => debug!("provisioned {}", target),
                Ok(false) => debug!("{} was written before provisioning finished", target),
                Err(e) => warn!("could not provision {}: {}", target, e),
            }
        });
    }

    /// Lookup for a new directory: context is the ancestors, query is the
    /// full path, result lands in the placeholder file.
    fn directory_job(&self, split: &SplitPath<'_>, path: &str) -> ProvisionJob {
        let sep: &str = &self.options.provisioning.separator;
        let placeholder: &str = &self.options.provisioning.placeholder_name;
        ProvisionJob {
            target: format!("{}/{}", path.trim_end_matches('/'), placeholder),
            context: split.parents.join(sep),
            query: split.all().join(sep),
        }
    }

    /// Lookup for a new file: context is the ancestors, query is the name.
    fn file_job(&self, split: &SplitPath<'_>, path: &str) -> ProvisionJob {
        ProvisionJob {
            target: path.to_string(),
            context: split.parents.join(&self.options.provisioning.separator),
            query: split.name.to_string(),
        }
    }
}

impl FsOperations for TreeEngine {
    fn getattr(&self, path: &str) -> VfsResult<FileAttrs> {
        self.tree.read().getattr(path)
    }

    fn readdir(&self, path: &str) -> VfsResult<Vec<String>> {
        self.tree.read().readdir(path)
    }

    fn mkdir(&self, path: &str, mode: u32) -> VfsResult<()> {
        debug!("mkdir {} {:o}", path, mode);
        let split: Option<SplitPath<'_>> = SplitPath::parse(path);
        let job: Option<ProvisionJob> = {
            let mut tree = self.tree.write();
            tree.mkdir(path, mode)?;
            match &split {
                Some(split) if !split.parent_is_root() && self.is_provisioning() => {
                    let job: ProvisionJob = self.directory_job(split, path);
                    match tree.create(&job.target, PLACEHOLDER_PERMS) {
                        Ok(()) => Some(job),
                        Err(e) => {
                            warn!("no placeholder in {}: {}", path, e);
                            None
                        }
                    }
                }
                _ => None,
            }
        };
        if let Some(job) = job {
            self.provision(job);
        }
        Ok(())
    }

    fn rmdir(&self, path: &str) -> VfsResult<()> {
        debug!("rmdir {}", path);
        self.tree.write().rmdir(path)
    }

    fn create(&self, path: &str, mode: u32) -> VfsResult<()> {
        debug!("create {} {:o}", path, mode);
        let split: Option<SplitPath<'_>> = SplitPath::parse(path);
        self.tree.write().create(path, mode)?;
        match &split {
            Some(split) if !split.parent_is_root() && self.is_provisioning() => {
                let job: ProvisionJob = self.file_job(split, path);
                self.provision(job);
            }
            _ => {}
        }
        Ok(())
    }

    fn open(&self, path: &str) -> VfsResult<()> {
        self.tree.read().open(path)
    }

    fn read(&self, path: &str, size: usize, offset: u64) -> VfsResult<Vec<u8>> {
        self.tree.read().read(path, size, offset)
    }

    fn write(&self, path: &str, data: &[u8], offset: u64) -> VfsResult<usize> {
        debug!("write {} ({} bytes at {})", path, data.len(), offset);
        self.tree.write().write(path, data, offset)
    }

    fn unlink(&self, path: &str) -> VfsResult<()> {
        debug!("unlink {}", path);
        self.tree.write().unlink(path)
    }

    fn rename(&self, from: &str, to: &str, flags: u32) -> VfsResult<()> {
        debug!("rename {} -> {}", from, to);
        self.tree.write().rename(from, to, flags)
    }

    fn link(&self, from: &str, to: &str) -> VfsResult<()> {
        debug!("link {} -> {}", to, from);
        self.tree.write().link(from, to)
    }

    fn symlink(&self, target: &str, link_path: &str) -> VfsResult<()> {
        debug!("symlink {} -> {}", link_path, target);
        self.tree.write().symlink(target, link_path)
    }

    fn readlink(&self, path: &str) -> VfsResult<String> {
        self.tree.read().readlink(path)
    }

    fn chmod(&self, path: &str, mode: u32) -> VfsResult<()> {
        debug!("chmod {} {:o}", path, mode);
        self.tree.write().chmod(path, mode)
    }

    fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()> {
        debug!("chown {} {}:{}", path, uid, gid);
        self.tree.write().chown(path, uid, gid)
    }

    fn truncate(&self, path: &str, size: u64) -> VfsResult<()> {
        debug!("truncate {} to {}", path, size);
        self.tree.write().truncate(path, size)
    }

    fn access(&self, path: &str) -> VfsResult<()> {
        if path::is_root(path) {
            return Ok(());
        }
        self.tree.read().access(path)
    }
}

impl std::fmt::Debug for TreeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeEngine")
            .field("options", &self.options)
            .field("provisioning", &self.is_provisioning())
            .finish()
    }
}
