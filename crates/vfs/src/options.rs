//! Configuration options for the filesystem engine and its mount.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{VfsError, VfsResult};
use crate::executor::ExecutorConfig;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsOptions {
    /// Content provisioning for newly created entries.
    pub provisioning: ProvisionOptions,
    /// Ownership stamped on new nodes.
    pub owner: OwnerOptions,
    /// Kernel attribute and entry cache lifetimes.
    pub kernel_cache: KernelCacheOptions,
    /// Filesystem name shown in the mount table.
    pub fs_name: String,
}

impl Default for VfsOptions {
    fn default() -> Self {
        Self {
            provisioning: ProvisionOptions::default(),
            owner: OwnerOptions::default(),
            kernel_cache: KernelCacheOptions::default(),
            fs_name: "dirspider".to_string(),
        }
    }
}

impl VfsOptions {
    /// Parse options from JSON. Missing fields take their defaults.
    ///
    /// # Arguments
    /// * `json` - JSON document
    pub fn from_json(json: &str) -> VfsResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| VfsError::InvalidArgument(format!("invalid options: {}", e)))
    }

    /// Set provisioning options.
    ///
    /// # Arguments
    /// * `provisioning` - Provisioning configuration
    pub fn with_provisioning(mut self, provisioning: ProvisionOptions) -> Self {
        self.provisioning = provisioning;
        self
    }

    /// Set the default owner of new nodes.
    pub fn with_owner(mut self, owner: OwnerOptions) -> Self {
        self.owner = owner;
        self
    }

    /// Set kernel cache options.
    pub fn with_kernel_cache(mut self, kernel_cache: KernelCacheOptions) -> Self {
        self.kernel_cache = kernel_cache;
        self
    }

    /// Set the filesystem name.
    ///
    /// # Arguments
    /// * `name` - Name reported as the mount source
    pub fn with_fs_name(mut self, name: impl Into<String>) -> Self {
        self.fs_name = name.into();
        self
    }
}

/// How new entries outside the root receive initial content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionOptions {
    /// Whether the provider is consulted at all.
    pub enabled: bool,
    /// Name of the file placed inside each provisioned directory.
    pub placeholder_name: String,
    /// Separator used when joining path segments into a query.
    pub separator: String,
    /// Upper bound on a single provider call.
    pub timeout_secs: u64,
    /// Worker threads of the provider runtime.
    pub worker_threads: usize,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            placeholder_name: "results.txt".to_string(),
            separator: " ".to_string(),
            timeout_secs: 10,
            worker_threads: 2,
        }
    }
}

impl ProvisionOptions {
    /// Turn provisioning on or off.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the placeholder file name.
    pub fn with_placeholder_name(mut self, name: impl Into<String>) -> Self {
        self.placeholder_name = name.into();
        self
    }

    /// Set the query separator.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Set the provider timeout in seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Provider call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Executor configuration derived from these options.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::default()
            .with_worker_threads(self.worker_threads)
            .with_default_timeout(Some(self.timeout()))
    }
}

/// Default ownership of new nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerOptions {
    /// Owning user.
    pub uid: u32,
    /// Owning group.
    pub gid: u32,
}

impl Default for OwnerOptions {
    fn default() -> Self {
        // SAFETY: getuid/getgid have no preconditions and cannot fail.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self { uid, gid }
    }
}

impl OwnerOptions {
    /// Owner with explicit ids.
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }
}

/// Kernel cache lifetimes. Zero keeps link counts and sizes fresh after every
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelCacheOptions {
    /// Attribute cache TTL in seconds.
    pub attr_timeout_secs: u64,
    /// Directory entry cache TTL in seconds.
    pub entry_timeout_secs: u64,
}

impl KernelCacheOptions {
    /// Attribute cache TTL.
    pub fn attr_ttl(&self) -> Duration {
        Duration::from_secs(self.attr_timeout_secs)
    }

    /// Entry cache TTL.
    pub fn entry_ttl(&self) -> Duration {
        Duration::from_secs(self.entry_timeout_secs)
    }
}
