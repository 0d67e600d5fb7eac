//! In-memory FUSE filesystem whose new entries are provisioned from a search
//! provider.
//!
//! Every directory, file, hardlink and symlink lives in process memory. When
//! a directory or file is created below the top level, a [`ContentProvider`]
//! is asked for (title, link) pairs which become the entry's initial content.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: FUSE Interface (fuser::Filesystem impl, PathRegistry)
//! Layer 2: Engine (TreeEngine: lock discipline, provisioning, FsOperations)
//! Layer 1: Primitives (Tree, DirNode, FileNode, ContentArena, path resolver)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dirspider_vfs::{DirSpiderFs, StaticContentProvider, TreeEngine, VfsOptions};
//!
//! let options = VfsOptions::default();
//! let engine = Arc::new(TreeEngine::init(options.clone(), Some(Arc::new(StaticContentProvider::new())))?);
//! let fs = DirSpiderFs::new(engine, &options);
//! dirspider_vfs::mount(fs, std::path::Path::new("/mnt/spider"))?;
//! ```

pub mod content;
pub mod engine;
pub mod error;
pub mod executor;
pub mod inode;
pub mod ops;
pub mod options;
pub mod path;
pub mod registry;
pub mod stats;
pub mod tree;

#[cfg(feature = "fuse")]
pub mod fuse;

pub use content::{render_hits, ContentProvider, Provisioner, SearchHit, StaticContentProvider};
pub use engine::TreeEngine;
pub use error::{VfsError, VfsResult};
pub use executor::{AsyncExecutor, ExecutorConfig, ExecutorError};
pub use inode::{EntryKind, MAX_NAME_LEN};
pub use ops::{FileAttrs, FsOperations};
pub use options::{KernelCacheOptions, OwnerOptions, ProvisionOptions, VfsOptions};
pub use registry::{PathRegistry, ROOT_INO};
pub use stats::TreeStats;
pub use tree::Tree;

#[cfg(feature = "fuse")]
pub use fuse::{mount, spawn_mount, DirSpiderFs};
