//! Error types for the VFS crate.

use thiserror::Error;

/// Errors that can occur during VFS operations.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Missing path component or missing entry.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Name collision in the destination directory.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Path segment exceeds the name bound.
    #[error("Name too long: {0}")]
    NameTooLong(String),

    /// Unsupported flags or operation shape.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Content growth could not be satisfied.
    #[error("Out of memory growing content to {requested} bytes")]
    OutOfMemory {
        /// Size the buffer was asked to grow to.
        requested: u64,
    },

    /// Content provider failed. Never escapes a tree operation.
    #[error("Content provider failed: {0}")]
    ProviderFailed(String),

    /// Mount operation failed.
    #[error("Mount failed: {0}")]
    MountFailed(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VfsError {
    /// Map this error onto the errno the kernel expects.
    pub fn errno(&self) -> i32 {
        match self {
            VfsError::NotFound(_) => libc::ENOENT,
            VfsError::AlreadyExists(_) => libc::EEXIST,
            VfsError::NameTooLong(_) => libc::ENAMETOOLONG,
            VfsError::InvalidArgument(_) => libc::EINVAL,
            VfsError::OutOfMemory { .. } => libc::ENOMEM,
            VfsError::ProviderFailed(_) | VfsError::MountFailed(_) => libc::EIO,
            VfsError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

/// Result alias used by tree operations.
pub type VfsResult<T> = Result<T, VfsError>;
