//! Common error types for the overlay mount manager.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`OverlayError`].
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Errors produced by the mount lifecycle.
#[derive(Error, Diagnostic, Debug)]
pub enum OverlayError {
    /// A required field is missing or invalid.
    #[error("Validation failed: {message}")]
    #[diagnostic(code(overlay::validation))]
    Validation {
        /// What was wrong.
        message: String,
    },

    /// The target path is already a mount point.
    #[error("Target is already mounted: {}", target.display())]
    #[diagnostic(
        code(overlay::mount::conflict),
        help("Unmount the existing mount first, or pick a different --target")
    )]
    Conflict {
        /// The conflicting mount point.
        target: PathBuf,
    },

    /// Creating or re-owning a directory failed.
    #[error("Failed {operation} {}: {source}", path.display())]
    #[diagnostic(code(overlay::filesystem))]
    Filesystem {
        /// The attempted operation (e.g. "creating", "owning").
        operation: &'static str,
        /// The path being operated on.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The overlay mount syscall failed.
    #[error("Mounting overlay on {} failed: {source}", target.display())]
    #[diagnostic(
        code(overlay::mount::failed),
        help("Mounting overlayfs requires CAP_SYS_ADMIN (run as root or install setuid)")
    )]
    Mount {
        /// The mount point.
        target: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The unmount syscall failed.
    #[error("Unmounting {} failed: {source}", target.display())]
    #[diagnostic(code(overlay::unmount::failed))]
    Unmount {
        /// The mount point.
        target: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Unmount was requested for an empty path.
    #[error("Mount target is empty")]
    #[diagnostic(code(overlay::unmount::empty_target))]
    EmptyTarget,

    /// No record with this id is registered.
    #[error("Mount not found: {id}")]
    #[diagnostic(code(overlay::mount::not_found))]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// A mount table line could not be decoded.
    #[error("Malformed mount table line {line:?}: {reason}")]
    #[diagnostic(code(overlay::mountinfo::parse))]
    Parse {
        /// The offending line.
        line: String,
        /// Why it was rejected.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(overlay::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(overlay::serialization))]
    Serialization(String),

    /// Feature not supported on this platform.
    #[error("Feature not supported: {feature}")]
    #[diagnostic(code(overlay::unsupported), help("OverlayFS is only available on Linux"))]
    Unsupported {
        /// The unsupported feature.
        feature: String,
    },
}

impl From<serde_json::Error> for OverlayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl OverlayError {
    /// Wrap an I/O failure on `path` as a [`OverlayError::Filesystem`].
    pub fn filesystem(
        operation: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Filesystem {
            operation,
            path,
            source,
        }
    }
}
