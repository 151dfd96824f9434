//! Standard filesystem paths for the mount registry.

use std::path::PathBuf;

use once_cell::sync::Lazy;

/// Default registry root (`$OVERLAY_ROOT`, else `~/.local/share/overlay`).
pub static OVERLAY_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var_os("OVERLAY_ROOT").map_or_else(
        || {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("/var/lib"))
                .join("overlay")
        },
        PathBuf::from,
    )
});

/// Layout of a registry root on disk.
///
/// ```text
/// <root>/config.json
/// <root>/config.lock
/// <root>/mounts/<id>/{rootfs,upper,work,merge}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayPaths {
    /// Registry root directory.
    pub root: PathBuf,
}

impl OverlayPaths {
    /// Create paths with the default root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths with a custom root directory.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Persisted registry document.
    #[must_use]
    pub fn config(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Advisory lock guarding the registry document.
    #[must_use]
    pub fn lock(&self) -> PathBuf {
        self.root.join("config.lock")
    }

    /// Directory holding every per-mount subtree.
    #[must_use]
    pub fn mounts(&self) -> PathBuf {
        self.root.join("mounts")
    }

    /// Subtree for a specific mount.
    #[must_use]
    pub fn mount(&self, id: &str) -> PathBuf {
        self.mounts().join(id)
    }

    /// Default mount point (merged view) of a mount.
    #[must_use]
    pub fn mount_target(&self, id: &str) -> PathBuf {
        self.mount(id).join("rootfs")
    }

    /// Upper (writable) directory of a mount.
    #[must_use]
    pub fn mount_upper(&self, id: &str) -> PathBuf {
        self.mount(id).join("upper")
    }

    /// Work directory of a mount.
    #[must_use]
    pub fn mount_work(&self, id: &str) -> PathBuf {
        self.mount(id).join("work")
    }

    /// Directory passed as the mount source to the overlay driver.
    #[must_use]
    pub fn mount_merge(&self, id: &str) -> PathBuf {
        self.mount(id).join("merge")
    }
}

impl Default for OverlayPaths {
    fn default() -> Self {
        Self {
            root: OVERLAY_ROOT.clone(),
        }
    }
}
