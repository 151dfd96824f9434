//! Runtime configuration.

use std::path::PathBuf;

use overlay_common::OverlayPaths;

use crate::filesystem::{DEFAULT_DIR_MODE, mountinfo::DEFAULT_MOUNT_TABLE};
use crate::runtime::registry::DEFAULT_STATE_MODE;

/// Runtime configuration options.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Registry layout.
    pub paths: OverlayPaths,
    /// Mode for the registry root and `mounts/`.
    pub state_mode: u32,
    /// Mode for per-mount directories.
    pub dir_mode: u32,
    /// Mount table consulted for conflicts.
    pub mount_table: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            paths: OverlayPaths::new(),
            state_mode: DEFAULT_STATE_MODE,
            dir_mode: DEFAULT_DIR_MODE,
            mount_table: PathBuf::from(DEFAULT_MOUNT_TABLE),
        }
    }
}

impl RuntimeConfig {
    /// Set the registry root.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.paths = OverlayPaths::with_root(root);
        self
    }

    /// Set the mode for per-mount directories.
    #[must_use]
    pub const fn with_dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// Read mounts from `path` instead of `/proc/self/mountinfo`.
    #[must_use]
    pub fn with_mount_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.mount_table = path.into();
        self
    }
}
