//! The mount record: one tracked overlay instance.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::id::MountId;
use crate::paths::OverlayPaths;

/// Describes one overlay mount created by this tool.
///
/// `upper`, `work` and `merge` always live under `<root>/mounts/<id>/`.
/// `target` does too unless the caller overrode it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountRecord {
    /// Unique, immutable identifier.
    pub id: MountId,
    /// Read-only lower directory.
    pub source: PathBuf,
    /// Mount point exposing the merged view.
    pub target: PathBuf,
    /// Writable upper directory.
    pub upper: PathBuf,
    /// Overlay scratch directory.
    pub work: PathBuf,
    /// Source argument handed to the overlay driver.
    pub merge: PathBuf,
}

impl MountRecord {
    /// Derive a record for `id` laid out under `paths`, with no source yet.
    #[must_use]
    pub fn new(paths: &OverlayPaths, id: MountId) -> Self {
        let key = id.as_str();
        Self {
            target: paths.mount_target(key),
            upper: paths.mount_upper(key),
            work: paths.mount_work(key),
            merge: paths.mount_merge(key),
            source: PathBuf::new(),
            id,
        }
    }

    /// Set the lower directory.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    /// Override the mount point.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = target.into();
        self
    }

    /// Every directory the record refers to, in provisioning order.
    #[must_use]
    pub fn directories(&self) -> [&Path; 5] {
        [
            &self.source,
            &self.target,
            &self.upper,
            &self.work,
            &self.merge,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_paths_from_root() {
        let paths = OverlayPaths::with_root("/tmp/r");
        let record = MountRecord::new(&paths, MountId::new_unchecked("U1")).with_source("/tmp/lower");

        assert_eq!(record.target, PathBuf::from("/tmp/r/mounts/U1/rootfs"));
        assert_eq!(record.upper, PathBuf::from("/tmp/r/mounts/U1/upper"));
        assert_eq!(record.work, PathBuf::from("/tmp/r/mounts/U1/work"));
        assert_eq!(record.merge, PathBuf::from("/tmp/r/mounts/U1/merge"));
        assert_eq!(record.source, PathBuf::from("/tmp/lower"));
    }

    #[test]
    fn target_override() {
        let paths = OverlayPaths::with_root("/tmp/r");
        let record = MountRecord::new(&paths, MountId::new_unchecked("U1")).with_target("/mnt/view");
        assert_eq!(record.target, PathBuf::from("/mnt/view"));
        assert_eq!(record.upper, PathBuf::from("/tmp/r/mounts/U1/upper"));
    }

    #[test]
    fn serialized_field_names() {
        let paths = OverlayPaths::with_root("/tmp/r");
        let record = MountRecord::new(&paths, MountId::new_unchecked("U1")).with_source("/tmp/lower");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["id"], "U1");
        assert_eq!(value["source"], "/tmp/lower");
        assert_eq!(value["target"], "/tmp/r/mounts/U1/rootfs");
        assert_eq!(value["merge"], "/tmp/r/mounts/U1/merge");

        let back: MountRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
