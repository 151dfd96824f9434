//! Directory provisioning for mount records.

use std::fs::DirBuilder;
use std::io::ErrorKind;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

use overlay_common::{MountRecord, OverlayError, OverlayResult};

use crate::security::Credentials;

/// Default permission bits for per-mount directories.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Creates the directories a [`MountRecord`] refers to.
///
/// Every directory created while elevated is immediately handed back to the
/// real identity, so a failure part way through leaves as little root-owned
/// residue as possible. Nothing is rolled back on failure.
#[derive(Debug, Clone, Copy)]
pub struct Provisioner {
    credentials: Credentials,
}

impl Provisioner {
    /// Create a provisioner acting under `credentials`.
    #[must_use]
    pub const fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Ensure source, target, upper, work and merge exist.
    ///
    /// Safe to call repeatedly: existing directories are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Validation`] if a path is not absolute and
    /// [`OverlayError::Filesystem`] if creating or re-owning fails.
    pub fn prepare(&self, record: &MountRecord, mode: u32) -> OverlayResult<()> {
        if let Some(relative) = record
            .directories()
            .into_iter()
            .find(|p| !p.is_absolute())
        {
            return Err(OverlayError::Validation {
                message: format!(
                    "mount {} refers to non-absolute path {:?}",
                    record.id,
                    relative.display()
                ),
            });
        }

        for dir in record.directories() {
            self.ensure_dir(dir, mode)?;
        }

        if let Some(mount_dir) = record.upper.parent() {
            self.credentials.reown(mount_dir)?;
        }

        tracing::debug!(id = %record.id, "Provisioned mount directories");
        Ok(())
    }

    /// Create `path` and any missing ancestors, re-owning each one as it
    /// is created.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Filesystem`] on failure.
    pub fn ensure_dir(&self, path: &Path, mode: u32) -> OverlayResult<()> {
        let missing: Vec<&Path> = path
            .ancestors()
            .take_while(|dir| !dir.as_os_str().is_empty() && !dir.exists())
            .collect();

        for dir in missing.into_iter().rev() {
            match DirBuilder::new().mode(mode).create(dir) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => continue,
                Err(e) => return Err(OverlayError::filesystem("creating", dir)(e)),
            }
            tracing::debug!(
                path = %dir.display(),
                mode = %format!("{mode:o}"),
                "Created directory"
            );

            self.credentials.reown(dir)?;
        }

        Ok(())
    }
}
