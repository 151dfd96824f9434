//! Mount lifecycle orchestration.

use std::path::{Path, PathBuf};

use overlay_common::{MountId, MountRecord, OverlayError, OverlayResult};

use super::config::RuntimeConfig;
use super::registry::{MountMap, Registry};
use crate::filesystem::{KernelMounter, MountTable, Mounter, Provisioner, check_option_paths};
use crate::security::Credentials;

/// Creates, lists and tears down overlay mounts.
///
/// A mount goes through `new_record` → conflict check → `prepare` →
/// `mount` → `save`; the record is only persisted once the kernel mount
/// succeeded. Directories created before a failing step are left behind.
#[derive(Debug)]
pub struct OverlayManager<M = KernelMounter> {
    config: RuntimeConfig,
    registry: Registry,
    mount_table: MountTable,
    provisioner: Provisioner,
    mounter: M,
}

impl OverlayManager<KernelMounter> {
    /// Open the registry described by `config` and mount through the kernel.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be initialized.
    pub fn new(config: RuntimeConfig, credentials: Credentials) -> OverlayResult<Self> {
        Self::with_mounter(config, credentials, KernelMounter)
    }
}

impl<M: Mounter> OverlayManager<M> {
    /// Open the registry described by `config`, mounting through `mounter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be initialized.
    pub fn with_mounter(
        config: RuntimeConfig,
        credentials: Credentials,
        mounter: M,
    ) -> OverlayResult<Self> {
        let registry = Registry::initialize(config.paths.clone(), credentials, config.state_mode)?;

        Ok(Self {
            mount_table: MountTable::at(&config.mount_table),
            provisioner: Provisioner::new(credentials),
            registry,
            mounter,
            config,
        })
    }

    /// The underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The mount operator in use.
    #[must_use]
    pub const fn mounter(&self) -> &M {
        &self.mounter
    }

    /// Overlay `source` and register the result.
    ///
    /// `target` defaults to `<root>/mounts/<id>/rootfs`.
    ///
    /// # Errors
    ///
    /// - [`OverlayError::Validation`] if `source` is not an existing directory
    ///   or a layer path cannot be passed to the kernel
    /// - [`OverlayError::Conflict`] if the target is already a mount point or
    ///   belongs to another live record
    /// - [`OverlayError::Filesystem`] if provisioning fails
    /// - [`OverlayError::Mount`] if the kernel refuses the mount
    pub fn create(&self, source: &Path, target: Option<&Path>) -> OverlayResult<MountRecord> {
        let source = absolute(source, "source")?;
        if !source.is_dir() {
            return Err(OverlayError::Validation {
                message: format!("source {} is not an existing directory", source.display()),
            });
        }

        let mut record = self.registry.new_record().with_source(source);
        if let Some(target) = target {
            record = record.with_target(absolute(target, "target")?);
        }

        check_option_paths(&record)?;
        self.mount_table.check_conflict(&record.target)?;
        if self
            .registry
            .list()?
            .values()
            .any(|other| other.target == record.target)
        {
            return Err(OverlayError::Conflict {
                target: record.target,
            });
        }

        self.provisioner.prepare(&record, self.config.dir_mode)?;
        if let Err(e) = self.mounter.mount(&record) {
            tracing::warn!(
                id = %record.id,
                path = %self.registry.paths().mount(record.id.as_str()).display(),
                "Mount failed, directories left behind"
            );
            return Err(e);
        }
        self.registry.save(&record)?;

        tracing::info!(
            id = %record.id,
            source = %record.source.display(),
            target = %record.target.display(),
            "Created overlay mount"
        );
        Ok(record)
    }

    /// All live records.
    ///
    /// # Errors
    ///
    /// See [`Registry::list`].
    pub fn list(&self) -> OverlayResult<MountMap> {
        self.registry.list()
    }

    /// Unmount `target`.
    ///
    /// # Errors
    ///
    /// See [`Mounter::unmount`].
    pub fn unmount(&self, target: &Path) -> OverlayResult<()> {
        self.mounter.unmount(target)
    }

    /// Delete the mount `id` and its directories.
    ///
    /// A target that is still mounted is unmounted first when `force` is set
    /// and rejected with [`OverlayError::Conflict`] otherwise. An id with no
    /// record but a `mounts/<id>` directory (left by a failed mount) is
    /// cleaned up as well.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::NotFound`] for an unknown id, or any error
    /// from unmounting or removal.
    pub fn remove(&self, id: &str, force: bool) -> OverlayResult<()> {
        let target = match self.registry.get(id)? {
            Some(record) => record.target,
            None => {
                let id = MountId::new(id)?;
                if !self.registry.paths().mount(id.as_str()).is_dir() {
                    return Err(OverlayError::NotFound { id: id.to_string() });
                }
                tracing::debug!(id = %id, "Removing unrecorded mount directories");
                self.registry.paths().mount_target(id.as_str())
            }
        };

        if self.mount_table.is_mounted(&target)? {
            if !force {
                return Err(OverlayError::Conflict { target });
            }
            self.mounter.unmount(&target)?;
        }

        self.registry.remove(id)?;
        self.registry.list()?;
        Ok(())
    }
}

fn absolute(path: &Path, what: &str) -> OverlayResult<PathBuf> {
    std::path::absolute(path).map_err(|e| OverlayError::Validation {
        message: format!("invalid {what} path {:?}: {e}", path.display()),
    })
}
