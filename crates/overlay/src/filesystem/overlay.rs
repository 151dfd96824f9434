//! OverlayFS attach and detach.

use std::path::Path;

use overlay_common::{MountRecord, OverlayResult};
#[cfg(target_os = "linux")]
use overlay_common::OverlayError;

/// Filesystem type passed to mount(2).
pub const OVERLAY_FSTYPE: &str = "overlay";

/// Overlay driver options for `record`.
///
/// Key names and their order are fixed:
/// `lowerdir=<source>,workdir=<work>,upperdir=<upper>`.
///
/// Paths are expected to have passed [`check_option_paths`].
#[must_use]
pub fn options_string(record: &MountRecord) -> String {
    format!(
        "lowerdir={},workdir={},upperdir={}",
        record.source.display(),
        record.work.display(),
        record.upper.display()
    )
}

/// Reject layer paths the overlay option string cannot carry verbatim.
///
/// The kernel splits options on `,` and lower layers on `:`, and treats `\`
/// as an escape, so none of these may appear in `source`, `upper` or `work`.
/// Paths must also be valid UTF-8.
///
/// # Errors
///
/// Returns [`overlay_common::OverlayError::Validation`] naming the first
/// offending path.
pub fn check_option_paths(record: &MountRecord) -> OverlayResult<()> {
    for (name, path) in [
        ("source", &record.source),
        ("upper", &record.upper),
        ("work", &record.work),
    ] {
        let reason = match path.to_str() {
            None => Some("is not valid UTF-8"),
            Some(s) if s.contains([',', ':', '\\']) => Some("contains ',', ':' or '\\'"),
            Some(_) => None,
        };
        if let Some(reason) = reason {
            return Err(overlay_common::OverlayError::Validation {
                message: format!("{name} path {:?} {reason}", path.display()),
            });
        }
    }
    Ok(())
}

/// Mount the overlay described by `record` on `record.target`.
///
/// # Errors
///
/// Returns [`OverlayError::Validation`] if a layer path cannot be expressed
/// as an option, and [`OverlayError::Mount`] carrying the errno on failure.
#[cfg(target_os = "linux")]
pub fn mount(record: &MountRecord) -> OverlayResult<()> {
    use rustix::mount::{MountFlags, mount};
    use std::ffi::CString;

    check_option_paths(record)?;
    let options = options_string(record);

    tracing::debug!(
        id = %record.id,
        merge = %record.merge.display(),
        target = %record.target.display(),
        options = %options,
        "Mounting overlayfs"
    );

    let options_c = CString::new(options).map_err(|_| OverlayError::Validation {
        message: "overlay options contain a NUL byte".to_string(),
    })?;

    mount(
        record.merge.as_path(),
        record.target.as_path(),
        OVERLAY_FSTYPE,
        MountFlags::empty(),
        options_c.as_c_str(),
    )
    .map_err(|e| OverlayError::Mount {
        target: record.target.clone(),
        source: e.into(),
    })?;

    tracing::info!(id = %record.id, target = %record.target.display(), "OverlayFS mounted");
    Ok(())
}

/// Overlay mounts need Linux.
///
/// # Errors
///
/// Always returns [`overlay_common::OverlayError::Unsupported`].
#[cfg(not(target_os = "linux"))]
pub fn mount(_record: &MountRecord) -> OverlayResult<()> {
    Err(overlay_common::OverlayError::Unsupported {
        feature: "overlayfs".to_string(),
    })
}

/// Unmount whatever is mounted on `target`.
///
/// # Errors
///
/// Returns [`OverlayError::EmptyTarget`] for an empty path without touching
/// the kernel, and [`OverlayError::Unmount`] if umount(2) fails.
#[cfg(target_os = "linux")]
pub fn unmount(target: &Path) -> OverlayResult<()> {
    use rustix::mount::{UnmountFlags, unmount};

    if target.as_os_str().is_empty() {
        return Err(OverlayError::EmptyTarget);
    }

    tracing::debug!(target = %target.display(), "Unmounting overlayfs");

    unmount(target, UnmountFlags::empty()).map_err(|e| OverlayError::Unmount {
        target: target.to_path_buf(),
        source: e.into(),
    })?;

    tracing::info!(target = %target.display(), "OverlayFS unmounted");
    Ok(())
}

/// Overlay mounts need Linux.
///
/// # Errors
///
/// Returns [`overlay_common::OverlayError::EmptyTarget`] for an empty path
/// and [`overlay_common::OverlayError::Unsupported`] otherwise.
#[cfg(not(target_os = "linux"))]
pub fn unmount(target: &Path) -> OverlayResult<()> {
    if target.as_os_str().is_empty() {
        return Err(overlay_common::OverlayError::EmptyTarget);
    }
    Err(overlay_common::OverlayError::Unsupported {
        feature: "overlayfs".to_string(),
    })
}

/// Attaches and detaches overlay mounts.
pub trait Mounter {
    /// Mount `record` on its target.
    ///
    /// # Errors
    ///
    /// Implementation specific; the kernel implementation returns
    /// [`overlay_common::OverlayError::Mount`].
    fn mount(&self, record: &MountRecord) -> OverlayResult<()>;

    /// Unmount `target`.
    ///
    /// # Errors
    ///
    /// Implementation specific; the kernel implementation returns
    /// [`overlay_common::OverlayError::EmptyTarget`] or
    /// [`overlay_common::OverlayError::Unmount`].
    fn unmount(&self, target: &Path) -> OverlayResult<()>;
}

/// [`Mounter`] backed by mount(2)/umount(2).
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelMounter;

impl Mounter for KernelMounter {
    fn mount(&self, record: &MountRecord) -> OverlayResult<()> {
        mount(record)
    }

    fn unmount(&self, target: &Path) -> OverlayResult<()> {
        unmount(target)
    }
}
