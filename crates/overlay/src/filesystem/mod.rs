//! Filesystem operations for overlay mounts.
//!
//! This module handles:
//! - Reading the kernel mount table
//! - Provisioning per-mount directories
//! - OverlayFS mount and unmount

pub mod mountinfo;
mod overlay;
mod provision;

pub use mountinfo::{MountInfo, MountTable, list_mounts};
pub use overlay::{
    KernelMounter, Mounter, OVERLAY_FSTYPE, check_option_paths, mount, options_string, unmount,
};
pub use provision::{DEFAULT_DIR_MODE, Provisioner};
