//! Reader for the kernel mount table (`/proc/self/mountinfo`).
//!
//! From `Documentation/filesystems/proc.rst`:
//!
//! ```text
//! 36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue
//! (1)(2)(3)   (4)   (5)      (6)      (7)   (8) (9)   (10)         (11)
//! ```
//!
//! Field (7) repeats zero or more times, so fields (9) to (11) are read from
//! the end of the line.

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};

use overlay_common::{OverlayError, OverlayResult};

/// Mount table of the calling process's mount namespace.
pub const DEFAULT_MOUNT_TABLE: &str = "/proc/self/mountinfo";

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// Unique id of the mount (may be reused after unmount).
    pub mount_id: u32,
    /// Id of the parent mount.
    pub parent_id: u32,
    /// `major:minor` of the backing device.
    pub major_minor: String,
    /// Root of the mount within the filesystem.
    pub root: PathBuf,
    /// Mount point relative to the process root.
    pub mount_point: PathBuf,
    /// Per-mount options.
    pub mount_options: String,
    /// Tagged optional fields (`shared:X`, `master:X`, ...).
    pub optional_fields: Vec<String>,
    /// Filesystem type (`type[.subtype]`).
    pub filesystem_type: String,
    /// Filesystem specific source, or `none`.
    pub mount_source: String,
    /// Per-superblock options.
    pub super_options: String,
}

impl MountInfo {
    /// Parse a single mount table line.
    ///
    /// The kernel escapes whitespace and backslashes in paths but passes
    /// other bytes through, so `root` and `mount_point` are built from raw
    /// bytes rather than UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Parse`] if the line has fewer than 10 fields,
    /// non-numeric ids, or no `-` separator ahead of the last three fields.
    pub fn parse_line(line: impl AsRef<[u8]>) -> OverlayResult<Self> {
        let line = line.as_ref();
        let fail = |reason: String| OverlayError::Parse {
            line: String::from_utf8_lossy(line).into_owned(),
            reason,
        };

        let fields: Vec<&[u8]> = line
            .split(u8::is_ascii_whitespace)
            .filter(|field| !field.is_empty())
            .collect();
        if fields.len() < 10 {
            return Err(fail(format!(
                "expected at least 10 fields, only got {}",
                fields.len()
            )));
        }

        let tail = fields.len() - 3;
        if fields[tail - 1] != b"-" {
            return Err(fail(
                "missing '-' separator before filesystem type".to_string(),
            ));
        }

        let number = |field: &[u8], what: &str| {
            std::str::from_utf8(field)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| fail(format!("invalid {what} {:?}", text(field))))
        };

        Ok(Self {
            mount_id: number(fields[0], "mount id")?,
            parent_id: number(fields[1], "parent id")?,
            major_minor: text(fields[2]),
            root: path(fields[3]),
            mount_point: path(fields[4]),
            mount_options: text(fields[5]),
            optional_fields: fields[6..tail - 1].iter().map(|f| text(f)).collect(),
            filesystem_type: text(fields[tail]),
            mount_source: text(fields[tail + 1]),
            super_options: text(fields[tail + 2]),
        })
    }
}

fn text(field: &[u8]) -> String {
    String::from_utf8_lossy(field).into_owned()
}

fn path(field: &[u8]) -> PathBuf {
    PathBuf::from(OsString::from_vec(unescape(field)))
}

/// Decode the kernel's octal escapes (`\040` for space and friends).
fn unescape(field: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(field.len());
    let mut i = 0;
    while i < field.len() {
        if field[i] == b'\\' && i + 3 < field.len() {
            let digits = &field[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(field[i]);
        i += 1;
    }
    out
}

/// Handle on a mount table file.
#[derive(Debug, Clone)]
pub struct MountTable {
    path: PathBuf,
}

impl MountTable {
    /// The current process's mount table.
    #[must_use]
    pub fn new() -> Self {
        Self::at(DEFAULT_MOUNT_TABLE)
    }

    /// A mount table read from `path` (another pid, or a fixture).
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path the table is read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse every entry.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Io`] if the table cannot be read and
    /// [`OverlayError::Parse`] for the first malformed line.
    pub fn list(&self) -> OverlayResult<Vec<MountInfo>> {
        let content = std::fs::read(&self.path)?;

        let mounts = content
            .split(|&b| b == b'\n')
            .filter(|line| !line.trim_ascii().is_empty())
            .map(MountInfo::parse_line)
            .collect::<OverlayResult<Vec<_>>>()?;

        tracing::debug!(
            table = %self.path.display(),
            count = mounts.len(),
            "Read mount table"
        );
        Ok(mounts)
    }

    /// Whether `path` is currently a mount point.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`MountTable::list`].
    pub fn is_mounted(&self, path: &Path) -> OverlayResult<bool> {
        let path = normalize(path);
        Ok(self.list()?.iter().any(|m| m.mount_point == path))
    }

    /// Fail with [`OverlayError::Conflict`] if `target` is already mounted.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Conflict`], or propagates read/parse errors.
    pub fn check_conflict(&self, target: &Path) -> OverlayResult<()> {
        if self.is_mounted(target)? {
            return Err(OverlayError::Conflict {
                target: target.to_path_buf(),
            });
        }
        Ok(())
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}

/// List every mount in the current namespace.
///
/// # Errors
///
/// See [`MountTable::list`].
pub fn list_mounts() -> OverlayResult<Vec<MountInfo>> {
    MountTable::new().list()
}

/// The kernel reports canonical paths; resolve symlinks when the path exists.
fn normalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
