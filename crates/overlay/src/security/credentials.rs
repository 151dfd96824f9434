//! Real vs. effective process identity.
//!
//! When the binary is installed setuid-root the effective uid is 0 while the
//! real uid is the invoking user. Everything created in that state must be
//! handed back to the real identity.

use std::path::Path;

use overlay_common::{OverlayError, OverlayResult};
use rustix::process::{Gid, Uid};

/// A uid/gid pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// User id.
    pub uid: Uid,
    /// Group id.
    pub gid: Gid,
}

impl Identity {
    /// Create an identity.
    #[must_use]
    pub const fn new(uid: Uid, gid: Gid) -> Self {
        Self { uid, gid }
    }

    /// The superuser.
    #[must_use]
    pub const fn root() -> Self {
        Self::new(Uid::ROOT, Gid::ROOT)
    }
}

/// The identities a process runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    /// Invoking identity.
    pub real: Identity,
    /// Identity used for permission checks.
    pub effective: Identity,
}

impl Credentials {
    /// Build credentials explicitly (useful to simulate a setuid run).
    #[must_use]
    pub const fn new(real: Identity, effective: Identity) -> Self {
        Self { real, effective }
    }

    /// Read the credentials of the current process.
    #[must_use]
    pub fn current() -> Self {
        use rustix::process::{getegid, geteuid, getgid, getuid};

        Self {
            real: Identity::new(getuid(), getgid()),
            effective: Identity::new(geteuid(), getegid()),
        }
    }

    /// Whether the process is running with an elevated effective identity.
    #[must_use]
    pub fn is_elevated(&self) -> bool {
        self.real != self.effective
    }

    /// Give `path` back to the real identity when elevated; no-op otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Filesystem`] if the chown fails.
    pub fn reown(&self, path: &Path) -> OverlayResult<()> {
        if !self.is_elevated() {
            return Ok(());
        }

        rustix::fs::chown(path, Some(self.real.uid), Some(self.real.gid))
            .map_err(|e| OverlayError::filesystem("owning", path)(e.into()))?;

        tracing::debug!(
            path = %path.display(),
            uid = self.real.uid.as_raw(),
            gid = self.real.gid.as_raw(),
            "Reassigned ownership to invoking user"
        );
        Ok(())
    }
}
