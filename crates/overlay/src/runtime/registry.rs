//! Mount registry persistence.
//!
//! The registry is a cache of reality: a record is only live while its
//! `<root>/mounts/<id>` subtree exists, and reading the registry prunes
//! every record whose subtree has disappeared.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};

use overlay_common::{MountId, MountRecord, OverlayError, OverlayPaths, OverlayResult};
use serde::{Deserialize, Serialize};

use crate::filesystem::Provisioner;
use crate::security::Credentials;

/// Default permission bits for the registry root and `mounts/`.
pub const DEFAULT_STATE_MODE: u32 = 0o700;

/// Registry contents keyed by mount id.
pub type MountMap = BTreeMap<String, MountRecord>;

/// On-disk shape of `config.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    mounts: MountMap,
}

/// Exclusive advisory lock on the registry document, released on drop.
struct DocumentLock {
    _file: File,
}

/// Durable collection of [`MountRecord`]s under a registry root.
#[derive(Debug, Clone)]
pub struct Registry {
    paths: OverlayPaths,
    credentials: Credentials,
}

impl Registry {
    /// Open the registry at `paths`, creating the root and `mounts/` with
    /// `mode` if needed. Idempotent.
    ///
    /// A relative root is resolved against the current directory, so every
    /// derived record path is absolute.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Validation`] for an unusable root and
    /// [`OverlayError::Filesystem`] if a directory cannot be created or
    /// re-owned.
    pub fn initialize(
        paths: OverlayPaths,
        credentials: Credentials,
        mode: u32,
    ) -> OverlayResult<Self> {
        let root = std::path::absolute(&paths.root).map_err(|e| OverlayError::Validation {
            message: format!("invalid registry root {:?}: {e}", paths.root.display()),
        })?;
        let paths = OverlayPaths::with_root(root);

        let provisioner = Provisioner::new(credentials);
        for dir in [paths.root.clone(), paths.mounts()] {
            provisioner.ensure_dir(&dir, mode)?;
            credentials.reown(&dir)?;
        }

        tracing::debug!(root = %paths.root.display(), "Initialized registry");
        Ok(Self { paths, credentials })
    }

    /// Registry layout.
    #[must_use]
    pub const fn paths(&self) -> &OverlayPaths {
        &self.paths
    }

    /// Build an unsaved record with a fresh id and derived paths.
    #[must_use]
    pub fn new_record(&self) -> MountRecord {
        MountRecord::new(&self.paths, MountId::generate())
    }

    /// Insert or replace `record`, rewriting the whole document.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Validation`] for an empty id, or any error
    /// reading or writing the document.
    pub fn save(&self, record: &MountRecord) -> OverlayResult<()> {
        if record.id.is_empty() {
            return Err(OverlayError::Validation {
                message: "mount record id must be set".to_string(),
            });
        }

        let _lock = self.lock()?;
        let mut document = self.read_document()?;
        document
            .mounts
            .insert(record.id.to_string(), record.clone());
        self.write_document(&document)?;

        tracing::debug!(id = %record.id, "Saved mount record");
        Ok(())
    }

    /// All live records, pruning (and persisting the removal of) any whose
    /// subtree no longer exists.
    ///
    /// # Errors
    ///
    /// Returns any error reading or writing the document.
    pub fn list(&self) -> OverlayResult<MountMap> {
        let _lock = self.lock()?;
        let mut document = self.read_document()?;

        let before = document.mounts.len();
        document.mounts.retain(|id, _| {
            let live = self.paths.mount(id).exists();
            if !live {
                tracing::warn!(id = %id, "Pruning mount whose directories are gone");
            }
            live
        });

        if document.mounts.len() != before {
            self.write_document(&document)?;
        }

        Ok(document.mounts)
    }

    /// Look up a live record by id.
    ///
    /// # Errors
    ///
    /// See [`Registry::list`].
    pub fn get(&self, id: &str) -> OverlayResult<Option<MountRecord>> {
        Ok(self.list()?.remove(id))
    }

    /// Delete `<root>/mounts/<id>` recursively.
    ///
    /// Does not unmount anything; the document entry disappears on the next
    /// [`Registry::list`].
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Validation`] for an id that is not a plain
    /// directory name, or [`OverlayError::Filesystem`] if removal fails.
    pub fn remove(&self, id: &str) -> OverlayResult<()> {
        let id = MountId::new(id)?;
        let dir = self.paths.mount(id.as_str());

        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(OverlayError::filesystem("removing", &dir)(e)),
        }

        tracing::info!(id = %id, path = %dir.display(), "Removed mount directories");
        Ok(())
    }

    fn lock(&self) -> OverlayResult<DocumentLock> {
        use rustix::fs::{FlockOperation, flock};

        let path = self.paths.lock();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(OverlayError::filesystem("opening", &path))?;
        self.credentials.reown(&path)?;

        flock(&file, FlockOperation::LockExclusive)
            .map_err(|e| OverlayError::filesystem("locking", &path)(e.into()))?;

        Ok(DocumentLock { _file: file })
    }

    /// Read the document, writing an empty one if it does not exist yet.
    fn read_document(&self) -> OverlayResult<Document> {
        let path = self.paths.config();

        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let document = Document::default();
                self.write_document(&document)?;
                return Ok(document);
            }
            Err(e) => return Err(e.into()),
        };

        let document: Document = serde_json::from_str(&json)?;
        tracing::debug!(
            path = %path.display(),
            count = document.mounts.len(),
            "Loaded registry document"
        );
        Ok(document)
    }

    /// Replace the document atomically (write a temp file, then rename).
    fn write_document(&self, document: &Document) -> OverlayResult<()> {
        let path = self.paths.config();
        let json = serde_json::to_string_pretty(document)?;

        let mut temp = tempfile::NamedTempFile::new_in(&self.paths.root)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        self.credentials.reown(temp.path())?;
        temp.persist(&path).map_err(|e| e.error)?;

        tracing::debug!(
            path = %path.display(),
            count = document.mounts.len(),
            "Wrote registry document"
        );
        Ok(())
    }
}
