//! Integration tests for the mount lifecycle, with the kernel mount replaced
//! by a recording fake.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use overlay::filesystem::Mounter;
use overlay::runtime::{OverlayManager, RuntimeConfig};
use overlay::security::Credentials;
use overlay_common::{MountRecord, OverlayError, OverlayResult};
use tempfile::TempDir;

const BASE_TABLE: &str = include_str!("fixtures/mountinfo");

#[derive(Default)]
struct RecordingMounter {
    mounted: RefCell<Vec<PathBuf>>,
    unmounted: RefCell<Vec<PathBuf>>,
    refuse: bool,
}

impl Mounter for RecordingMounter {
    fn mount(&self, record: &MountRecord) -> OverlayResult<()> {
        if self.refuse {
            return Err(OverlayError::Mount {
                target: record.target.clone(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            });
        }
        self.mounted.borrow_mut().push(record.target.clone());
        Ok(())
    }

    fn unmount(&self, target: &Path) -> OverlayResult<()> {
        if target.as_os_str().is_empty() {
            return Err(OverlayError::EmptyTarget);
        }
        self.unmounted.borrow_mut().push(target.to_path_buf());
        Ok(())
    }
}

struct Fixture {
    temp: TempDir,
    table: PathBuf,
    lower: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let table = temp.path().join("mountinfo");
        std::fs::write(&table, BASE_TABLE).unwrap();

        let lower = temp.path().join("lower");
        std::fs::create_dir(&lower).unwrap();
        std::fs::write(lower.join("a"), b"from lower").unwrap();

        Self { temp, table, lower }
    }

    fn root(&self) -> PathBuf {
        self.temp.path().join("r")
    }

    fn manager(&self, mounter: RecordingMounter) -> OverlayManager<RecordingMounter> {
        let config = RuntimeConfig::default()
            .with_root(self.root())
            .with_mount_table(&self.table);
        let me = Credentials::current().real;
        OverlayManager::with_mounter(config, Credentials::new(me, me), mounter).unwrap()
    }

    /// Pretend `target` shows up in the kernel mount table.
    fn add_mount(&self, target: &Path) {
        let target = std::fs::canonicalize(target).unwrap_or_else(|_| target.to_path_buf());
        let line = format!(
            "99 25 0:77 / {} rw,relatime - overlay overlay rw,lowerdir=/x,upperdir=/y,workdir=/z\n",
            target.display()
        );
        let mut table = std::fs::read_to_string(&self.table).unwrap();
        table.push_str(&line);
        std::fs::write(&self.table, table).unwrap();
    }
}

#[test_log::test]
fn create_provisions_mounts_and_saves() {
    let fixture = Fixture::new();
    let manager = fixture.manager(RecordingMounter::default());

    let record = manager.create(&fixture.lower, None).unwrap();

    assert_eq!(record.source, fixture.lower);
    assert_eq!(
        record.target,
        fixture.root().join("mounts").join(record.id.as_str()).join("rootfs")
    );
    for dir in record.directories() {
        assert!(dir.is_dir(), "{} missing", dir.display());
    }
    assert_eq!(*manager.mounter().mounted.borrow(), vec![record.target.clone()]);

    let mounts = manager.list().unwrap();
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[record.id.as_str()], record);
}

#[test]
fn create_honours_target_override() {
    let fixture = Fixture::new();
    let manager = fixture.manager(RecordingMounter::default());
    let target = fixture.temp.path().join("view");

    let record = manager.create(&fixture.lower, Some(&target)).unwrap();

    assert_eq!(record.target, target);
    assert!(target.is_dir());
    assert!(record.upper.starts_with(fixture.root().join("mounts")));
}

#[test]
fn conflicting_target_touches_nothing() {
    let fixture = Fixture::new();
    let target = fixture.temp.path().join("busy");
    fixture.add_mount(&target);
    let manager = fixture.manager(RecordingMounter::default());

    let err = manager.create(&fixture.lower, Some(&target)).unwrap_err();

    assert!(matches!(err, OverlayError::Conflict { .. }));
    assert!(!target.exists());
    assert!(manager.mounter().mounted.borrow().is_empty());
    assert_eq!(
        std::fs::read_dir(fixture.root().join("mounts")).unwrap().count(),
        0
    );
    assert!(manager.list().unwrap().is_empty());
}

#[test]
fn target_of_live_record_is_not_reused() {
    let fixture = Fixture::new();
    let manager = fixture.manager(RecordingMounter::default());
    let target = fixture.temp.path().join("view");

    let first = manager.create(&fixture.lower, Some(&target)).unwrap();
    let err = manager.create(&fixture.lower, Some(&target)).unwrap_err();

    assert!(matches!(err, OverlayError::Conflict { .. }));
    assert_eq!(manager.mounter().mounted.borrow().len(), 1);
    let mounts = manager.list().unwrap();
    assert_eq!(mounts.len(), 1);
    assert!(mounts.contains_key(first.id.as_str()));

    // Once the first record is gone the target is free again.
    manager.remove(first.id.as_str(), false).unwrap();
    manager.create(&fixture.lower, Some(&target)).unwrap();
}

#[test]
fn source_with_layer_separator_is_rejected() {
    let fixture = Fixture::new();
    let manager = fixture.manager(RecordingMounter::default());
    let source = fixture.temp.path().join("a:b");
    std::fs::create_dir(&source).unwrap();

    let err = manager.create(&source, None).unwrap_err();

    assert!(matches!(err, OverlayError::Validation { .. }));
    assert!(manager.mounter().mounted.borrow().is_empty());
    assert_eq!(
        std::fs::read_dir(fixture.root().join("mounts")).unwrap().count(),
        0
    );
}

#[test]
fn failed_mount_is_not_saved() {
    let fixture = Fixture::new();
    let manager = fixture.manager(RecordingMounter {
        refuse: true,
        ..RecordingMounter::default()
    });

    let err = manager.create(&fixture.lower, None).unwrap_err();

    assert!(matches!(err, OverlayError::Mount { .. }));
    // Directories stay behind, but the registry never claims the mount.
    assert_eq!(
        std::fs::read_dir(fixture.root().join("mounts")).unwrap().count(),
        1
    );
    assert!(manager.list().unwrap().is_empty());
}

#[test]
fn missing_source_is_rejected() {
    let fixture = Fixture::new();
    let manager = fixture.manager(RecordingMounter::default());

    let err = manager
        .create(&fixture.temp.path().join("nope"), None)
        .unwrap_err();

    assert!(matches!(err, OverlayError::Validation { .. }));
    assert!(manager.mounter().mounted.borrow().is_empty());
}

#[test]
fn remove_deletes_record_and_directories() {
    let fixture = Fixture::new();
    let manager = fixture.manager(RecordingMounter::default());
    let record = manager.create(&fixture.lower, None).unwrap();

    manager.remove(record.id.as_str(), false).unwrap();

    assert!(!record.upper.exists());
    assert!(manager.list().unwrap().is_empty());
    assert!(fixture.lower.join("a").exists());
    let raw = std::fs::read_to_string(fixture.root().join("config.json")).unwrap();
    assert!(!raw.contains(record.id.as_str()));
}

#[test]
fn remove_refuses_mounted_target_without_force() {
    let fixture = Fixture::new();
    let manager = fixture.manager(RecordingMounter::default());
    let record = manager.create(&fixture.lower, None).unwrap();
    fixture.add_mount(&record.target);

    let err = manager.remove(record.id.as_str(), false).unwrap_err();
    assert!(matches!(err, OverlayError::Conflict { .. }));
    assert!(record.upper.exists());

    manager.remove(record.id.as_str(), true).unwrap();
    assert_eq!(*manager.mounter().unmounted.borrow(), vec![record.target.clone()]);
    assert!(!record.upper.exists());
}

#[test]
fn remove_cleans_up_after_failed_mount() {
    let fixture = Fixture::new();
    let manager = fixture.manager(RecordingMounter {
        refuse: true,
        ..RecordingMounter::default()
    });
    manager.create(&fixture.lower, None).unwrap_err();

    let orphan = std::fs::read_dir(fixture.root().join("mounts"))
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .file_name();
    let id = orphan.to_str().unwrap();

    manager.remove(id, false).unwrap();

    assert!(!fixture.root().join("mounts").join(id).exists());
    assert!(manager.mounter().unmounted.borrow().is_empty());
    let err = manager.remove(id, false).unwrap_err();
    assert!(matches!(err, OverlayError::NotFound { .. }));
}

#[test]
fn remove_unknown_id() {
    let fixture = Fixture::new();
    let manager = fixture.manager(RecordingMounter::default());

    let err = manager.remove("does-not-exist", true).unwrap_err();
    assert!(matches!(err, OverlayError::NotFound { .. }));
}

#[test]
fn out_of_band_deletion_is_garbage_collected() {
    let fixture = Fixture::new();
    let manager = fixture.manager(RecordingMounter::default());
    let kept = manager.create(&fixture.lower, None).unwrap();
    let gone = manager.create(&fixture.lower, None).unwrap();

    std::fs::remove_dir_all(fixture.root().join("mounts").join(gone.id.as_str())).unwrap();

    let mounts = manager.list().unwrap();
    assert!(mounts.contains_key(kept.id.as_str()));
    assert!(!mounts.contains_key(gone.id.as_str()));
}

#[test]
fn unmount_empty_target() {
    let fixture = Fixture::new();
    let manager = fixture.manager(RecordingMounter::default());

    let err = manager.unmount(Path::new("")).unwrap_err();
    assert!(matches!(err, OverlayError::EmptyTarget));
    assert!(manager.mounter().unmounted.borrow().is_empty());
}
