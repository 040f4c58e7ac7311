//! Tests for the JSON-file backup and user stores

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;

use pathxp::application::services::MigrationService;
use pathxp::domain::{ExperienceConfig, MigrationBackup, OldRealmConfig, RealmSystem, UserRecord};
use pathxp::infrastructure::stores::{JsonFileBackupStore, JsonFileUserStore};
use pathxp::infrastructure::traits::{BackupStore, FileSystem, RealFileSystem, UserStore};
use pathxp::util::testing::init_test_setup;

fn backup(id: &str, users: Vec<UserRecord>) -> MigrationBackup {
    MigrationBackup {
        migration_id: id.to_string(),
        created_at: Utc::now(),
        users,
    }
}

/// Real filesystem that counts reads and writes.
#[derive(Default)]
struct CountingFileSystem {
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl FileSystem for CountingFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        RealFileSystem.read_to_string(path)
    }
    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        RealFileSystem.write(path, content)
    }
    fn exists(&self, path: &Path) -> bool {
        RealFileSystem.exists(path)
    }
    fn is_file(&self, path: &Path) -> bool {
        RealFileSystem.is_file(path)
    }
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        RealFileSystem.create_dir_all(path)
    }
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        RealFileSystem.rename(from, to)
    }
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        RealFileSystem.remove_file(path)
    }
    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        RealFileSystem.list_files(dir)
    }
    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        RealFileSystem.ensure_parent(path)
    }
}

// ============================================================
// JsonFileBackupStore
// ============================================================

#[test]
fn given_missing_dir_when_putting_backup_then_creates_dir_and_file() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("nested").join("backups");
    let store = JsonFileBackupStore::new(Arc::new(RealFileSystem), &dir);
    let original = backup("migration_1_abc", vec![UserRecord::new("u1", 1500)]);

    store.put("migration_1_abc", &original).unwrap();

    assert!(dir.join("migration_1_abc.json").is_file());
    assert!(!dir.join("migration_1_abc.json.tmp").exists());
    assert_eq!(store.get("migration_1_abc").unwrap(), Some(original));
}

#[test]
fn given_stored_backups_when_listing_then_returns_ids_sorted() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let store = JsonFileBackupStore::new(Arc::new(RealFileSystem), temp.path());
    store.put("migration_2_b", &backup("migration_2_b", vec![])).unwrap();
    store.put("migration_1_a", &backup("migration_1_a", vec![])).unwrap();
    std::fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

    let ids = store.list().unwrap();

    assert_eq!(ids, vec!["migration_1_a", "migration_2_b"]);
}

#[test]
fn given_no_dir_when_listing_or_getting_then_empty() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let store = JsonFileBackupStore::new(Arc::new(RealFileSystem), temp.path().join("absent"));

    assert!(store.list().unwrap().is_empty());
    assert!(store.get("migration_1_a").unwrap().is_none());
    assert!(!store.delete("migration_1_a").unwrap());
}

#[test]
fn given_stored_backup_when_deleting_then_file_is_removed() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let store = JsonFileBackupStore::new(Arc::new(RealFileSystem), temp.path());
    store.put("m1", &backup("m1", vec![])).unwrap();

    assert!(store.delete("m1").unwrap());

    assert!(!temp.path().join("m1.json").exists());
    assert!(store.get("m1").unwrap().is_none());
}

#[test]
fn given_corrupt_backup_file_when_getting_then_invalid_data() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("m1.json"), "{ not json").unwrap();
    let store = JsonFileBackupStore::new(Arc::new(RealFileSystem), temp.path());

    let err = store.get("m1").unwrap_err();

    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

// ============================================================
// JsonFileUserStore
// ============================================================

#[test]
fn given_missing_file_when_loading_users_then_empty() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let store = JsonFileUserStore::new(Arc::new(RealFileSystem), temp.path().join("users.json"));

    assert!(store.load_all().unwrap().is_empty());
}

#[test]
fn given_existing_users_when_saving_then_upserts_by_id() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("users.json");
    let store = JsonFileUserStore::new(Arc::new(RealFileSystem), &path);
    store
        .save_all(&[UserRecord::new("u1", 10), UserRecord::new("u2", 20)])
        .unwrap();

    store
        .save(&UserRecord::new("u2", 25).with_completed(["n1"]))
        .unwrap();
    store.save(&UserRecord::new("u3", 30)).unwrap();

    let users = store.load_all().unwrap();
    assert_eq!(users.len(), 3);
    assert_eq!(users[1].experience, 25);
    assert_eq!(users[1].completed_nodes, vec!["n1".to_string()]);
    assert_eq!(users[2].user_id, "u3");
}

#[test]
fn given_saved_users_when_reading_file_then_uses_camel_case_fields() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("out").join("users.json");
    let store = JsonFileUserStore::new(Arc::new(RealFileSystem), &path);

    store.save_all(&[UserRecord::new("u1", 42)]).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("\"userId\""));
    assert!(content.contains("\"completedNodes\""));
}

#[test]
fn given_batch_of_users_when_save_many_then_reads_and_writes_file_once() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("users.json");
    RealFileSystem
        .write(
            &path,
            &serde_json::to_string(&[UserRecord::new("u0", 1), UserRecord::new("u1", 2)]).unwrap(),
        )
        .unwrap();
    let fs = Arc::new(CountingFileSystem::default());
    let store = JsonFileUserStore::new(fs.clone(), &path);
    let batch: Vec<UserRecord> = (1..200)
        .map(|i| UserRecord::new(format!("u{i}"), i * 10))
        .collect();

    store.save_many(&batch).unwrap();

    assert_eq!(fs.reads.load(Ordering::SeqCst), 1);
    assert_eq!(fs.writes.load(Ordering::SeqCst), 1);
    let users = store.load_all().unwrap();
    assert_eq!(users.len(), 200);
    assert_eq!((users[0].user_id.as_str(), users[0].experience), ("u0", 1));
    assert_eq!((users[1].user_id.as_str(), users[1].experience), ("u1", 10));
    assert_eq!(users[199].user_id, "u199");
}

#[test]
fn given_file_backed_users_when_rollback_then_restores_all_in_one_write() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let fs = Arc::new(CountingFileSystem::default());
    let users_store = Arc::new(JsonFileUserStore::new(fs.clone(), temp.path().join("users.json")));
    let backups = Arc::new(JsonFileBackupStore::new(fs.clone(), temp.path().join("backups")));
    let mut svc = MigrationService::new(
        RealmSystem::from_config(&ExperienceConfig::default()),
        1_000_000,
        backups.clone(),
        users_store.clone(),
    );
    let originals: Vec<UserRecord> = (0..50)
        .map(|i| UserRecord::new(format!("u{i:02}"), i * 60))
        .collect();
    let old = OldRealmConfig::new(
        vec![0, 200, 500, 800, 1100, 1400, 1700, 2000, 2400, 2700, 3070],
        3070,
    );
    let summary = svc.migrate_all(&originals, &old, None).unwrap();
    users_store
        .save_all(&summary.migrated_users(&originals))
        .unwrap();
    let writes_before = fs.writes.load(Ordering::SeqCst);

    let result = svc.rollback(&summary.migration_id).unwrap();

    assert_eq!(result.restored, 50);
    assert!(result.errors.is_empty());
    assert_eq!(fs.writes.load(Ordering::SeqCst) - writes_before, 1);
    assert_eq!(users_store.load_all().unwrap(), originals);
    assert!(backups.list().unwrap().is_empty());
}
