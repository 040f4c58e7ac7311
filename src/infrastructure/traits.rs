//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations, allowing services
//! to be tested with in-memory implementations.

use std::io;
use std::path::{Path, PathBuf};

use crate::domain::{MigrationBackup, UserRecord};

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a file.
    fn is_file(&self, path: &Path) -> bool;

    /// Create directory and all parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Rename (atomic within one filesystem).
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove file.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Files directly inside a directory, sorted by name.
    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// Create parent directories of `path` if missing.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

/// Key-value store for pre-migration snapshots, keyed by migration id.
///
/// Last writer wins; no concurrent migrations with the same id are expected.
pub trait BackupStore: Send + Sync {
    fn put(&self, migration_id: &str, backup: &MigrationBackup) -> io::Result<()>;

    fn get(&self, migration_id: &str) -> io::Result<Option<MigrationBackup>>;

    /// Returns whether a backup was removed.
    fn delete(&self, migration_id: &str) -> io::Result<bool>;

    /// Ids of all stored backups.
    fn list(&self) -> io::Result<Vec<String>>;
}

/// Persistence of user progress records.
pub trait UserStore: Send + Sync {
    /// Insert or replace by user id.
    fn save(&self, user: &UserRecord) -> io::Result<()>;

    /// Upsert every record; stops at the first failure.
    fn save_many(&self, users: &[UserRecord]) -> io::Result<()> {
        users.iter().try_for_each(|u| self.save(u))
    }

    fn load_all(&self) -> io::Result<Vec<UserRecord>>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                self.create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
