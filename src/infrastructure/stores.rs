//! Backup and user store implementations
//!
//! In-memory stores back dry runs and tests; JSON-file stores persist
//! through the `FileSystem` abstraction. File writes go through a sibling
//! temp file and a rename, so a reader never sees a half-written document.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::domain::{MigrationBackup, UserRecord};
use crate::infrastructure::traits::{BackupStore, FileSystem, UserStore};

fn lock<T>(mutex: &Mutex<T>) -> io::Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| io::Error::other("store lock poisoned"))
}

fn write_atomic(fs: &dyn FileSystem, path: &Path, content: &str) -> io::Result<()> {
    fs.ensure_parent(path)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs.write(&tmp, content)?;
    fs.rename(&tmp, path)
}

// ============================================================
// IN-MEMORY
// ============================================================

#[derive(Debug, Default)]
pub struct InMemoryBackupStore {
    backups: Mutex<BTreeMap<String, MigrationBackup>>,
}

impl InMemoryBackupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackupStore for InMemoryBackupStore {
    fn put(&self, migration_id: &str, backup: &MigrationBackup) -> io::Result<()> {
        lock(&self.backups)?.insert(migration_id.to_string(), backup.clone());
        Ok(())
    }

    fn get(&self, migration_id: &str) -> io::Result<Option<MigrationBackup>> {
        Ok(lock(&self.backups)?.get(migration_id).cloned())
    }

    fn delete(&self, migration_id: &str) -> io::Result<bool> {
        Ok(lock(&self.backups)?.remove(migration_id).is_some())
    }

    fn list(&self) -> io::Result<Vec<String>> {
        Ok(lock(&self.backups)?.keys().cloned().collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: Mutex<BTreeMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        Self {
            users: Mutex::new(
                users
                    .into_iter()
                    .map(|u| (u.user_id.clone(), u))
                    .collect(),
            ),
        }
    }
}

impl UserStore for InMemoryUserStore {
    fn save(&self, user: &UserRecord) -> io::Result<()> {
        lock(&self.users)?.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    fn save_many(&self, users: &[UserRecord]) -> io::Result<()> {
        let mut stored = lock(&self.users)?;
        for user in users {
            stored.insert(user.user_id.clone(), user.clone());
        }
        Ok(())
    }

    fn load_all(&self) -> io::Result<Vec<UserRecord>> {
        Ok(lock(&self.users)?.values().cloned().collect())
    }
}

// ============================================================
// JSON FILES
// ============================================================

/// One `<migration-id>.json` file per backup inside a directory.
pub struct JsonFileBackupStore {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl JsonFileBackupStore {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, migration_id: &str) -> io::Result<PathBuf> {
        let safe = !migration_id.is_empty()
            && migration_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !safe {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid migration id: {migration_id:?}"),
            ));
        }
        Ok(self.dir.join(format!("{migration_id}.json")))
    }
}

impl BackupStore for JsonFileBackupStore {
    fn put(&self, migration_id: &str, backup: &MigrationBackup) -> io::Result<()> {
        let path = self.path_for(migration_id)?;
        let content = serde_json::to_string_pretty(backup)?;
        write_atomic(self.fs.as_ref(), &path, &content)?;
        debug!("put: backup {} -> {}", migration_id, path.display());
        Ok(())
    }

    fn get(&self, migration_id: &str) -> io::Result<Option<MigrationBackup>> {
        let path = self.path_for(migration_id)?;
        if !self.fs.exists(&path) {
            return Ok(None);
        }
        let content = self.fs.read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn delete(&self, migration_id: &str) -> io::Result<bool> {
        let path = self.path_for(migration_id)?;
        if !self.fs.exists(&path) {
            return Ok(false);
        }
        self.fs.remove_file(&path)?;
        debug!("delete: backup {}", migration_id);
        Ok(true)
    }

    fn list(&self) -> io::Result<Vec<String>> {
        if !self.fs.exists(&self.dir) {
            return Ok(Vec::new());
        }
        Ok(self
            .fs
            .list_files(&self.dir)?
            .into_iter()
            .filter(|p| p.extension().is_some_and(|e| e == "json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
            .collect())
    }
}

/// All users in one JSON array file.
pub struct JsonFileUserStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileUserStore {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the whole file.
    pub fn save_all(&self, users: &[UserRecord]) -> io::Result<()> {
        let _guard = lock(&self.write_lock)?;
        self.write_users(users)
    }

    fn write_users(&self, users: &[UserRecord]) -> io::Result<()> {
        let content = serde_json::to_string_pretty(users)?;
        write_atomic(self.fs.as_ref(), &self.path, &content)
    }
}

impl UserStore for JsonFileUserStore {
    /// Reads and rewrites the whole file. Use `save_many` for batches.
    fn save(&self, user: &UserRecord) -> io::Result<()> {
        self.save_many(std::slice::from_ref(user))
    }

    /// One read and one write for the whole batch; existing users keep
    /// their position, new ones are appended in input order.
    fn save_many(&self, users: &[UserRecord]) -> io::Result<()> {
        let _guard = lock(&self.write_lock)?;
        let mut stored = self.load_all()?;
        let mut index: HashMap<String, usize> = stored
            .iter()
            .enumerate()
            .map(|(i, u)| (u.user_id.clone(), i))
            .collect();
        for user in users {
            match index.get(&user.user_id) {
                Some(&i) => stored[i] = user.clone(),
                None => {
                    index.insert(user.user_id.clone(), stored.len());
                    stored.push(user.clone());
                }
            }
        }
        debug!("save_many: {} users -> {}", users.len(), self.path.display());
        self.write_users(&stored)
    }

    fn load_all(&self) -> io::Result<Vec<UserRecord>> {
        if !self.fs.exists(&self.path) {
            return Ok(Vec::new());
        }
        let content = self.fs.read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}
