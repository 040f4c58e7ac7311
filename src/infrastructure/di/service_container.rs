//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::application::services::{ExperienceSystem, MigrationService};
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::infrastructure::stores::{InMemoryBackupStore, JsonFileBackupStore};
use crate::infrastructure::traits::{BackupStore, FileSystem, RealFileSystem, UserStore};

/// Container holding settings and shared I/O dependencies.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Persistent migration backups
    pub backups: Arc<dyn BackupStore>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let backups = Arc::new(JsonFileBackupStore::new(
            fs.clone(),
            settings.backup_dir.clone(),
        ));
        Self::with_deps(settings, fs, backups)
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        backups: Arc<dyn BackupStore>,
    ) -> Self {
        let settings = Arc::new(settings);

        Self {
            settings,
            fs,
            backups,
        }
    }

    /// Experience system with the configured (or overridden) experience
    /// configuration and node catalog loaded.
    pub fn experience_system(
        &self,
        config_override: Option<&Path>,
        nodes_override: Option<&Path>,
    ) -> ApplicationResult<ExperienceSystem> {
        let mut system = ExperienceSystem::new(self.fs.clone());

        let config_path = config_override.or(self.settings.experience_config.as_deref());
        if let Some(path) = config_path {
            debug!("experience_system: config={}", path.display());
            system.load_config_file(path)?;
        }

        let nodes_path = nodes_override.or(self.settings.nodes_file.as_deref());
        if let Some(path) = nodes_path {
            debug!("experience_system: nodes={}", path.display());
            system.load_nodes_file(path)?;
        }
        Ok(system)
    }

    /// Migration service targeting `system`'s realm table.
    ///
    /// A dry run keeps its backup in memory only.
    pub fn migration_service(
        &self,
        system: &ExperienceSystem,
        users: Arc<dyn UserStore>,
        dry_run: bool,
    ) -> MigrationService {
        let backups: Arc<dyn BackupStore> = if dry_run {
            Arc::new(InMemoryBackupStore::new())
        } else {
            self.backups.clone()
        };
        MigrationService::new(
            system.realm_system().clone(),
            system.config().total_experience,
            backups,
            users,
        )
    }
}
