//! User progress migration with backup and rollback
//!
//! ## Phases
//!
//! ```text
//! Backup ──> Scale ──> Realm-Preserve ──> Commit
//!   │                                       │
//!   └──────────── Rollback(migration_id) <──┘
//! ```
//!
//! The backup of every input user is stored before any user is processed.
//! A failing backup aborts the run; a failing user does not.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{
    codes, DomainError, MigrationBackup, MigrationError, MigrationResult, MigrationSummary,
    OldRealmConfig, ProgressRescaler, RealmSystem, RollbackResult, UserRecord, ValidationIssue,
    ValidationReport,
};
use crate::infrastructure::traits::{BackupStore, UserStore};

/// `migration_<unix-millis>_<9 hex chars>`
pub fn generate_migration_id(now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("migration_{}_{}", now.timestamp_millis(), &random[..9])
}

/// Migrates user progress onto the current realm system.
pub struct MigrationService {
    realms: RealmSystem,
    new_max_experience: i64,
    backups: Arc<dyn BackupStore>,
    users: Arc<dyn UserStore>,
    log: BTreeMap<String, MigrationSummary>,
}

impl MigrationService {
    pub fn new(
        realms: RealmSystem,
        new_max_experience: i64,
        backups: Arc<dyn BackupStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            realms,
            new_max_experience,
            backups,
            users,
            log: BTreeMap::new(),
        }
    }

    pub fn new_max_experience(&self) -> i64 {
        self.new_max_experience
    }

    /// Migrate a single user without backup or log entry.
    pub fn migrate_user(
        &self,
        user: &UserRecord,
        old: &OldRealmConfig,
        valid_node_ids: Option<&HashSet<String>>,
    ) -> ApplicationResult<MigrationResult> {
        let rescaler = ProgressRescaler::new(old, &self.realms, self.new_max_experience)?;
        Ok(rescaler.rescale(user, valid_node_ids)?)
    }

    /// Migrate a batch.
    ///
    /// Fails as a whole only when the old configuration is malformed or the
    /// backup cannot be stored. Per-user failures, including repeated user
    /// ids after the first occurrence, land in the summary's error list.
    #[instrument(level = "debug", skip_all, fields(users = users.len()))]
    pub fn migrate_all(
        &mut self,
        users: &[UserRecord],
        old: &OldRealmConfig,
        valid_node_ids: Option<&HashSet<String>>,
    ) -> ApplicationResult<MigrationSummary> {
        let rescaler = ProgressRescaler::new(old, &self.realms, self.new_max_experience)?;

        let now = Utc::now();
        let migration_id = generate_migration_id(now);
        let backup = MigrationBackup {
            migration_id: migration_id.clone(),
            created_at: now,
            users: users.to_vec(),
        };
        self.backups
            .put(&migration_id, &backup)
            .with_context(|| format!("store backup {migration_id}"))?;
        debug!("migrate_all: backup {} stored", migration_id);

        let mut seen = HashSet::new();
        let repeated: Vec<bool> = users
            .iter()
            .map(|u| !seen.insert(u.user_id.as_str()))
            .collect();

        let outcomes: Vec<Result<MigrationResult, DomainError>> = users
            .par_iter()
            .zip(repeated.par_iter())
            .map(|(user, repeated)| {
                if *repeated {
                    Err(DomainError::DuplicateUser(user.user_id.clone()))
                } else {
                    rescaler.rescale(user, valid_node_ids)
                }
            })
            .collect();

        let mut results = Vec::with_capacity(users.len());
        let mut errors = Vec::new();
        for (user, outcome) in users.iter().zip(outcomes) {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!("Migration failed for user {:?}: {}", user.user_id, e);
                    errors.push(MigrationError {
                        user_id: user.user_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let summary = MigrationSummary::new(
            migration_id.clone(),
            now,
            self.new_max_experience,
            users.len(),
            results,
            errors,
        );
        info!(
            "Migration {}: {} of {} users migrated, {} adjusted, {} failed",
            summary.migration_id,
            summary.successful,
            summary.total_users,
            summary.adjusted_for_realm_preservation,
            summary.failed
        );
        self.log.insert(migration_id, summary.clone());
        Ok(summary)
    }

    /// Summary of a migration run by this service.
    pub fn summary(&self, migration_id: &str) -> Option<&MigrationSummary> {
        self.log.get(migration_id)
    }

    /// Post-hoc checks of a logged migration.
    pub fn validate_migration(&self, migration_id: &str) -> ValidationReport {
        let mut report = ValidationReport::new();
        let Some(summary) = self.log.get(migration_id) else {
            report.push(ValidationIssue::error(
                codes::MIGRATION_NOT_FOUND,
                format!("Migration {migration_id} not found"),
                json!({"migrationId": migration_id}),
            ));
            return report;
        };
        let max = summary.new_max_experience;

        for result in &summary.results {
            if result.new_experience < 0 || result.new_experience > max {
                report.push(ValidationIssue::error(
                    codes::MIGRATED_EXPERIENCE_OUT_OF_RANGE,
                    format!(
                        "User {} migrated to {} outside [0, {max}]",
                        result.user_id, result.new_experience
                    ),
                    json!({"userId": result.user_id, "newExperience": result.new_experience, "max": max}),
                ));
            }
            if result.new_realm < result.old_realm {
                report.push(ValidationIssue::error(
                    codes::REALM_REGRESSION,
                    format!(
                        "User {} dropped from realm {} to {}",
                        result.user_id, result.old_realm, result.new_realm
                    ),
                    json!({
                        "userId": result.user_id,
                        "oldRealm": result.old_realm,
                        "newRealm": result.new_realm,
                        "adjusted": result.adjusted,
                    }),
                ));
            }
        }

        let orphaned: usize = summary.results.iter().map(|r| r.orphaned_nodes.len()).sum();
        if orphaned > 0 {
            let affected = summary
                .results
                .iter()
                .filter(|r| !r.orphaned_nodes.is_empty())
                .count();
            report.push(ValidationIssue::warning(
                codes::ORPHANED_NODES,
                format!("{orphaned} completed nodes of {affected} users no longer exist"),
                json!({"count": orphaned, "users": affected}),
            ));
        }
        if !summary.errors.is_empty() {
            report.push(ValidationIssue::warning(
                codes::FAILED_MIGRATIONS,
                format!("{} users failed to migrate", summary.errors.len()),
                json!({
                    "count": summary.errors.len(),
                    "userIds": summary.errors.iter().map(|e| e.user_id.as_str()).collect::<Vec<_>>(),
                }),
            ));
        }
        report
    }

    /// Restore every user of a stored backup.
    ///
    /// On full success the backup and the log entry are discarded. With
    /// restore errors both are kept so the rollback can be retried.
    #[instrument(level = "debug", skip(self))]
    pub fn rollback(&mut self, migration_id: &str) -> ApplicationResult<RollbackResult> {
        let backup = self
            .backups
            .get(migration_id)
            .with_context(|| format!("load backup {migration_id}"))?
            .ok_or_else(|| ApplicationError::BackupNotFound(migration_id.to_string()))?;

        let mut restored = 0;
        let mut errors = Vec::new();
        match self.users.save_many(&backup.users) {
            Ok(()) => restored = backup.users.len(),
            Err(e) => {
                // retry one by one to find the failing users
                warn!("Batch restore failed for {}: {}", migration_id, e);
                for user in &backup.users {
                    match self.users.save(user) {
                        Ok(()) => restored += 1,
                        Err(e) => {
                            warn!("Restore failed for user {:?}: {}", user.user_id, e);
                            errors.push(MigrationError {
                                user_id: user.user_id.clone(),
                                error: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        if errors.is_empty() {
            self.backups
                .delete(migration_id)
                .with_context(|| format!("delete backup {migration_id}"))?;
            self.log.remove(migration_id);
        }
        info!(
            "Rollback {}: {} users restored, {} failed",
            migration_id,
            restored,
            errors.len()
        );

        Ok(RollbackResult {
            migration_id: migration_id.to_string(),
            restored,
            errors,
        })
    }
}
