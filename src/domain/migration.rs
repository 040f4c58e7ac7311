//! Progress migration between experience scales
//!
//! `ProgressRescaler` is the pure per-user part of a migration run:
//! clamp, scale, then preserve the realm. Backup, batching and rollback
//! live in the application layer.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::rounding::round_ratio;
use crate::domain::{DomainError, DomainResult, RealmSystem, ThresholdTable, UserRecord};

/// Realm table and experience cap of the scale being migrated away from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OldRealmConfig {
    pub thresholds: Vec<i64>,
    pub max_experience: i64,
}

impl OldRealmConfig {
    pub fn new(thresholds: Vec<i64>, max_experience: i64) -> Self {
        Self {
            thresholds,
            max_experience,
        }
    }

    /// Non-empty, starting at 0, strictly increasing, positive cap.
    pub fn validate(&self) -> DomainResult<()> {
        if self.max_experience <= 0 {
            return Err(DomainError::InvalidOldRealmConfig(format!(
                "max experience must be positive, got {}",
                self.max_experience
            )));
        }
        match self.thresholds.first() {
            None => {
                return Err(DomainError::InvalidOldRealmConfig(
                    "threshold list is empty".to_string(),
                ))
            }
            Some(&first) if first != 0 => {
                return Err(DomainError::InvalidOldRealmConfig(format!(
                    "first threshold must be 0, got {first}"
                )))
            }
            Some(_) => {}
        }
        if let Some(index) = self.thresholds.windows(2).position(|w| w[1] <= w[0]) {
            return Err(DomainError::InvalidOldRealmConfig(format!(
                "thresholds not strictly increasing at index {}",
                index + 1
            )));
        }
        Ok(())
    }

    pub fn realm_for(&self, experience: i64) -> usize {
        ThresholdTable::new(self.thresholds.clone()).index_for(experience)
    }
}

/// Outcome for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub user_id: String,
    pub old_experience: i64,
    pub new_experience: i64,
    pub old_realm: usize,
    pub new_realm: usize,
    /// Experience was raised to keep the old realm.
    pub adjusted: bool,
    /// Completed node ids that no longer exist.
    pub orphaned_nodes: Vec<String>,
}

/// A user that could not be migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationError {
    pub user_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub migration_id: String,
    pub timestamp: DateTime<Utc>,
    pub total_users: usize,
    pub successful: usize,
    pub failed: usize,
    pub adjusted_for_realm_preservation: usize,
    /// New maximum experience the results were scaled to.
    pub new_max_experience: i64,
    pub results: Vec<MigrationResult>,
    pub errors: Vec<MigrationError>,
}

impl MigrationSummary {
    pub fn new(
        migration_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        new_max_experience: i64,
        total_users: usize,
        results: Vec<MigrationResult>,
        errors: Vec<MigrationError>,
    ) -> Self {
        let adjusted = results.iter().filter(|r| r.adjusted).count();
        Self {
            migration_id: migration_id.into(),
            timestamp,
            total_users,
            successful: results.len(),
            failed: errors.len(),
            adjusted_for_realm_preservation: adjusted,
            new_max_experience,
            results,
            errors,
        }
    }

    /// Users as they should be written back after this migration.
    pub fn migrated_users(&self, originals: &[UserRecord]) -> Vec<UserRecord> {
        let mut by_id: HashMap<&str, &UserRecord> = HashMap::with_capacity(originals.len());
        for user in originals {
            // first occurrence is the one that migrated
            by_id.entry(user.user_id.as_str()).or_insert(user);
        }
        self.results
            .iter()
            .map(|r| {
                let completed = by_id
                    .get(r.user_id.as_str())
                    .map(|u| u.completed_nodes.clone())
                    .unwrap_or_default();
                UserRecord::new(r.user_id.clone(), r.new_experience).with_completed(completed)
            })
            .collect()
    }
}

/// Pre-migration snapshot of every user in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationBackup {
    pub migration_id: String,
    pub created_at: DateTime<Utc>,
    pub users: Vec<UserRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResult {
    pub migration_id: String,
    pub restored: usize,
    pub errors: Vec<MigrationError>,
}

impl RollbackResult {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Rescales one user's progress from an old scale onto a new realm system.
#[derive(Debug, Clone)]
pub struct ProgressRescaler<'a> {
    old: &'a OldRealmConfig,
    old_table: ThresholdTable,
    new: &'a RealmSystem,
    new_max_experience: i64,
}

impl<'a> ProgressRescaler<'a> {
    pub fn new(
        old: &'a OldRealmConfig,
        new: &'a RealmSystem,
        new_max_experience: i64,
    ) -> DomainResult<Self> {
        old.validate()?;
        Ok(Self {
            old,
            old_table: ThresholdTable::new(old.thresholds.clone()),
            new,
            new_max_experience,
        })
    }

    /// Migrate one user.
    ///
    /// The new realm is never below the old one. When plain scaling would
    /// demote the user, the experience is lifted to the new threshold of
    /// the old realm and the result is marked `adjusted`.
    pub fn rescale(
        &self,
        user: &UserRecord,
        valid_node_ids: Option<&HashSet<String>>,
    ) -> DomainResult<MigrationResult> {
        if user.user_id.trim().is_empty() {
            return Err(DomainError::EmptyUserId);
        }

        let clamped = user.experience.clamp(0, self.old.max_experience);
        let old_realm = self.old_table.index_for(clamped);

        let mut new_experience =
            round_ratio(clamped, self.new_max_experience, self.old.max_experience);
        let mut new_realm = self.new.current_realm(new_experience);
        let mut adjusted = false;

        if new_realm < old_realm {
            let Some(floor) = self.new.realm_table().threshold(old_realm) else {
                return Err(DomainError::UnmappableRealm {
                    old_realm,
                    max_realm: self.new.max_realm(),
                });
            };
            new_experience = floor;
            new_realm = old_realm;
            adjusted = true;
        }

        let orphaned_nodes = match valid_node_ids {
            Some(valid) => user
                .completed_nodes
                .iter()
                .filter(|id| !valid.contains(*id))
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        Ok(MigrationResult {
            user_id: user.user_id.clone(),
            old_experience: clamped,
            new_experience: new_experience.clamp(0, self.new_max_experience),
            old_realm,
            new_realm,
            adjusted,
            orphaned_nodes,
        })
    }
}
