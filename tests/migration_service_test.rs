//! Tests for MigrationService
//!
//! Old scale used throughout: max 3070 with realm table
//! `[0, 200, 500, 800, 1100, 1400, 1700, 2000, 2400, 2700, 3070]`,
//! migrated onto the default 1,000,000 scale.

use std::collections::HashSet;
use std::io;
use std::sync::Arc;

use pathxp::application::services::MigrationService;
use pathxp::application::ApplicationError;
use pathxp::domain::rounding::round_ratio;
use pathxp::domain::{
    codes, DomainError, ExperienceConfig, MigrationBackup, OldRealmConfig, RealmSystem,
    UserRecord,
};
use pathxp::infrastructure::stores::{InMemoryBackupStore, InMemoryUserStore};
use pathxp::infrastructure::traits::{BackupStore, UserStore};
use pathxp::util::testing::init_test_setup;

const NEW_MAX: i64 = 1_000_000;

fn old_config() -> OldRealmConfig {
    OldRealmConfig::new(
        vec![0, 200, 500, 800, 1100, 1400, 1700, 2000, 2400, 2700, 3070],
        3070,
    )
}

fn service(
    backups: Arc<dyn BackupStore>,
    users: Arc<dyn UserStore>,
) -> MigrationService {
    MigrationService::new(
        RealmSystem::from_config(&ExperienceConfig::default()),
        NEW_MAX,
        backups,
        users,
    )
}

/// Backup store whose writes always fail.
struct BrokenBackupStore;

impl BackupStore for BrokenBackupStore {
    fn put(&self, _: &str, _: &MigrationBackup) -> io::Result<()> {
        Err(io::Error::other("disk full"))
    }
    fn get(&self, _: &str) -> io::Result<Option<MigrationBackup>> {
        Ok(None)
    }
    fn delete(&self, _: &str) -> io::Result<bool> {
        Ok(false)
    }
    fn list(&self) -> io::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// User store that refuses to save one particular user.
struct RejectingUserStore {
    inner: InMemoryUserStore,
    rejected: String,
}

impl UserStore for RejectingUserStore {
    fn save(&self, user: &UserRecord) -> io::Result<()> {
        if user.user_id == self.rejected {
            return Err(io::Error::other("write rejected"));
        }
        self.inner.save(user)
    }
    fn load_all(&self) -> io::Result<Vec<UserRecord>> {
        self.inner.load_all()
    }
}

// ============================================================
// migrate_all() tests
// ============================================================

#[test]
fn given_users_when_migrate_all_then_results_keep_input_order_and_counts() {
    init_test_setup();
    let mut svc = service(
        Arc::new(InMemoryBackupStore::new()),
        Arc::new(InMemoryUserStore::new()),
    );
    let users = vec![
        UserRecord::new("u1", 1500),
        UserRecord::new("u2", 300),
        UserRecord::new("u3", 0),
    ];

    let summary = svc.migrate_all(&users, &old_config(), None).unwrap();

    assert_eq!(summary.total_users, 3);
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.adjusted_for_realm_preservation, 1);
    assert_eq!(summary.new_max_experience, NEW_MAX);
    let ids: Vec<&str> = summary.results.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2", "u3"]);
    assert_eq!(summary.results[0].new_experience, 500_000);
    assert!(summary.results[0].adjusted);
    assert_eq!(summary.results[1].new_experience, 97_720);
    assert_eq!(summary.results[2].new_experience, 0);
}

#[test]
fn given_many_users_when_migrate_all_then_no_realm_regresses() {
    init_test_setup();
    let mut svc = service(
        Arc::new(InMemoryBackupStore::new()),
        Arc::new(InMemoryUserStore::new()),
    );
    let mut users: Vec<UserRecord> = (0..=3070)
        .step_by(7)
        .map(|xp| UserRecord::new(format!("user-{xp}"), xp))
        .collect();
    users.push(UserRecord::new("below-zero", -40));
    users.push(UserRecord::new("above-max", 5000));
    let realms = RealmSystem::from_config(&ExperienceConfig::default());

    let summary = svc.migrate_all(&users, &old_config(), None).unwrap();

    assert_eq!(summary.successful, users.len());
    for (user, result) in users.iter().zip(&summary.results) {
        assert_eq!(user.user_id, result.user_id);
        assert_eq!(result.old_experience, user.experience.clamp(0, 3070));
        assert!(result.new_realm >= result.old_realm, "{:?}", result);
        assert!((0..=NEW_MAX).contains(&result.new_experience));
        if result.adjusted {
            assert_eq!(
                result.new_experience,
                realms.realm_thresholds()[result.old_realm],
                "{:?}",
                result
            );
        } else {
            assert_eq!(
                result.new_experience,
                round_ratio(result.old_experience, NEW_MAX, 3070),
                "{:?}",
                result
            );
        }
    }
    let below = &summary.results[summary.results.len() - 2];
    assert_eq!((below.new_experience, below.new_realm), (0, 0));
    let above = &summary.results[summary.results.len() - 1];
    assert_eq!(above.new_experience, NEW_MAX);
}

#[test]
fn given_migration_when_migrate_all_then_backup_holds_original_users() {
    init_test_setup();
    let backups = Arc::new(InMemoryBackupStore::new());
    let mut svc = service(backups.clone(), Arc::new(InMemoryUserStore::new()));
    let users = vec![
        UserRecord::new("u1", 1500).with_completed(["a", "b"]),
        UserRecord::new("u2", 300),
    ];

    let summary = svc.migrate_all(&users, &old_config(), None).unwrap();

    let backup = backups.get(&summary.migration_id).unwrap().unwrap();
    assert_eq!(backup.migration_id, summary.migration_id);
    assert_eq!(backup.users, users);
}

#[test]
fn given_failing_backup_store_when_migrate_all_then_aborts_before_processing() {
    init_test_setup();
    let users_store = Arc::new(InMemoryUserStore::new());
    let mut svc = service(Arc::new(BrokenBackupStore), users_store.clone());

    let result = svc.migrate_all(&[UserRecord::new("u1", 1500)], &old_config(), None);

    assert!(matches!(
        result,
        Err(ApplicationError::OperationFailed { .. })
    ));
    assert!(users_store.load_all().unwrap().is_empty());
}

#[test]
fn given_malformed_old_config_when_migrate_all_then_fails_without_backup() {
    init_test_setup();
    let backups = Arc::new(InMemoryBackupStore::new());
    let mut svc = service(backups.clone(), Arc::new(InMemoryUserStore::new()));
    let old = OldRealmConfig::new(vec![0, 500, 200], 3070);

    let result = svc.migrate_all(&[UserRecord::new("u1", 10)], &old, None);

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::InvalidOldRealmConfig(_)))
    ));
    assert!(backups.list().unwrap().is_empty());
}

#[test]
fn given_repeated_and_empty_ids_when_migrate_all_then_only_those_fail() {
    init_test_setup();
    let mut svc = service(
        Arc::new(InMemoryBackupStore::new()),
        Arc::new(InMemoryUserStore::new()),
    );
    let users = vec![
        UserRecord::new("u1", 100),
        UserRecord::new("", 200),
        UserRecord::new("u1", 900),
        UserRecord::new("u2", 300),
    ];

    let summary = svc.migrate_all(&users, &old_config(), None).unwrap();

    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.results[0].old_experience, 100);
    assert_eq!(summary.results[1].user_id, "u2");
    let failed: Vec<&str> = summary.errors.iter().map(|e| e.user_id.as_str()).collect();
    assert_eq!(failed, vec!["", "u1"]);
}

#[test]
fn given_empty_batch_when_migrate_all_then_empty_summary() {
    init_test_setup();
    let mut svc = service(
        Arc::new(InMemoryBackupStore::new()),
        Arc::new(InMemoryUserStore::new()),
    );

    let summary = svc.migrate_all(&[], &old_config(), None).unwrap();

    assert_eq!(summary.total_users, 0);
    assert!(summary.results.is_empty());
    assert!(svc.summary(&summary.migration_id).is_some());
}

// ============================================================
// validate_migration() tests
// ============================================================

#[test]
fn given_unknown_id_when_validate_migration_then_not_found_error() {
    init_test_setup();
    let svc = service(
        Arc::new(InMemoryBackupStore::new()),
        Arc::new(InMemoryUserStore::new()),
    );

    let report = svc.validate_migration("migration_0_000000000");

    assert!(!report.valid);
    assert!(report.has_code(codes::MIGRATION_NOT_FOUND));
}

#[test]
fn given_orphans_and_failures_when_validate_migration_then_warns_but_stays_valid() {
    init_test_setup();
    let mut svc = service(
        Arc::new(InMemoryBackupStore::new()),
        Arc::new(InMemoryUserStore::new()),
    );
    let valid_ids: HashSet<String> = ["a".to_string()].into();
    let users = vec![
        UserRecord::new("u1", 1500).with_completed(["a", "removed"]),
        UserRecord::new("u1", 10),
    ];

    let summary = svc
        .migrate_all(&users, &old_config(), Some(&valid_ids))
        .unwrap();
    let report = svc.validate_migration(&summary.migration_id);

    assert!(report.valid);
    assert!(report.has_code(codes::ORPHANED_NODES));
    assert!(report.has_code(codes::FAILED_MIGRATIONS));
    assert!(!report.has_code(codes::REALM_REGRESSION));
    assert_eq!(
        summary.results[0].orphaned_nodes,
        vec!["removed".to_string()]
    );
}

#[test]
fn given_clean_migration_when_validate_migration_then_no_issues() {
    init_test_setup();
    let mut svc = service(
        Arc::new(InMemoryBackupStore::new()),
        Arc::new(InMemoryUserStore::new()),
    );

    let summary = svc
        .migrate_all(
            &[UserRecord::new("u1", 1500), UserRecord::new("u2", 3070)],
            &old_config(),
            None,
        )
        .unwrap();
    let report = svc.validate_migration(&summary.migration_id);

    assert!(report.valid);
    assert!(report.errors.is_empty());
    assert!(report.warnings.is_empty());
}

// ============================================================
// rollback() tests
// ============================================================

#[test]
fn given_completed_migration_when_rollback_then_restores_and_discards_backup() {
    init_test_setup();
    let backups = Arc::new(InMemoryBackupStore::new());
    let users_store = Arc::new(InMemoryUserStore::new());
    let mut svc = service(backups.clone(), users_store.clone());
    let users = vec![UserRecord::new("u1", 1500), UserRecord::new("u2", 300)];

    let summary = svc.migrate_all(&users, &old_config(), None).unwrap();
    for migrated in summary.migrated_users(&users) {
        users_store.save(&migrated).unwrap();
    }
    let result = svc.rollback(&summary.migration_id).unwrap();

    assert!(result.is_complete());
    assert_eq!(result.restored, 2);
    assert_eq!(users_store.load_all().unwrap(), users);
    assert!(backups.get(&summary.migration_id).unwrap().is_none());
    assert!(svc.summary(&summary.migration_id).is_none());
}

#[test]
fn given_unknown_id_when_rollback_then_backup_not_found() {
    init_test_setup();
    let mut svc = service(
        Arc::new(InMemoryBackupStore::new()),
        Arc::new(InMemoryUserStore::new()),
    );

    let err = svc.rollback("migration_1_abcdef012").unwrap_err();

    assert!(matches!(err, ApplicationError::BackupNotFound(id) if id == "migration_1_abcdef012"));
}

#[test]
fn given_restore_failure_when_rollback_then_reports_it_and_keeps_backup() {
    init_test_setup();
    let backups = Arc::new(InMemoryBackupStore::new());
    let users_store = Arc::new(RejectingUserStore {
        inner: InMemoryUserStore::new(),
        rejected: "u2".to_string(),
    });
    let mut svc = service(backups.clone(), users_store.clone());
    let users = vec![UserRecord::new("u1", 1500), UserRecord::new("u2", 300)];

    let summary = svc.migrate_all(&users, &old_config(), None).unwrap();
    let result = svc.rollback(&summary.migration_id).unwrap();

    assert!(!result.is_complete());
    assert_eq!(result.restored, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].user_id, "u2");
    assert!(backups.get(&summary.migration_id).unwrap().is_some());
    assert!(svc.summary(&summary.migration_id).is_some());
}

// ============================================================
// migrate_user() tests
// ============================================================

#[test]
fn given_single_user_when_migrate_user_then_no_backup_is_written() {
    init_test_setup();
    let backups = Arc::new(InMemoryBackupStore::new());
    let svc = service(backups.clone(), Arc::new(InMemoryUserStore::new()));

    let result = svc
        .migrate_user(&UserRecord::new("u1", 300), &old_config(), None)
        .unwrap();

    assert_eq!(result.new_experience, 97_720);
    assert!(backups.list().unwrap().is_empty());
}
