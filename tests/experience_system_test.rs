//! Tests for ExperienceSystem and the service container wiring

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use pathxp::application::services::ExperienceSystem;
use pathxp::application::ApplicationError;
use pathxp::config::Settings;
use pathxp::domain::{
    codes, Difficulty, DomainError, Node, ProblemNode, RawExperienceConfig, TreasureNode,
    TreasureTier,
};
use pathxp::infrastructure::di::ServiceContainer;
use pathxp::infrastructure::stores::{InMemoryBackupStore, InMemoryUserStore};
use pathxp::infrastructure::traits::{BackupStore, RealFileSystem};
use pathxp::util::testing::{init_test_setup, sample_path};

fn system() -> ExperienceSystem {
    ExperienceSystem::new(Arc::new(RealFileSystem))
}

fn three_problems() -> Vec<Node> {
    vec![
        ProblemNode::new("p-easy", Difficulty::Easy).into(),
        ProblemNode::new("p-medium", Difficulty::Medium).into(),
        ProblemNode::new("p-hard", Difficulty::Hard).into(),
    ]
}

fn test_settings(temp: &TempDir) -> Settings {
    Settings {
        backup_dir: temp.path().join("backups"),
        ..Settings::default()
    }
}

// ============================================================
// allocation
// ============================================================

#[test]
fn given_one_problem_per_difficulty_when_allocating_then_scales_raw_values_exactly() {
    init_test_setup();
    let mut sys = system();
    sys.load_nodes(three_problems());

    let allocation = sys.allocations().unwrap();

    assert_eq!(allocation.get("p-easy"), Some(200_000));
    assert_eq!(allocation.get("p-medium"), Some(320_000));
    assert_eq!(allocation.get("p-hard"), Some(480_000));
    assert_eq!(allocation.total(), 1_000_000);
}

#[test]
fn given_large_catalog_when_validating_then_all_invariants_hold() {
    init_test_setup();
    let mut sys = system();
    sys.load_nodes(sample_path(150));

    let report = sys.validate().unwrap();
    let summary = sys.summary().unwrap();

    assert!(report.valid, "{}", report);
    assert_eq!(summary.node_count, 154);
    assert_eq!(summary.problem_count, 150);
    assert_eq!(summary.treasure_count, 4);
    assert_eq!(summary.allocated_total, 1_000_000);
    assert!(summary.min_experience >= 1);
    assert!(summary.valid);
}

#[test]
fn given_small_catalog_when_validating_then_flags_concentrated_nodes() {
    init_test_setup();
    let mut sys = system();
    sys.load_nodes(three_problems());

    let report = sys.validate().unwrap();

    assert!(!report.valid);
    assert_eq!(
        report
            .issues_with_code(codes::MAX_PERCENTAGE_VIOLATION)
            .count(),
        3
    );
    assert!(!report.has_code(codes::TOTAL_EXPERIENCE_MISMATCH));
}

#[test]
fn given_empty_catalog_when_summarizing_then_zeroes() {
    init_test_setup();
    let sys = system();

    let summary = sys.summary().unwrap();

    assert_eq!(summary.node_count, 0);
    assert_eq!(summary.allocated_total, 0);
    assert_eq!(summary.average_experience, 0.0);
}

#[test]
fn given_catalog_when_asking_node_experience_then_matches_allocation() {
    init_test_setup();
    let mut sys = system();
    sys.load_nodes(three_problems());

    assert_eq!(sys.node_experience("p-hard").unwrap(), Some(480_000));
    assert_eq!(sys.node_experience("missing").unwrap(), None);
}

#[test]
fn given_tags_when_previewing_problem_experience_then_uses_unnormalized_formula() {
    init_test_setup();
    let sys = system();

    let xp = sys.problem_experience(
        Difficulty::Medium,
        &["highFrequencyInterview".to_string(), "unknown".to_string()],
    );

    assert_eq!(xp, 10_400);
    assert_eq!(sys.treasure_experience(TreasureTier::Late), 35_000);
}

#[test]
fn given_treasure_when_explaining_then_reports_tier_value() {
    init_test_setup();
    let mut sys = system();
    sys.load_nodes(vec![TreasureNode::new("chest", TreasureTier::Final, 9).into()]);

    let explanation = sys.explain("chest");

    assert_eq!(explanation.node_id, "chest");
    assert_eq!(explanation.final_experience, 50_000);
}

// ============================================================
// configuration
// ============================================================

#[test]
fn given_invalid_config_when_loading_then_previous_stays_in_effect() {
    init_test_setup();
    let mut sys = system();
    sys.load_nodes(three_problems());
    let raw: RawExperienceConfig =
        serde_json::from_str(r#"{"totalExperience": 500000, "realmThresholds": [0, 1, 2]}"#)
            .unwrap();

    let err = sys.load_config(&raw).unwrap_err();

    match err {
        ApplicationError::Domain(DomainError::InvalidConfiguration(report)) => {
            assert!(report.has_code(codes::REALM_THRESHOLD_COUNT));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sys.config().total_experience, 1_000_000);
    assert_eq!(sys.allocations().unwrap().total(), 1_000_000);
}

#[test]
fn given_smaller_total_when_loading_config_then_realms_follow() {
    init_test_setup();
    let mut sys = system();
    let raw: RawExperienceConfig = serde_json::from_str(r#"{"totalExperience": 100000}"#).unwrap();

    sys.load_config(&raw).unwrap();
    sys.load_nodes(three_problems());

    assert_eq!(sys.allocations().unwrap().total(), 100_000);
    // stock realm 5 starts at 50% of the total
    assert_eq!(sys.current_realm(50_000), 5);
    assert_eq!(sys.current_realm(49_999), 4);
    assert_eq!(sys.current_level(100_000), 100);
}

#[test]
fn given_experience_when_taking_progress_snapshot_then_matches_delegates() {
    init_test_setup();
    let sys = system();

    let snapshot = sys.progress(500_000);

    assert_eq!(snapshot.realm, 5);
    assert_eq!(snapshot.experience_to_next_realm, 150_000);
    assert_eq!(snapshot.realm_progress, 0.0);
    assert_eq!(snapshot.level, sys.current_level(500_000));
    assert!((0.0..=1.0).contains(&snapshot.level_progress));
}

// ============================================================
// ServiceContainer
// ============================================================

#[test]
fn given_config_and_nodes_files_when_building_system_then_both_loaded() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("experience.toml");
    fs::write(
        &config_path,
        "totalExperience = 200000\n\n[difficultyBaseValues]\nhard = 20000\n",
    )
    .unwrap();
    let nodes_path = temp.path().join("nodes.json");
    fs::write(
        &nodes_path,
        serde_json::to_string(&serde_json::json!({ "nodes": three_problems() })).unwrap(),
    )
    .unwrap();
    let container = ServiceContainer::new(test_settings(&temp));

    let sys = container
        .experience_system(Some(&config_path), Some(&nodes_path))
        .unwrap();

    assert_eq!(sys.config().total_experience, 200_000);
    assert_eq!(sys.config().difficulty_base_values.hard, 20_000);
    assert_eq!(sys.registry().count(), 3);
    // raw 5000 + 8000 + 20000 = 33000
    assert_eq!(sys.allocations().unwrap().total(), 200_000);
}

#[test]
fn given_settings_paths_when_no_override_then_uses_settings() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let nodes_path = temp.path().join("nodes.json");
    fs::write(&nodes_path, serde_json::to_string(&three_problems()).unwrap()).unwrap();
    let settings = Settings {
        nodes_file: Some(nodes_path),
        ..test_settings(&temp)
    };
    let container = ServiceContainer::new(settings);

    let sys = container.experience_system(None, None).unwrap();

    assert_eq!(sys.registry().count(), 3);
}

#[test]
fn given_missing_nodes_file_when_building_system_then_operation_failed() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let container = ServiceContainer::new(test_settings(&temp));
    let missing = temp.path().join("nope.json");

    let result = container.experience_system(None, Some(&missing));

    assert!(matches!(
        result,
        Err(ApplicationError::OperationFailed { .. })
    ));
}

#[test]
fn given_dry_run_when_migrating_then_no_backup_reaches_container_store() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let backups = Arc::new(InMemoryBackupStore::new());
    let container =
        ServiceContainer::with_deps(test_settings(&temp), Arc::new(RealFileSystem), backups.clone());
    let sys = container.experience_system(None, None).unwrap();
    let old = container.settings.migration.old_realm_config();

    let mut dry = container.migration_service(&sys, Arc::new(InMemoryUserStore::new()), true);
    dry.migrate_all(&[pathxp::domain::UserRecord::new("u1", 1000)], &old, None)
        .unwrap();
    assert!(backups.list().unwrap().is_empty());

    let mut real = container.migration_service(&sys, Arc::new(InMemoryUserStore::new()), false);
    let summary = real
        .migrate_all(&[pathxp::domain::UserRecord::new("u1", 1000)], &old, None)
        .unwrap();
    assert_eq!(backups.list().unwrap(), vec![summary.migration_id]);
}
