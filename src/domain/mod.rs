//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod calculator;
pub mod entities;
pub mod error;
pub mod experience_config;
pub mod migration;
pub mod realm;
pub mod registry;
pub mod rounding;
pub mod validation;
pub mod validator;

pub use calculator::{CalculationExplanation, ExperienceAllocation, ExperienceCalculator};
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use experience_config::{
    default_level_thresholds, default_realm_thresholds, Constraints, DifficultyBaseValues,
    ExperienceConfig, ImportanceMultipliers, RawExperienceConfig, TreasureTierValues,
    DEFAULT_TOTAL_EXPERIENCE, LEVEL_COUNT, REALM_COUNT,
};
pub use migration::{
    MigrationBackup, MigrationError, MigrationResult, MigrationSummary, OldRealmConfig,
    ProgressRescaler, RollbackResult,
};
pub use realm::{RealmSystem, ThresholdTable};
pub use registry::NodeRegistry;
pub use validation::{codes, Severity, ValidationIssue, ValidationReport};
pub use validator::Validator;
