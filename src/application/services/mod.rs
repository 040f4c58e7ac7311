//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, BackupStore, UserStore)
//! but are themselves concrete structs, not traits.

mod configuration;
mod experience_system;
mod migration;

pub use configuration::{parse_raw_config, ConfigFormat, ConfigurationManager};
pub use experience_system::{parse_nodes, ExperienceSystem, ProgressSnapshot, SystemSummary};
pub use migration::{generate_migration_id, MigrationService};
