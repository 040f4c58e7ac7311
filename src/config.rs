//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/pathxp/pathxp.toml`
//! 3. Local config: `<dir>/.pathxp.toml` (usually the working directory)
//! 4. Environment variables: `PATHXP_*` prefix
//!
//! These are tool settings (where files live, migration defaults). The
//! experience configuration itself is a separate document loaded by
//! `ConfigurationManager`.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{default_realm_thresholds, OldRealmConfig};

/// Defaults for migrations from a previous experience scale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MigrationSettings {
    /// Maximum experience of the old scale
    pub old_max_experience: i64,
    /// Old realm table; derived from the stock realm curve when unset
    pub old_realm_thresholds: Option<Vec<i64>>,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            old_max_experience: 3070,
            old_realm_thresholds: None,
        }
    }
}

impl MigrationSettings {
    /// Old realm configuration used when a migration input does not carry one.
    pub fn old_realm_config(&self) -> OldRealmConfig {
        let thresholds = self
            .old_realm_thresholds
            .clone()
            .unwrap_or_else(|| default_realm_thresholds(self.old_max_experience));
        OldRealmConfig::new(thresholds, self.old_max_experience)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawMigrationSettings {
    pub old_max_experience: Option<i64>,
    pub old_realm_thresholds: Option<Vec<i64>>,
}

/// Raw settings for intermediate parsing (`None` = not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub experience_config: Option<PathBuf>,
    pub nodes_file: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    #[serde(default)]
    pub migration: RawMigrationSettings,
}

/// Effective tool settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Experience configuration document (.json or .toml); built-in defaults when unset
    pub experience_config: Option<PathBuf>,
    /// Default node catalog for commands that need one
    pub nodes_file: Option<PathBuf>,
    /// Where migration backups are kept
    pub backup_dir: PathBuf,
    pub migration: MigrationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            experience_config: None,
            nodes_file: None,
            backup_dir: dirs_default_backup_dir(),
            migration: MigrationSettings::default(),
        }
    }
}

/// Get the default backup directory (~/.pathxp/backups).
fn dirs_default_backup_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".pathxp").join("backups"))
        .unwrap_or_else(|| PathBuf::from("~/.pathxp/backups"))
}

/// Get the XDG config directory for pathxp.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "pathxp").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("pathxp.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".pathxp.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// Expand `~`, `$VAR` and `${VAR}`; unknown variables leave the input as is.
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(raw.as_ref()) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => path.to_path_buf(),
    }
}

impl Settings {
    fn expand_paths(&mut self) {
        self.backup_dir = expand_path(&self.backup_dir);
        self.experience_config = self.experience_config.as_deref().map(expand_path);
        self.nodes_file = self.nodes_file.as_deref().map(expand_path);
    }

    /// Overlay wins field by field.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            experience_config: overlay
                .experience_config
                .clone()
                .or_else(|| self.experience_config.clone()),
            nodes_file: overlay
                .nodes_file
                .clone()
                .or_else(|| self.nodes_file.clone()),
            backup_dir: overlay
                .backup_dir
                .clone()
                .unwrap_or_else(|| self.backup_dir.clone()),
            migration: MigrationSettings {
                old_max_experience: overlay
                    .migration
                    .old_max_experience
                    .unwrap_or(self.migration.old_max_experience),
                old_realm_thresholds: overlay
                    .migration
                    .old_realm_thresholds
                    .clone()
                    .or_else(|| self.migration.old_realm_thresholds.clone()),
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Optional directory holding a `.pathxp.toml`
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();

        Ok(current)
    }

    /// Load a single settings file over the defaults, without global config
    /// or environment overrides.
    pub fn load_file(path: &Path) -> Result<Self, ApplicationError> {
        let raw = load_raw_settings(path)?;
        let mut settings = Self::default().merge_with(&raw);
        settings.expand_paths();
        Ok(settings)
    }

    /// Apply PATHXP_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("PATHXP")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("migration.old_realm_thresholds")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_string("experience_config") {
            settings.experience_config = Some(PathBuf::from(val));
        }
        if let Ok(val) = config.get_string("nodes_file") {
            settings.nodes_file = Some(PathBuf::from(val));
        }
        if let Ok(val) = config.get_string("backup_dir") {
            settings.backup_dir = PathBuf::from(val);
        }
        if let Ok(val) = config.get_int("migration.old_max_experience") {
            settings.migration.old_max_experience = val;
        }
        if let Ok(val) = config.get::<Vec<i64>>("migration.old_realm_thresholds") {
            settings.migration.old_realm_thresholds = Some(val);
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# pathxp configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/pathxp/pathxp.toml
#   Local:  ./.pathxp.toml
#   Env:    PATHXP_* environment variables (PATHXP_MIGRATION__OLD_MAX_EXPERIENCE=...)

# Experience configuration (.json or .toml); built-in defaults when unset
# experience_config = "~/learning-path/experience.json"

# Node catalog used by validate/allocate/explain when --nodes is omitted
# nodes_file = "~/learning-path/nodes.json"

# Migration backups
# backup_dir = "~/.pathxp/backups"

[migration]
# Maximum experience of the scale being migrated away from
# old_max_experience = 3070

# Old realm table (11 entries, starting at 0); scaled stock curve when unset
# old_realm_thresholds = [0, 154, 368, 675, 1075, 1535, 1996, 2395, 2702, 2917, 3070]
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
