//! Experience configuration loading and validation
//!
//! Holds the live `ExperienceConfig`. A load either fully succeeds or leaves
//! the previous configuration in effect.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{
    Constraints, Difficulty, DomainError, ExperienceConfig, RawExperienceConfig, TreasureTier,
    ValidationReport, Validator,
};
use crate::infrastructure::traits::FileSystem;

/// Supported experience configuration document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Format from the file extension; unknown extensions are a config error.
    pub fn from_path(path: &Path) -> ApplicationResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(ApplicationError::Config {
                message: format!(
                    "unsupported experience config format {:?}: {}",
                    other.unwrap_or(""),
                    path.display()
                ),
            }),
        }
    }
}

/// Parse a partial experience configuration document.
pub fn parse_raw_config(content: &str, format: ConfigFormat) -> ApplicationResult<RawExperienceConfig> {
    match format {
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| ApplicationError::Config {
            message: format!("parse experience config: {e}"),
        }),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ApplicationError::Config {
            message: format!("parse experience config: {e}"),
        }),
    }
}

/// Owner of the live experience configuration.
pub struct ConfigurationManager {
    fs: Arc<dyn FileSystem>,
    config: ExperienceConfig,
}

impl ConfigurationManager {
    /// Start with the built-in defaults.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            config: ExperienceConfig::default(),
        }
    }

    /// Fill omitted fields from the defaults, validate, then take effect.
    ///
    /// On failure the error carries every violation and the previous
    /// configuration stays active.
    #[instrument(level = "debug", skip_all)]
    pub fn load(&mut self, raw: &RawExperienceConfig) -> ApplicationResult<&ExperienceConfig> {
        let merged = raw.merge_with_defaults();
        let report = self.validate(&merged);
        for warning in &report.warnings {
            debug!("load: warning {}", warning);
        }
        if !report.valid {
            return Err(DomainError::InvalidConfiguration(report).into());
        }
        self.config = merged;
        info!(
            "Experience configuration loaded: total={}",
            self.config.total_experience
        );
        Ok(&self.config)
    }

    /// Load a `.json` or `.toml` document from disk.
    pub fn load_file(&mut self, path: &Path) -> ApplicationResult<&ExperienceConfig> {
        debug!("load_file: path={}", path.display());
        let format = ConfigFormat::from_path(path)?;
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read experience config", path)?;
        let raw = parse_raw_config(&content, format)?;
        self.load(&raw)
    }

    /// Run the semantic checks without touching the live configuration.
    pub fn validate(&self, config: &ExperienceConfig) -> ValidationReport {
        Validator::validate_config(config)
    }

    pub fn config(&self) -> &ExperienceConfig {
        &self.config
    }

    pub fn base_experience(&self, difficulty: Difficulty) -> i64 {
        self.config.difficulty_base_values.get(difficulty)
    }

    /// Product of the configured multipliers; unknown tags count as 1.0.
    pub fn importance_multiplier<'a>(&self, tags: impl IntoIterator<Item = &'a String>) -> f64 {
        self.config.importance_multipliers.combined(tags)
    }

    pub fn treasure_experience(&self, tier: TreasureTier) -> i64 {
        self.config.treasure_tier_values.get(tier)
    }

    pub fn realm_thresholds(&self) -> &[i64] {
        &self.config.realm_thresholds
    }

    pub fn level_thresholds(&self) -> &[i64] {
        &self.config.level_thresholds
    }

    pub fn constraints(&self) -> &Constraints {
        &self.config.constraints
    }

    /// Current configuration as a complete JSON document.
    pub fn to_json(&self) -> ApplicationResult<String> {
        serde_json::to_string_pretty(&RawExperienceConfig::from(&self.config))
            .map_err(|e| ApplicationError::operation("serialize experience config", e))
    }
}
