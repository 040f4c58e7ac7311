//! Experience configuration: the balance knobs of the allocation engine
//!
//! `RawExperienceConfig` is the partial document as it comes from a file or
//! caller: every field optional, so "not specified" can be told apart from
//! an explicit value. `RawExperienceConfig::merge_with_defaults` turns it into
//! a complete `ExperienceConfig`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::rounding::{round_f64, round_ratio};
use crate::domain::{Difficulty, TreasureTier};

pub const DEFAULT_TOTAL_EXPERIENCE: i64 = 1_000_000;
pub const REALM_COUNT: usize = 11;
pub const LEVEL_COUNT: usize = 100;

const DEFAULT_REALM_THRESHOLDS: [i64; REALM_COUNT] = [
    0, 50_000, 120_000, 220_000, 350_000, 500_000, 650_000, 780_000, 880_000, 950_000, 1_000_000,
];

/// Base experience per difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyBaseValues {
    pub easy: i64,
    pub medium: i64,
    pub hard: i64,
}

impl DifficultyBaseValues {
    pub fn get(&self, difficulty: Difficulty) -> i64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

impl Default for DifficultyBaseValues {
    fn default() -> Self {
        Self {
            easy: 5000,
            medium: 8000,
            hard: 12000,
        }
    }
}

/// Experience per treasure tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasureTierValues {
    pub early: i64,
    pub mid: i64,
    pub late: i64,
    #[serde(rename = "final")]
    pub final_: i64,
}

impl TreasureTierValues {
    pub fn get(&self, tier: TreasureTier) -> i64 {
        match tier {
            TreasureTier::Early => self.early,
            TreasureTier::Mid => self.mid,
            TreasureTier::Late => self.late,
            TreasureTier::Final => self.final_,
        }
    }
}

impl Default for TreasureTierValues {
    fn default() -> Self {
        Self {
            early: 15000,
            mid: 25000,
            late: 35000,
            final_: 50000,
        }
    }
}

/// Tag → multiplier mapping.
///
/// A tag missing from the mapping is neutral: its multiplier is 1.0.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportanceMultipliers(BTreeMap<String, f64>);

impl ImportanceMultipliers {
    pub fn new(map: BTreeMap<String, f64>) -> Self {
        Self(map)
    }

    /// Multiplier for a single tag, 1.0 when unknown.
    pub fn factor(&self, tag: &str) -> f64 {
        self.0.get(tag).copied().unwrap_or(1.0)
    }

    /// Configured multiplier for a tag, `None` when unknown.
    pub fn get(&self, tag: &str) -> Option<f64> {
        self.0.get(tag).copied()
    }

    /// Product of the multipliers of all tags; 1.0 for an empty set.
    pub fn combined<'a, I>(&self, tags: I) -> f64
    where
        I: IntoIterator<Item = &'a String>,
    {
        tags.into_iter().map(|t| self.factor(t)).product()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    pub fn insert(&mut self, tag: impl Into<String>, multiplier: f64) {
        self.0.insert(tag.into(), multiplier);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn defaults() -> Self {
        let mut map = BTreeMap::new();
        map.insert("highFrequencyInterview".to_string(), 1.3);
        map.insert("classicAlgorithm".to_string(), 1.2);
        map.insert("hasAnimation".to_string(), 1.15);
        Self(map)
    }
}

/// Global allocation constraints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    /// Largest share of the total a single node may hold, in (0, 1].
    pub max_single_node_percentage: f64,
    /// Smallest experience a node may hold, >= 1.
    pub min_node_experience: i64,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_single_node_percentage: 0.05,
            min_node_experience: 1,
        }
    }
}

/// Complete configuration of the experience system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceConfig {
    /// Authoritative experience budget shared by all nodes.
    pub total_experience: i64,
    pub difficulty_base_values: DifficultyBaseValues,
    pub importance_multipliers: ImportanceMultipliers,
    pub treasure_tier_values: TreasureTierValues,
    /// Exactly `REALM_COUNT` thresholds, 0 up to `total_experience`.
    pub realm_thresholds: Vec<i64>,
    /// Exactly `LEVEL_COUNT` thresholds, 0 up to `total_experience`.
    pub level_thresholds: Vec<i64>,
    pub constraints: Constraints,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            total_experience: DEFAULT_TOTAL_EXPERIENCE,
            difficulty_base_values: DifficultyBaseValues::default(),
            importance_multipliers: ImportanceMultipliers::defaults(),
            treasure_tier_values: TreasureTierValues::default(),
            realm_thresholds: DEFAULT_REALM_THRESHOLDS.to_vec(),
            level_thresholds: default_level_thresholds(DEFAULT_TOTAL_EXPERIENCE),
            constraints: Constraints::default(),
        }
    }
}

/// Default realm table for a budget: the stock table scaled to `total`.
pub fn default_realm_thresholds(total: i64) -> Vec<i64> {
    DEFAULT_REALM_THRESHOLDS
        .iter()
        .map(|t| round_ratio(*t, total, DEFAULT_TOTAL_EXPERIENCE))
        .collect()
}

/// Default level curve: quadratic, `round(total × (i / 99)²)` for level `i + 1`.
pub fn default_level_thresholds(total: i64) -> Vec<i64> {
    let last = (LEVEL_COUNT - 1) as f64;
    (0..LEVEL_COUNT)
        .map(|i| {
            let ratio = i as f64 / last;
            round_f64(total as f64 * ratio * ratio)
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDifficultyBaseValues {
    pub easy: Option<i64>,
    pub medium: Option<i64>,
    pub hard: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTreasureTierValues {
    pub early: Option<i64>,
    pub mid: Option<i64>,
    pub late: Option<i64>,
    #[serde(rename = "final")]
    pub final_: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawConstraints {
    pub max_single_node_percentage: Option<f64>,
    pub min_node_experience: Option<i64>,
}

/// Partial configuration for intermediate parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawExperienceConfig {
    pub total_experience: Option<i64>,
    pub difficulty_base_values: RawDifficultyBaseValues,
    /// Merged key-by-key over the default multipliers.
    pub importance_multipliers: Option<BTreeMap<String, f64>>,
    pub treasure_tier_values: RawTreasureTierValues,
    pub realm_thresholds: Option<Vec<i64>>,
    pub level_thresholds: Option<Vec<i64>>,
    pub constraints: RawConstraints,
}

impl RawExperienceConfig {
    /// Fill every omitted field from the built-in defaults.
    ///
    /// - Scalars: specified value wins, otherwise the default
    /// - Nested groups: merged field by field
    /// - Multipliers: union over the defaults, specified tags win
    /// - Omitted threshold tables: derived from the effective total
    pub fn merge_with_defaults(&self) -> ExperienceConfig {
        let defaults = ExperienceConfig::default();
        let total = self.total_experience.unwrap_or(defaults.total_experience);

        let base = &self.difficulty_base_values;
        let tiers = &self.treasure_tier_values;
        let constraints = &self.constraints;

        let mut multipliers = defaults.importance_multipliers.clone();
        if let Some(overlay) = &self.importance_multipliers {
            for (tag, value) in overlay {
                multipliers.insert(tag.clone(), *value);
            }
        }

        ExperienceConfig {
            total_experience: total,
            difficulty_base_values: DifficultyBaseValues {
                easy: base.easy.unwrap_or(defaults.difficulty_base_values.easy),
                medium: base.medium.unwrap_or(defaults.difficulty_base_values.medium),
                hard: base.hard.unwrap_or(defaults.difficulty_base_values.hard),
            },
            importance_multipliers: multipliers,
            treasure_tier_values: TreasureTierValues {
                early: tiers.early.unwrap_or(defaults.treasure_tier_values.early),
                mid: tiers.mid.unwrap_or(defaults.treasure_tier_values.mid),
                late: tiers.late.unwrap_or(defaults.treasure_tier_values.late),
                final_: tiers.final_.unwrap_or(defaults.treasure_tier_values.final_),
            },
            realm_thresholds: self
                .realm_thresholds
                .clone()
                .unwrap_or_else(|| default_realm_thresholds(total)),
            level_thresholds: self
                .level_thresholds
                .clone()
                .unwrap_or_else(|| default_level_thresholds(total)),
            constraints: Constraints {
                max_single_node_percentage: constraints
                    .max_single_node_percentage
                    .unwrap_or(defaults.constraints.max_single_node_percentage),
                min_node_experience: constraints
                    .min_node_experience
                    .unwrap_or(defaults.constraints.min_node_experience),
            },
        }
    }
}

impl From<&ExperienceConfig> for RawExperienceConfig {
    fn from(config: &ExperienceConfig) -> Self {
        Self {
            total_experience: Some(config.total_experience),
            difficulty_base_values: RawDifficultyBaseValues {
                easy: Some(config.difficulty_base_values.easy),
                medium: Some(config.difficulty_base_values.medium),
                hard: Some(config.difficulty_base_values.hard),
            },
            importance_multipliers: Some(
                config
                    .importance_multipliers
                    .iter()
                    .map(|(k, v)| (k.clone(), *v))
                    .collect(),
            ),
            treasure_tier_values: RawTreasureTierValues {
                early: Some(config.treasure_tier_values.early),
                mid: Some(config.treasure_tier_values.mid),
                late: Some(config.treasure_tier_values.late),
                final_: Some(config.treasure_tier_values.final_),
            },
            realm_thresholds: Some(config.realm_thresholds.clone()),
            level_thresholds: Some(config.level_thresholds.clone()),
            constraints: RawConstraints {
                max_single_node_percentage: Some(config.constraints.max_single_node_percentage),
                min_node_experience: Some(config.constraints.min_node_experience),
            },
        }
    }
}
