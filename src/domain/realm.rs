//! Realm and level progression
//!
//! Pure threshold lookups over strictly increasing tables. Realms are
//! 0-based (0..=10), levels are 1-based (1..=100).

use crate::domain::ExperienceConfig;

/// A strictly increasing threshold table starting at 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdTable {
    thresholds: Vec<i64>,
}

impl ThresholdTable {
    pub fn new(thresholds: Vec<i64>) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &[i64] {
        &self.thresholds
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Highest index of the table.
    pub fn max_index(&self) -> usize {
        self.thresholds.len().saturating_sub(1)
    }

    pub fn threshold(&self, index: usize) -> Option<i64> {
        self.thresholds.get(index).copied()
    }

    /// Greatest index `i` with `thresholds[i] <= experience`.
    ///
    /// Negative experience maps to 0, anything at or above the last
    /// threshold maps to the last index.
    pub fn index_for(&self, experience: i64) -> usize {
        let Some(&last) = self.thresholds.last() else {
            return 0;
        };
        if experience < 0 {
            return 0;
        }
        if experience >= last {
            return self.max_index();
        }
        // number of thresholds <= experience, binary search
        self.thresholds
            .partition_point(|t| *t <= experience)
            .saturating_sub(1)
    }

    /// Experience still missing to reach the next index, 0 at the top.
    pub fn to_next(&self, experience: i64) -> i64 {
        let index = self.index_for(experience);
        if index >= self.max_index() {
            return 0;
        }
        (self.thresholds[index + 1] - experience).max(0)
    }

    /// Fraction of the current step covered, in [0, 1]; 1.0 at the top.
    pub fn progress(&self, experience: i64) -> f64 {
        let index = self.index_for(experience);
        if index >= self.max_index() {
            return 1.0;
        }
        let current = self.thresholds[index];
        let next = self.thresholds[index + 1];
        let span = (next - current) as f64;
        if span <= 0.0 {
            return 1.0;
        }
        ((experience - current) as f64 / span).clamp(0.0, 1.0)
    }
}

/// Converts cumulative experience into realm and level positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealmSystem {
    realms: ThresholdTable,
    levels: ThresholdTable,
}

impl RealmSystem {
    pub fn new(realm_thresholds: Vec<i64>, level_thresholds: Vec<i64>) -> Self {
        Self {
            realms: ThresholdTable::new(realm_thresholds),
            levels: ThresholdTable::new(level_thresholds),
        }
    }

    pub fn from_config(config: &ExperienceConfig) -> Self {
        Self::new(
            config.realm_thresholds.clone(),
            config.level_thresholds.clone(),
        )
    }

    pub fn realm_thresholds(&self) -> &[i64] {
        self.realms.thresholds()
    }

    pub fn level_thresholds(&self) -> &[i64] {
        self.levels.thresholds()
    }

    pub fn realm_table(&self) -> &ThresholdTable {
        &self.realms
    }

    pub fn max_realm(&self) -> usize {
        self.realms.max_index()
    }

    pub fn current_realm(&self, experience: i64) -> usize {
        self.realms.index_for(experience)
    }

    pub fn experience_to_next_realm(&self, experience: i64) -> i64 {
        self.realms.to_next(experience)
    }

    pub fn realm_progress(&self, experience: i64) -> f64 {
        self.realms.progress(experience)
    }

    /// 1-based level.
    pub fn current_level(&self, experience: i64) -> usize {
        self.levels.index_for(experience) + 1
    }

    pub fn experience_to_next_level(&self, experience: i64) -> i64 {
        self.levels.to_next(experience)
    }

    pub fn level_progress(&self, experience: i64) -> f64 {
        self.levels.progress(experience)
    }
}
