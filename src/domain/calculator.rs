//! Experience calculation and normalization
//!
//! Raw per-node values come from the configuration formulas; the set is
//! then rescaled so that it sums to exactly `total_experience`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::rounding::{round_f64, round_ratio};
use crate::domain::{
    Difficulty, DomainError, DomainResult, ExperienceConfig, Node, NodeRegistry, TreasureTier,
};

/// Node id → allocated experience. Produced only by the calculator;
/// consumers rebuild it by recalculating instead of mutating it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperienceAllocation(BTreeMap<String, i64>);

impl ExperienceAllocation {
    pub fn get(&self, node_id: &str) -> Option<i64> {
        self.0.get(node_id).copied()
    }

    pub fn total(&self) -> i64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in node id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn values(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.values().copied()
    }
}

impl FromIterator<(String, i64)> for ExperienceAllocation {
    fn from_iter<T: IntoIterator<Item = (String, i64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Diagnostic breakdown of a single node's pre-normalization value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationExplanation {
    pub node_id: String,
    pub steps: Vec<String>,
    pub base_experience: i64,
    /// Value of the per-node formula *before* normalization.
    pub final_experience: i64,
    /// Applied tag → multiplier.
    pub multipliers: BTreeMap<String, f64>,
}

pub const NORMALIZATION_CAVEAT: &str =
    "Note: this is the pre-normalization value; the allocated value may differ after scaling to the total";

/// Stateless calculator over a borrowed configuration.
#[derive(Debug, Clone, Copy)]
pub struct ExperienceCalculator<'a> {
    config: &'a ExperienceConfig,
}

impl<'a> ExperienceCalculator<'a> {
    pub fn new(config: &'a ExperienceConfig) -> Self {
        Self { config }
    }

    /// `round(base(difficulty) × Π multiplier(tag))`, half away from zero.
    pub fn problem_experience<'t, I>(&self, difficulty: Difficulty, tags: I) -> i64
    where
        I: IntoIterator<Item = &'t String>,
    {
        let base = self.config.difficulty_base_values.get(difficulty);
        let multiplier = self.config.importance_multipliers.combined(tags);
        round_f64(base as f64 * multiplier)
    }

    /// Direct lookup, never scaled individually.
    pub fn treasure_experience(&self, tier: TreasureTier) -> i64 {
        self.config.treasure_tier_values.get(tier)
    }

    pub fn raw_experience(&self, node: &Node) -> i64 {
        match node {
            Node::Problem(p) => self.problem_experience(p.difficulty, &p.tags),
            Node::Treasure(t) => self.treasure_experience(t.tier),
        }
    }

    /// Allocate exactly `total_experience` across `nodes`.
    ///
    /// Values are scaled by `total / raw_total` with exact rational
    /// rounding. The rounding residual goes entirely to the node holding
    /// the largest scaled value; ties go to the lowest node id. A later
    /// node replaces an earlier one with the same id.
    pub fn calculate_all<'n>(
        &self,
        nodes: impl IntoIterator<Item = &'n Node>,
    ) -> DomainResult<ExperienceAllocation> {
        let target = self.config.total_experience;

        let raw: BTreeMap<String, i64> = nodes
            .into_iter()
            .map(|n| (n.id().to_string(), self.raw_experience(n)))
            .collect();
        if raw.is_empty() {
            return Ok(ExperienceAllocation::default());
        }

        let raw_total: i64 = raw.values().sum();
        debug!(
            "calculate_all: {} nodes, raw_total={}, target={}",
            raw.len(),
            raw_total,
            target
        );
        if raw_total == target {
            return Ok(ExperienceAllocation(raw));
        }
        if raw_total <= 0 {
            return Err(DomainError::DegenerateRawTotal(raw_total));
        }

        let mut scaled: BTreeMap<String, i64> = raw
            .into_iter()
            .map(|(id, value)| (id, round_ratio(value, target, raw_total)))
            .collect();

        let residual = target - scaled.values().sum::<i64>();
        if residual != 0 {
            let mut largest: Option<(&String, i64)> = None;
            for (id, value) in &scaled {
                if largest.map_or(true, |(_, max)| *value > max) {
                    largest = Some((id, *value));
                }
            }
            if let Some((id, _)) = largest {
                let id = id.clone();
                debug!("calculate_all: residual {} absorbed by {}", residual, id);
                if let Some(value) = scaled.get_mut(&id) {
                    *value += residual;
                }
            }
        }

        Ok(ExperienceAllocation(scaled))
    }

    /// Explain the per-node formula for `node_id`.
    ///
    /// The reported `final_experience` is the pre-normalization value; the
    /// steps end with a caveat saying so.
    pub fn explain(&self, registry: &NodeRegistry, node_id: &str) -> CalculationExplanation {
        let Some(node) = registry.get(node_id) else {
            return CalculationExplanation {
                node_id: node_id.to_string(),
                steps: vec![format!("Node {node_id} not found")],
                base_experience: 0,
                final_experience: 0,
                multipliers: BTreeMap::new(),
            };
        };

        let mut steps = Vec::new();
        let mut multipliers = BTreeMap::new();
        let (base_experience, final_experience) = match node {
            Node::Problem(problem) => {
                let base = self.config.difficulty_base_values.get(problem.difficulty);
                steps.push(format!("Base experience for {}: {}", problem.difficulty, base));

                let mut total_multiplier = 1.0;
                for tag in &problem.tags {
                    if let Some(m) = self.config.importance_multipliers.get(tag) {
                        multipliers.insert(tag.clone(), m);
                        total_multiplier *= m;
                        steps.push(format!("Tag \"{tag}\" multiplier: {m}"));
                    } else {
                        steps.push(format!("Tag \"{tag}\" not configured, multiplier: 1.0"));
                    }
                }
                if problem.tags.is_empty() {
                    steps.push("No importance tags, multiplier: 1.0".to_string());
                } else {
                    steps.push(format!("Total multiplier: {total_multiplier:.4}"));
                }

                let value = self.problem_experience(problem.difficulty, &problem.tags);
                steps.push(format!(
                    "Final experience: {base} × {total_multiplier:.4} = {value}"
                ));
                (base, value)
            }
            Node::Treasure(treasure) => {
                let value = self.treasure_experience(treasure.tier);
                steps.push(format!("Treasure tier \"{}\": {}", treasure.tier, value));
                (value, value)
            }
        };
        steps.push(NORMALIZATION_CAVEAT.to_string());

        CalculationExplanation {
            node_id: node_id.to_string(),
            steps,
            base_experience,
            final_experience,
            multipliers,
        }
    }
}
