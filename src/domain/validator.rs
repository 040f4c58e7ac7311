//! Invariant checks over configurations and realized allocations
//!
//! Every check returns a `ValidationReport` and reports all violations it
//! finds. Nothing here fails with an error.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde_json::json;
use tracing::debug;

use crate::domain::validation::codes;
use crate::domain::{
    Difficulty, ExperienceAllocation, ExperienceConfig, Node, TreasureTier, ValidationIssue,
    ValidationReport, LEVEL_COUNT, REALM_COUNT,
};

/// Codes used for one threshold table.
struct TableCodes {
    name: &'static str,
    count: &'static str,
    monotonicity: &'static str,
    start: &'static str,
    end: &'static str,
}

const REALM_CODES: TableCodes = TableCodes {
    name: "realm",
    count: codes::REALM_THRESHOLD_COUNT,
    monotonicity: codes::REALM_THRESHOLD_MONOTONICITY,
    start: codes::REALM_THRESHOLD_START,
    end: codes::REALM_THRESHOLD_END,
};

const LEVEL_CODES: TableCodes = TableCodes {
    name: "level",
    count: codes::LEVEL_THRESHOLD_COUNT,
    monotonicity: codes::LEVEL_THRESHOLD_MONOTONICITY,
    start: codes::LEVEL_THRESHOLD_START,
    end: codes::LEVEL_THRESHOLD_END,
};

/// Stateless validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    /// Semantic checks of a complete configuration.
    ///
    /// Ordering of base values and tier values is only a warning here; the
    /// allocation checks enforce the realized ordering.
    pub fn validate_config(config: &ExperienceConfig) -> ValidationReport {
        let mut report = ValidationReport::new();
        let total = config.total_experience;

        if total <= 0 {
            report.push(schema_error("totalExperience", "must be a positive integer", json!(total)));
        }
        for d in Difficulty::ALL {
            let value = config.difficulty_base_values.get(d);
            if value <= 0 {
                report.push(schema_error(
                    &format!("difficultyBaseValues.{d}"),
                    "must be a positive integer",
                    json!(value),
                ));
            }
        }
        for t in TreasureTier::ALL {
            let value = config.treasure_tier_values.get(t);
            if value <= 0 {
                report.push(schema_error(
                    &format!("treasureTierValues.{t}"),
                    "must be a positive integer",
                    json!(value),
                ));
            }
        }
        let pct = config.constraints.max_single_node_percentage;
        if !(pct > 0.0 && pct <= 1.0) {
            report.push(schema_error(
                "constraints.maxSingleNodePercentage",
                "must be in (0, 1]",
                json!(pct),
            ));
        }
        let min = config.constraints.min_node_experience;
        if min < 1 {
            report.push(schema_error(
                "constraints.minNodeExperience",
                "must be at least 1",
                json!(min),
            ));
        }

        let base = &config.difficulty_base_values;
        if !(base.easy <= base.medium && base.medium <= base.hard) {
            report.push(ValidationIssue::warning(
                codes::DIFFICULTY_ORDERING,
                "Difficulty base values should satisfy easy <= medium <= hard",
                json!({"easy": base.easy, "medium": base.medium, "hard": base.hard}),
            ));
        }

        let tiers: Vec<i64> = TreasureTier::ALL
            .iter()
            .map(|t| config.treasure_tier_values.get(*t))
            .collect();
        if !tiers.windows(2).all(|w| w[0] <= w[1]) {
            let values = &config.treasure_tier_values;
            report.push(ValidationIssue::warning(
                codes::TREASURE_TIER_ORDERING,
                "Treasure tier values should satisfy early <= mid <= late <= final",
                json!({
                    "early": values.early,
                    "mid": values.mid,
                    "late": values.late,
                    "final": values.final_,
                }),
            ));
        }

        check_threshold_table(
            &mut report,
            &REALM_CODES,
            &config.realm_thresholds,
            REALM_COUNT,
            total,
        );
        check_threshold_table(
            &mut report,
            &LEVEL_CODES,
            &config.level_thresholds,
            LEVEL_COUNT,
            total,
        );

        for (tag, multiplier) in config.importance_multipliers.iter() {
            if !(*multiplier >= 1.0) {
                report.push(ValidationIssue::error(
                    codes::INVALID_MULTIPLIER,
                    format!("Importance multiplier for \"{tag}\" must be >= 1.0, got {multiplier}"),
                    json!({"tag": tag, "multiplier": multiplier}),
                ));
            }
        }

        debug!(
            "validate_config: {} errors, {} warnings",
            report.errors.len(),
            report.warnings.len()
        );
        report
    }

    /// Exact total conservation plus positivity of every node.
    pub fn validate_total(allocation: &ExperienceAllocation, target_total: i64) -> ValidationReport {
        let mut report = ValidationReport::new();
        let actual = allocation.total();
        let deviation = actual - target_total;
        if deviation != 0 {
            report.push(ValidationIssue::error(
                codes::TOTAL_EXPERIENCE_MISMATCH,
                format!("Total experience {actual} does not equal {target_total} (deviation {deviation})"),
                json!({"expected": target_total, "actual": actual, "deviation": deviation}),
            ));
        }
        for (node_id, experience) in allocation.iter() {
            if experience <= 0 {
                report.push(ValidationIssue::error(
                    codes::INVALID_EXPERIENCE_VALUE,
                    format!("Node {node_id} has non-positive experience {experience}"),
                    json!({"nodeId": node_id, "experience": experience}),
                ));
            }
        }
        report
    }

    /// `mean(easy) <= mean(medium) <= mean(hard)` over the realized allocation.
    ///
    /// Empty groups are skipped; the remaining groups are compared pairwise
    /// in difficulty order.
    pub fn validate_difficulty_ordering<'n>(
        allocation: &ExperienceAllocation,
        nodes: impl IntoIterator<Item = &'n Node>,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();

        let mut groups: BTreeMap<Difficulty, Vec<i64>> = BTreeMap::new();
        for problem in nodes.into_iter().filter_map(Node::as_problem) {
            if let Some(value) = allocation.get(&problem.id) {
                groups.entry(problem.difficulty).or_default().push(value);
            }
        }

        let means: Vec<(Difficulty, f64, usize)> = groups
            .into_iter()
            .map(|(d, values)| {
                let mean = values.iter().sum::<i64>() as f64 / values.len() as f64;
                (d, mean, values.len())
            })
            .collect();

        for ((lower, lower_mean, lower_count), (higher, higher_mean, higher_count)) in
            means.into_iter().tuple_windows()
        {
            if lower_mean > higher_mean {
                report.push(ValidationIssue::error(
                    codes::DIFFICULTY_ORDERING_VIOLATION,
                    format!(
                        "Average {lower} experience ({lower_mean:.2}) exceeds average {higher} experience ({higher_mean:.2})"
                    ),
                    json!({
                        "lower": lower.as_str(),
                        "higher": higher.as_str(),
                        "lowerMean": lower_mean,
                        "higherMean": higher_mean,
                        "lowerCount": lower_count,
                        "higherCount": higher_count,
                    }),
                ));
            }
        }
        report
    }

    /// Same-tier consistency (warning) and strict cross-tier ordering.
    pub fn validate_treasure_tiers<'n>(
        allocation: &ExperienceAllocation,
        nodes: impl IntoIterator<Item = &'n Node>,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();

        let mut by_tier: BTreeMap<TreasureTier, Vec<(&str, i64)>> = BTreeMap::new();
        for treasure in nodes.into_iter().filter_map(Node::as_treasure) {
            if let Some(value) = allocation.get(&treasure.id) {
                by_tier
                    .entry(treasure.tier)
                    .or_default()
                    .push((treasure.id.as_str(), value));
            }
        }

        for (tier, entries) in &by_tier {
            let distinct: Vec<i64> = entries.iter().map(|(_, v)| *v).unique().sorted().collect();
            if distinct.len() > 1 {
                report.push(ValidationIssue::warning(
                    codes::TREASURE_TIER_INCONSISTENCY,
                    format!("Treasures of tier {tier} carry different experience values"),
                    json!({"tier": tier.as_str(), "values": distinct, "count": entries.len()}),
                ));
            }
        }

        let representative = |tier: TreasureTier| {
            by_tier
                .get(&tier)
                .and_then(|entries| entries.first())
                .map(|(_, v)| *v)
        };
        for (lower, higher) in TreasureTier::ALL.iter().copied().tuple_windows() {
            let (Some(lower_value), Some(higher_value)) =
                (representative(lower), representative(higher))
            else {
                continue;
            };
            if lower_value >= higher_value {
                report.push(ValidationIssue::error(
                    codes::TREASURE_TIER_ORDERING_VIOLATION,
                    format!(
                        "Tier {lower} ({lower_value}) must be strictly below tier {higher} ({higher_value})"
                    ),
                    json!({
                        "lower": lower.as_str(),
                        "higher": higher.as_str(),
                        "lowerValue": lower_value,
                        "higherValue": higher_value,
                    }),
                ));
            }
        }
        report
    }

    pub fn validate_realm_thresholds(thresholds: &[i64], total_experience: i64) -> ValidationReport {
        let mut report = ValidationReport::new();
        check_threshold_table(&mut report, &REALM_CODES, thresholds, REALM_COUNT, total_experience);
        report
    }

    /// Every allocation check plus the per-node percentage and minimum
    /// constraints.
    pub fn validate_all<'n>(
        allocation: &ExperienceAllocation,
        nodes: impl IntoIterator<Item = &'n Node>,
        config: &ExperienceConfig,
    ) -> ValidationReport {
        let nodes: Vec<&Node> = nodes.into_iter().collect();
        let total = config.total_experience;

        let mut report = Self::validate_total(allocation, total);
        report.merge(Self::validate_difficulty_ordering(
            allocation,
            nodes.iter().copied(),
        ));
        report.merge(Self::validate_treasure_tiers(allocation, nodes.iter().copied()));
        report.merge(Self::validate_realm_thresholds(&config.realm_thresholds, total));

        let max_pct = config.constraints.max_single_node_percentage;
        let max_allowed = total as f64 * max_pct;
        let min_allowed = config.constraints.min_node_experience;
        for (node_id, experience) in allocation.iter() {
            if experience as f64 > max_allowed {
                let percentage = if total != 0 {
                    experience as f64 / total as f64 * 100.0
                } else {
                    f64::INFINITY
                };
                report.push(ValidationIssue::error(
                    codes::MAX_PERCENTAGE_VIOLATION,
                    format!(
                        "Node {node_id} holds {percentage:.2}% of the total, limit is {:.2}%",
                        max_pct * 100.0
                    ),
                    json!({
                        "nodeId": node_id,
                        "experience": experience,
                        "percentage": percentage,
                        "maxPercentage": max_pct * 100.0,
                    }),
                ));
            }
            if experience < min_allowed {
                report.push(ValidationIssue::error(
                    codes::MIN_EXPERIENCE_VIOLATION,
                    format!("Node {node_id} has {experience} experience, minimum is {min_allowed}"),
                    json!({"nodeId": node_id, "experience": experience, "minimum": min_allowed}),
                ));
            }
        }

        debug!(
            "validate_all: {} nodes, {} errors, {} warnings",
            allocation.len(),
            report.errors.len(),
            report.warnings.len()
        );
        report
    }
}

fn schema_error(field: &str, message: &str, value: serde_json::Value) -> ValidationIssue {
    ValidationIssue::error(
        codes::SCHEMA_VALIDATION_ERROR,
        format!("{field} {message}"),
        json!({"field": field, "value": value}),
    )
}

/// Count, start, end and strict monotonicity of one threshold table.
/// A wrong count skips the index-based checks.
fn check_threshold_table(
    report: &mut ValidationReport,
    table: &TableCodes,
    thresholds: &[i64],
    expected_count: usize,
    total_experience: i64,
) {
    let name = table.name;
    if thresholds.len() != expected_count {
        report.push(ValidationIssue::error(
            table.count,
            format!(
                "Expected {expected_count} {name} thresholds, got {}",
                thresholds.len()
            ),
            json!({"expected": expected_count, "actual": thresholds.len()}),
        ));
        return;
    }

    if thresholds[0] != 0 {
        report.push(ValidationIssue::error(
            table.start,
            format!("First {name} threshold must be 0, got {}", thresholds[0]),
            json!({"actual": thresholds[0]}),
        ));
    }
    let last = thresholds[expected_count - 1];
    if last != total_experience {
        report.push(ValidationIssue::error(
            table.end,
            format!("Last {name} threshold must equal total experience {total_experience}, got {last}"),
            json!({"expected": total_experience, "actual": last}),
        ));
    }
    for (index, pair) in thresholds.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            report.push(ValidationIssue::error(
                table.monotonicity,
                format!(
                    "{name} threshold at index {} ({}) must exceed the previous one ({})",
                    index + 1,
                    pair[1],
                    pair[0]
                ),
                json!({"index": index + 1, "previous": pair[0], "current": pair[1]}),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProblemNode, TreasureNode};

    fn alloc(entries: &[(&str, i64)]) -> ExperienceAllocation {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn given_default_config_when_validating_then_is_valid_without_warnings() {
        let report = Validator::validate_config(&ExperienceConfig::default());
        assert!(report.valid, "{report}");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn given_total_off_by_one_when_validating_total_then_single_mismatch_with_deviation() {
        let allocation = alloc(&[("a", 500_000), ("b", 499_999)]);

        let report = Validator::validate_total(&allocation, 1_000_000);

        assert_eq!(report.errors.len(), 1);
        let issue = &report.errors[0];
        assert_eq!(issue.code, codes::TOTAL_EXPERIENCE_MISMATCH);
        assert_eq!(issue.detail("deviation"), Some(&json!(-1)));
    }

    #[test]
    fn given_zero_node_with_matching_total_when_validating_total_then_reports_invalid_value() {
        let allocation = alloc(&[("a", 1_000_000), ("b", 0)]);

        let report = Validator::validate_total(&allocation, 1_000_000);

        assert!(!report.valid);
        assert!(report.has_code(codes::INVALID_EXPERIENCE_VALUE));
        assert!(!report.has_code(codes::TOTAL_EXPERIENCE_MISMATCH));
    }

    #[test]
    fn given_inverted_difficulty_means_when_validating_then_reports_each_violation() {
        let nodes: Vec<Node> = vec![
            ProblemNode::new("e", Difficulty::Easy).into(),
            ProblemNode::new("m", Difficulty::Medium).into(),
            ProblemNode::new("h", Difficulty::Hard).into(),
        ];
        let allocation = alloc(&[("e", 300), ("m", 200), ("h", 100)]);

        let report = Validator::validate_difficulty_ordering(&allocation, &nodes);

        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].detail("lower"), Some(&json!("easy")));
        assert_eq!(report.errors[0].detail("lowerCount"), Some(&json!(1)));
    }

    #[test]
    fn given_missing_medium_group_when_validating_ordering_then_compares_easy_with_hard() {
        let nodes: Vec<Node> = vec![
            ProblemNode::new("e", Difficulty::Easy).into(),
            ProblemNode::new("h", Difficulty::Hard).into(),
        ];
        let allocation = alloc(&[("e", 300), ("h", 100)]);

        let report = Validator::validate_difficulty_ordering(&allocation, &nodes);

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].detail("higher"), Some(&json!("hard")));
    }

    #[test]
    fn given_unequal_same_tier_values_when_validating_tiers_then_warns_only() {
        let nodes: Vec<Node> = vec![
            TreasureNode::new("t1", TreasureTier::Early, 1).into(),
            TreasureNode::new("t2", TreasureTier::Early, 2).into(),
            TreasureNode::new("t3", TreasureTier::Final, 3).into(),
        ];
        let allocation = alloc(&[("t1", 100), ("t2", 110), ("t3", 500)]);

        let report = Validator::validate_treasure_tiers(&allocation, &nodes);

        assert!(report.valid);
        assert!(report.has_code(codes::TREASURE_TIER_INCONSISTENCY));
    }

    #[test]
    fn given_equal_adjacent_tiers_when_validating_then_strict_ordering_fails() {
        let nodes: Vec<Node> = vec![
            TreasureNode::new("t1", TreasureTier::Early, 1).into(),
            TreasureNode::new("t2", TreasureTier::Mid, 2).into(),
        ];
        let allocation = alloc(&[("t1", 100), ("t2", 100)]);

        let report = Validator::validate_treasure_tiers(&allocation, &nodes);

        assert!(report.has_code(codes::TREASURE_TIER_ORDERING_VIOLATION));
    }

    #[test]
    fn given_wrong_realm_count_when_validating_then_short_circuits() {
        let report = Validator::validate_realm_thresholds(&[5, 3, 1], 1_000_000);

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, codes::REALM_THRESHOLD_COUNT);
    }

    #[test]
    fn given_bad_realm_table_when_validating_then_reports_all_violations() {
        let thresholds = vec![
            1, 50_000, 40_000, 220_000, 350_000, 500_000, 650_000, 780_000, 880_000, 950_000, 999_000,
        ];

        let report = Validator::validate_realm_thresholds(&thresholds, 1_000_000);

        assert!(report.has_code(codes::REALM_THRESHOLD_START));
        assert!(report.has_code(codes::REALM_THRESHOLD_END));
        let monotonic: Vec<_> = report
            .issues_with_code(codes::REALM_THRESHOLD_MONOTONICITY)
            .collect();
        assert_eq!(monotonic.len(), 1);
        assert_eq!(monotonic[0].detail("index"), Some(&json!(2)));
    }

    #[test]
    fn given_multiplier_below_one_and_inverted_bases_when_validating_config_then_error_and_warning() {
        let mut config = ExperienceConfig::default();
        config.importance_multipliers.insert("penalty", 0.5);
        config.difficulty_base_values.easy = 9000;

        let report = Validator::validate_config(&config);

        assert!(!report.valid);
        assert!(report.has_code(codes::INVALID_MULTIPLIER));
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].code, codes::DIFFICULTY_ORDERING);
    }

    #[test]
    fn given_concentrated_allocation_when_validating_all_then_flags_percentage() {
        let config = ExperienceConfig::default();
        let nodes: Vec<Node> = vec![
            ProblemNode::new("a", Difficulty::Easy).into(),
            ProblemNode::new("b", Difficulty::Hard).into(),
        ];
        let allocation = alloc(&[("a", 400_000), ("b", 600_000)]);

        let report = Validator::validate_all(&allocation, &nodes, &config);

        assert_eq!(
            report.issues_with_code(codes::MAX_PERCENTAGE_VIOLATION).count(),
            2
        );
        assert!(!report.has_code(codes::MIN_EXPERIENCE_VIOLATION));
    }
}
