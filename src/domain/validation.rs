//! Structured validation issues and reports
//!
//! Expected validation failures are returned as values, never raised.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable machine-readable issue codes.
pub mod codes {
    pub const SCHEMA_VALIDATION_ERROR: &str = "SCHEMA_VALIDATION_ERROR";
    pub const DIFFICULTY_ORDERING: &str = "DIFFICULTY_ORDERING";
    pub const TREASURE_TIER_ORDERING: &str = "TREASURE_TIER_ORDERING";
    pub const REALM_THRESHOLD_COUNT: &str = "REALM_THRESHOLD_COUNT";
    pub const REALM_THRESHOLD_MONOTONICITY: &str = "REALM_THRESHOLD_MONOTONICITY";
    pub const REALM_THRESHOLD_START: &str = "REALM_THRESHOLD_START";
    pub const REALM_THRESHOLD_END: &str = "REALM_THRESHOLD_END";
    pub const LEVEL_THRESHOLD_COUNT: &str = "LEVEL_THRESHOLD_COUNT";
    pub const LEVEL_THRESHOLD_MONOTONICITY: &str = "LEVEL_THRESHOLD_MONOTONICITY";
    pub const LEVEL_THRESHOLD_START: &str = "LEVEL_THRESHOLD_START";
    pub const LEVEL_THRESHOLD_END: &str = "LEVEL_THRESHOLD_END";
    pub const INVALID_MULTIPLIER: &str = "INVALID_MULTIPLIER";

    pub const TOTAL_EXPERIENCE_MISMATCH: &str = "TOTAL_EXPERIENCE_MISMATCH";
    pub const INVALID_EXPERIENCE_VALUE: &str = "INVALID_EXPERIENCE_VALUE";
    pub const DIFFICULTY_ORDERING_VIOLATION: &str = "DIFFICULTY_ORDERING_VIOLATION";
    pub const TREASURE_TIER_INCONSISTENCY: &str = "TREASURE_TIER_INCONSISTENCY";
    pub const TREASURE_TIER_ORDERING_VIOLATION: &str = "TREASURE_TIER_ORDERING_VIOLATION";
    pub const MAX_PERCENTAGE_VIOLATION: &str = "MAX_PERCENTAGE_VIOLATION";
    pub const MIN_EXPERIENCE_VIOLATION: &str = "MIN_EXPERIENCE_VIOLATION";

    pub const MIGRATION_NOT_FOUND: &str = "MIGRATION_NOT_FOUND";
    pub const MIGRATED_EXPERIENCE_OUT_OF_RANGE: &str = "MIGRATED_EXPERIENCE_OUT_OF_RANGE";
    pub const REALM_REGRESSION: &str = "REALM_REGRESSION";
    pub const ORPHANED_NODES: &str = "ORPHANED_NODES";
    pub const FAILED_MIGRATIONS: &str = "FAILED_MIGRATIONS";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single validation error or warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    /// Free-form diagnostic payload.
    pub details: Map<String, Value>,
}

impl ValidationIssue {
    pub fn error(code: &str, message: impl Into<String>, details: Value) -> Self {
        Self::new(code, message, Severity::Error, details)
    }

    pub fn warning(code: &str, message: impl Into<String>, details: Value) -> Self {
        Self::new(code, message, Severity::Warning, details)
    }

    fn new(code: &str, message: impl Into<String>, severity: Severity, details: Value) -> Self {
        let details = match details {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            code: code.to_string(),
            message: message.into(),
            severity,
            details,
        }
    }

    /// Look up a detail field.
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Outcome of a validation pass. `valid` iff there are no errors;
/// warnings never affect validity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Route an issue to errors or warnings by its severity.
    pub fn push(&mut self, issue: ValidationIssue) {
        match issue.severity {
            Severity::Error => {
                self.errors.push(issue);
                self.valid = false;
            }
            Severity::Warning => self.warnings.push(issue),
        }
    }

    /// Union of two reports.
    pub fn merge(&mut self, other: ValidationReport) {
        for issue in other.errors.into_iter().chain(other.warnings) {
            self.push(issue);
        }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.issues_with_code(code).next().is_some()
    }

    pub fn issues_with_code<'a>(
        &'a self,
        code: &'a str,
    ) -> impl Iterator<Item = &'a ValidationIssue> + 'a {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .filter(move |i| i.code == code)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        f.write_str(&lines.join("\n"))
    }
}
