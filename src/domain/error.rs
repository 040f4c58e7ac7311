//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::ValidationReport;

/// Domain errors represent business rule violations.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Every violation found, never just the first.
    #[error("configuration validation failed:\n{0}")]
    InvalidConfiguration(ValidationReport),

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("raw experience total is {0}, cannot normalize")]
    DegenerateRawTotal(i64),

    #[error("invalid old realm configuration: {0}")]
    InvalidOldRealmConfig(String),

    #[error("empty user id")]
    EmptyUserId,

    #[error("duplicate user in batch: {0}")]
    DuplicateUser(String),

    #[error("realm {old_realm} has no counterpart in the new realm table (max {max_realm})")]
    UnmappableRealm { old_realm: usize, max_realm: usize },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
