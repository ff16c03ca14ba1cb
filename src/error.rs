//! Error types for the monitoring core.
//!
//! Per-row CSV problems are not errors; they travel as data in
//! [`crate::csv_parser::ParseOutcome`]. Only failures that abort a whole
//! operation are represented here.

use thiserror::Error;

/// Storage collaborator failure.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored profile violates the range invariants
    #[error("Corrupt culture profile: {0}")]
    Profile(#[from] ProfileError),

    /// In-memory store lock was poisoned by a panicking writer
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Range profile rejected at construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    #[error("culture profile name must not be blank")]
    MissingName,

    #[error("{profile}: {field} bounds must be finite numbers")]
    NonFinite { profile: String, field: &'static str },

    #[error("{profile}: {field} minimum {min} must be strictly below maximum {max}")]
    InvalidRange {
        profile: String,
        field: &'static str,
        min: f64,
        max: f64,
    },
}

/// Whole-file CSV import failure. Nothing is persisted when one of these is
/// returned.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("CSV file is empty or could not be read")]
    Empty,

    #[error("Failed to read CSV file: {0}")]
    Unreadable(String),

    #[error("{0}")]
    InvalidHeader(String),

    #[error("No valid measurements found in CSV file. Errors: {}", .errors.join("; "))]
    NoValidRows { errors: Vec<String> },

    #[error("Database error while saving measurements: {0}")]
    Storage(#[from] StoreError),
}

/// Text column held a value outside the enum's vocabulary.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
