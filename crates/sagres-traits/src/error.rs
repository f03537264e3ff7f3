//! Error types for the sagres pipeline.
//!
//! Structural problems (missing columns, duplicate join keys, unmappable
//! dates) abort the run. Per-date statistical insufficiency is deliberately
//! *not* represented here: those dates are skipped by the affected stage and
//! counted in its summary output instead.

use thiserror::Error;

/// The main error type for sagres operations.
///
/// Every variant is fatal to the stage that raises it; the pipeline makes no
/// attempt at partial recovery from structural data errors.
#[derive(Debug, Error)]
pub enum SagresError {
    /// A required column is absent from an input table.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A join or pivot key occurs more than once where uniqueness is required.
    ///
    /// Duplicate keys would silently fan out left-join rows or overwrite
    /// panel cells, so they are surfaced instead of deduplicated.
    #[error("Duplicate key in {table}: {detail}")]
    DuplicateKey {
        /// Name of the offending table or panel.
        table: String,
        /// Description of the colliding key(s).
        detail: String,
    },

    /// A calendar date could not be mapped to a fundamental report period.
    ///
    /// The disclosure-lag table covers all twelve months, so hitting this
    /// variant indicates a logic bug rather than bad input.
    #[error("Date cannot be mapped to a report period: {0}")]
    UnmappableDate(chrono::NaiveDate),

    /// An observation-frequency label is not in the fixed conversion table.
    #[error("Unknown frequency label: {0}")]
    UnknownFrequency(String),

    /// Too little data for an operation that cannot proceed at all
    /// (e.g. evaluating an empty return series).
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Malformed or inconsistent input data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Error from Polars operations.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl From<String> for SagresError {
    fn from(s: String) -> Self {
        Self::InvalidData(s)
    }
}

impl From<&str> for SagresError {
    fn from(s: &str) -> Self {
        Self::InvalidData(s.to_string())
    }
}

/// A specialized Result type for sagres operations.
pub type Result<T> = std::result::Result<T, SagresError>;
