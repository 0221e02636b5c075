//! Crate-wide error taxonomy.
//!
//! Every fatal condition the projection core can hit collapses into one of the four kinds
//! below. There is no retry path anywhere in this crate: a solver failure fails the whole
//! solve, a bad table fails the whole construction, and nothing here is caught and resumed.
//! Non-fatal diagnostics (inforce specamt below the new minimum, and the like) are not
//! represented as `LmiError` at all -- they go out through `log::warn!` instead, since the
//! run continues regardless.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmiError {
    /// Inconsistent product database or rate table, detected at construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Precondition failure in stratified algebra, calendar, or currency arithmetic.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// An illustration request that is nonsensical given the cell's inforce state.
    #[error("inforce anomaly: {0}")]
    InforceAnomaly(String),

    /// The solver could not bracket or converge on a root.
    #[error("convergence failure: {0}")]
    Convergence(String),

    /// Cooperative cancellation requested by the caller (census driver only).
    #[error("run cancelled")]
    Cancelled,

    /// I/O or parse failure loading a CSV/JSON fixture.
    #[error("table load error: {0}")]
    TableLoad(#[from] TableLoadError),
}

#[derive(Debug, Error)]
pub enum TableLoadError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error reading {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

pub type LmiResult<T> = Result<T, LmiError>;
