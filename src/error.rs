//! Crate-wide error type.
//!
//! One enum covers the whole pipeline so callers can match on the failure
//! class without unwrapping nested error chains. Boundary errors (I/O, CSV,
//! JSON) are wrapped transparently; everything else carries enough context to
//! be actionable in a log line.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A timestamp input was malformed, or a timezone-naive instant was
    /// supplied where a disambiguated one is required.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Stored series data violates an invariant (seconds-precision
    /// timestamps, finite values). Carries the first violation found.
    #[error("invalid series: {0}")]
    Validation(String),

    /// An aggregate or read was requested on a series with no data.
    #[error("series is empty")]
    EmptySeries,

    /// Interpolation/resampling needs at least two stored points.
    #[error("interpolation requires at least 2 points, series has {0}")]
    InsufficientData(usize),

    /// `add_named_exclusion` was called with a calendar name that is not in
    /// the injected calendar set.
    #[error("unknown exclusion calendar: {0}")]
    UnknownExclusionSet(String),

    /// The external baseline modeling executable exited unsuccessfully.
    /// Captured diagnostic output is attached; the call is not retried.
    #[error("baseline model failed (exit status {status:?}): {stderr}")]
    ModelingService {
        status: Option<i32>,
        stderr: String,
    },

    /// The baseline model returned output the pipeline cannot consume.
    #[error("baseline model produced unusable output: {0}")]
    ModelOutput(String),

    /// A cost computation was requested but no tariff is configured.
    #[error("cannot calculate cost: no tariff configured")]
    MissingTariff,

    /// A percentage metric in `event_performance` had a zero denominator.
    #[error("zero denominator computing {metric}")]
    ZeroDenominator { metric: &'static str },

    /// The tariff document is missing a required section or is malformed
    /// beyond what serde_json reports.
    #[error("invalid tariff: {0}")]
    TariffFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
