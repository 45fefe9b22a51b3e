//! The baseline modeling port.
//!
//! Fitting the weather-normalized baseline is an external, swappable
//! algorithm. The pipeline only depends on this one-method contract, which
//! keeps the orchestrator pure and testable with a fake model.
//!
//! Two implementations ship with the crate:
//! - [`RegressionModel`]: in-process time-of-week regression with optional
//!   temperature adjustment (weighted least squares)
//! - [`ScriptModel`]: temp-file handoff to an external executable, mirroring
//!   the classic R-script integration

use std::collections::BTreeMap;

use chrono_tz::Tz;

use crate::error::Result;
use crate::series::SeriesPoint;
use crate::time::Timestamp;

pub mod regression;
pub mod script;

pub use regression::RegressionModel;
pub use script::ScriptModel;

/// Everything a baseline model needs for one prediction run.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Training load: `(timestamp, kW)`, ordered, exclusions already applied.
    pub load: Vec<SeriesPoint>,
    /// Timestamps to predict for, ordered.
    pub prediction_times: Vec<Timestamp>,
    /// Training outdoor air temperature, if available.
    pub temperature: Option<Vec<SeriesPoint>>,
    /// Forecast temperature for the prediction window. Only meaningful when
    /// training temperature is present; a model ignores temperature for
    /// predictions lacking matching forecast data.
    pub forecast_temperature: Option<Vec<SeriesPoint>>,
    /// Unit flag for the temperature series.
    pub fahrenheit: bool,
    /// Recency-weighting window, days.
    pub weighting_days: u32,
    /// Modeling interval, minutes.
    pub interval_minutes: u32,
    /// Zone used for local-time rendering and time-of-week features.
    pub timezone: Tz,
}

/// Predicted load aligned to the requested timestamps, plus the model's
/// error-statistics record (lowercase metric name to value, uninterpreted
/// by the pipeline).
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub predictions: Vec<SeriesPoint>,
    pub error_stats: BTreeMap<String, f64>,
}

/// A baseline modeling service. One blocking round-trip per call; callers
/// own any timeout or cancellation policy.
pub trait BaselineModel {
    fn predict(&self, request: &ModelRequest) -> Result<ModelResponse>;
}
