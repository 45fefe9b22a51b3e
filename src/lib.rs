//! `loadshape` library crate.
//!
//! Electric load shape analysis: weather-normalized baselines,
//! demand-response event performance, and tariff-based cost.
//!
//! The pipeline runs in four stages:
//!
//! 1. normalize heterogeneous timestamps to UTC epoch seconds ([`time`])
//! 2. build ordered, exclusion-aware series from raw records ([`series`])
//! 3. fit a baseline through the swappable model port ([`model`])
//! 4. derive diffs, event statistics, and costs ([`loadshape`], [`tariff`])

pub mod calendar;
pub mod error;
pub mod loadshape;
pub mod model;
pub mod series;
pub mod tariff;
pub mod time;

pub use calendar::CalendarSet;
pub use error::{Error, Result};
pub use loadshape::{BaselineOptions, CostOptions, DiffOptions, DiffOutput, Loadshape};
pub use model::{BaselineModel, ModelRequest, ModelResponse, RegressionModel, ScriptModel};
pub use series::{DataQuery, Series, SeriesPoint, TemperatureUnits};
pub use tariff::Tariff;
pub use time::{TimeInput, Timestamp};
