//! The timestamp-indexed series at the heart of the pipeline.
//!
//! A `Series` is an ordered sequence of `(timestamp, value)` points plus a
//! set of exclusion windows. It is built once from raw records or delimited
//! text, then read through [`Series::data`], which can slice, resample onto a
//! uniform grid by linear interpolation, and filter excluded periods.
//!
//! Ingestion is deliberately tolerant: real meter feeds contain occasional
//! corrupt records, so a value that does not coerce to a finite float drops
//! that row rather than failing the whole load. Malformed timestamps indicate
//! a misconfigured feed and are fatal.
//!
//! Stored points are sorted ascending by timestamp. Duplicate timestamps are
//! retained as-is; interpolation reads the first point at a duplicated
//! abscissa.

use std::fmt::Write as _;
use std::path::Path;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::calendar::CalendarSet;
use crate::error::{Error, Result};
use crate::time::{self, TimeInput, Timestamp};

/// One observation: UTC epoch seconds and a finite value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Unit flag for temperature series; metadata consumed by the baseline model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnits {
    #[default]
    Fahrenheit,
    Celsius,
}

/// Read parameters for [`Series::data`].
///
/// Slicing only happens when both bounds are supplied; with neither, the full
/// stored range is used. `exclude` defaults to true.
#[derive(Debug, Clone)]
pub struct DataQuery {
    pub start_at: Option<TimeInput>,
    pub end_at: Option<TimeInput>,
    /// Resample step in seconds; enables linear interpolation onto a uniform
    /// grid when set.
    pub step_size: Option<i64>,
    pub exclude: bool,
}

impl Default for DataQuery {
    fn default() -> Self {
        Self {
            start_at: None,
            end_at: None,
            step_size: None,
            exclude: true,
        }
    }
}

impl DataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn between(mut self, start_at: impl Into<TimeInput>, end_at: impl Into<TimeInput>) -> Self {
        self.start_at = Some(start_at.into());
        self.end_at = Some(end_at.into());
        self
    }

    pub fn step(mut self, step_size: i64) -> Self {
        self.step_size = Some(step_size);
        self
    }

    /// Skip exclusion filtering.
    pub fn raw(mut self) -> Self {
        self.exclude = false;
        self
    }
}

/// Linear interpolation with clamped ends over sorted points.
///
/// Queries left of the first point return the first value, right of the last
/// return the last value. At a duplicated abscissa the first point wins.
pub(crate) fn interp(points: &[SeriesPoint], x: Timestamp) -> f64 {
    debug_assert!(!points.is_empty());
    let first = points[0];
    let last = points[points.len() - 1];
    if x <= first.timestamp {
        return first.value;
    }
    if x >= last.timestamp {
        return last.value;
    }
    // First index whose timestamp is >= x; x is strictly inside the range.
    let hi = points.partition_point(|p| p.timestamp < x);
    let upper = points[hi];
    if upper.timestamp == x {
        return upper.value;
    }
    let lower = points[hi - 1];
    let dx = (upper.timestamp - lower.timestamp) as f64;
    if dx == 0.0 {
        return upper.value;
    }
    let frac = (x - lower.timestamp) as f64 / dx;
    lower.value + frac * (upper.value - lower.value)
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// An ordered, timestamp-indexed numeric sequence with exclusion windows.
#[derive(Debug, Clone)]
pub struct Series {
    points: Vec<SeriesPoint>,
    exclusions: Vec<(Timestamp, Timestamp)>,
    timezone: Tz,
    temperature_units: TemperatureUnits,
}

impl Series {
    /// Build a series from raw `(timestamp-like, value)` records.
    ///
    /// Timestamps are normalized via [`crate::time::normalize`] (errors are
    /// fatal); non-finite values drop their row. Points are sorted ascending
    /// and validated before the series is returned.
    pub fn new<T>(records: impl IntoIterator<Item = (T, f64)>, timezone: Tz) -> Result<Self>
    where
        T: Into<TimeInput>,
    {
        let mut points = Vec::new();
        let mut dropped = 0usize;
        for (ts, value) in records {
            let timestamp = time::normalize(ts, timezone)?;
            if value.is_finite() {
                points.push(SeriesPoint::new(timestamp, value));
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!(dropped, "dropped records with non-finite values");
        }
        Self::finish(points, timezone)
    }

    /// Build a series from already-normalized points, trusting the caller.
    ///
    /// Used for derived series (baseline output, diff results) whose points
    /// are known-good; no validation is performed, so [`Series::valid`]
    /// remains meaningful on the result.
    pub fn from_points(mut points: Vec<SeriesPoint>, timezone: Tz) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self {
            points,
            exclusions: Vec::new(),
            timezone,
            temperature_units: TemperatureUnits::default(),
        }
    }

    /// Build a series from delimited text: column 0 is the timestamp,
    /// `data_column` selects the value column (1 = first value column).
    ///
    /// Rows whose value field is missing or does not parse as a finite float
    /// are dropped; malformed timestamps are fatal.
    pub fn from_csv_str(text: &str, timezone: Tz, data_column: usize) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut points = Vec::new();
        let mut dropped = 0usize;
        for record in reader.records() {
            let record = record?;
            let Some(ts_field) = record.get(0).filter(|f| !f.is_empty()) else {
                continue;
            };
            let timestamp = time::normalize(ts_field, timezone)?;
            match record.get(data_column).map(str::parse::<f64>) {
                Some(Ok(value)) if value.is_finite() => {
                    points.push(SeriesPoint::new(timestamp, value));
                }
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            warn!(dropped, "dropped rows without a usable value field");
        }
        Self::finish(points, timezone)
    }

    /// Like [`Series::from_csv_str`], reading from a file path.
    pub fn from_csv_path(path: impl AsRef<Path>, timezone: Tz, data_column: usize) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_csv_str(&text, timezone, data_column)
    }

    fn finish(mut points: Vec<SeriesPoint>, timezone: Tz) -> Result<Self> {
        points.sort_by_key(|p| p.timestamp);
        let series = Self {
            points,
            exclusions: Vec::new(),
            timezone,
            temperature_units: TemperatureUnits::default(),
        };
        series.validate()?;
        Ok(series)
    }

    /// Set the temperature unit flag (metadata only).
    pub fn with_temperature_units(mut self, units: TemperatureUnits) -> Self {
        self.temperature_units = units;
        self
    }

    // --- validation --- //

    /// First invariant violation in the stored points, if any. Shared by the
    /// raising and non-raising validation paths.
    fn first_violation(&self) -> Option<String> {
        for p in &self.points {
            if p.timestamp.abs() >= 10_000_000_000 {
                return Some(format!(
                    "timestamp {} is not in seconds since the unix epoch",
                    p.timestamp
                ));
            }
            if !p.value.is_finite() {
                return Some(format!(
                    "value at timestamp {} is not a finite number",
                    p.timestamp
                ));
            }
        }
        None
    }

    /// Raise on the first invariant violation.
    pub fn validate(&self) -> Result<()> {
        match self.first_violation() {
            Some(msg) => Err(Error::Validation(msg)),
            None => Ok(()),
        }
    }

    /// Non-raising validation.
    pub fn valid(&self) -> bool {
        self.first_violation().is_none()
    }

    // --- reads --- //

    /// Read points, optionally slicing, resampling, and exclusion-filtering.
    ///
    /// Resampling interpolates linearly onto `start..=end` stepped by
    /// `step_size` (end included only when it lands on the grid), rounding
    /// values to 2 decimals; it needs at least 2 stored points and clamps
    /// queries outside the stored range to the boundary values. Exclusion
    /// windows are applied last, inclusive on both ends, one interval at a
    /// time.
    pub fn data(&self, query: &DataQuery) -> Result<Vec<SeriesPoint>> {
        if self.points.is_empty() {
            return Err(Error::EmptySeries);
        }

        let explicit = match (&query.start_at, &query.end_at) {
            (Some(s), Some(e)) => Some((
                time::normalize(s.clone(), self.timezone)?,
                time::normalize(e.clone(), self.timezone)?,
            )),
            _ => None,
        };
        let (start_at, end_at) = explicit.unwrap_or((
            self.points[0].timestamp,
            self.points[self.points.len() - 1].timestamp,
        ));

        let mut data = if let Some(step) = query.step_size {
            if step <= 0 {
                return Err(Error::Validation(format!(
                    "step_size must be positive, got {step}"
                )));
            }
            if self.points.len() < 2 {
                return Err(Error::InsufficientData(self.points.len()));
            }
            let mut grid = Vec::new();
            let mut t = start_at;
            while t <= end_at {
                grid.push(SeriesPoint::new(t, round2(interp(&self.points, t))));
                t += step;
            }
            grid
        } else {
            self.points.clone()
        };

        if explicit.is_some() {
            data.retain(|p| p.timestamp >= start_at && p.timestamp <= end_at);
        }

        if query.exclude {
            for &(ex_start, ex_end) in &self.exclusions {
                data.retain(|p| p.timestamp < ex_start || p.timestamp > ex_end);
            }
        }

        Ok(data)
    }

    /// Stored points, raw order, no exclusion filtering.
    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    /// Stored values in timestamp order; exclusions are not applied.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn sum(&self) -> f64 {
        self.points.iter().map(|p| p.value).sum()
    }

    pub fn average(&self) -> Result<f64> {
        if self.points.is_empty() {
            return Err(Error::EmptySeries);
        }
        Ok(self.sum() / self.points.len() as f64)
    }

    /// First stored timestamp.
    pub fn start_at(&self) -> Result<Timestamp> {
        self.points.first().map(|p| p.timestamp).ok_or(Error::EmptySeries)
    }

    /// Last stored timestamp.
    pub fn end_at(&self) -> Result<Timestamp> {
        self.points.last().map(|p| p.timestamp).ok_or(Error::EmptySeries)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn temperature_units(&self) -> TemperatureUnits {
        self.temperature_units
    }

    pub fn is_fahrenheit(&self) -> bool {
        self.temperature_units == TemperatureUnits::Fahrenheit
    }

    // --- exclusion periods --- //

    /// Add a closed exclusion interval. Intervals are kept independent; no
    /// merging of overlaps is attempted.
    pub fn add_exclusion(
        &mut self,
        start_at: impl Into<TimeInput>,
        end_at: impl Into<TimeInput>,
    ) -> Result<()> {
        let start_at = time::normalize(start_at, self.timezone)?;
        let end_at = time::normalize(end_at, self.timezone)?;
        self.exclusions.push((start_at, end_at));
        Ok(())
    }

    /// Add one midnight-to-midnight 24-hour exclusion per date of a named
    /// calendar, localized in the series' timezone.
    pub fn add_named_exclusion(&mut self, name: &str, calendars: &CalendarSet) -> Result<()> {
        for &date in calendars.get(name)? {
            let start_at = time::localize(date.and_time(NaiveTime::MIN), self.timezone)?;
            self.exclusions.push((start_at, start_at + 24 * 3600));
        }
        Ok(())
    }

    pub fn clear_exclusions(&mut self) {
        self.exclusions.clear();
    }

    pub fn exclusions(&self) -> &[(Timestamp, Timestamp)] {
        &self.exclusions
    }

    // --- export --- //

    /// Serialize a read to two-column `local-time,value` text, the handoff
    /// format consumed by script-backed baseline models. Timestamps are
    /// rendered as local-time strings, not epoch integers.
    pub fn to_csv_string(&self, query: &DataQuery) -> Result<String> {
        write_table(&self.data(query)?, self.timezone)
    }

    /// Write [`Series::to_csv_string`] output to a file.
    pub fn write_to_file(&self, path: impl AsRef<Path>, query: &DataQuery) -> Result<()> {
        std::fs::write(path, self.to_csv_string(query)?)?;
        Ok(())
    }
}

/// Render points as `local-time,value` lines in the given zone.
pub(crate) fn write_table(points: &[SeriesPoint], tz: Tz) -> Result<String> {
    let mut out = String::new();
    for p in points {
        let local = time::format_local(p.timestamp, tz)?;
        // Infallible for String targets.
        let _ = writeln!(out, "{local},{}", p.value);
    }
    Ok(out)
}
