//! Tariff parsing and cost integration.
//!
//! Tariffs arrive as OpenEI-style JSON documents: a flattened rate structure
//! (`energyratestructure/period<N>/<attr>` keys) plus per-day-kind schedules
//! assigning one rate period to each of 24 hour slots, with one schedule row
//! per month. Demand-response override periods substitute the DR-day
//! schedule for specific date ranges.
//!
//! Cost integration walks a timestamp grid over a load series: each interval
//! contributes `kWh x tier-1 rate` at the period in effect at the interval's
//! start, reported at the interval's end alongside a running cumulative cost.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, Timelike, Weekday};
use chrono_tz::Tz;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::series::{Series, SeriesPoint, interp};
use crate::time::{self, TimeInput, Timestamp};

/// A parsed tariff: tiered rate structure, day-kind schedules, and optional
/// demand-response override periods.
#[derive(Debug, Clone, Default)]
pub struct Tariff {
    /// period -> attribute -> value (e.g. `rate_structure[0]["tier1rate"]`).
    rate_structure: BTreeMap<u32, BTreeMap<String, f64>>,
    weekday_schedule: Option<Vec<Vec<u32>>>,
    weekend_schedule: Option<Vec<Vec<u32>>>,
    dr_schedule: Option<Vec<Vec<u32>>>,
    dr_periods: Vec<(Timestamp, Timestamp)>,
}

impl Tariff {
    /// Parse the first item of an OpenEI tariff document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(text)?;
        let item = doc
            .get("items")
            .and_then(|items| items.get(0))
            .and_then(Value::as_object)
            .ok_or_else(|| Error::TariffFormat("document has no items[0] object".into()))?;

        let mut rate_structure: BTreeMap<u32, BTreeMap<String, f64>> = BTreeMap::new();
        for (key, value) in item {
            if !key.contains("energyratestructure") {
                continue;
            }
            let mut parts = key.split('/');
            let (Some(_), Some(period_part), Some(attr)) =
                (parts.next(), parts.next(), parts.next())
            else {
                return Err(Error::TariffFormat(format!("unparseable rate key: {key}")));
            };
            let period: u32 = period_part
                .trim_start_matches("period")
                .parse()
                .map_err(|_| Error::TariffFormat(format!("unparseable rate period: {key}")))?;
            let value = value
                .as_f64()
                .ok_or_else(|| Error::TariffFormat(format!("non-numeric rate value: {key}")))?;
            rate_structure
                .entry(period)
                .or_default()
                .insert(attr.to_owned(), value);
        }
        if rate_structure.is_empty() {
            return Err(Error::TariffFormat("no energyratestructure entries".into()));
        }

        Ok(Self {
            rate_structure,
            weekday_schedule: parse_schedule(item.get("energyweekdayschedule"))?,
            weekend_schedule: parse_schedule(item.get("energyweekendschedule"))?,
            dr_schedule: parse_schedule(item.get("energydrdayschedule"))?,
            dr_periods: Vec::new(),
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Register a demand-response override window; the DR-day schedule (when
    /// present) is used for timestamps falling inside it.
    pub fn add_dr_period(
        &mut self,
        start_at: impl Into<TimeInput>,
        end_at: impl Into<TimeInput>,
        tz: Tz,
    ) -> Result<()> {
        let start_at = time::normalize(start_at, tz)?;
        let end_at = time::normalize(end_at, tz)?;
        self.dr_periods.push((start_at, end_at));
        Ok(())
    }

    pub fn dr_periods(&self) -> &[(Timestamp, Timestamp)] {
        &self.dr_periods
    }

    /// Tier-1 $/kWh rate in effect at `ts`.
    pub fn rate_at(&self, ts: Timestamp, tz: Tz) -> Result<f64> {
        let period = self.period_at(ts, tz)?;
        self.rate_structure
            .get(&period)
            .and_then(|attrs| attrs.get("tier1rate"))
            .copied()
            .ok_or_else(|| Error::TariffFormat(format!("no tier1rate for period {period}")))
    }

    /// Rate period in effect at `ts`: DR-day schedule inside a DR override,
    /// weekend schedule on Sat/Sun when present, weekday schedule otherwise.
    pub fn period_at(&self, ts: Timestamp, tz: Tz) -> Result<u32> {
        let local = time::to_local(ts, tz)?;

        let in_dr_period = self
            .dr_periods
            .iter()
            .any(|&(start, end)| ts >= start && ts <= end);
        let is_weekend = matches!(local.weekday(), Weekday::Sat | Weekday::Sun);

        let schedule = if in_dr_period && self.dr_schedule.is_some() {
            self.dr_schedule.as_ref()
        } else if is_weekend && self.weekend_schedule.is_some() {
            self.weekend_schedule.as_ref()
        } else {
            self.weekday_schedule.as_ref()
        }
        .ok_or_else(|| Error::TariffFormat("tariff has no applicable schedule".into()))?;

        // One row per month when the schedule carries 12; otherwise the
        // first row applies year-round.
        let row = schedule
            .get(local.month0() as usize)
            .or_else(|| schedule.first())
            .ok_or_else(|| Error::TariffFormat("empty schedule".into()))?;
        row.get(local.hour() as usize)
            .copied()
            .ok_or_else(|| Error::TariffFormat("schedule row shorter than 24 slots".into()))
    }

    /// Integrate cost over `times` for `load`.
    ///
    /// Returns `(cost, cumulative_cost)`: per-interval cost reported at each
    /// interval's end (zero at the first grid point) and its running sum.
    /// Load is read raw (no exclusion filtering) and interpolated linearly;
    /// each interval's average power is the trapezoid mean of its endpoints.
    pub fn cost(&self, load: &Series, times: &[Timestamp], tz: Tz) -> Result<(Series, Series)> {
        if load.len() < 2 {
            return Err(Error::InsufficientData(load.len()));
        }
        if times.is_empty() {
            return Err(Error::EmptySeries);
        }

        let points = load.points();
        let mut cost = Vec::with_capacity(times.len());
        let mut cumulative = Vec::with_capacity(times.len());
        let mut running = 0.0;

        cost.push(SeriesPoint::new(times[0], 0.0));
        cumulative.push(SeriesPoint::new(times[0], 0.0));

        for window in times.windows(2) {
            let (prev, now) = (window[0], window[1]);
            let hours = (now - prev) as f64 / 3600.0;
            let avg_kw = (interp(points, prev) + interp(points, now)) / 2.0;
            let interval_cost = avg_kw * hours * self.rate_at(prev, tz)?;
            running += interval_cost;
            cost.push(SeriesPoint::new(now, interval_cost));
            cumulative.push(SeriesPoint::new(now, running));
        }

        Ok((
            Series::from_points(cost, tz),
            Series::from_points(cumulative, tz),
        ))
    }
}

/// A schedule value is a flat array of period numbers chunked into 24-slot
/// rows (one per month in full documents).
fn parse_schedule(value: Option<&Value>) -> Result<Option<Vec<Vec<u32>>>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let flat = value
        .as_array()
        .ok_or_else(|| Error::TariffFormat("schedule is not an array".into()))?;
    let mut slots = Vec::with_capacity(flat.len());
    for entry in flat {
        let period = entry
            .as_u64()
            .ok_or_else(|| Error::TariffFormat("non-integer schedule slot".into()))?;
        slots.push(period as u32);
    }
    if slots.is_empty() || slots.len() % 24 != 0 {
        return Err(Error::TariffFormat(format!(
            "schedule length {} is not a multiple of 24",
            slots.len()
        )));
    }
    Ok(Some(slots.chunks(24).map(<[u32]>::to_vec).collect()))
}
