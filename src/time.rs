//! Timestamp normalization.
//!
//! Meter feeds hand us timestamps in whatever form the upstream logger used:
//! epoch seconds, epoch milliseconds, numeric strings, local date/time
//! strings, or already-aware instants. Everything is normalized at the ingest
//! boundary to one canonical representation, whole UTC seconds since the
//! epoch, so the rest of the pipeline never sees an ambiguous time.
//!
//! Rules:
//! - numeric inputs with more than 10 decimal digits are milliseconds and are
//!   divided by 1000 (truncating)
//! - `YYYY-MM-DD` and `YYYY-MM-DD HH:MM:SS` strings are interpreted as local
//!   wall-clock time in the supplied zone
//! - naive instants are rejected outright rather than silently assigned a zone
//! - normalization is idempotent over already-normalized integers

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{Error, Result};

/// UTC seconds since the unix epoch.
pub type Timestamp = i64;

/// Any ms-or-finer timestamp has at least 11 decimal digits of seconds.
const MILLIS_THRESHOLD: i64 = 10_000_000_000;

/// A heterogeneous timestamp input, prior to normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeInput {
    /// Epoch seconds or milliseconds (disambiguated by digit count).
    Epoch(f64),
    /// A numeric string, or a `YYYY-MM-DD [HH:MM:SS]` local date/time string.
    Text(String),
    /// A timezone-aware instant.
    Instant(DateTime<Utc>),
    /// A naive date/time. Always rejected by [`normalize`]; the variant
    /// exists so the rejection is an explicit runtime policy rather than a
    /// silent `From` impl gap.
    Naive(NaiveDateTime),
}

impl From<i64> for TimeInput {
    fn from(v: i64) -> Self {
        TimeInput::Epoch(v as f64)
    }
}

impl From<f64> for TimeInput {
    fn from(v: f64) -> Self {
        TimeInput::Epoch(v)
    }
}

impl From<&str> for TimeInput {
    fn from(v: &str) -> Self {
        TimeInput::Text(v.to_owned())
    }
}

impl From<String> for TimeInput {
    fn from(v: String) -> Self {
        TimeInput::Text(v)
    }
}

impl From<DateTime<Utc>> for TimeInput {
    fn from(v: DateTime<Utc>) -> Self {
        TimeInput::Instant(v)
    }
}

impl From<DateTime<Tz>> for TimeInput {
    fn from(v: DateTime<Tz>) -> Self {
        TimeInput::Instant(v.with_timezone(&Utc))
    }
}

impl From<NaiveDateTime> for TimeInput {
    fn from(v: NaiveDateTime) -> Self {
        TimeInput::Naive(v)
    }
}

/// Normalize a heterogeneous timestamp input to whole UTC epoch seconds.
///
/// Fractional seconds are truncated. Local date/time strings are localized in
/// `tz`; an ambiguous wall-clock time (DST fall-back) resolves to the earlier
/// instant and a nonexistent one (spring-forward gap) is an error.
pub fn normalize(input: impl Into<TimeInput>, tz: Tz) -> Result<Timestamp> {
    match input.into() {
        TimeInput::Epoch(v) => epoch_to_seconds(v),
        TimeInput::Text(s) => {
            // Numeric strings take the epoch path, same digit rule applied.
            if let Ok(v) = s.trim().parse::<f64>() {
                return epoch_to_seconds(v);
            }
            let naive = parse_local(&s)?;
            localize(naive, tz)
        }
        TimeInput::Instant(dt) => Ok(dt.timestamp()),
        TimeInput::Naive(_) => Err(Error::InvalidTimestamp(
            "naive date/time supplied; timestamps must carry a timezone".into(),
        )),
    }
}

fn epoch_to_seconds(v: f64) -> Result<Timestamp> {
    if !v.is_finite() {
        return Err(Error::InvalidTimestamp(format!(
            "non-finite epoch value: {v}"
        )));
    }
    let secs = v.trunc();
    if secs.abs() >= MILLIS_THRESHOLD as f64 {
        Ok((secs / 1000.0).trunc() as i64)
    } else {
        Ok(secs as i64)
    }
}

fn parse_local(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    if s.contains(':') {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .map_err(|e| Error::InvalidTimestamp(format!("unrecognized timestamp '{s}': {e}")))
    } else {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(|d| d.and_time(chrono::NaiveTime::MIN))
            .map_err(|e| Error::InvalidTimestamp(format!("unrecognized timestamp '{s}': {e}")))
    }
}

/// Resolve a local wall-clock time to an instant in `tz`.
pub(crate) fn localize(naive: NaiveDateTime, tz: Tz) -> Result<Timestamp> {
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Ok(dt.timestamp()),
        chrono::LocalResult::Ambiguous(earlier, _later) => Ok(earlier.timestamp()),
        chrono::LocalResult::None => Err(Error::InvalidTimestamp(format!(
            "local time {naive} does not exist in zone {tz}"
        ))),
    }
}

/// Convert a normalized timestamp back to a zone-aware instant.
pub fn to_local(ts: Timestamp, tz: Tz) -> Result<DateTime<Tz>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.with_timezone(&tz))
        .ok_or_else(|| Error::InvalidTimestamp(format!("epoch seconds out of range: {ts}")))
}

/// Render a normalized timestamp as a local-time string, the form expected
/// on the wire by script-backed baseline models.
pub fn format_local(ts: Timestamp, tz: Tz) -> Result<String> {
    Ok(to_local(ts, tz)?.format("%Y-%m-%d %H:%M:%S").to_string())
}
