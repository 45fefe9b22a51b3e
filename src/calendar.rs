//! Named exclusion calendars.
//!
//! A calendar maps a name (e.g. `us_holidays`) to an ordered set of local
//! dates. `Series::add_named_exclusion` turns each date into one
//! midnight-to-midnight 24-hour exclusion window in the series' timezone.
//!
//! The set is an explicit value injected where it is needed rather than
//! ambient global state, so embedders can extend or replace it per site
//! (company shutdown days, regional holidays, test fixtures).

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::{Error, Result};

/// An immutable lookup table of named holiday/exclusion calendars.
#[derive(Debug, Clone, Default)]
pub struct CalendarSet {
    calendars: BTreeMap<String, Vec<NaiveDate>>,
}

impl CalendarSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in calendars: `us_holidays` covering the US federal
    /// holidays for 2013-2015, the span of the bundled sample data.
    pub fn builtin() -> Self {
        Self::new().with_calendar("us_holidays", us_holidays())
    }

    /// Add (or replace) a calendar. Names are case-insensitive; dates are
    /// stored sorted and deduplicated.
    pub fn with_calendar(mut self, name: &str, mut dates: Vec<NaiveDate>) -> Self {
        dates.sort_unstable();
        dates.dedup();
        self.calendars.insert(name.to_ascii_lowercase(), dates);
        self
    }

    /// Look up a calendar by name.
    pub fn get(&self, name: &str) -> Result<&[NaiveDate]> {
        self.calendars
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UnknownExclusionSet(name.to_owned()))
    }

    /// Names of all known calendars, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.calendars.keys().map(String::as_str)
    }
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    // Hard-coded table below only contains valid dates.
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// US federal holidays, observed dates, 2013-2015.
fn us_holidays() -> Vec<NaiveDate> {
    vec![
        // 2013
        ymd(2013, 1, 1),   // New Year's Day
        ymd(2013, 1, 21),  // Martin Luther King Jr. Day
        ymd(2013, 2, 18),  // Washington's Birthday
        ymd(2013, 5, 27),  // Memorial Day
        ymd(2013, 7, 4),   // Independence Day
        ymd(2013, 9, 2),   // Labor Day
        ymd(2013, 10, 14), // Columbus Day
        ymd(2013, 11, 11), // Veterans Day
        ymd(2013, 11, 28), // Thanksgiving Day
        ymd(2013, 12, 25), // Christmas Day
        // 2014
        ymd(2014, 1, 1),
        ymd(2014, 1, 20),
        ymd(2014, 2, 17),
        ymd(2014, 5, 26),
        ymd(2014, 7, 4),
        ymd(2014, 9, 1),
        ymd(2014, 10, 13),
        ymd(2014, 11, 11),
        ymd(2014, 11, 27),
        ymd(2014, 12, 25),
        // 2015
        ymd(2015, 1, 1),
        ymd(2015, 1, 19),
        ymd(2015, 2, 16),
        ymd(2015, 5, 25),
        ymd(2015, 7, 3), // Independence Day observed
        ymd(2015, 9, 7),
        ymd(2015, 10, 12),
        ymd(2015, 11, 11),
        ymd(2015, 11, 26),
        ymd(2015, 12, 25),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_us_holidays() {
        let set = CalendarSet::builtin();
        let dates = set.get("us_holidays").unwrap();
        assert!(dates.contains(&ymd(2014, 7, 4)));
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let set = CalendarSet::builtin();
        assert!(set.get("US_HOLIDAYS").is_ok());
    }

    #[test]
    fn unknown_name_errors() {
        let set = CalendarSet::builtin();
        assert!(matches!(
            set.get("lunar_new_year"),
            Err(Error::UnknownExclusionSet(_))
        ));
    }

    #[test]
    fn custom_calendars_can_be_added() {
        let set = CalendarSet::new().with_calendar("shutdown", vec![ymd(2014, 12, 24)]);
        assert_eq!(set.get("shutdown").unwrap().len(), 1);
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["shutdown"]);
    }
}
