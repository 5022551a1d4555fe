//! ISO-8601 week identifiers (`YYYY-Www`) used to key meal plans.

use chrono::{Datelike, Days, NaiveDate, Utc, Weekday};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeekError {
    #[error("malformed ISO week '{0}', expected YYYY-Www")]
    Malformed(String),

    #[error("week {0} out of range for that year")]
    OutOfRange(u32),

    #[error("year {0} out of range")]
    InvalidYear(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsoWeek {
    year: i32,
    week: u32,
    start: NaiveDate,
}

impl IsoWeek {
    pub fn new(year: i32, week: u32) -> Result<Self, WeekError> {
        if !(1..=53).contains(&week) {
            return Err(WeekError::OutOfRange(week));
        }
        NaiveDate::from_ymd_opt(year, 1, 4).ok_or(WeekError::InvalidYear(year))?;
        // Years with 52 ISO weeks have no week 53.
        let start = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
            .ok_or(WeekError::OutOfRange(week))?;
        Ok(Self { year, week, start })
    }

    pub fn containing(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        let start = date - Days::new(u64::from(date.weekday().num_days_from_monday()));
        Self {
            year: iso.year(),
            week: iso.week(),
            start,
        }
    }

    pub fn current() -> Self {
        Self::containing(Utc::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn week(&self) -> u32 {
        self.week
    }

    /// Monday of this week.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// The Monday after this week, exclusive upper bound for range queries.
    pub fn end(&self) -> NaiveDate {
        self.start + Days::new(7)
    }
}

impl fmt::Display for IsoWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

impl FromStr for IsoWeek {
    type Err = WeekError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let malformed = || WeekError::Malformed(trimmed.to_string());
        let (year, week) = trimmed.split_once("-W").ok_or_else(malformed)?;
        let year: i32 = year.parse().map_err(|_| malformed())?;
        let week: u32 = week.parse().map_err(|_| malformed())?;
        Self::new(year, week)
    }
}
