//! Calendar date ranges and date-bound parsing.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Accepted input format for date bounds.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid date '{value}' (expected YYYY-MM-DD)")]
pub struct InvalidDate {
    pub value: String,
}

/// Anything usable as a date bound: a `NaiveDate` or an ISO `YYYY-MM-DD` string.
pub trait IntoDate {
    fn into_date(self) -> Result<NaiveDate, InvalidDate>;
}

impl IntoDate for NaiveDate {
    fn into_date(self) -> Result<NaiveDate, InvalidDate> {
        Ok(self)
    }
}

impl IntoDate for &NaiveDate {
    fn into_date(self) -> Result<NaiveDate, InvalidDate> {
        Ok(*self)
    }
}

impl IntoDate for &str {
    fn into_date(self) -> Result<NaiveDate, InvalidDate> {
        NaiveDate::parse_from_str(self.trim(), DATE_FORMAT).map_err(|_| InvalidDate {
            value: self.to_string(),
        })
    }
}

impl IntoDate for String {
    fn into_date(self) -> Result<NaiveDate, InvalidDate> {
        self.as_str().into_date()
    }
}

impl IntoDate for &String {
    fn into_date(self) -> Result<NaiveDate, InvalidDate> {
        self.as_str().into_date()
    }
}

/// Inclusive calendar date range.
///
/// `start <= end` is expected but not enforced: an inverted range is valid
/// and simply contains no dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Parse both bounds from anything implementing [`IntoDate`].
    pub fn parse(start: impl IntoDate, end: impl IntoDate) -> Result<Self, InvalidDate> {
        Ok(Self::new(start.into_date()?, end.into_date()?))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    /// True if any day of the calendar month `(year, month)` lies in the range.
    pub fn overlaps_month(&self, year: i32, month: u32) -> bool {
        let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
            return false;
        };
        let last = last_day_of_month(first);
        first <= self.end && self.start <= last
    }
}

/// Last calendar day of the month containing `date`.
pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

/// `(year, month)` pairs from the month of `start` through the month of `end`.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    let (mut y, mut m) = (start.year(), start.month());
    let (end_y, end_m) = (end.year(), end.month());
    while (y, m) <= (end_y, end_m) {
        months.push((y, m));
        if m == 12 {
            y += 1;
            m = 1;
        } else {
            m += 1;
        }
    }
    months
}
