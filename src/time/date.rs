//! Calendar-agnostic broken-down dates.

use crate::error::NcTimeError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A date and time of day, independent of any calendar.
///
/// Field order makes the derived `Ord` chronological within a single calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CfDate {
    pub year: i64,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl CfDate {
    pub const fn new(year: i64, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Shift by whole months, keeping the day and the time of day.
    pub const fn add_months(&self, months: i64) -> Self {
        let total = self.year * 12 + (self.month as i64 - 1) + months;
        Self {
            year: total.div_euclid(12),
            month: (total.rem_euclid(12) + 1) as u32,
            ..*self
        }
    }

    pub const fn add_years(&self, years: i64) -> Self {
        Self {
            year: self.year + years,
            ..*self
        }
    }

    /// `YYYYMMDDHHMMSS` digits.
    pub fn as_timestamp(&self) -> String {
        format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }

    /// The timestamp digits as an integer, which orders like the date itself.
    pub fn as_int(&self) -> i64 {
        self.year * 10_000_000_000
            + i64::from(self.month) * 100_000_000
            + i64::from(self.day) * 1_000_000
            + i64::from(self.hour) * 10_000
            + i64::from(self.minute) * 100
            + i64::from(self.second)
    }

    /// The first `len` digits of the timestamp, as used in filename periods.
    pub fn truncated_timestamp(&self, len: usize) -> String {
        let mut timestamp = self.as_timestamp();
        timestamp.truncate(len);
        timestamp
    }
}

impl fmt::Display for CfDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

impl FromStr for CfDate {
    type Err = NcTimeError;

    /// Accepts `YYYY[-MM[-DD]][( |T)HH[:MM[:SS[.f]]]][Z]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NcTimeError::InvalidTimestamp(s.to_string());
        let trimmed = s.trim().trim_end_matches('Z');
        let (date_part, time_part) = match trimmed.split_once(['T', ' ']) {
            Some((date, time)) => (date, time.trim()),
            None => (trimmed, ""),
        };

        let (negative, date_part) = match date_part.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, date_part),
        };
        let mut fields = date_part.split('-');
        let year: i64 = fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let month = parse_field(fields.next(), 1, 12).ok_or_else(invalid)?;
        let day = parse_field(fields.next(), 1, 31).ok_or_else(invalid)?;
        if fields.next().is_some() {
            return Err(invalid());
        }

        let mut clock = time_part.split(':');
        let hour = parse_field(clock.next().filter(|t| !t.is_empty()), 0, 24).ok_or_else(invalid)?;
        let minute = parse_field(clock.next(), 0, 59).ok_or_else(invalid)?;
        let second = parse_field(clock.next().map(|sec| sec.split('.').next().unwrap_or(sec)), 0, 60)
            .ok_or_else(invalid)?;
        if clock.next().is_some() {
            return Err(invalid());
        }

        let year = if negative { -year } else { year };
        Ok(Self::new(year, month, day, hour, minute, second))
    }
}

/// Missing fields take their lower bound; present fields must parse and be in range.
fn parse_field(field: Option<&str>, min: u32, max: u32) -> Option<u32> {
    match field {
        None => Some(min),
        Some(text) => text.trim().parse().ok().filter(|v| (min..=max).contains(v)),
    }
}
