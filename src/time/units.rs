//! CF time units and conversions between numeric offsets and dates.

use crate::error::NcTimeError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::calendar::Calendar;
use super::date::CfDate;

/// Decimal places kept when comparing time values.
pub const NDECIMALS: i32 = 5;

/// Round a time value to [`NDECIMALS`] decimals.
pub fn round_time(value: f64) -> f64 {
    let factor = 10f64.powi(NDECIMALS);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Months,
    Years,
}

impl TimeUnit {
    /// Length in seconds for fixed-length units, `None` for months and years.
    pub const fn seconds(self) -> Option<i64> {
        match self {
            Self::Seconds => Some(1),
            Self::Minutes => Some(60),
            Self::Hours => Some(3600),
            Self::Days => Some(86_400),
            Self::Months | Self::Years => None,
        }
    }

    /// Single-letter unit codes used by `--set-inc` (`s m h D M Y`).
    pub const fn from_letter(letter: char) -> Option<Self> {
        match letter {
            's' => Some(Self::Seconds),
            'm' => Some(Self::Minutes),
            'h' => Some(Self::Hours),
            'D' => Some(Self::Days),
            'M' => Some(Self::Months),
            'Y' => Some(Self::Years),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
            Self::Months => "months",
            Self::Years => "years",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TimeUnit {
    type Err = NcTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Ok(Self::Seconds),
            "min" | "mins" | "minute" | "minutes" => Ok(Self::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Ok(Self::Hours),
            "d" | "day" | "days" => Ok(Self::Days),
            "month" | "months" => Ok(Self::Months),
            "year" | "years" => Ok(Self::Years),
            _ => Err(NcTimeError::InvalidUnits(s.to_string())),
        }
    }
}

/// `<unit> since <reference>` time units.
///
/// Equality is on the normalised form, so `days since 1850-1-1` equals
/// `days since 1850-01-01 00:00:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub reference: CfDate,
}

impl TimeUnits {
    pub const fn new(unit: TimeUnit, reference: CfDate) -> Self {
        Self { unit, reference }
    }

    /// Same reference date, different unit.
    #[must_use]
    pub const fn with_unit(&self, unit: TimeUnit) -> Self {
        Self {
            unit,
            reference: self.reference,
        }
    }
}

impl fmt::Display for TimeUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} since {}", self.unit, self.reference)
    }
}

impl Serialize for TimeUnits {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for TimeUnits {
    type Err = NcTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NcTimeError::InvalidUnits(s.to_string());
        let lowered = s.to_lowercase();
        let split = lowered.find(" since ").ok_or_else(invalid)?;
        let unit = s[..split].parse::<TimeUnit>().map_err(|_| invalid())?;
        let reference = s[split + " since ".len()..]
            .parse::<CfDate>()
            .map_err(|_| invalid())?;
        Ok(Self { unit, reference })
    }
}

/// Convert a numeric time value to a date.
///
/// Month and year units interpolate linearly inside the month (or year) the value
/// falls in, so `0.5 months since 1850-01-01` is the middle of January.
pub fn num2date(value: f64, units: &TimeUnits, calendar: Calendar) -> CfDate {
    let seconds = match units.unit.seconds() {
        Some(factor) => {
            calendar.to_seconds(&units.reference) + (value * factor as f64).round() as i64
        }
        None => {
            let whole = value.floor();
            let fraction = value - whole;
            let lower = shift(&units.reference, units.unit, whole as i64, calendar);
            let upper = shift(&units.reference, units.unit, whole as i64 + 1, calendar);
            lower + (fraction * (upper - lower) as f64).round() as i64
        }
    };
    calendar.from_seconds(seconds)
}

/// Convert a date to a numeric time value, inverse of [`num2date`].
pub fn date2num(date: &CfDate, units: &TimeUnits, calendar: Calendar) -> f64 {
    let target = calendar.to_seconds(date);
    match units.unit.seconds() {
        Some(factor) => (target - calendar.to_seconds(&units.reference)) as f64 / factor as f64,
        None => {
            let reference = &units.reference;
            let mut whole = match units.unit {
                TimeUnit::Years => date.year - reference.year,
                _ => (date.year - reference.year) * 12 + i64::from(date.month) - i64::from(reference.month),
            };
            while shift(reference, units.unit, whole, calendar) > target {
                whole -= 1;
            }
            while shift(reference, units.unit, whole + 1, calendar) <= target {
                whole += 1;
            }
            let lower = shift(reference, units.unit, whole, calendar);
            let upper = shift(reference, units.unit, whole + 1, calendar);
            whole as f64 + (target - lower) as f64 / (upper - lower) as f64
        }
    }
}

/// Seconds of `reference` shifted by `count` months or years.
fn shift(reference: &CfDate, unit: TimeUnit, count: i64, calendar: Calendar) -> i64 {
    let shifted = match unit {
        TimeUnit::Years => reference.add_years(count),
        _ => reference.add_months(count),
    };
    calendar.to_seconds(&shifted)
}
