//! Filename period timestamps and the dates they stand for.

use crate::error::NcTimeError;

use super::calendar::Calendar;
use super::date::CfDate;
use super::frequency::Increment;
use super::units::{TimeUnits, num2date};

/// Half an hour, in days.
const HALF_HOUR: f64 = 0.125 / 6.0;

/// Which filename convention to undo for sub-daily frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodCorrection {
    /// Keep the filename dates as they are.
    None,
    /// Time-averaged variables.
    Averaged,
    /// Instantaneous (`time: point`) variables.
    Instantaneous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

/// Correction in days for a `3hr`/`6hr` filename timestamp, keyed by its `HHMMSS` suffix.
fn correction(frequency: &str, kind: PeriodCorrection, bound: Bound, hhmmss: &str) -> f64 {
    let steps = match (kind, frequency, bound) {
        (PeriodCorrection::Averaged, "3hr", Bound::Start) => match hhmmss {
            "000000" => Some(0.0),
            "003000" => Some(-1.0),
            "013000" => Some(-3.0),
            "030000" => Some(-6.0),
            _ => None,
        },
        (PeriodCorrection::Averaged, "3hr", Bound::End) => match hhmmss {
            "210000" => Some(0.0),
            "213000" => Some(-1.0),
            "223000" => Some(-3.0),
            "230000" => Some(-4.0),
            "000000" => Some(-6.0),
            "003000" => Some(-7.0),
            _ => None,
        },
        (PeriodCorrection::Averaged, "6hr", Bound::Start) => match hhmmss {
            "000000" => Some(0.0),
            "060000" => Some(-12.0),
            _ => None,
        },
        (PeriodCorrection::Averaged, "6hr", Bound::End) => match hhmmss {
            "180000" => Some(0.0),
            "230000" => Some(-10.0),
            "000000" => Some(-12.0),
            _ => None,
        },
        (PeriodCorrection::Instantaneous, "3hr", Bound::Start) => match hhmmss {
            "000000" => Some(6.0),
            "003000" => Some(5.0),
            "013000" => Some(3.0),
            "030000" => Some(0.0),
            _ => None,
        },
        (PeriodCorrection::Instantaneous, "3hr", Bound::End) => match hhmmss {
            "210000" => Some(6.0),
            "213000" => Some(5.0),
            "223000" => Some(3.0),
            "230000" => Some(2.0),
            "000000" => Some(0.0),
            "003000" => Some(-1.0),
            _ => None,
        },
        (PeriodCorrection::Instantaneous, "6hr", Bound::Start) => match hhmmss {
            "000000" => Some(12.0),
            "060000" => Some(0.0),
            _ => None,
        },
        (PeriodCorrection::Instantaneous, "6hr", Bound::End) => match hhmmss {
            "180000" => Some(12.0),
            "230000" => Some(2.0),
            "000000" => Some(0.0),
            _ => None,
        },
        _ => None,
    };
    steps.map_or(0.0, |half_hours| half_hours * HALF_HOUR)
}

/// Complete a truncated filename timestamp to 14 digits.
///
/// Years and months are completed with the first month/day, the rest with zeros:
/// `1850` becomes `18500101000000` and `185002` becomes `18500201000000`.
pub fn untruncated_timestamp(timestamp: &str) -> String {
    let completed = match timestamp.len() {
        4 => format!("{timestamp}0101"),
        6 => format!("{timestamp}01"),
        _ => timestamp.to_string(),
    };
    format!("{completed:0<14}")
}

/// Parse a filename timestamp (4 to 14 digits) into a date.
pub fn timestamp_to_date(timestamp: &str) -> Result<CfDate, NcTimeError> {
    let invalid = || NcTimeError::InvalidTimestamp(timestamp.to_string());
    if !(4..=14).contains(&timestamp.len()) || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let full = untruncated_timestamp(timestamp);
    let field = |range: std::ops::Range<usize>| full[range].parse::<u32>().map_err(|_| invalid());
    let year: i64 = full[0..4].parse().map_err(|_| invalid())?;
    let (month, day) = (field(4..6)?, field(6..8)?);
    let (hour, minute, second) = (field(8..10)?, field(10..12)?, field(12..14)?);
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 24 || minute > 59 || second > 60 {
        return Err(invalid());
    }
    Ok(CfDate::new(year, month, day, hour, minute, second))
}

/// Validate a `--start`/`--end` style timestamp argument.
pub fn parse_timestamp_arg(value: &str) -> Result<String, NcTimeError> {
    timestamp_to_date(value).map(|_| value.to_string())
}

/// Dates covered by a filename period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilenamePeriod {
    pub start: CfDate,
    pub end: CfDate,
    /// Date the following chunk is expected to start at.
    pub next: CfDate,
}

/// Turn the `period_start`/`period_end` timestamps of a filename into dates.
///
/// For `3hr` and `6hr` files the known filename conventions are shifted back to the
/// date of the first and last time step, according to `correction`.
pub fn dates_from_period(
    period_start: &str,
    period_end: &str,
    frequency: &str,
    increment: Increment,
    calendar: Calendar,
    correction_kind: PeriodCorrection,
) -> Result<FilenamePeriod, NcTimeError> {
    let apply = |timestamp: &str, bound: Bound| -> Result<CfDate, NcTimeError> {
        let date = timestamp_to_date(timestamp)?;
        let full = untruncated_timestamp(timestamp);
        let days = correction(frequency, correction_kind, bound, &full[8..14]);
        if days == 0.0 {
            return Ok(date);
        }
        let seconds = calendar.to_seconds(&date) + (days * 86_400.0).round() as i64;
        Ok(calendar.from_seconds(seconds))
    };

    let start = apply(period_start, Bound::Start)?;
    let end = apply(period_end, Bound::End)?;
    let next = num2date(
        increment.step(),
        &TimeUnits::new(increment.unit, end),
        calendar,
    );
    Ok(FilenamePeriod { start, end, next })
}
