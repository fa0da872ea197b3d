//! CF calendars and their day counting rules.

use crate::error::NcTimeError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::date::CfDate;

const SECONDS_PER_DAY: i64 = 86_400;

/// Cumulative days before each month in a 365-day year.
const CUMULATIVE_DAYS: [i64; 13] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];

/// Cumulative days before each month in a 366-day year.
const CUMULATIVE_DAYS_LEAP: [i64; 13] = [0, 31, 60, 91, 121, 152, 182, 213, 244, 274, 305, 335, 366];

/// Julian day number of 1582-10-15, the first Gregorian day of the standard calendar.
const GREGORIAN_SWITCH_JDN: i64 = 2_299_161;

/// CF calendar types supported by the time axis rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Calendar {
    /// Mixed Julian/Gregorian calendar (`standard`, `gregorian`)
    #[default]
    Standard,
    ProlepticGregorian,
    Julian,
    /// Every year has 365 days (`noleap`, `365_day`)
    NoLeap,
    /// Every year has 366 days (`all_leap`, `366_day`)
    AllLeap,
    /// Twelve months of 30 days
    #[serde(rename = "360_day")]
    Day360,
}

impl Calendar {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::ProlepticGregorian => "proleptic_gregorian",
            Self::Julian => "julian",
            Self::NoLeap => "noleap",
            Self::AllLeap => "all_leap",
            Self::Day360 => "360_day",
        }
    }

    pub const fn is_leap_year(self, year: i64) -> bool {
        match self {
            Self::Standard => {
                if year > 1582 {
                    gregorian_leap(year)
                } else {
                    year.rem_euclid(4) == 0
                }
            }
            Self::ProlepticGregorian => gregorian_leap(year),
            Self::Julian => year.rem_euclid(4) == 0,
            Self::NoLeap | Self::Day360 => false,
            Self::AllLeap => true,
        }
    }

    pub const fn days_in_month(self, year: i64, month: u32) -> u32 {
        if matches!(self, Self::Day360) {
            return 30;
        }
        match month {
            2 => {
                if self.is_leap_year(year) {
                    29
                } else {
                    28
                }
            }
            4 | 6 | 9 | 11 => 30,
            _ => 31,
        }
    }

    /// Monotonic day count of `date` in this calendar.
    ///
    /// Only differences between day numbers are meaningful; the origin depends on the
    /// calendar (Julian day number for the real-world calendars, year zero otherwise).
    pub fn day_number(self, date: &CfDate) -> i64 {
        let (y, m, d) = (date.year, i64::from(date.month), i64::from(date.day));
        match self {
            Self::Day360 => y * 360 + (m - 1) * 30 + d - 1,
            Self::NoLeap => y * 365 + CUMULATIVE_DAYS[(m - 1) as usize] + d - 1,
            Self::AllLeap => y * 366 + CUMULATIVE_DAYS_LEAP[(m - 1) as usize] + d - 1,
            Self::Julian => julian_jdn(y, m, d),
            Self::ProlepticGregorian => gregorian_jdn(y, m, d),
            Self::Standard => {
                if (y, m, d) >= (1582, 10, 15) {
                    gregorian_jdn(y, m, d)
                } else {
                    julian_jdn(y, m, d)
                }
            }
        }
    }

    /// Inverse of [`Calendar::day_number`], returning midnight of that day.
    pub fn date_from_day_number(self, number: i64) -> CfDate {
        let (year, month, day) = match self {
            Self::Day360 => {
                let year = number.div_euclid(360);
                let rem = number.rem_euclid(360);
                (year, rem / 30 + 1, rem % 30 + 1)
            }
            Self::NoLeap => split_year(number, 365, &CUMULATIVE_DAYS),
            Self::AllLeap => split_year(number, 366, &CUMULATIVE_DAYS_LEAP),
            Self::Julian => julian_from_jdn(number),
            Self::ProlepticGregorian => gregorian_from_jdn(number),
            Self::Standard => {
                if number >= GREGORIAN_SWITCH_JDN {
                    gregorian_from_jdn(number)
                } else {
                    julian_from_jdn(number)
                }
            }
        };
        CfDate::new(year, month as u32, day as u32, 0, 0, 0)
    }

    /// Seconds elapsed since the calendar origin.
    pub fn to_seconds(self, date: &CfDate) -> i64 {
        self.day_number(date) * SECONDS_PER_DAY
            + i64::from(date.hour) * 3600
            + i64::from(date.minute) * 60
            + i64::from(date.second)
    }

    pub fn from_seconds(self, seconds: i64) -> CfDate {
        let day = seconds.div_euclid(SECONDS_PER_DAY);
        let rem = seconds.rem_euclid(SECONDS_PER_DAY);
        let date = self.date_from_day_number(day);
        CfDate::new(
            date.year,
            date.month,
            date.day,
            (rem / 3600) as u32,
            (rem % 3600 / 60) as u32,
            (rem % 60) as u32,
        )
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Calendar {
    type Err = NcTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "gregorian" => Ok(Self::Standard),
            "proleptic_gregorian" => Ok(Self::ProlepticGregorian),
            "julian" => Ok(Self::Julian),
            "noleap" | "365_day" | "no_leap" => Ok(Self::NoLeap),
            "all_leap" | "366_day" => Ok(Self::AllLeap),
            "360_day" => Ok(Self::Day360),
            _ => Err(NcTimeError::InvalidCalendar(s.to_string())),
        }
    }
}

const fn gregorian_leap(year: i64) -> bool {
    (year.rem_euclid(4) == 0 && year.rem_euclid(100) != 0) || year.rem_euclid(400) == 0
}

fn split_year(number: i64, year_len: i64, cumulative: &[i64; 13]) -> (i64, i64, i64) {
    let year = number.div_euclid(year_len);
    let rem = number.rem_euclid(year_len);
    let month = cumulative[1..].iter().position(|&c| rem < c).unwrap_or(11);
    (year, month as i64 + 1, rem - cumulative[month] + 1)
}

fn gregorian_jdn(y: i64, m: i64, d: i64) -> i64 {
    let a = (14 - m).div_euclid(12);
    let y = y + 4800 - a;
    let m = m + 12 * a - 3;
    d + (153 * m + 2).div_euclid(5) + 365 * y + y.div_euclid(4) - y.div_euclid(100)
        + y.div_euclid(400)
        - 32045
}

fn julian_jdn(y: i64, m: i64, d: i64) -> i64 {
    let a = (14 - m).div_euclid(12);
    let y = y + 4800 - a;
    let m = m + 12 * a - 3;
    d + (153 * m + 2).div_euclid(5) + 365 * y + y.div_euclid(4) - 32083
}

fn gregorian_from_jdn(jdn: i64) -> (i64, i64, i64) {
    let a = jdn + 32044;
    let b = (4 * a + 3).div_euclid(146_097);
    let c = a - (146_097 * b).div_euclid(4);
    let (year, month, day) = finish_from_jdn(c);
    (100 * b + year, month, day)
}

fn julian_from_jdn(jdn: i64) -> (i64, i64, i64) {
    finish_from_jdn(jdn + 32082)
}

fn finish_from_jdn(c: i64) -> (i64, i64, i64) {
    let d = (4 * c + 3).div_euclid(1461);
    let e = c - (1461 * d).div_euclid(4);
    let m = (5 * e + 2).div_euclid(153);
    let day = e - (153 * m + 2).div_euclid(5) + 1;
    let month = m + 3 - 12 * m.div_euclid(10);
    let year = d - 4800 + m.div_euclid(10);
    (year, month, day)
}
