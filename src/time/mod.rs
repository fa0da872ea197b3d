//! CF time handling: calendars, units, MIP frequencies and filename periods.
//!
//! Dates are kept as broken-down [`CfDate`] values and converted to integer seconds
//! in a given [`Calendar`] for arithmetic, so non-standard calendars (`noleap`,
//! `360_day`, ...) never go through a real-world date library.

pub mod calendar;
pub mod date;
pub mod frequency;
pub mod timestamp;
pub mod units;

pub use calendar::Calendar;
pub use date::CfDate;
pub use frequency::{Increment, IncrementOverride, IncrementTable};
pub use timestamp::{FilenamePeriod, PeriodCorrection, dates_from_period, untruncated_timestamp};
pub use units::{NDECIMALS, TimeUnit, TimeUnits, date2num, num2date, round_time};
