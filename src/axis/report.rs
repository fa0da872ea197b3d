//! Rendering of time axis diagnostics.

use super::handler::{AxisFile, Moment};
use super::status::StatusCode;
use crate::time::{Calendar, Increment, TimeUnits};
use serde::Serialize;
use std::fmt::{self, Write as _};

/// A time step (or bound) that differs from the rebuilt axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch<T> {
    pub index: usize,
    pub found: T,
    pub expected: T,
}

/// Outcome of checking one file.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub filename: String,
    pub units: TimeUnits,
    pub ref_units: TimeUnits,
    pub calendar: Calendar,
    pub ref_calendar: Calendar,
    pub start: Moment,
    pub end: Moment,
    pub last: Moment,
    pub length: usize,
    pub frequency: String,
    pub increment: Increment,
    pub is_instant: bool,
    pub has_bounds: bool,
    pub status: Vec<StatusCode>,
    pub wrong_timesteps: Vec<Mismatch<f64>>,
    pub wrong_bounds: Vec<Mismatch<[f64; 2]>>,

    /// New filename when the file was renamed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed: Option<String>,

    /// Whether the file was modified on disk
    pub corrected: bool,
}

impl Diagnostic {
    pub fn new(file: &AxisFile, ref_units: TimeUnits, ref_calendar: Calendar) -> Self {
        Self {
            filename: file.filename.clone(),
            units: file.units,
            ref_units,
            calendar: file.calendar,
            ref_calendar,
            start: file.start.clone(),
            end: file.end.clone(),
            last: file.last.clone(),
            length: file.length,
            frequency: file.frequency.clone(),
            increment: file.increment,
            is_instant: file.is_instant,
            has_bounds: file.has_bounds(),
            status: Vec::new(),
            wrong_timesteps: Vec::new(),
            wrong_bounds: Vec::new(),
            renamed: None,
            corrected: false,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.status.is_empty()
    }

    /// Human readable block; `limit` caps the listed time steps and bounds (0 = all).
    pub fn render(&self, limit: usize) -> Result<String, fmt::Error> {
        let mut out = String::new();
        writeln!(out, "{}", self.filename)?;
        writeln!(out, "        Units: {} [ref = {}]", self.units, self.ref_units)?;
        writeln!(out, "        Calendar: {} [ref = {}]", self.calendar, self.ref_calendar)?;
        for (label, moment) in [("Start:", &self.start), ("End:  ", &self.end), ("Last: ", &self.last)] {
            writeln!(
                out,
                "        {label} {} = {} = {}",
                moment.timestamp, moment.date, moment.num
            )?;
        }
        writeln!(out, "        Length: {}", self.length)?;
        writeln!(out, "        Frequency: {} = {}", self.frequency, self.increment)?;
        writeln!(out, "        Is instant: {}", self.is_instant)?;
        write!(out, "        Has bounds: {}", self.has_bounds)?;

        if self.status.is_empty() {
            write!(out, "\n        Status: {}", StatusCode::Ok.message())?;
        }
        for code in &self.status {
            write!(out, "\n        Status: Error {} -- {}", code.code(), code.message())?;
        }

        let cap = |len: usize| if limit == 0 { len } else { limit.min(len) };
        for wrong in &self.wrong_timesteps[..cap(self.wrong_timesteps.len())] {
            write!(
                out,
                "\n        Wrong timestep: {:<10} iso {:<10}",
                wrong.found.to_string(),
                wrong.expected.to_string()
            )?;
        }
        for wrong in &self.wrong_bounds[..cap(self.wrong_bounds.len())] {
            write!(
                out,
                "\n        Wrong bound: {:<10} iso {:<10}",
                format!("{:?}", wrong.found),
                format!("{:?}", wrong.expected)
            )?;
        }
        if let Some(renamed) = &self.renamed {
            write!(out, "\n        Renamed: {renamed}")?;
        }
        Ok(out)
    }
}

/// Counters printed at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub scanned: usize,
    pub skipped: usize,
    pub with_errors: usize,
}

impl Summary {
    pub const fn exit_ok(&self) -> bool {
        self.skipped == 0 && self.with_errors == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of files scanned: {}", self.scanned)?;
        writeln!(f, "Number of files skipped: {}", self.skipped)?;
        write!(f, "Number of files with error(s): {}", self.with_errors)
    }
}
