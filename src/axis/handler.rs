//! Per-file state of the time axis checker.

use crate::context::{ProcessingContext, TIME_VARIABLE, file_name, frequency, table_id};
use crate::error::{NcTimeError, Result};
use crate::netcdf::NcFile;
use crate::time::{
    Calendar, CfDate, Increment, PeriodCorrection, TimeUnits, dates_from_period, date2num,
    num2date, round_time,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One point of the theoretical axis, in the three forms the diagnostic shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Moment {
    pub timestamp: String,
    pub date: CfDate,
    pub num: f64,
}

/// Offsets (in frequency units) that move climatology filename dates to the
/// middle of the climatological period.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ClimatologyOffsets {
    start: f64,
    end: f64,
    upper: f64,
}

/// Everything the checker knows about a file before comparing axes.
#[derive(Debug, Clone)]
pub struct AxisFile {
    pub path: PathBuf,
    pub filename: String,
    pub table: String,
    pub frequency: String,
    pub increment: Increment,
    pub length: usize,

    /// Time values as stored, rounded
    pub time_axis: Vec<f64>,
    pub units: TimeUnits,
    pub calendar: Calendar,

    /// Name of the bounds (or climatology) variable
    pub bounds_var: Option<String>,
    pub time_bounds: Option<Vec<[f64; 2]>>,
    pub is_instant: bool,
    pub is_climatology: bool,

    pub start: Moment,
    pub end: Moment,
    pub last: Moment,

    /// Length of the filename timestamps
    pub timestamp_len: usize,

    /// Byte range of `period_end` in the filename
    end_range: std::ops::Range<usize>,

    ref_units: TimeUnits,
    ref_calendar: Calendar,
    /// Reference units with the increment's unit
    funits: TimeUnits,
    start_axis: f64,
    climatology: Option<ClimatologyOffsets>,
}

impl AxisFile {
    pub fn load(path: &Path, ctx: &ProcessingContext) -> Result<Self> {
        let nc = NcFile::open(path)?;
        let filename = file_name(path);
        let (start_range, end_range) = ctx.period_ranges(&filename)?;
        let timestamp_len = end_range.len();
        let period_start = ctx.start.clone().unwrap_or_else(|| filename[start_range].to_string());
        let period_end = ctx.end.clone().unwrap_or_else(|| filename[end_range.clone()].to_string());

        let table = table_id(&nc, &ctx.increments);
        let frequency = frequency(&nc)?;

        let time = nc.require_variable(TIME_VARIABLE)?;
        let length = nc.leading_len(TIME_VARIABLE)? as usize;
        if length == 0 {
            return Err(NcTimeError::EmptyTimeAxis {
                path: path.display().to_string(),
            }
            .into());
        }
        let time_axis: Vec<f64> = nc
            .read_f64(TIME_VARIABLE)?
            .into_iter()
            .map(round_time)
            .collect();
        let climatology_var = time.attr("climatology").and_then(|a| a.as_text());
        let bounds_var = climatology_var
            .clone()
            .or_else(|| time.attr("bounds").and_then(|a| a.as_text()));
        let time_bounds = match &bounds_var {
            Some(name) => Some(
                nc.read_f64(name)?
                    .chunks_exact(2)
                    .map(|pair| [round_time(pair[0]), round_time(pair[1])])
                    .collect(),
            ),
            None => None,
        };
        let units: TimeUnits = nc.require_var_text(TIME_VARIABLE, "units")?.parse()?;
        let calendar: Calendar = nc.require_var_text(TIME_VARIABLE, "calendar")?.parse()?;

        let variable = filename.split('_').next().unwrap_or_default();
        nc.require_variable(variable)?;
        let cell_methods = nc.require_var_text(variable, "cell_methods")?;
        let is_instant = cell_methods.to_lowercase().contains("time: point");
        let is_climatology = climatology_var.is_some();

        let increment = ctx.increments.lookup(&table, &frequency)?;
        let step = increment.step();
        let funits = ctx.ref_units.with_unit(increment.unit);
        let kind = if is_instant {
            PeriodCorrection::Instantaneous
        } else {
            PeriodCorrection::Averaged
        };
        let period = dates_from_period(
            &period_start,
            &period_end,
            &frequency,
            increment,
            ctx.ref_calendar,
            kind,
        )?;
        let to_num = |date: &CfDate| round_time(date2num(date, &funits, ctx.ref_calendar));
        let mut start_num = to_num(&period.start);
        let mut end_num = to_num(&period.end);

        let climatology = if is_climatology {
            let half_span = (period.end.year - period.start.year) / 2;
            let year = period.start.year + half_span;
            let start_clim = to_num(&CfDate { year, ..period.start });
            let end_clim = to_num(&CfDate { year, ..period.end });
            let before_end = match frequency.as_str() {
                "monC" | "monClim" => 10.0,
                "1hrCM" => 22.5,
                _ => return Err(NcTimeError::InvalidClimatologyFrequency(frequency).into()),
            };
            let offsets = ClimatologyOffsets {
                start: start_clim - start_num,
                end: end_num - end_clim,
                upper: end_num - before_end - start_clim,
            };
            start_num += offsets.start + 0.5;
            end_num -= offsets.end - 0.5;
            Some(offsets)
        } else {
            if !is_instant {
                start_num += 0.5 * step;
                end_num += 0.5 * step;
            }
            None
        };

        let moment = |num: f64| -> Moment {
            let date = num2date(num, &funits, ctx.ref_calendar);
            Moment {
                timestamp: date.truncated_timestamp(timestamp_len),
                num: round_time(date2num(&date, &units, calendar)),
                date,
            }
        };
        let start = moment(start_num);
        let end = moment(end_num);
        let last = moment(start_num + (length - 1) as f64 * step);

        tracing::debug!(
            file = %filename,
            table = %table,
            frequency = %frequency,
            increment = %increment,
            instant = is_instant,
            climatology = is_climatology,
            "Loaded time properties"
        );
        Ok(Self {
            path: path.to_path_buf(),
            filename,
            table,
            frequency,
            increment,
            length,
            time_axis,
            units,
            calendar,
            bounds_var,
            time_bounds,
            is_instant,
            is_climatology,
            start,
            end,
            last,
            timestamp_len,
            end_range,
            ref_units: ctx.ref_units,
            ref_calendar: ctx.ref_calendar,
            funits,
            start_axis: start_num,
            climatology,
        })
    }

    pub const fn has_bounds(&self) -> bool {
        self.bounds_var.is_some()
    }

    fn frequency_axis(&self) -> impl Iterator<Item = f64> + '_ {
        let step = self.increment.step();
        (0..self.length).map(move |i| self.start_axis + i as f64 * step)
    }

    fn to_reference(&self, value: f64) -> f64 {
        let date = num2date(value, &self.funits, self.ref_calendar);
        round_time(date2num(&date, &self.ref_units, self.ref_calendar))
    }

    /// Theoretical time values in the reference units and calendar.
    pub fn build_time_axis(&self) -> Vec<f64> {
        self.frequency_axis().map(|v| self.to_reference(v)).collect()
    }

    /// Theoretical `[lower, upper]` bounds of every time step.
    pub fn build_time_bounds(&self) -> Vec<[f64; 2]> {
        let half_step = 0.5 * self.increment.step();
        self.frequency_axis()
            .map(|v| {
                let (lower, upper) = match (&self.climatology, self.is_instant) {
                    (Some(clim), _) => (v - (clim.start + 0.5), v + (clim.upper - 0.5)),
                    (None, true) => (v, v),
                    (None, false) => (v - half_step, v + half_step),
                };
                [self.to_reference(lower), self.to_reference(upper)]
            })
            .collect()
    }

    /// Filename with its `period_end` replaced by the last theoretical timestamp.
    pub fn corrected_filename(&self) -> String {
        let mut renamed = self.filename.clone();
        renamed.replace_range(self.end_range.clone(), &self.last.timestamp);
        renamed
    }
}
