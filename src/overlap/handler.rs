//! One file of a dataset, as a node of the coverage graph.

use crate::context::{
    ProcessingContext, TIME_VARIABLE, file_name, frequency, reference_time, table_id,
};
use crate::error::{NcTimeError, Result};
use crate::netcdf::NcFile;
use crate::time::{CfDate, PeriodCorrection, dates_from_period, num2date};
use std::ops::Range;
use std::path::{Path, PathBuf};

const CLIM_SUFFIX: &str = "-clim.nc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    /// Dataset the file belongs to: the filename without its period
    pub id: String,
    pub filename: String,
    pub path: PathBuf,

    /// First date covered, from the filename
    pub start: CfDate,
    /// Last date covered, from the filename
    pub end: CfDate,
    /// Date the following chunk should start at
    pub next: CfDate,

    pub first_step: CfDate,
    pub last_step: CfDate,

    start_range: Range<usize>,
    end_range: Range<usize>,
}

impl FileNode {
    pub fn load(path: &Path, ctx: &ProcessingContext) -> Result<Self> {
        let filename = file_name(path);
        let (start_range, end_range) = ctx.period_ranges(&filename)?;
        let nc = NcFile::open(path)?;
        let table = table_id(&nc, &ctx.increments);
        let frequency = frequency(&nc)?;
        let increment = ctx.increments.lookup(&table, &frequency)?;
        let period = dates_from_period(
            &filename[start_range.clone()],
            &filename[end_range.clone()],
            &frequency,
            increment,
            ctx.ref_calendar,
            PeriodCorrection::None,
        )?;

        let steps = time_steps(&nc)?;
        let (Some(&first_step), Some(&last_step)) = (steps.first(), steps.last()) else {
            return Err(NcTimeError::EmptyTimeAxis {
                path: path.display().to_string(),
            }
            .into());
        };

        let node = Self {
            id: dataset_id(&filename),
            filename,
            path: path.to_path_buf(),
            start: period.start,
            end: period.end,
            next: period.next,
            first_step,
            last_step,
            start_range,
            end_range,
        };
        tracing::debug!(
            dataset = %node.id,
            file = %node.filename,
            start = node.start.as_int(),
            end = node.end.as_int(),
            next = node.next.as_int(),
            "Created node"
        );
        Ok(node)
    }

    /// Index of the first time step strictly after `date`.
    pub fn cutting_timestep(&self, date: &CfDate) -> Result<u64> {
        let nc = NcFile::open(&self.path)?;
        time_steps(&nc)?
            .iter()
            .position(|step| step > date)
            .map(|index| index as u64)
            .ok_or_else(|| {
                NcTimeError::NetCdfTimeStepNotFound {
                    date: date.to_string(),
                    path: self.path.display().to_string(),
                }
                .into()
            })
    }

    /// Filename of the part of this file starting at `from`.
    ///
    /// Both filename timestamps must have the same length.
    pub fn truncated_filename(&self, from: &CfDate) -> Result<String> {
        let (start_len, end_len) = (self.start_range.len(), self.end_range.len());
        if start_len != end_len {
            return Err(NcTimeError::FilenameMismatch {
                filename: self.filename.clone(),
                pattern: "period timestamps of equal length".to_string(),
            }
            .into());
        }
        let mut renamed = self.filename.clone();
        // Replace the later range first so the earlier offsets stay valid.
        renamed.replace_range(self.end_range.clone(), &self.end.truncated_timestamp(end_len));
        renamed.replace_range(self.start_range.clone(), &from.truncated_timestamp(start_len));
        Ok(renamed)
    }
}

/// Filename without its last `_` field; climatologies keep a `-clim` marker.
pub fn dataset_id(filename: &str) -> String {
    let stem = filename
        .rsplit_once('_')
        .map_or(filename, |(stem, _)| stem);
    if filename.ends_with(CLIM_SUFFIX) {
        format!("{stem}-clim")
    } else {
        stem.to_string()
    }
}

/// Dates of every time step, in the file's own units and calendar.
fn time_steps(nc: &NcFile) -> Result<Vec<CfDate>> {
    let (calendar, units) = reference_time(nc)?;
    Ok(nc
        .read_f64(TIME_VARIABLE)?
        .into_iter()
        .map(|value| num2date(value, &units, calendar))
        .collect())
}
