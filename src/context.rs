//! Processing context shared by every file of a run.

use crate::cli::{CommonArgs, GlobalArgs};
use crate::collector::{Collector, DEFAULT_IGNORE_DIR, FileFilter};
use crate::config::{Config, translate_filename_format};
use crate::error::{NcTimeError, Result};
use crate::netcdf::NcFile;
use crate::matching::closest_match;
use crate::time::frequency::DEFAULT_TABLE;
use crate::time::{Calendar, IncrementTable, TimeUnits};
use anyhow::Context;
use regex::Regex;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Name of the time coordinate variable.
pub const TIME_VARIABLE: &str = "time";

/// Per-run counters, updated from worker tasks.
#[derive(Debug, Default)]
pub struct ScanStats {
    scanned: AtomicUsize,
    skipped: AtomicUsize,
    errors: AtomicUsize,
}

impl ScanStats {
    pub fn record_scanned(&self) {
        self.scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn scanned(&self) -> usize {
        self.scanned.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Everything a file handler needs besides the file itself.
///
/// Built once per run from the command line, the configuration file and the first
/// collected file, then shared read-only (behind an `Arc`) by the workers.
#[derive(Debug)]
pub struct ProcessingContext {
    /// Collected input files, sorted by path
    pub files: Vec<PathBuf>,

    /// Project name (lowercase), as used to select the configuration section
    pub project: String,

    /// Anchored filename regex with `period_start` and `period_end` groups
    pub pattern: Regex,

    /// Calendar every file is expected to use
    pub ref_calendar: Calendar,

    /// Time units every file is expected to use
    pub ref_units: TimeUnits,

    pub increments: IncrementTable,

    /// Files processed concurrently
    pub processes: usize,

    /// Expected first timestamp of the series, overriding filenames
    pub start: Option<String>,

    /// Expected last timestamp of the series, overriding filenames
    pub end: Option<String>,

    pub stats: ScanStats,
}

impl ProcessingContext {
    pub fn new(common: &CommonArgs, global: &GlobalArgs) -> Result<Self> {
        let filter = FileFilter::with_rules(&common.include_file, &common.exclude_file);
        let dir_filter = match &common.ignore_dir {
            Some(regex) => regex.clone(),
            None => Regex::new(DEFAULT_IGNORE_DIR)?,
        };
        let files = Collector::new(common.input.clone())
            .with_file_filter(filter)
            .with_dir_filter(Some(dir_filter))
            .collect();
        if files.is_empty() {
            tracing::warn!("No netCDF file found in {:?}", common.input);
        }
        let first = files.first().map(NcFile::open).transpose()?;

        let (file_calendar, file_units) = match &first {
            Some(file) if common.calendar.is_none() || common.units.is_none() => {
                let (calendar, units) = reference_time(file)?;
                (Some(calendar), Some(units))
            }
            _ => (None, None),
        };
        let ref_calendar = common.calendar.or(file_calendar).unwrap_or_default();

        let project = match (&global.project, &first) {
            (Some(project), _) => project.to_lowercase(),
            (None, Some(file)) => detect_project(file)?,
            (None, None) => "cmip6".to_string(),
        };
        let config = Config::load(global.config_dir.as_deref())?;
        let project_config = config.project(&project)?;
        let pattern = translate_filename_format(&project_config.filename_format)?;

        let ref_units = match &project_config.time_units_default {
            Some(units) => units
                .parse::<TimeUnits>()
                .with_context(|| format!("Invalid time_units_default for project '{project}'"))?,
            None => common
                .units
                .or(file_units)
                .map_or_else(|| "days since 1850-01-01".parse(), Ok)?,
        };

        let mut increments = IncrementTable::default();
        for rule in &common.set_inc {
            increments.apply(rule)?;
        }

        tracing::info!(
            files = files.len(),
            project = %project,
            calendar = %ref_calendar,
            units = %ref_units,
            "Processing context ready"
        );
        Ok(Self {
            files,
            project,
            pattern,
            ref_calendar,
            ref_units,
            increments,
            processes: common.max_processes.max(1),
            start: common.start.clone(),
            end: common.end.clone(),
            stats: ScanStats::default(),
        })
    }

    /// Byte ranges of `period_start` and `period_end` in a filename.
    pub fn period_ranges(&self, filename: &str) -> Result<(Range<usize>, Range<usize>)> {
        let mismatch = || NcTimeError::FilenameMismatch {
            filename: filename.to_string(),
            pattern: self.pattern.to_string(),
        };
        let normalised = normalise_climatology(filename);
        let caps = self.pattern.captures(&normalised).ok_or_else(mismatch)?;
        // `-clim` removal only shortens the tail, so offsets are still valid.
        let range = |name: &str| caps.name(name).map(|m| m.range()).ok_or_else(mismatch);
        Ok((range("period_start")?, range("period_end")?))
    }
}

/// `-clim.nc` climatology filenames match the project pattern once reduced to `.nc`.
pub fn normalise_climatology(filename: &str) -> String {
    filename.replace("-clim.nc", ".nc")
}

/// Calendar and units of the time variable of `file`.
pub fn reference_time(file: &NcFile) -> Result<(Calendar, TimeUnits)> {
    let units = file
        .require_var_text(TIME_VARIABLE, "units")?
        .parse::<TimeUnits>()?;
    let calendar = file
        .require_var_text(TIME_VARIABLE, "calendar")?
        .parse::<Calendar>()?;
    Ok((calendar, units))
}

/// Project name from the `project_id` (CMIP5, CORDEX) or `mip_era` (CMIP6) attribute.
pub fn detect_project(file: &NcFile) -> Result<String> {
    file.global_text("project_id")
        .or_else(|| file.global_text("mip_era"))
        .map(|p| p.trim().to_lowercase())
        .ok_or_else(|| {
            NcTimeError::NoNetCdfAttribute {
                attribute: "project_id".to_string(),
                variable: None,
                path: file.path().display().to_string(),
            }
            .into()
        })
}

/// MIP table of a file. CMIP5 stores `Table Amon (date)`.
pub fn table_id(nc: &NcFile, increments: &IncrementTable) -> String {
    let Some(raw) = nc.global_text("table_id") else {
        tracing::warn!(path = %nc.path().display(), "No table_id attribute, using default increments");
        return DEFAULT_TABLE.to_string();
    };
    let mut words = raw.split_whitespace();
    let table = match (words.next(), words.next()) {
        (Some(_), Some(name)) => name,
        (Some(name), None) => name,
        _ => DEFAULT_TABLE,
    };
    if !increments.has_table(table) {
        tracing::debug!(table, "No specific increments for this table, using the defaults");
        return DEFAULT_TABLE.to_string();
    }
    table.to_string()
}

/// `frequency` global attribute, or the value of the closest attribute name.
pub fn frequency(nc: &NcFile) -> Result<String> {
    if let Some(value) = nc.global_text("frequency") {
        return Ok(value.trim().to_string());
    }
    let candidate = closest_match("frequency", nc.global_attr_names());
    match candidate.and_then(|name| nc.global_text(name).map(|value| (name, value))) {
        Some((name, value)) => {
            tracing::warn!(attribute = name, "Consider \"{name}\" attribute instead of \"frequency\"");
            Ok(value.trim().to_string())
        }
        None => Err(NcTimeError::NoNetCdfAttribute {
            attribute: "frequency".to_string(),
            variable: None,
            path: nc.path().display().to_string(),
        }
        .into()),
    }
}

/// Filename component of a path, lossily converted.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
