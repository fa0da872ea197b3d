//! Shared test fixtures and utilities for integration tests.
//!
//! Each test works in its own [`TempWorkspace`] and synthesises small CMIP6-like
//! netCDF files with [`Sample`], so no real model output is needed.

use clap::Parser;
use nctime::cli::{Cli, Commands};
use nctime::netcdf::{NcType, NcWriter, Version};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Month lengths of the `noleap` calendar.
#[allow(dead_code)]
pub const NOLEAP_MONTHS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// A temporary directory that is removed when dropped.
#[allow(dead_code)] // Methods used across different integration test crates
pub struct TempWorkspace {
    _temp: TempDir,
    root: PathBuf,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl TempWorkspace {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path().to_path_buf();
        Self { _temp: temp, root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Creates a file with the given content, parent directories included.
    pub fn create_file(&self, path: &str, content: &str) {
        let full_path = self.root.join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap_or_else(|e| {
                panic!("Failed to create parent directory for '{}': {}", path, e)
            });
        }
        std::fs::write(&full_path, content)
            .unwrap_or_else(|e| panic!("Failed to write file '{}': {}", path, e));
    }

    /// Sorted names of the `.nc` files directly inside `dir` (relative to the root).
    pub fn nc_files(&self, dir: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.root.join(dir))
            .expect("Failed to list directory")
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".nc"))
            .collect();
        names.sort();
        names
    }

    /// Parse an `nctime` command line, pointing the configuration at an empty
    /// directory of this workspace so user configuration never leaks in.
    pub fn cli(&self, args: &[&str]) -> Cli {
        let config_dir = self.root.join("config");
        let mut argv = vec![
            "nctime".to_string(),
            "-i".to_string(),
            config_dir.display().to_string(),
        ];
        argv.extend(args.iter().map(|a| (*a).to_string()));
        Cli::try_parse_from(argv).unwrap_or_else(|e| panic!("Invalid command line: {e}"))
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
pub fn axis_args(cli: &Cli) -> &nctime::cli::AxisArgs {
    match &cli.command {
        Commands::Axis(args) => args,
        Commands::Overlap(_) => panic!("expected the axis subcommand"),
    }
}

#[allow(dead_code)]
pub fn overlap_args(cli: &Cli) -> &nctime::cli::OverlapArgs {
    match &cli.command {
        Commands::Overlap(args) => args,
        Commands::Axis(_) => panic!("expected the overlap subcommand"),
    }
}

/// A CMIP6-like file with a `time` axis and one data variable.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Sample {
    pub variable: String,
    pub table: String,
    pub frequency: String,
    pub period_start: String,
    pub period_end: String,
    pub units: String,
    pub calendar: String,
    pub cell_methods: String,
    pub time: Vec<f64>,
    pub bounds: Option<Vec<[f64; 2]>>,
    pub climatology: bool,
}

#[allow(dead_code)]
impl Sample {
    /// Monthly means over whole years, `noleap`, `days since 1850-01-01`.
    pub fn monthly(first_year: i64, last_year: i64) -> Self {
        let (time, bounds) = monthly_axis(first_year, last_year);
        Self {
            variable: "tas".to_string(),
            table: "Amon".to_string(),
            frequency: "mon".to_string(),
            period_start: format!("{first_year:04}01"),
            period_end: format!("{last_year:04}12"),
            units: "days since 1850-01-01 00:00:00".to_string(),
            calendar: "noleap".to_string(),
            cell_methods: "area: mean time: mean".to_string(),
            time,
            bounds: Some(bounds),
            climatology: false,
        }
    }

    /// Daily means from `first_day` (days since 1850-01-01) for `days` days.
    pub fn daily(period_start: &str, period_end: &str, first_day: u32, days: u32) -> Self {
        let time = (first_day..first_day + days).map(|d| f64::from(d) + 0.5).collect();
        let bounds = (first_day..first_day + days)
            .map(|d| [f64::from(d), f64::from(d + 1)])
            .collect();
        Self {
            variable: "pr".to_string(),
            table: "day".to_string(),
            frequency: "day".to_string(),
            period_start: period_start.to_string(),
            period_end: period_end.to_string(),
            units: "days since 1850-01-01 00:00:00".to_string(),
            calendar: "noleap".to_string(),
            cell_methods: "area: time: mean".to_string(),
            time,
            bounds: Some(bounds),
            climatology: false,
        }
    }

    pub fn filename(&self) -> String {
        let suffix = if self.climatology { "-clim" } else { "" };
        format!(
            "{}_{}_IPSL-CM6A-LR_historical_r1i1p1f1_gr_{}-{}{}.nc",
            self.variable, self.table, self.period_start, self.period_end, suffix
        )
    }

    /// Write the file into `dir` and return its path.
    pub fn write(&self, dir: &Path) -> PathBuf {
        std::fs::create_dir_all(dir).expect("Failed to create sample directory");
        let path = dir.join(self.filename());
        let bounds_name = if self.climatology { "climatology_bnds" } else { "time_bnds" };
        let bounds_attr = if self.climatology { "climatology" } else { "bounds" };

        let mut writer = NcWriter::new(Version::Offset64);
        writer
            .unlimited_dimension("time", self.time.len() as u64)
            .dimension("bnds", 2)
            .global_text("mip_era", "CMIP6")
            .global_text("table_id", &self.table)
            .global_text("frequency", &self.frequency);
        writer
            .variable("time", NcType::Double, &["time"])
            .unwrap()
            .var_text("time", "units", &self.units)
            .unwrap()
            .var_text("time", "calendar", &self.calendar)
            .unwrap()
            .values("time", self.time.clone())
            .unwrap();
        if let Some(bounds) = &self.bounds {
            writer
                .var_text("time", bounds_attr, bounds_name)
                .unwrap()
                .variable(bounds_name, NcType::Double, &["time", "bnds"])
                .unwrap()
                .values(bounds_name, bounds.iter().flatten().copied().collect())
                .unwrap();
        }
        writer
            .variable(&self.variable, NcType::Float, &["time"])
            .unwrap()
            .var_text(&self.variable, "cell_methods", &self.cell_methods)
            .unwrap();
        writer.write(&path).expect("Failed to write sample file");
        path
    }
}

/// Mid-month times and month bounds of whole `noleap` years, in days since 1850.
#[allow(dead_code)]
pub fn monthly_axis(first_year: i64, last_year: i64) -> (Vec<f64>, Vec<[f64; 2]>) {
    let mut lower = ((first_year - 1850) * 365) as f64;
    let mut time = Vec::new();
    let mut bounds = Vec::new();
    for _ in first_year..=last_year {
        for days in NOLEAP_MONTHS {
            let upper = lower + f64::from(days);
            time.push((lower + upper) / 2.0);
            bounds.push([lower, upper]);
            lower = upper;
        }
    }
    (time, bounds)
}
