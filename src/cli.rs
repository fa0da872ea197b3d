use crate::axis::StatusCode;
use crate::time::{Calendar, IncrementOverride, TimeUnits, timestamp::parse_timestamp_arg};
use clap::{Args, Parser, Subcommand};
use regex::Regex;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nctime", version)]
#[command(
    about = "Diagnose the time axis and the time coverage of chunked netCDF files",
    long_about = None
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Show debug messages
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Write logs to a file in DIR (default: ./logs) instead of stderr
    #[arg(
        short,
        long,
        global = true,
        num_args = 0..=1,
        default_missing_value = "logs",
        value_name = "DIR"
    )]
    pub log: Option<PathBuf>,

    /// Directory holding nctime.toml
    #[arg(short = 'i', long = "config-dir", global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Project section of the configuration (default: read from the files)
    #[arg(short, long, global = true)]
    pub project: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check and optionally rewrite the time axis of each file
    Axis(AxisArgs),
    /// Check the time coverage of each dataset and optionally resolve overlaps
    Overlap(OverlapArgs),
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Files or directories to scan
    #[arg(required = true, value_parser = existing_path)]
    pub input: Vec<PathBuf>,

    /// Skip directories matching REGEX (default: hidden folders)
    #[arg(long, value_name = "REGEX")]
    pub ignore_dir: Option<Regex>,

    /// Only keep files matching REGEX (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub include_file: Vec<Regex>,

    /// Drop files matching REGEX (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub exclude_file: Vec<Regex>,

    /// Override a time increment, e.g. `cfSites:subhr=15m` (units: s m h D M Y)
    #[arg(long, value_name = "TABLE:FREQUENCY=INCREMENT")]
    pub set_inc: Vec<IncrementOverride>,

    /// Reference calendar (default: from the first file)
    #[arg(long)]
    pub calendar: Option<Calendar>,

    /// Reference time units (default: from the first file)
    #[arg(long)]
    pub units: Option<TimeUnits>,

    /// Number of files processed in parallel (-1 for every available core)
    #[arg(long, default_value = "4", allow_negative_numbers = true, value_parser = process_count)]
    pub max_processes: usize,

    /// Expected start of the time series (YYYY[MM[DD[HH[MM[SS]]]]])
    #[arg(long, value_name = "TIMESTAMP", value_parser = parse_timestamp_arg)]
    pub start: Option<String>,

    /// Expected end of the time series (YYYY[MM[DD[HH[MM[SS]]]]])
    #[arg(long, value_name = "TIMESTAMP", value_parser = parse_timestamp_arg)]
    pub end: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AxisArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Rewrite the time axis, bounds and filename when they are wrong
    #[arg(short, long)]
    pub write: bool,

    /// Rewrite every file, wrong or not
    #[arg(short, long)]
    pub force: bool,

    /// The simulation is still running: skip end-of-period checks
    #[arg(long, conflicts_with = "card")]
    pub on_fly: bool,

    /// libIGCM directory holding run.card
    #[arg(short, long, value_name = "DIR", value_parser = existing_path)]
    pub card: Option<PathBuf>,

    /// Show every diagnostic, including files without errors
    #[arg(short, long)]
    pub all: bool,

    /// Wrong time steps shown per file (no value: all of them)
    #[arg(long, num_args = 0..=1, default_value = "5", default_missing_value = "0", value_name = "N")]
    pub limit: usize,

    /// Status codes to ignore, comma separated (e.g. 002,007)
    #[arg(long, value_delimiter = ',', value_name = "CODES")]
    pub ignore_errors: Vec<StatusCode>,

    /// Also print each diagnostic as a JSON line
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct OverlapArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Delete full overlaps and truncate partial overlaps
    #[arg(long)]
    pub resolve: bool,

    /// Only delete full overlaps
    #[arg(long)]
    pub full_only: bool,

    /// libIGCM directory holding run.card and config.card
    #[arg(short, long, value_name = "DIR", value_parser = existing_path)]
    pub card: Option<PathBuf>,
}

fn existing_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("no such file or directory: {value}"))
    }
}

fn process_count(value: &str) -> Result<usize, String> {
    let requested: i64 = value
        .parse()
        .map_err(|_| format!("not a number: {value}"))?;
    let available = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    match requested {
        -1 => Ok(available),
        n if n >= 1 => Ok((n as usize).min(available.max(1))),
        _ => Err("must be -1 or a positive number".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    #[test]
    fn parses_axis_options() {
        let_assert!(
            Ok(cli) = Cli::try_parse_from([
                "nctime",
                "-d",
                "axis",
                ".",
                "--write",
                "--ignore-errors",
                "002,007",
                "--set-inc",
                "Amon:mon=1M",
                "--calendar",
                "noleap",
                "--limit",
            ])
        );
        check!(cli.global.debug);
        let_assert!(Commands::Axis(args) = cli.command);
        check!(args.write);
        check!(args.limit == 0);
        check!(args.ignore_errors == vec![StatusCode::UnitsChanged, StatusCode::CalendarChanged]);
        check!(args.common.calendar == Some(Calendar::NoLeap));
        check!(args.common.set_inc.len() == 1);
        check!(args.common.max_processes >= 1);
    }

    #[test]
    fn default_limit_and_log_directory() {
        let_assert!(Ok(cli) = Cli::try_parse_from(["nctime", "axis", ".", "--log"]));
        check!(cli.global.log == Some(PathBuf::from("logs")));
        let_assert!(Commands::Axis(args) = cli.command);
        check!(args.limit == 5);
    }

    #[test]
    fn rejects_invalid_inputs() {
        check!(Cli::try_parse_from(["nctime", "axis", "/does/not/exist"]).is_err());
        check!(Cli::try_parse_from(["nctime", "axis", ".", "--calendar", "lunar"]).is_err());
        check!(Cli::try_parse_from(["nctime", "axis", ".", "--ignore-errors", "042"]).is_err());
        check!(Cli::try_parse_from(["nctime", "axis", ".", "--start", "18x0"]).is_err());
        check!(Cli::try_parse_from(["nctime", "axis", ".", "--on-fly", "--card", "."]).is_err());
        check!(Cli::try_parse_from(["nctime", "overlap", ".", "--max-processes", "0"]).is_err());
    }

    #[test]
    fn all_cores_with_minus_one() {
        let_assert!(
            Ok(cli) = Cli::try_parse_from(["nctime", "overlap", ".", "--max-processes", "-1", "--resolve"])
        );
        let_assert!(Commands::Overlap(args) = cli.command);
        check!(args.resolve);
        check!(args.common.max_processes >= 1);
    }
}
