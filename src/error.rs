//! Error handling types and utilities.

/// A specialized Result type for nctime operations.
///
/// This is an alias for `anyhow::Result` with context added via `.context()` and
/// `.with_context()` methods throughout the codebase.
pub type Result<T> = anyhow::Result<T>;

/// Domain errors raised while reading, checking or repairing netCDF files.
///
/// Each variant is attached to an `anyhow::Error` at the failure site so callers can
/// still `downcast_ref::<NcTimeError>()` when they need to branch on the cause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NcTimeError {
    #[error("Invalid or corrupted netCDF file '{path}': {reason}")]
    InvalidNetCdfFile { path: String, reason: String },

    #[error("Attribute '{attribute}' not found{} in '{path}'", on_variable(.variable.as_deref()))]
    NoNetCdfAttribute {
        attribute: String,
        variable: Option<String>,
        path: String,
    },

    #[error("Variable '{variable}' not found in '{path}'")]
    NoNetCdfVariable { variable: String, path: String },

    #[error("No time step found after {date} in '{path}'")]
    NetCdfTimeStepNotFound { date: String, path: String },

    #[error("Time axis is empty in '{path}'")]
    EmptyTimeAxis { path: String },

    #[error("Cannot rename '{src}' to '{dst}'{}", existing_target(.exists))]
    RenamingNetCdfFailed {
        src: String,
        dst: String,
        exists: bool,
    },

    #[error("Unknown frequency '{0}'")]
    InvalidFrequency(String),

    #[error("Unknown MIP table '{0}'")]
    InvalidTable(String),

    #[error("Invalid time units '{0}'")]
    InvalidUnits(String),

    #[error("Unknown calendar '{0}'")]
    InvalidCalendar(String),

    #[error("Frequency '{0}' has no climatology bounds definition")]
    InvalidClimatologyFrequency(String),

    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Filename '{filename}' does not match the expected format {pattern}")]
    FilenameMismatch { filename: String, pattern: String },

    #[error("No run.card found in '{0}'")]
    NoRunCardFound(String),

    #[error("No config.card found in '{0}'")]
    NoConfigCardFound(String),

    #[error("No configuration for project '{project}' in {source_name}")]
    NoConfigSection { project: String, source_name: String },

    #[error("Dimension '{dimension}' is not the leading dimension of variable '{variable}'")]
    UnsupportedSlice { dimension: String, variable: String },

    #[error("Unknown status code '{0}'")]
    InvalidStatusCode(String),
}

const fn existing_target(exists: &bool) -> &'static str {
    if *exists { ": target already exists" } else { "" }
}

fn on_variable(variable: Option<&str>) -> String {
    variable.map_or_else(String::new, |v| format!(" on variable '{v}'"))
}
