//! Time axis checker.
//!
//! Each file's time axis is rebuilt from its filename period, frequency and calendar,
//! then compared with the stored one. Mismatches are reported as [`StatusCode`]s and
//! can be corrected in place.

pub mod handler;
pub mod report;
pub mod status;

pub use handler::AxisFile;
pub use report::{Diagnostic, Mismatch, Summary};
pub use status::StatusCode;

use crate::card;
use crate::cli::{AxisArgs, GlobalArgs};
use crate::context::{ProcessingContext, TIME_VARIABLE};
use crate::error::{NcTimeError, Result};
use crate::netcdf::{Attribute, Edits, NcFile};
use anyhow::Context;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info_span;

/// What to do with each file besides diagnosing it.
#[derive(Debug, Clone, Default)]
pub struct AxisOptions {
    /// Correct files showing a fixable status
    pub write: bool,
    /// Correct every file
    pub force: bool,
    /// Skip the end-of-period checks (003, 008)
    pub on_fly: bool,
    /// Codes dropped from the reported status
    pub ignore: Vec<StatusCode>,
}

impl AxisOptions {
    fn from_args(args: &AxisArgs, on_fly: bool) -> Self {
        Self {
            write: args.write,
            force: args.force,
            on_fly,
            ignore: args.ignore_errors.clone(),
        }
    }
}

/// Check (and possibly correct) one file.
pub fn process(path: &Path, ctx: &ProcessingContext, opts: &AxisOptions) -> Result<Diagnostic> {
    let file = AxisFile::load(path, ctx)?;
    let mut diag = Diagnostic::new(&file, ctx.ref_units, ctx.ref_calendar);
    let mut status = Vec::new();

    if !opts.on_fly && file.last.timestamp != file.end.timestamp {
        status.push(StatusCode::EndTimestampMismatch);
    }
    if !opts.on_fly && file.last.date != file.end.date {
        status.push(StatusCode::EndDateMismatch);
    }
    if file.is_instant && file.has_bounds() {
        status.push(StatusCode::InstantWithBounds);
    }
    if !file.is_instant && !file.has_bounds() {
        status.push(StatusCode::AveragedWithoutBounds);
    }
    let end_mismatch = status
        .iter()
        .any(|s| matches!(s, StatusCode::EndTimestampMismatch | StatusCode::EndDateMismatch));

    let mut rebuilt_axis = None;
    if !end_mismatch {
        let rebuilt = file.build_time_axis();
        diag.wrong_timesteps = mismatches(&file.time_axis, &rebuilt);
        if !diag.wrong_timesteps.is_empty() {
            status.push(StatusCode::WrongAxis);
        }
        rebuilt_axis = Some(rebuilt);
    }

    let mut rebuilt_bounds = None;
    if let Some(bounds) = &file.time_bounds
        && !end_mismatch
        && !status.contains(&StatusCode::InstantWithBounds)
    {
        let rebuilt = file.build_time_bounds();
        diag.wrong_bounds = mismatches(bounds, &rebuilt);
        if !diag.wrong_bounds.is_empty() {
            status.push(StatusCode::WrongBounds);
        }
        rebuilt_bounds = Some(rebuilt);
    }

    if ctx.ref_units != file.units {
        status.push(StatusCode::UnitsChanged);
    }
    if ctx.ref_calendar != file.calendar {
        status.push(StatusCode::CalendarChanged);
    }

    let wants = |code: StatusCode| opts.force || (opts.write && status.contains(&code));
    let mut path = file.path.clone();

    if wants(StatusCode::EndTimestampMismatch) {
        let renamed = file.corrected_filename();
        if renamed != file.filename {
            path = rename(&file.path, &renamed)?;
            diag.renamed = Some(renamed);
        }
    }

    let mut edits = Edits::new();
    let drop_bounds =
        (opts.write || opts.force) && status.contains(&StatusCode::InstantWithBounds);
    let bounds_var = match &file.bounds_var {
        Some(var) if drop_bounds => {
            edits = edits.drop_var(var).delete_attr(Some(TIME_VARIABLE), "bounds");
            None
        }
        other => other.as_deref(),
    };
    let rewrite_axis = opts.force
        || (opts.write && status.iter().any(|s| s.needs_axis_rewrite()));
    if rewrite_axis {
        let axis = rebuilt_axis.unwrap_or_else(|| file.build_time_axis());
        edits = edits
            .replace_values(TIME_VARIABLE, axis)
            .set_attr(Some(TIME_VARIABLE), Attribute::text("units", &ctx.ref_units.to_string()))
            .set_attr(Some(TIME_VARIABLE), Attribute::text("calendar", ctx.ref_calendar.name()));
        if let Some(var) = bounds_var {
            let bounds = rebuilt_bounds.unwrap_or_else(|| file.build_time_bounds());
            edits = edits.replace_values(var, bounds.into_iter().flatten().collect());
        }
    }
    if !edits.is_empty() {
        NcFile::update(&path, &edits)
            .with_context(|| format!("Failed to correct {}", path.display()))?;
        diag.corrected = true;
        tracing::info!(path = %path.display(), "Corrected time axis");
    }

    status.retain(|code| !opts.ignore.contains(code));
    diag.status = status;
    Ok(diag)
}

/// Rows of `found` that differ from `expected`.
fn mismatches<T: PartialEq + Copy>(found: &[T], expected: &[T]) -> Vec<Mismatch<T>> {
    found
        .iter()
        .zip(expected)
        .enumerate()
        .filter(|(_, (f, e))| f != e)
        .map(|(index, (&found, &expected))| Mismatch { index, found, expected })
        .collect()
}

fn rename(path: &Path, filename: &str) -> Result<PathBuf> {
    let target = path.with_file_name(filename);
    let failure = |exists: bool| NcTimeError::RenamingNetCdfFailed {
        src: path.display().to_string(),
        dst: target.display().to_string(),
        exists,
    };
    if target.exists() {
        return Err(failure(true).into());
    }
    std::fs::rename(path, &target).map_err(|e| anyhow::Error::new(failure(false)).context(e))?;
    tracing::info!(src = %path.display(), dst = %target.display(), "Renamed file");
    Ok(target)
}

/// Run the checker over every collected file and print the diagnostics.
pub async fn run(args: &AxisArgs, global: &GlobalArgs) -> Result<Summary> {
    let on_fly = match &args.card {
        Some(dir) => !card::is_simulation_completed(dir)?,
        None => args.on_fly,
    };
    if on_fly {
        tracing::info!("Simulation still running, end-of-period checks are skipped");
    }
    let ctx = Arc::new(ProcessingContext::new(&args.common, global)?);
    let opts = Arc::new(AxisOptions::from_args(args, on_fly));

    let mut results = stream::iter(ctx.files.clone())
        .map(|path| {
            let ctx = Arc::clone(&ctx);
            let opts = Arc::clone(&opts);
            async move {
                let shown = path.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    let span = info_span!("axis", file = %path.display());
                    let _enter = span.enter();
                    process(&path, &ctx, &opts)
                })
                .await
                .context("Task panicked")
                .and_then(|r| r);
                (shown, outcome)
            }
        })
        .buffered(ctx.processes);

    while let Some((path, outcome)) = results.next().await {
        ctx.stats.record_scanned();
        match outcome {
            Ok(diag) => {
                if diag.has_errors() {
                    ctx.stats.record_error();
                }
                if diag.has_errors() || args.all {
                    println!("{}\n", diag.render(args.limit)?);
                }
                if args.json {
                    println!("{}", serde_json::to_string(&diag)?);
                }
            }
            Err(e) => {
                ctx.stats.record_skipped();
                tracing::error!("{} skipped: {:#}", path.display(), e);
            }
        }
    }

    let summary = Summary {
        scanned: ctx.stats.scanned(),
        skipped: ctx.stats.skipped(),
        with_errors: ctx.stats.errors(),
    };
    println!("{summary}");
    Ok(summary)
}
