//! Time coverage checker.
//!
//! Files are grouped per dataset. Each dataset becomes a directed graph whose
//! shortest `START -> END` path is the minimal chain of files covering the period;
//! files off that path overlap it completely, consecutive files on it may overlap
//! partially, and a missing path means a gap in the time series.

pub mod graph;
pub mod handler;

pub use graph::{Dataset, Evaluation, PartialOverlap, PathEntry};
pub use handler::FileNode;

use crate::card;
use crate::cli::{GlobalArgs, OverlapArgs};
use crate::context::{ProcessingContext, TIME_VARIABLE};
use crate::error::Result;
use crate::netcdf::{Edits, NcFile};
use crate::time::timestamp::timestamp_to_date;
use anyhow::Context;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use tracing::info_span;

/// Counters printed at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub nodes: usize,
    pub skipped: usize,
    pub datasets: usize,
    pub with_overlaps: usize,
    pub broken: usize,
}

impl Summary {
    pub const fn exit_ok(&self) -> bool {
        self.with_overlaps == 0 && self.broken == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of files scanned: {}", self.nodes + self.skipped)?;
        writeln!(f, "Number of files skipped: {}", self.skipped)?;
        writeln!(f, "Number of datasets: {}", self.datasets)?;
        writeln!(f, "Number of datasets with overlap(s): {}", self.with_overlaps)?;
        write!(f, "Number of datasets with broken time series: {}", self.broken)
    }
}

/// Group nodes per dataset, each sorted by filename.
pub fn group(nodes: Vec<FileNode>) -> BTreeMap<String, Vec<FileNode>> {
    let mut datasets: BTreeMap<String, Vec<FileNode>> = BTreeMap::new();
    for node in nodes {
        datasets.entry(node.id.clone()).or_default().push(node);
    }
    datasets
}

/// Diagnostic text of an evaluated dataset.
pub fn render(dataset: &Dataset, evaluation: &Evaluation) -> Result<String> {
    let mut out = String::new();
    let name = |i: usize| dataset.nodes[i].filename.as_str();
    match evaluation {
        Evaluation::Broken { entries } => {
            write!(out, "Time series broken: {}", dataset.id)?;
            for entry in entries {
                match entry {
                    PathEntry::File(i) => write!(out, "\n  {}", name(*i))?,
                    PathEntry::Break => write!(out, "\n  BREAK")?,
                }
            }
        }
        Evaluation::Continuous { path, partial, full } => {
            if evaluation.has_overlaps() {
                write!(out, "Shortest path found WITH overlaps: {}", dataset.id)?;
            } else {
                write!(out, "Shortest path found without overlaps: {}", dataset.id)?;
            }
            for &i in path {
                match partial.iter().find(|p| p.node == i) {
                    Some(overlap) => write!(
                        out,
                        "\n[ {} <-- overlap from {} to {} ]",
                        name(i),
                        dataset.nodes[i].start.as_int(),
                        overlap.end_overlap.as_int()
                    )?,
                    None => write!(out, "\n  {}", name(i))?,
                }
            }
            for &i in full {
                write!(out, "\n[ {} <-- to remove ]", name(i))?;
            }
        }
    }
    Ok(out)
}

/// Delete fully overlapped files, then (unless `full_only`) truncate partial overlaps.
pub fn resolve(dataset: &Dataset, evaluation: &Evaluation, full_only: bool) -> Result<()> {
    let Evaluation::Continuous { partial, full, .. } = evaluation else {
        return Ok(());
    };
    for &i in full {
        let node = &dataset.nodes[i];
        std::fs::remove_file(&node.path)
            .with_context(|| format!("Failed to remove {}", node.path.display()))?;
        tracing::info!(path = %node.path.display(), "Removed fully overlapping file");
    }
    if full_only {
        return Ok(());
    }
    for overlap in partial {
        let node = &dataset.nodes[overlap.node];
        let target = node
            .path
            .with_file_name(node.truncated_filename(&overlap.cutting_date)?);
        let edits = Edits::new().slice(TIME_VARIABLE, overlap.cutting_timestep);
        NcFile::rewrite_to(&node.path, &target, &edits)?;
        std::fs::remove_file(&node.path)
            .with_context(|| format!("Failed to remove {}", node.path.display()))?;
        tracing::info!(
            src = %node.path.display(),
            dst = %target.display(),
            from = overlap.cutting_timestep,
            "Truncated partially overlapping file"
        );
    }
    Ok(())
}

/// Build every dataset graph, print its diagnostic and resolve overlaps on request.
pub async fn run(args: &OverlapArgs, global: &GlobalArgs) -> Result<Summary> {
    let mut common = args.common.clone();
    if let Some(dir) = &args.card {
        let (first, last) = card::simulated_period(dir)?.as_timestamps();
        tracing::info!(start = %first, end = %last, "Simulated period read from run.card");
        common.start = Some(first);
        common.end = Some(last);
    }
    let ctx = Arc::new(ProcessingContext::new(&common, global)?);

    let mut loaded = stream::iter(ctx.files.clone())
        .map(|path| {
            let ctx = Arc::clone(&ctx);
            async move {
                let shown = path.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    let span = info_span!("overlap", file = %path.display());
                    let _enter = span.enter();
                    FileNode::load(&path, &ctx)
                })
                .await
                .context("Task panicked")
                .and_then(|r| r);
                (shown, outcome)
            }
        })
        .buffered(ctx.processes);

    let mut nodes = Vec::with_capacity(ctx.files.len());
    while let Some((path, outcome)) = loaded.next().await {
        ctx.stats.record_scanned();
        match outcome {
            Ok(node) => nodes.push(node),
            Err(e) => {
                ctx.stats.record_skipped();
                tracing::error!("{} skipped: {:#}", path.display(), e);
            }
        }
    }

    let bound = |timestamp: Option<&str>| -> Result<Option<i64>> {
        Ok(timestamp
            .map(timestamp_to_date)
            .transpose()?
            .map(|date| date.as_int()))
    };
    let (first, last) = (bound(ctx.start.as_deref())?, bound(ctx.end.as_deref())?);

    let mut summary = Summary {
        nodes: nodes.len(),
        skipped: ctx.stats.skipped(),
        ..Summary::default()
    };
    for (id, files) in group(nodes) {
        summary.datasets += 1;
        let dataset = Dataset::new(id, files, first, last);
        let evaluation = match dataset.evaluate() {
            Ok(evaluation) => evaluation,
            Err(e) => {
                tracing::error!(dataset = %dataset.id, "Evaluation failed: {:#}", e);
                summary.broken += 1;
                continue;
            }
        };
        if evaluation.is_broken() {
            summary.broken += 1;
        } else if evaluation.has_overlaps() {
            summary.with_overlaps += 1;
        }
        println!("{}\n", render(&dataset, &evaluation)?);

        if args.resolve || args.full_only {
            resolve(&dataset, &evaluation, args.full_only)
                .with_context(|| format!("Failed to resolve overlaps of {}", dataset.id))?;
        }
    }
    println!("{summary}");
    Ok(summary)
}
