mod common;

use assert2::{check, let_assert};
use common::{Sample, TempWorkspace, overlap_args};
use nctime::context::ProcessingContext;
use nctime::error::NcTimeError;
use nctime::netcdf::NcFile;
use nctime::overlap::{self, Dataset, Evaluation, FileNode, PathEntry};
use nctime::time::CfDate;

const DATASET: &str = "tas_Amon_IPSL-CM6A-LR_historical_r1i1p1f1_gr";

const RUN_TABLE: &str = "[Configuration]
PeriodState= \"Completed\"

#  CumulPeriod |  PeriodDateBegin |   PeriodDateEnd |        RunDateBegin |          RunDateEnd |  RealCpuTime |  UserCpuTime |  SysCpuTime |
#  1           |         18500101 |        18591231 | 2017-01-01T00:00:00 | 2017-01-01T06:00:00 |     100.0000 |      90.0000 |      1.0000 |
#  2           |         18600101 |        18791231 | 2017-01-01T06:00:00 | 2017-01-01T12:00:00 |     100.0000 |      90.0000 |      1.0000 |
";

/// Write monthly files covering the given year ranges.
fn workspace_with(chunks: &[(i64, i64)]) -> TempWorkspace {
    let workspace = TempWorkspace::new();
    let data = workspace.path().join("data");
    for &(first, last) in chunks {
        Sample::monthly(first, last).write(&data);
    }
    workspace
}

fn filename(first: i64, last: i64) -> String {
    format!("{DATASET}_{first:04}01-{last:04}12.nc")
}

fn load(workspace: &TempWorkspace, extra: &[&str]) -> Dataset {
    let data = workspace.path().join("data");
    let mut args = vec!["overlap", data.to_str().unwrap()];
    args.extend_from_slice(extra);
    let cli = workspace.cli(&args);
    let ctx = ProcessingContext::new(&overlap_args(&cli).common, &cli.global).unwrap();
    let nodes = ctx
        .files
        .iter()
        .map(|path| FileNode::load(path, &ctx).unwrap())
        .collect();
    let bound = |ts: &Option<String>| {
        ts.as_deref()
            .map(|ts| nctime::time::timestamp::timestamp_to_date(ts).unwrap().as_int())
    };
    Dataset::new(DATASET.to_string(), nodes, bound(&ctx.start), bound(&ctx.end))
}

#[test]
fn node_dates_come_from_the_filename() {
    let workspace = workspace_with(&[(1850, 1859)]);
    let dataset = load(&workspace, &[]);
    let node = &dataset.nodes[0];

    check!(node.id == DATASET);
    check!(node.start == CfDate::new(1850, 1, 1, 0, 0, 0));
    check!(node.end == CfDate::new(1859, 12, 1, 0, 0, 0));
    check!(node.next == CfDate::new(1860, 1, 1, 0, 0, 0));
    check!(node.first_step == CfDate::new(1850, 1, 16, 12, 0, 0));
    check!(node.last_step == CfDate::new(1859, 12, 16, 12, 0, 0));
}

#[test]
fn contiguous_files_have_no_overlap() {
    let workspace = workspace_with(&[(1850, 1859), (1860, 1869), (1870, 1879)]);
    let dataset = load(&workspace, &[]);

    let_assert!(Ok(evaluation) = dataset.evaluate());
    let_assert!(Evaluation::Continuous { path, partial, full } = &evaluation);
    check!(path == &vec![0, 1, 2]);
    check!(partial.is_empty());
    check!(full.is_empty());
    check!(!evaluation.has_overlaps());

    let_assert!(Ok(text) = overlap::render(&dataset, &evaluation));
    check!(text.starts_with("Shortest path found without overlaps"));
}

#[test]
fn partial_overlap_is_truncated() {
    let workspace = workspace_with(&[(1850, 1859), (1855, 1869)]);
    let dataset = load(&workspace, &[]);

    let_assert!(Ok(evaluation) = dataset.evaluate());
    let_assert!(Evaluation::Continuous { path, partial, full } = &evaluation);
    check!(path == &vec![0, 1]);
    check!(full.is_empty());
    check!(partial.len() == 1);
    check!(partial[0].node == 1);
    check!(partial[0].cutting_date == CfDate::new(1860, 1, 1, 0, 0, 0));
    check!(partial[0].cutting_timestep == 60);

    let_assert!(Ok(text) = overlap::render(&dataset, &evaluation));
    check!(text.contains(&format!("[ {} <-- overlap from", filename(1855, 1869))));

    let_assert!(Ok(()) = overlap::resolve(&dataset, &evaluation, false));
    check!(workspace.nc_files("data") == vec![filename(1850, 1859), filename(1860, 1869)]);

    let truncated = NcFile::open(workspace.path().join("data").join(filename(1860, 1869))).unwrap();
    let time = truncated.read_f64("time").unwrap();
    check!(time.len() == 120);
    check!(time[0] == common::monthly_axis(1860, 1860).0[0]);
    check!(truncated.leading_len("time_bnds").unwrap() == 120);
}

#[test]
fn full_overlap_is_removed() {
    let workspace = workspace_with(&[(1850, 1869), (1855, 1859)]);
    let dataset = load(&workspace, &[]);

    let_assert!(Ok(evaluation) = dataset.evaluate());
    let_assert!(Evaluation::Continuous { path, partial, full } = &evaluation);
    check!(path == &vec![0]);
    check!(partial.is_empty());
    check!(full == &vec![1]);

    let_assert!(Ok(text) = overlap::render(&dataset, &evaluation));
    check!(text.contains(&format!("[ {} <-- to remove ]", filename(1855, 1859))));

    let_assert!(Ok(()) = overlap::resolve(&dataset, &evaluation, true));
    check!(workspace.nc_files("data") == vec![filename(1850, 1869)]);
}

#[test]
fn full_only_keeps_partial_overlaps() {
    let workspace = workspace_with(&[(1850, 1859), (1855, 1869), (1856, 1857)]);
    let dataset = load(&workspace, &[]);

    let_assert!(Ok(evaluation) = dataset.evaluate());
    let_assert!(Ok(()) = overlap::resolve(&dataset, &evaluation, true));
    check!(workspace.nc_files("data") == vec![filename(1850, 1859), filename(1855, 1869)]);
}

#[test]
fn gap_breaks_the_time_series() {
    let workspace = workspace_with(&[(1850, 1859), (1870, 1879)]);
    let dataset = load(&workspace, &[]);

    let_assert!(Ok(evaluation) = dataset.evaluate());
    check!(evaluation.is_broken());
    let_assert!(Evaluation::Broken { entries } = &evaluation);
    check!(entries == &vec![PathEntry::File(0), PathEntry::Break, PathEntry::File(1)]);

    let_assert!(Ok(text) = overlap::render(&dataset, &evaluation));
    check!(text.lines().nth(2).map(str::trim) == Some("BREAK"));
}

#[test]
fn expected_start_before_the_first_file_breaks_the_series() {
    let workspace = workspace_with(&[(1850, 1859), (1860, 1869)]);

    let_assert!(Ok(evaluation) = load(&workspace, &["--start", "1845"]).evaluate());
    check!(evaluation.is_broken());

    let_assert!(Ok(evaluation) = load(&workspace, &["--start", "1850", "--end", "1869"]).evaluate());
    check!(!evaluation.is_broken());
}

#[test]
fn cutting_timestep_past_the_last_step_is_an_error() {
    let workspace = workspace_with(&[(1850, 1859)]);
    let dataset = load(&workspace, &[]);

    let_assert!(Ok(index) = dataset.nodes[0].cutting_timestep(&CfDate::new(1850, 6, 1, 0, 0, 0)));
    check!(index == 5);

    let_assert!(Err(err) = dataset.nodes[0].cutting_timestep(&CfDate::new(1860, 1, 1, 0, 0, 0)));
    let_assert!(Some(NcTimeError::NetCdfTimeStepNotFound { .. }) = err.downcast_ref::<NcTimeError>());
}

#[tokio::test(flavor = "multi_thread")]
async fn run_resolves_every_dataset() {
    let workspace = workspace_with(&[(1850, 1859), (1855, 1869), (1870, 1879)]);
    let data = workspace.path().join("data");
    Sample::daily("18500101", "18501231", 0, 365).write(&data);
    Sample::daily("18510101", "18511231", 365, 365).write(&data);

    let cli = workspace.cli(&["overlap", data.to_str().unwrap(), "--resolve"]);
    let_assert!(Ok(summary) = overlap::run(overlap_args(&cli), &cli.global).await);
    check!(summary.nodes == 5);
    check!(summary.datasets == 2);
    check!(summary.with_overlaps == 1);
    check!(summary.broken == 0);
    check!(!summary.exit_ok());

    let cli = workspace.cli(&["overlap", data.to_str().unwrap()]);
    let_assert!(Ok(summary) = overlap::run(overlap_args(&cli), &cli.global).await);
    check!(summary.with_overlaps == 0);
    check!(summary.exit_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn run_with_card_expects_the_simulated_period() {
    let workspace = workspace_with(&[(1850, 1859), (1860, 1869)]);
    workspace.create_file("card/run.card", RUN_TABLE);
    workspace.create_file("card/config.card", "[UserChoices]\n");
    let data = workspace.path().join("data");
    let card = workspace.path().join("card");

    let cli = workspace.cli(&["overlap", data.to_str().unwrap(), "--card", card.to_str().unwrap()]);
    let_assert!(Ok(summary) = overlap::run(overlap_args(&cli), &cli.global).await);
    check!(summary.broken == 1);
    check!(!summary.exit_ok());

    Sample::monthly(1870, 1879).write(&data);
    let_assert!(Ok(summary) = overlap::run(overlap_args(&cli), &cli.global).await);
    check!(summary.broken == 0);
    check!(summary.exit_ok());
}
