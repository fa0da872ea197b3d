//! Tracing initialization.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan, fmt::writer::BoxMakeWriter};

static INIT: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Initialize tracing. Safe to call multiple times; only the first call counts.
///
/// Events go to stderr, or to `nctime-<unix seconds>-<pid>.log` inside `log_dir`
/// when one is given. Returns the log file path in the latter case.
pub fn init(debug: bool, log_dir: Option<&Path>) -> Option<PathBuf> {
    INIT.get_or_init(|| {
        let is_test =
            std::env::var("NEXTEST").is_ok() || std::env::var("CARGO_TARGET_TMPDIR").is_ok();
        let level = if debug || is_test {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };
        let filter = EnvFilter::from_default_env().add_directive(level.into());

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_target(true)
            .with_span_events(FmtSpan::NONE)
            .compact();

        if is_test {
            if let Err(e) = builder.with_test_writer().try_init() {
                eprintln!("Failed to initialize tracing: {}", e);
            }
            return None;
        }

        let logfile = log_dir.and_then(|dir| match open_logfile(dir) {
            Ok(logfile) => Some(logfile),
            Err(e) => {
                eprintln!("Failed to create a log file in {}: {}", dir.display(), e);
                None
            }
        });
        let (writer, path) = match logfile {
            Some((file, path)) => (BoxMakeWriter::new(Mutex::new(file)), Some(path)),
            None => (BoxMakeWriter::new(std::io::stderr), None),
        };
        if let Err(e) = builder.with_writer(writer).try_init() {
            eprintln!("Failed to initialize tracing: {}", e);
        }
        path
    })
    .clone()
}

fn open_logfile(dir: &Path) -> std::io::Result<(File, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    let path = dir.join(format!("nctime-{}-{}.log", seconds, std::process::id()));
    let file = File::create(&path)?;
    Ok((file, path))
}
