use clap::Parser;
use nctime::cli::{Cli, Commands};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    if let Some(logfile) = nctime::tracing::init(cli.global.debug, cli.global.log.as_deref()) {
        eprintln!("Logging to {}", logfile.display());
    }
    tracing::info!(command = ?std::env::args().collect::<Vec<_>>(), "Starting nctime");

    let ok = match &cli.command {
        Commands::Axis(args) => nctime::axis::run(args, &cli.global)
            .await
            .inspect_err(|e| tracing::error!("Time axis check failed: {:#}", e))?
            .exit_ok(),
        Commands::Overlap(args) => nctime::overlap::run(args, &cli.global)
            .await
            .inspect_err(|e| tracing::error!("Time coverage check failed: {:#}", e))?
            .exit_ok(),
    };
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
