//! outdial CLI — dispatch a CSV call schedule and write an outcome report.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use outdial::{Config, PlatformEngine, default_report_path, run_batch, shutdown};

/// Batch-schedule outbound automated phone calls from a CSV of call records.
#[derive(Debug, Parser)]
#[command(name = "outdial", version, about)]
struct Cli {
    /// Path to the input CSV of call records
    input: PathBuf,

    /// Path for the CSV report (derived from the current timestamp if omitted)
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let output = match cli.output {
        Some(path) => path,
        None => {
            let path = default_report_path(Local::now());
            println!("path for report file was not specified");
            println!("report will be saved as {}", path.display());
            path
        }
    };

    let config = Config::default();
    if let Err(e) = dispatch(&cli.input, &output, &config).await {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    shutdown::linger(config.queue.shutdown_grace).await;
    ExitCode::SUCCESS
}

async fn dispatch(
    input: &std::path::Path,
    output: &std::path::Path,
    config: &Config,
) -> outdial::Result<()> {
    let (engine, events) = PlatformEngine::deploy(&config.deploy).await?;
    run_batch(engine, events, config, input, output).await
}
