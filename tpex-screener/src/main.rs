//! TPEx Screener - monthly breakout scan of TPEx-listed equities.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tpex_common::config::Config;
use tpex_common::logging::init_logging_with_exclusions;
use tpex_screener::data::ScreeningPeriod;

/// Screen TPEx equities for volume-confirmed moving average breakouts.
#[derive(Parser, Debug)]
#[command(name = "tpex-screener")]
#[command(version)]
#[command(about = "Technical breakout screener for TPEx-listed equities", long_about = None)]
struct Cli {
    /// Month to screen, as YYYY/MM (defaults to the current month)
    #[arg(long, short)]
    month: Option<ScreeningPeriod>,

    /// Config file path (defaults to ~/.tpex-screener/config.json)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Directory for the result tables
    #[arg(long, short)]
    output_dir: Option<PathBuf>,

    /// Maximum number of instruments screened at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TPEX_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if let Some(n) = self.concurrency {
            config.screener.concurrency = n;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let start = std::time::Instant::now();
    let cli = Cli::parse();

    let mut config = Config::load_with_env(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    let period = cli.month.unwrap_or_else(ScreeningPeriod::current);
    tracing::info!(
        period = %period,
        output_dir = %config.output.dir.display(),
        "TPEx Screener v{}",
        env!("CARGO_PKG_VERSION")
    );

    let outcome = tpex_screener::run(&config, period).await;

    let elapsed = start.elapsed();
    tracing::info!(
        duration_ms = elapsed.as_millis() as u64,
        "Total execution time: {:.2} seconds",
        elapsed.as_secs_f64()
    );

    outcome.context("Screening run aborted")?;
    Ok(())
}
