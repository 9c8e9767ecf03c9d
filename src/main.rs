use anyhow::Result;
use clap::Parser;
use sma_price_tracker::{
    providers::CoinGeckoProvider, report::StdoutSink, Cli, PriceTracker, ShutdownCoordinator,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.into_config()?;

    let shutdown = ShutdownCoordinator::new();
    shutdown.listen_for_ctrl_c();

    let provider = Arc::new(CoinGeckoProvider::new(&config.api_url, shutdown.clone())?);
    let mut tracker = PriceTracker::new(config, provider, shutdown, StdoutSink)?;

    // Terminal errors are already logged by the tracker.
    match tracker.run().await {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
