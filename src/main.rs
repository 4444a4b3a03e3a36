mod config;
mod errors;
mod exchanges;
mod fetcher;
mod models;
mod runner;
mod snapshot;

use config::{Config, LogFormat};
use runner::Runner;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(
        config
            .as_ref()
            .map(|c| c.log_format)
            .unwrap_or(LogFormat::Text),
    );
    let config = config?;

    // one timestamp for every row written in this run
    let timestamp = chrono::Utc::now().timestamp();

    tracing::info!(
        "funding snapshot {timestamp}: exchanges {:?}, output dir {}",
        config.exchanges.iter().map(|p| p.id()).collect::<Vec<_>>(),
        config.output_dir.display()
    );

    let runner = Runner::from_config(&config)?;
    let report = runner.run(timestamp).await;
    report.log_summary();

    // partial failures are in the report and the logs, not the exit code
    Ok(())
}
