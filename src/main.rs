mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use reddit_media::config::Config;
use reddit_media::Harvester;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_overrides(cli.overrides());

    let output_dir = config.resolve_output_dir(chrono::Local::now());
    tracing::info!(input = %config.input_dir.display(), output = %output_dir.display(), "starting reddit media downloader");

    let harvester = Harvester::new(&config)?;
    let report = harvester
        .run_with_progress(&output_dir, |p| {
            if p.success {
                tracing::debug!(current = p.current, total = p.total, file = %p.current_item, "downloaded");
            } else {
                tracing::warn!(current = p.current, total = p.total, file = %p.current_item, "failed");
            }
        })
        .await?;

    if report.unique_media > 0 {
        println!("Successful: {}", report.succeeded);
        println!("Failed: {}", report.failed);
        println!("Files saved to: {}", report.output_dir.display());
    }
    Ok(())
}
