use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use pipeline::config::{init_logger, load_environment, PipelineConfig};
use pipeline::services::collector::run_collection;
use pipeline::services::youtube_api::YouTubeClient;

async fn run() -> Result<()> {
    let config = PipelineConfig::from_env()?;
    let api_key = config.require_api_key()?;
    let client = YouTubeClient::new(api_key, config.request_timeout)?;
    info!("YouTube API client created successfully");

    let summary = run_collection(&client, &config)
        .await
        .context("collection failed")?;

    info!(
        "Topics completed: {}/{}",
        summary.topics_completed,
        config.topics.len()
    );
    if !summary.topics_skipped.is_empty() {
        warn!("Topics skipped after errors: {}", summary.topics_skipped.join(", "));
    }
    if summary.quota_exhausted {
        warn!(
            "Quota budget exhausted, not attempted: {}",
            summary.topics_not_attempted.join(", ")
        );
    }
    info!(
        "Requests: {}, quota used: {}/{} unit(s)",
        summary.requests, summary.units_used, config.quota_budget
    );
    info!(
        "Total videos collected: {}, unique: {}",
        summary.total_videos, summary.unique_videos
    );

    match summary.output {
        Some(path) => info!("Raw data written to {}", path.display()),
        None => bail!("no videos were collected"),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    load_environment();
    init_logger();
    info!("YouTube IT Skills Data Collection");

    if let Err(e) = run().await {
        error!("{e:#}");
        std::process::exit(1);
    }
    info!("Data collection complete!");
}
