use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info};
use pipeline::config::{init_logger, load_environment, PipelineConfig};
use pipeline::services::cleaner::run_cleaning;

fn run() -> Result<()> {
    let config = PipelineConfig::from_env()?;
    let summary = run_cleaning(&config, Utc::now())
        .with_context(|| format!("cleaning {} failed", config.raw_data_dir.display()))?;

    info!(
        "Records loaded: {}, malformed: {}, duplicates: {}, outside window: {}",
        summary.loaded, summary.skipped, summary.duplicates_removed, summary.outside_window
    );
    info!("Total videos: {}", summary.written);
    info!("Videos by topic:");
    for (topic, count) in &summary.per_topic {
        info!("  {topic}: {count}");
    }
    info!("Videos by year:");
    for (year, count) in &summary.per_year {
        info!("  {year}: {count}");
    }
    info!("Cleaned table: {}", summary.csv_path.display());
    Ok(())
}

fn main() {
    load_environment();
    init_logger();
    info!("Data Cleaning and Preparation");

    if let Err(e) = run() {
        error!("{e:#}");
        error!("Run the collect stage first to produce raw data.");
        std::process::exit(1);
    }
}
