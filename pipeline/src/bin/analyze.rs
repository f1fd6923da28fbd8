use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info};
use pipeline::config::{init_logger, load_environment, PipelineConfig};
use pipeline::services::analyzer::run_analysis;

fn run() -> Result<()> {
    let config = PipelineConfig::from_env()?;
    let summary = run_analysis(&config, Utc::now())
        .with_context(|| format!("analyzing {} failed", config.processed_data_dir.display()))?;

    info!("Input: {}", summary.input.display());
    info!(
        "Charts rendered: {}/6 in {}",
        summary.charts.len(),
        config.results_dir.display()
    );
    info!("Report: {}", summary.report_path.display());
    info!("Aggregates: {}", summary.summary_path.display());
    Ok(())
}

fn main() {
    load_environment();
    init_logger();
    info!("YouTube IT Skills Trend Analysis");

    if let Err(e) = run() {
        error!("{e:#}");
        std::process::exit(1);
    }
    info!("Analysis Complete!");
}
