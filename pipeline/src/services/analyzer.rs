use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::models::{AnalysisResult, CleanedVideoRecord, GrowthRate, TopicSummary, TopicYearStats};
use crate::services::{charts, report};
use crate::utils::{latest_file_with_extension, mean, median, round2, write_atomically};
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub fn read_cleaned_csv(path: &Path) -> Result<Vec<CleanedVideoRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Loads the most recent cleaned CSV, falling back to the JSON mirror.
pub fn load_cleaned_data(dir: &Path) -> Result<(PathBuf, Vec<CleanedVideoRecord>)> {
    if let Some(path) = latest_file_with_extension(dir, "csv")? {
        info!("Loading data from: {}", path.display());
        let records = read_cleaned_csv(&path)?;
        return Ok((path, records));
    }

    if let Some(path) = latest_file_with_extension(dir, "json")? {
        info!("Loading data from: {}", path.display());
        let records = serde_json::from_slice(&fs::read(&path)?)?;
        return Ok((path, records));
    }

    Err(PipelineError::NoInputFiles(dir.to_path_buf()))
}

/// Configured topics first, then any others found in the data, alphabetically.
fn topic_order(records: &[CleanedVideoRecord], configured: &[&str]) -> Vec<String> {
    let mut topics: Vec<String> = configured.iter().map(|t| t.to_string()).collect();
    let extra: BTreeSet<&str> = records
        .iter()
        .map(|r| r.topic.as_str())
        .filter(|t| !configured.contains(t))
        .collect();
    topics.extend(extra.into_iter().map(String::from));
    topics
}

fn bucket_stats(topic: &str, year: i32, records: &[&CleanedVideoRecord]) -> TopicYearStats {
    let views: Vec<f64> = records.iter().map(|r| r.view_count as f64).collect();
    let likes: Vec<f64> = records.iter().map(|r| r.like_count as f64).collect();
    let views_per_year: Vec<f64> = records.iter().map(|r| r.avg_views_per_year).collect();
    let ratios: Vec<f64> = records.iter().filter_map(|r| r.engagement_ratio).collect();

    TopicYearStats {
        topic: topic.to_string(),
        year,
        video_count: records.len(),
        mean_views: mean(&views).map(round2),
        median_views: median(&views).map(round2),
        mean_likes: mean(&likes).map(round2),
        mean_views_per_year: mean(&views_per_year).map(round2),
        mean_engagement_ratio: mean(&ratios).map(|r| (r * 10_000.0).round() / 10_000.0),
    }
}

fn percent_change(previous: f64, current: f64) -> f64 {
    if previous > 0.0 {
        round2((current - previous) / previous * 100.0)
    } else {
        0.0
    }
}

/// Year-over-year change per topic between consecutive years that have videos.
/// Empty years are skipped rather than compared as zero.
fn growth_rates(topics: &[String], buckets: &[TopicYearStats]) -> Vec<GrowthRate> {
    let mut growth = Vec::new();
    for topic in topics {
        let populated: Vec<&TopicYearStats> = buckets
            .iter()
            .filter(|b| &b.topic == topic && b.video_count > 0)
            .collect();

        for pair in populated.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            growth.push(GrowthRate {
                topic: topic.clone(),
                year: curr.year,
                video_count_growth_pct: percent_change(
                    prev.video_count as f64,
                    curr.video_count as f64,
                ),
                avg_views_growth_pct: percent_change(
                    prev.mean_views.unwrap_or(0.0),
                    curr.mean_views.unwrap_or(0.0),
                ),
            });
        }
    }
    growth
}

/// Aggregates the cleaned table. Every topic gets a bucket for every year between
/// the earliest and latest publication year, empty or not.
pub fn analyze(records: &[CleanedVideoRecord], configured_topics: &[&str]) -> AnalysisResult {
    let topics = topic_order(records, configured_topics);
    let years: Vec<i32> = match (
        records.iter().map(|r| r.publication_year).min(),
        records.iter().map(|r| r.publication_year).max(),
    ) {
        (Some(first), Some(last)) => (first..=last).collect(),
        _ => Vec::new(),
    };

    let mut grouped: BTreeMap<(&str, i32), Vec<&CleanedVideoRecord>> = BTreeMap::new();
    for record in records {
        grouped
            .entry((record.topic.as_str(), record.publication_year))
            .or_default()
            .push(record);
    }

    let mut buckets = Vec::with_capacity(topics.len() * years.len());
    for topic in &topics {
        for &year in &years {
            let members = grouped
                .get(&(topic.as_str(), year))
                .map(Vec::as_slice)
                .unwrap_or_default();
            buckets.push(bucket_stats(topic, year, members));
        }
    }

    let yearly_totals = years
        .iter()
        .map(|&year| {
            let count = records.iter().filter(|r| r.publication_year == year).count();
            (year, count)
        })
        .collect();

    let topic_totals = topics
        .iter()
        .map(|topic| {
            let members: Vec<&CleanedVideoRecord> =
                records.iter().filter(|r| &r.topic == topic).collect();
            let views: Vec<f64> = members.iter().map(|r| r.view_count as f64).collect();
            let ratios: Vec<f64> = members.iter().filter_map(|r| r.engagement_ratio).collect();
            TopicSummary {
                topic: topic.clone(),
                video_count: members.len(),
                mean_views: mean(&views).map(round2),
                mean_engagement_ratio: mean(&ratios).map(|r| (r * 10_000.0).round() / 10_000.0),
            }
        })
        .collect();

    let growth = growth_rates(&topics, &buckets);

    AnalysisResult {
        total_videos: records.len(),
        topics,
        years,
        buckets,
        yearly_totals,
        topic_totals,
        growth,
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    pub input: PathBuf,
    pub report_path: PathBuf,
    pub summary_path: PathBuf,
    pub charts: Vec<PathBuf>,
    pub result: AnalysisResult,
}

pub fn run_analysis(config: &PipelineConfig, now: DateTime<Utc>) -> Result<AnalysisSummary> {
    let (input, records) = load_cleaned_data(&config.processed_data_dir)?;
    if records.is_empty() {
        return Err(PipelineError::NoValidRecords(0));
    }

    let result = analyze(&records, &config.topic_names());
    info!(
        "Analyzed {} videos across {} topic(s) and {} year(s)",
        result.total_videos,
        result.topics.len(),
        result.years.len()
    );

    let charts = charts::render_all(&result, &config.results_dir);
    if charts.is_empty() {
        warn!("No charts could be rendered");
    }

    let source = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let text = report::render_report(&result, &source, now);
    let report_path = config.results_dir.join("analysis_report.txt");
    write_atomically(&report_path, text.as_bytes())?;
    info!("Summary report saved to: {}", report_path.display());

    let summary_path = config.results_dir.join("analysis_summary.json");
    write_atomically(&summary_path, &serde_json::to_vec_pretty(&result)?)?;
    info!("Aggregates saved to: {}", summary_path.display());

    Ok(AnalysisSummary {
        input,
        report_path,
        summary_path,
        charts,
        result,
    })
}
