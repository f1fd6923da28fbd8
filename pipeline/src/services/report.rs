use crate::models::{AnalysisResult, GrowthRate, TopicSummary};
use chrono::{DateTime, Utc};
use std::fmt::Write;

const RULE_WIDTH: usize = 60;

/// Formats a number with thousands separators, no decimals.
pub fn format_thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0.0 && digits != "0" {
        grouped.insert(0, '-');
    }
    grouped
}

fn ranked<'a, K: PartialOrd>(
    topics: &'a [TopicSummary],
    key: impl Fn(&TopicSummary) -> Option<K>,
) -> Vec<(&'a TopicSummary, K)> {
    let mut scored: Vec<(&TopicSummary, K)> = topics
        .iter()
        .filter(|t| t.video_count > 0)
        .filter_map(|t| key(t).map(|k| (t, k)))
        .collect();
    // Stable sort keeps topic order for ties.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

fn fastest_growing(growth: &[GrowthRate]) -> Vec<&GrowthRate> {
    let Some(latest) = growth.iter().map(|g| g.year).max() else {
        return Vec::new();
    };
    let mut recent: Vec<&GrowthRate> = growth.iter().filter(|g| g.year == latest).collect();
    recent.sort_by(|a, b| {
        b.video_count_growth_pct
            .partial_cmp(&a.video_count_growth_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    recent.truncate(3);
    recent
}

/// Plain-text summary of an analysis run.
pub fn render_report(result: &AnalysisResult, source: &str, generated_at: DateTime<Utc>) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let thin = "-".repeat(RULE_WIDTH);
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "YouTube IT Skills Trend Analysis Report");
    let _ = writeln!(out, "{rule}\n");
    let _ = writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Source: {source}\n");

    let _ = writeln!(out, "EXECUTIVE SUMMARY");
    let _ = writeln!(out, "{thin}");
    let _ = writeln!(out, "Total videos analyzed: {}", result.total_videos);
    match (result.years.first(), result.years.last()) {
        (Some(first), Some(last)) => {
            let _ = writeln!(out, "Date range: {first} - {last}");
        }
        _ => {
            let _ = writeln!(out, "Date range: n/a");
        }
    }
    let active_topics = result.topic_totals.iter().filter(|t| t.video_count > 0).count();
    let _ = writeln!(out, "Topics analyzed: {active_topics}\n");

    let _ = writeln!(out, "KEY FINDINGS");
    let _ = writeln!(out, "{thin}");

    let _ = writeln!(out, "\nMost popular topics (by video count):");
    for (topic, count) in ranked(&result.topic_totals, |t| Some(t.video_count)).into_iter().take(5) {
        let _ = writeln!(out, "  - {}: {count} videos", topic.topic);
    }

    let _ = writeln!(out, "\nTopics with highest average views:");
    for (topic, views) in ranked(&result.topic_totals, |t| t.mean_views).into_iter().take(5) {
        let _ = writeln!(out, "  - {}: {} average views", topic.topic, format_thousands(views));
    }

    let _ = writeln!(out, "\nTopics with highest engagement ratio ((likes + comments) / views):");
    for (topic, ratio) in ranked(&result.topic_totals, |t| t.mean_engagement_ratio)
        .into_iter()
        .take(5)
    {
        let _ = writeln!(out, "  - {}: {ratio:.4}", topic.topic);
    }

    let fastest = fastest_growing(&result.growth);
    if !fastest.is_empty() {
        let _ = writeln!(out, "\nGrowth Trends:");
        let _ = writeln!(out, "  Fastest growing topics (by video count, {}):", fastest[0].year);
        for g in fastest {
            let _ = writeln!(out, "    - {}: {:.1}% growth", g.topic, g.video_count_growth_pct);
        }
    }

    let _ = writeln!(out, "\nVIDEOS PER TOPIC PER YEAR");
    let _ = writeln!(out, "{thin}");
    let width = result.topics.iter().map(String::len).max().unwrap_or(5).max(5);
    let mut header = format!("{:<width$}", "topic");
    for year in &result.years {
        let _ = write!(header, " {year:>6}");
    }
    let _ = writeln!(out, "{header}");
    for topic in &result.topics {
        let mut row = format!("{topic:<width$}");
        for &year in &result.years {
            let count = result.bucket(topic, year).map_or(0, |b| b.video_count);
            let _ = write!(row, " {count:>6}");
        }
        let _ = writeln!(out, "{row}");
    }

    let _ = writeln!(out, "\nAVERAGE / MEDIAN VIEWS PER TOPIC PER YEAR");
    let _ = writeln!(out, "{thin}");
    for bucket in &result.buckets {
        let mean = bucket.mean_views.map_or_else(|| "n/a".to_string(), format_thousands);
        let median = bucket.median_views.map_or_else(|| "n/a".to_string(), format_thousands);
        let _ = writeln!(
            out,
            "  {:<width$} {}  mean {mean:>12}  median {median:>12}",
            bucket.topic, bucket.year
        );
    }

    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "For detailed visualizations, see the PNG files in this directory.");
    out
}
