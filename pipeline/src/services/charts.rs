use crate::models::{AnalysisResult, TopicYearStats};
use log::{info, warn};
use plotters::prelude::*;
use std::error::Error;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

type ChartResult = Result<(), Box<dyn Error>>;
type ChartFn = fn(&Path, &AnalysisResult) -> ChartResult;

const CHART_SIZE: (u32, u32) = (1400, 800);
const STEEL_BLUE: RGBColor = RGBColor(70, 130, 180);

/// Year axis padded by one year on each side so single-year data still has width.
fn padded_years(years: &[i32]) -> Range<i32> {
    match (years.first(), years.last()) {
        (Some(&first), Some(&last)) => (first - 1)..(last + 1),
        _ => 0..1,
    }
}

fn y_ceiling(max: f64) -> f64 {
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

/// Yellow-orange-red scale for `t` in [0, 1].
pub fn heat_color(t: f64) -> RGBColor {
    const LOW: (u8, u8, u8) = (255, 255, 204);
    const MID: (u8, u8, u8) = (253, 141, 60);
    const HIGH: (u8, u8, u8) = (189, 0, 38);

    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let (from, to, local) = if t < 0.5 {
        (LOW, MID, t * 2.0)
    } else {
        (MID, HIGH, (t - 0.5) * 2.0)
    };
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * local).round() as u8;
    RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
}

/// Splits a year series into runs of defined points. `None` ends a run.
fn split_at_gaps(points: impl IntoIterator<Item = (i32, Option<f64>)>) -> Vec<Vec<(i32, f64)>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for (year, value) in points {
        match value {
            Some(v) => current.push((year, v)),
            None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// One line per topic over the year axis. Undefined buckets break the line.
fn line_chart(
    path: &Path,
    title: &str,
    y_desc: &str,
    result: &AnalysisResult,
    metric: impl Fn(&TopicYearStats) -> Option<f64>,
) -> ChartResult {
    let series: Vec<(&str, Vec<Vec<(i32, f64)>>)> = result
        .topics
        .iter()
        .map(|topic| {
            let segments = split_at_gaps(
                result
                    .buckets
                    .iter()
                    .filter(|b| &b.topic == topic)
                    .map(|b| (b.year, metric(b))),
            );
            (topic.as_str(), segments)
        })
        .collect();
    let max = series
        .iter()
        .flat_map(|(_, segments)| segments.iter().flatten().map(|p| p.1))
        .fold(0.0, f64::max);

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(padded_years(&result.years), 0f64..y_ceiling(max))?;

    chart
        .configure_mesh()
        .x_desc("Year")
        .y_desc(y_desc)
        .x_labels(result.years.len() + 2)
        .draw()?;

    for (idx, (topic, segments)) in series.into_iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        for (n, segment) in segments.into_iter().enumerate() {
            let line = chart.draw_series(LineSeries::new(segment.clone(), color.stroke_width(2)))?;
            if n == 0 {
                line.label(topic).legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
            }
            chart.draw_series(segment.into_iter().map(|p| Circle::new(p, 4, color.filled())))?;
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn publication_trends(path: &Path, result: &AnalysisResult) -> ChartResult {
    line_chart(
        path,
        "IT Tutorial Videos Published per Topic Over Time",
        "Number of Videos Published",
        result,
        |b| Some(b.video_count as f64),
    )
}

fn engagement_views(path: &Path, result: &AnalysisResult) -> ChartResult {
    line_chart(
        path,
        "Average Views per Topic Over Time",
        "Average View Count",
        result,
        |b| b.mean_views,
    )
}

fn engagement_likes(path: &Path, result: &AnalysisResult) -> ChartResult {
    line_chart(
        path,
        "Average Likes per Topic Over Time",
        "Average Like Count",
        result,
        |b| b.mean_likes,
    )
}

fn engagement_ratio(path: &Path, result: &AnalysisResult) -> ChartResult {
    line_chart(
        path,
        "Engagement Ratio per Topic Over Time",
        "(Likes + Comments) / Views",
        result,
        |b| b.mean_engagement_ratio,
    )
}

fn publication_heatmap(path: &Path, result: &AnalysisResult) -> ChartResult {
    let topics = &result.topics;
    let (Some(&first), Some(&last)) = (result.years.first(), result.years.last()) else {
        return Ok(());
    };
    let max = result
        .buckets
        .iter()
        .map(|b| b.video_count)
        .max()
        .unwrap_or(0)
        .max(1) as f64;

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Heatmap: Videos Published by Topic and Year", ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(180)
        .build_cartesian_2d(first..last + 1, 0..topics.len() as i32)?;

    let topic_label = |row: &i32| {
        usize::try_from(*row)
            .ok()
            .and_then(|i| topics.get(i))
            .cloned()
            .unwrap_or_default()
    };
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Year")
        .y_desc("Topic")
        .x_labels(result.years.len() + 1)
        .y_labels(topics.len() + 1)
        .y_label_formatter(&topic_label)
        .draw()?;

    let cells: Vec<(i32, i32, usize)> = result
        .buckets
        .iter()
        .filter_map(|b| {
            let row = topics.iter().position(|t| *t == b.topic)?;
            Some((b.year, row as i32, b.video_count))
        })
        .collect();

    chart.draw_series(cells.iter().map(|&(year, row, count)| {
        Rectangle::new(
            [(year, row), (year + 1, row + 1)],
            heat_color(count as f64 / max).filled(),
        )
    }))?;
    chart.draw_series(cells.iter().map(|&(year, row, count)| {
        Text::new(count.to_string(), (year, row + 1), ("sans-serif", 18).into_font())
    }))?;

    root.present()?;
    Ok(())
}

fn yearly_total(path: &Path, result: &AnalysisResult) -> ChartResult {
    let (Some(&first), Some(&last)) = (result.years.first(), result.years.last()) else {
        return Ok(());
    };
    let max = result
        .yearly_totals
        .iter()
        .map(|&(_, count)| count)
        .max()
        .unwrap_or(0);
    let y_max = ((max as f64 * 1.15).ceil() as u32).max(1);

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Total IT Tutorial Videos Published per Year", ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d((first..last + 1).into_segmented(), 0u32..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Year")
        .y_desc("Total Videos")
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(STEEL_BLUE.mix(0.7).filled())
            .margin(10)
            .data(result.yearly_totals.iter().map(|&(year, count)| (year, count as u32))),
    )?;
    chart.draw_series(result.yearly_totals.iter().map(|&(year, count)| {
        Text::new(
            count.to_string(),
            (SegmentValue::CenterOf(year), count as u32),
            ("sans-serif", 16).into_font(),
        )
    }))?;

    root.present()?;
    Ok(())
}

/// Renders every chart into `dir`. A chart that fails is logged and skipped.
pub fn render_all(result: &AnalysisResult, dir: &Path) -> Vec<PathBuf> {
    if result.years.is_empty() {
        warn!("No publication years to chart");
        return Vec::new();
    }
    if let Err(e) = fs::create_dir_all(dir) {
        warn!("Cannot create results directory {}: {e}", dir.display());
        return Vec::new();
    }

    let charts: [(&str, ChartFn); 6] = [
        ("publication_trends.png", publication_trends as ChartFn),
        ("engagement_views.png", engagement_views as ChartFn),
        ("engagement_likes.png", engagement_likes as ChartFn),
        ("engagement_ratio.png", engagement_ratio as ChartFn),
        ("publication_heatmap.png", publication_heatmap as ChartFn),
        ("yearly_total.png", yearly_total as ChartFn),
    ];

    let mut rendered = Vec::new();
    for (name, draw) in charts {
        let path = dir.join(name);
        match draw(&path, result) {
            Ok(()) => {
                info!("Saved: {}", path.display());
                rendered.push(path);
            }
            Err(e) => warn!("Failed to render {}: {e}", path.display()),
        }
    }
    rendered
}
