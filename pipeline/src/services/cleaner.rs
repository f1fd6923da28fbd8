use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::models::{CleanedVideoRecord, CLEANED_CSV_HEADER};
use crate::utils::{
    list_files_with_extension, parse_iso8601_duration_to_seconds, parse_iso8601_timestamp,
    round2, run_timestamp, write_atomically,
};
use chrono::{DateTime, Datelike, Utc};
use csv::WriterBuilder;
use log::{info, warn};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Placeholder for missing free-text fields.
const UNKNOWN: &str = "Unknown";

/// A raw record together with the file it came from.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub source: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub source: String,
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    pub loaded: usize,
    pub skipped: Vec<SkippedRecord>,
    pub duplicates_removed: usize,
    pub outside_window: usize,
    pub records: Vec<CleanedVideoRecord>,
}

#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Year used to compute `years_since_publication`.
    pub reference_year: i32,
    /// Records published before this year are dropped.
    pub min_year: Option<i32>,
}

impl CleanOptions {
    pub fn for_run(config: &PipelineConfig, now: DateTime<Utc>) -> Self {
        CleanOptions {
            reference_year: now.year(),
            min_year: Some(config.window_start_year()),
        }
    }
}

/// Loads every `*.json` file of the raw-data directory, in file-name order.
/// A file holding an array contributes each element, any other value is one record.
pub fn load_raw_data(dir: &Path) -> Result<Vec<RawEntry>> {
    let files = list_files_with_extension(dir, "json")?;
    if files.is_empty() {
        return Err(PipelineError::NoInputFiles(dir.to_path_buf()));
    }

    info!("Found {} data file(s)", files.len());
    let mut entries = Vec::new();
    for path in files {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        info!("  Loading: {source}");

        let parsed = fs::read(&path)
            .map_err(PipelineError::from)
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).map_err(PipelineError::from));
        match parsed {
            Ok(Value::Array(items)) => entries.extend(items.into_iter().map(|value| RawEntry {
                source: source.clone(),
                value,
            })),
            Ok(value) => entries.push(RawEntry { source, value }),
            Err(e) => warn!("  Error loading {}: {e}", path.display()),
        }
    }

    info!("Total records loaded: {}", entries.len());
    Ok(entries)
}

/// Numbers, numeric strings or nothing; anything unusable counts as 0.
fn coerce_count(value: Option<&Value>) -> u64 {
    fn from_float(f: f64) -> Option<u64> {
        (f.is_finite() && f >= 0.0).then_some(f as u64)
    }

    let count = match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().and_then(from_float)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(from_float))
        }
        _ => None,
    };
    count.unwrap_or(0)
}

fn text_field(record: &Map<String, Value>, key: &str) -> Option<String> {
    match record.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn tags_field(record: &Map<String, Value>) -> String {
    match record.get("tags") {
        Some(Value::Array(tags)) => tags
            .iter()
            .filter_map(Value::as_str)
            .map(|t| t.replace('|', "/"))
            .collect::<Vec<_>>()
            .join("|"),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

/// Turns one raw record into a cleaned row, or explains why it is malformed.
pub fn clean_record(
    value: &Value,
    config: &PipelineConfig,
    reference_year: i32,
) -> std::result::Result<CleanedVideoRecord, String> {
    let record = value
        .as_object()
        .ok_or_else(|| "record is not a JSON object".to_string())?;

    let video_id = text_field(record, "video_id")
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| "missing video_id".to_string())?;

    let published_raw = text_field(record, "published_at").unwrap_or_default();
    let published_at = parse_iso8601_timestamp(&published_raw)
        .ok_or_else(|| format!("video {video_id}: invalid published_at {published_raw:?}"))?;

    let topic_label = text_field(record, "topic").unwrap_or_default();
    let topic = config
        .resolve_topic(&topic_label)
        .ok_or_else(|| format!("video {video_id}: unknown topic {topic_label:?}"))?;

    let view_count = coerce_count(record.get("view_count"));
    let like_count = coerce_count(record.get("like_count"));
    let comment_count = coerce_count(record.get("comment_count"));

    let publication_year = published_at.year();
    let years_since_publication = (reference_year - publication_year + 1).max(1);
    let engagement_ratio = (view_count > 0).then(|| {
        let ratio = like_count.saturating_add(comment_count) as f64 / view_count as f64;
        (ratio * 10_000.0).round() / 10_000.0
    });

    Ok(CleanedVideoRecord {
        title: text_field(record, "title").unwrap_or_else(|| UNKNOWN.to_string()),
        description: text_field(record, "description").unwrap_or_else(|| UNKNOWN.to_string()),
        channel_id: text_field(record, "channel_id").unwrap_or_default(),
        channel_title: text_field(record, "channel_title").unwrap_or_else(|| UNKNOWN.to_string()),
        published_at,
        publication_year,
        publication_month: published_at.month(),
        duration_seconds: parse_iso8601_duration_to_seconds(
            &text_field(record, "duration").unwrap_or_default(),
        ),
        view_count,
        like_count,
        comment_count,
        years_since_publication,
        avg_views_per_year: round2(view_count as f64 / years_since_publication as f64),
        engagement_rate: round2(like_count as f64 / view_count.max(1) as f64 * 100.0),
        engagement_ratio,
        topic: topic.to_string(),
        tags: tags_field(record),
        video_id,
    })
}

pub fn clean_records(
    entries: &[RawEntry],
    config: &PipelineConfig,
    options: &CleanOptions,
) -> Result<CleanReport> {
    let mut report = CleanReport {
        loaded: entries.len(),
        ..CleanReport::default()
    };
    let mut seen_video_ids: HashSet<String> = HashSet::new();

    for (index, entry) in entries.iter().enumerate() {
        let record = match clean_record(&entry.value, config, options.reference_year) {
            Ok(record) => record,
            Err(reason) => {
                warn!("Skipping malformed record #{index} in {}: {reason}", entry.source);
                report.skipped.push(SkippedRecord {
                    source: entry.source.clone(),
                    index,
                    reason,
                });
                continue;
            }
        };

        if !seen_video_ids.insert(record.video_id.clone()) {
            report.duplicates_removed += 1;
            continue;
        }
        if options
            .min_year
            .is_some_and(|min_year| record.publication_year < min_year)
        {
            report.outside_window += 1;
            continue;
        }
        report.records.push(record);
    }

    if report.duplicates_removed > 0 {
        info!("Removed {} duplicate video(s)", report.duplicates_removed);
    }
    if report.outside_window > 0 {
        info!(
            "Dropped {} video(s) published before the collection window",
            report.outside_window
        );
    }
    if report.records.is_empty() {
        return Err(PipelineError::NoValidRecords(report.loaded));
    }
    Ok(report)
}

pub fn cleaned_to_csv(records: &[CleanedVideoRecord]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CLEANED_CSV_HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| PipelineError::Io(e.into_error()))
}

/// Writes the cleaned rows as CSV plus a JSON mirror. Returns both paths.
pub fn save_cleaned_data(
    records: &[CleanedVideoRecord],
    dir: &Path,
    now: DateTime<Utc>,
) -> Result<(PathBuf, PathBuf)> {
    let filename = format!("cleaned_youtube_data_{}", run_timestamp(now));

    let csv_path = dir.join(format!("{filename}.csv"));
    write_atomically(&csv_path, &cleaned_to_csv(records)?)?;
    info!("Cleaned data saved to CSV: {}", csv_path.display());

    let json_path = dir.join(format!("{filename}.json"));
    write_atomically(&json_path, &serde_json::to_vec_pretty(records)?)?;
    info!("Cleaned data saved to JSON: {}", json_path.display());

    Ok((csv_path, json_path))
}

#[derive(Debug, Clone)]
pub struct CleanSummary {
    pub loaded: usize,
    pub skipped: usize,
    pub duplicates_removed: usize,
    pub outside_window: usize,
    pub written: usize,
    pub per_topic: BTreeMap<String, usize>,
    pub per_year: BTreeMap<i32, usize>,
    pub csv_path: PathBuf,
}

pub fn run_cleaning(config: &PipelineConfig, now: DateTime<Utc>) -> Result<CleanSummary> {
    let entries = load_raw_data(&config.raw_data_dir)?;
    let report = clean_records(&entries, config, &CleanOptions::for_run(config, now))?;
    let (csv_path, _) = save_cleaned_data(&report.records, &config.processed_data_dir, now)?;

    let mut per_topic = BTreeMap::new();
    let mut per_year = BTreeMap::new();
    for record in &report.records {
        *per_topic.entry(record.topic.clone()).or_insert(0) += 1;
        *per_year.entry(record.publication_year).or_insert(0) += 1;
    }

    Ok(CleanSummary {
        loaded: report.loaded,
        skipped: report.skipped.len(),
        duplicates_removed: report.duplicates_removed,
        outside_window: report.outside_window,
        written: report.records.len(),
        per_topic,
        per_year,
        csv_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use log::{Level, LevelFilter, Log, Metadata, Record};
    use serde_json::json;
    use std::cell::RefCell;
    use std::sync::Once;

    thread_local! {
        static WARNINGS: RefCell<Vec<String>> = RefCell::new(Vec::new());
    }

    /// Keeps warnings per test thread so parallel tests don't see each other's.
    struct WarningCapture;

    impl Log for WarningCapture {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= Level::Warn
        }

        fn log(&self, record: &Record) {
            if self.enabled(record.metadata()) {
                WARNINGS.with(|w| w.borrow_mut().push(record.args().to_string()));
            }
        }

        fn flush(&self) {}
    }

    static CAPTURE: WarningCapture = WarningCapture;
    static INSTALL: Once = Once::new();

    fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
        INSTALL.call_once(|| {
            if log::set_logger(&CAPTURE).is_ok() {
                log::set_max_level(LevelFilter::Warn);
            }
        });
        WARNINGS.with(|w| w.borrow_mut().clear());
        let value = f();
        let warnings = WARNINGS.with(|w| w.borrow_mut().drain(..).collect());
        (value, warnings)
    }

    fn raw(video_id: &str, topic: &str, published_at: &str) -> Value {
        json!({
            "video_id": video_id,
            "title": format!("Video {video_id}"),
            "description": "",
            "published_at": published_at,
            "channel_id": "UC1",
            "channel_title": "Channel",
            "view_count": 1000,
            "like_count": 40,
            "comment_count": 10,
            "duration": "PT12M30S",
            "tags": ["a", "b"],
            "category_id": "27",
            "topic": topic,
            "query": format!("{topic} tutorial"),
            "collected_at": "2024-05-01T00:00:00Z"
        })
    }

    fn entries(values: Vec<Value>) -> Vec<RawEntry> {
        values
            .into_iter()
            .map(|value| RawEntry {
                source: "test.json".into(),
                value,
            })
            .collect()
    }

    fn options() -> CleanOptions {
        CleanOptions {
            reference_year: 2024,
            min_year: Some(2019),
        }
    }

    #[test]
    fn cleans_a_complete_record() {
        let config = PipelineConfig::default();
        let record = clean_record(&raw("abc", "cybersecurity", "2022-06-15T08:00:00Z"), &config, 2024).unwrap();

        assert_eq!(record.publication_year, 2022);
        assert_eq!(record.publication_month, 6);
        assert_eq!(record.duration_seconds, 750);
        assert_eq!(record.years_since_publication, 3);
        assert_eq!(record.avg_views_per_year, 333.33);
        assert_eq!(record.engagement_rate, 4.0);
        assert_eq!(record.engagement_ratio, Some(0.05));
        assert_eq!(record.tags, "a|b");
        assert_eq!(record.topic, "cybersecurity");
    }

    #[test]
    fn coerces_counts_to_documented_default() {
        let config = PipelineConfig::default();
        let mut value = raw("abc", "data science tutorial", "2023-01-01T00:00:00Z");
        value["view_count"] = json!("2500");
        value["like_count"] = json!(null);
        value["comment_count"] = json!("n/a");
        value.as_object_mut().unwrap().remove("title");

        let record = clean_record(&value, &config, 2024).unwrap();
        assert_eq!(record.view_count, 2500);
        assert_eq!(record.like_count, 0);
        assert_eq!(record.comment_count, 0);
        assert_eq!(record.title, "Unknown");
        assert_eq!(record.topic, "data science");
    }

    #[test]
    fn zero_views_leave_ratio_undefined() {
        let config = PipelineConfig::default();
        let mut value = raw("abc", "cybersecurity", "2023-01-01T00:00:00Z");
        value["view_count"] = json!(0);

        let record = clean_record(&value, &config, 2024).unwrap();
        assert_eq!(record.engagement_ratio, None);
        assert_eq!(record.engagement_rate, 4000.0);
    }

    #[test]
    fn one_malformed_record_among_valid_ones() {
        let config = PipelineConfig::default();
        let mut values: Vec<Value> = (0..5)
            .map(|i| raw(&format!("v{i}"), "web development", "2021-03-01T00:00:00Z"))
            .collect();
        values.insert(2, json!({"video_id": "broken", "published_at": "not a date", "topic": "web development"}));

        let (report, warnings) =
            capture_warnings(|| clean_records(&entries(values), &config, &options()));
        let report = report.unwrap();
        assert_eq!(report.records.len(), 5);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 2);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("#2"));
        assert!(warnings[0].contains("invalid published_at"));
    }

    #[test]
    fn oversized_counts_do_not_overflow() {
        let config = PipelineConfig::default();
        let value = json!({
            "video_id": "x",
            "published_at": "2022-01-01T00:00:00Z",
            "topic": "cybersecurity",
            "view_count": 10,
            "like_count": "1e30",
            "comment_count": 5
        });

        let record = clean_record(&value, &config, 2024).unwrap();
        assert_eq!(record.like_count, u64::MAX);
        assert_eq!(record.comment_count, 5);
        assert!(record.engagement_ratio.is_some_and(f64::is_finite));
    }

    #[test]
    fn drops_duplicate_ids_keeping_first() {
        let config = PipelineConfig::default();
        let values = vec![
            raw("a", "cybersecurity", "2021-03-01T00:00:00Z"),
            raw("b", "cloud computing", "2021-03-01T00:00:00Z"),
            raw("a", "machine learning", "2022-03-01T00:00:00Z"),
        ];

        let report = clean_records(&entries(values), &config, &options()).unwrap();
        assert_eq!(report.duplicates_removed, 1);
        let ids: HashSet<_> = report.records.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids.len(), report.records.len());
        let a = report.records.iter().find(|r| r.video_id == "a").unwrap();
        assert_eq!(a.topic, "cybersecurity");
    }

    #[test]
    fn every_row_has_a_configured_topic() {
        let config = PipelineConfig::default();
        let values = vec![
            raw("a", "cybersecurity", "2021-03-01T00:00:00Z"),
            raw("b", "cooking", "2021-03-01T00:00:00Z"),
            json!({"video_id": "c", "published_at": "2021-03-01T00:00:00Z"}),
            raw("d", "Python Programming tutorial", "2021-03-01T00:00:00Z"),
        ];

        let report = clean_records(&entries(values), &config, &options()).unwrap();
        let names = config.topic_names();
        assert_eq!(report.records.len(), 2);
        assert!(report.records.iter().all(|r| names.contains(&r.topic.as_str())));
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn filters_records_before_window() {
        let config = PipelineConfig::default();
        let values = vec![
            raw("old", "cybersecurity", "2015-03-01T00:00:00Z"),
            raw("new", "cybersecurity", "2020-03-01T00:00:00Z"),
        ];
        let report = clean_records(&entries(values), &config, &options()).unwrap();
        assert_eq!(report.outside_window, 1);
        assert!(report.skipped.is_empty());
        assert_eq!(report.records.len(), 1);
    }

    #[test]
    fn fails_when_nothing_valid_remains() {
        let config = PipelineConfig::default();
        let err = clean_records(&entries(vec![json!(42), json!("x")]), &config, &options()).unwrap_err();
        assert!(matches!(err, PipelineError::NoValidRecords(2)));
    }

    #[test]
    fn empty_or_missing_raw_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("raw");
        let err = load_raw_data(&missing).unwrap_err();
        assert!(matches!(err, PipelineError::NoInputFiles(_)));
        assert!(err.to_string().contains("no input files found"));

        fs::create_dir_all(&missing).unwrap();
        assert!(matches!(
            load_raw_data(&missing).unwrap_err(),
            PipelineError::NoInputFiles(_)
        ));
    }

    #[test]
    fn loads_arrays_objects_and_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let list = json!([raw("a", "cybersecurity", "2021-01-01T00:00:00Z"), raw("b", "cybersecurity", "2021-01-01T00:00:00Z")]);
        fs::write(dir.path().join("youtube_data_1.json"), list.to_string()).unwrap();
        fs::write(
            dir.path().join("youtube_data_2.json"),
            raw("c", "cybersecurity", "2021-01-01T00:00:00Z").to_string(),
        )
        .unwrap();
        fs::write(dir.path().join("youtube_data_3.json"), "{ truncated").unwrap();

        let entries = load_raw_data(dir.path()).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].source, "youtube_data_2.json");
    }

    #[test]
    fn run_cleaning_writes_csv_with_fixed_header() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            raw_data_dir: dir.path().join("raw"),
            processed_data_dir: dir.path().join("processed"),
            ..PipelineConfig::default()
        };
        fs::create_dir_all(&config.raw_data_dir).unwrap();
        let list = json!([
            raw("a", "cybersecurity", "2021-01-01T00:00:00Z"),
            raw("b", "cloud computing", "2022-01-01T00:00:00Z"),
            raw("a", "cybersecurity", "2021-01-01T00:00:00Z"),
        ]);
        fs::write(config.raw_data_dir.join("youtube_data_x.json"), list.to_string()).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let summary = run_cleaning(&config, now).unwrap();
        assert_eq!(summary.written, 2);
        assert_eq!(summary.duplicates_removed, 1);
        assert_eq!(summary.per_year.get(&2021), Some(&1));

        let csv_text = fs::read_to_string(&summary.csv_path).unwrap();
        let header = csv_text.lines().next().unwrap();
        assert_eq!(header, CLEANED_CSV_HEADER.join(","));

        let mut reader = csv::Reader::from_path(&summary.csv_path).unwrap();
        let rows: Vec<CleanedVideoRecord> = reader.deserialize().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].published_at, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        assert!(summary.csv_path.with_extension("json").exists());
    }
}
