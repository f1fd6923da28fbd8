use crate::error::Result;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Parse an ISO 8601 timestamp ("2021-04-05T12:00:00Z") into UTC.
pub fn parse_iso8601_timestamp(date_str: &str) -> Option<DateTime<Utc>> {
    let date_str = date_str.trim();
    if date_str.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc3339(date_str)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Parse an ISO 8601 duration (P1DT2H3M4S) to total seconds. Invalid input yields 0.
pub fn parse_iso8601_duration_to_seconds(duration_str: &str) -> i64 {
    let Some(body) = duration_str.trim().strip_prefix('P') else {
        return 0;
    };

    let mut total_seconds = 0.0;
    let mut current_number = String::new();
    let mut in_time = false;

    for ch in body.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            current_number.push(ch);
            continue;
        }
        if ch == 'T' {
            in_time = true;
            current_number.clear();
            continue;
        }
        let Ok(num) = current_number.parse::<f64>() else {
            return 0;
        };
        total_seconds += match (ch, in_time) {
            ('W', false) => num * 604_800.0,
            ('D', false) => num * 86_400.0,
            ('H', true) => num * 3600.0,
            ('M', true) => num * 60.0,
            ('S', true) => num,
            _ => return 0,
        };
        current_number.clear();
    }

    if !current_number.is_empty() {
        return 0;
    }
    total_seconds as i64
}

/// Timestamp used in output file names.
pub fn run_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Files in `dir` with the given extension, sorted by file name.
/// A missing directory yields an empty list.
pub fn list_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Most recently modified file with the given extension. Ties go to the later name.
pub fn latest_file_with_extension(dir: &Path, extension: &str) -> Result<Option<PathBuf>> {
    let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;
    for path in list_files_with_extension(dir, extension)? {
        let modified = fs::metadata(&path)?.modified()?;
        if latest.as_ref().map_or(true, |(t, _)| modified >= *t) {
            latest = Some((modified, path));
        }
    }
    Ok(latest.map(|(_, path)| path))
}

/// Write `contents` next to `path` and rename it into place once complete.
pub fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    #[test]
    fn parses_durations() {
        assert_eq!(parse_iso8601_duration_to_seconds("PT1H2M3S"), 3723);
        assert_eq!(parse_iso8601_duration_to_seconds("PT15M"), 900);
        assert_eq!(parse_iso8601_duration_to_seconds("P1DT1S"), 86_401);
        assert_eq!(parse_iso8601_duration_to_seconds("P0D"), 0);
        assert_eq!(parse_iso8601_duration_to_seconds(""), 0);
        assert_eq!(parse_iso8601_duration_to_seconds("1H"), 0);
        assert_eq!(parse_iso8601_duration_to_seconds("PT5X"), 0);
        assert_eq!(parse_iso8601_duration_to_seconds("PT12"), 0);
    }

    #[test]
    fn parses_timestamps_with_offsets() {
        let dt = parse_iso8601_timestamp("2021-12-31T23:30:00-02:00").unwrap();
        assert_eq!(dt.year(), 2022);
        assert!(parse_iso8601_timestamp("2021-13-01").is_none());
        assert!(parse_iso8601_timestamp("  ").is_none());
    }

    #[test]
    fn formats_run_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        assert_eq!(run_timestamp(now), "20240203_040506");
    }

    #[test]
    fn mean_and_median() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
        assert_eq!(median(&[5.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(round2(1.23456), 1.23);
    }

    #[test]
    fn lists_files_in_name_order_and_tolerates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_files_with_extension(&dir.path().join("nope"), "json")
            .unwrap()
            .is_empty());

        write_atomically(&dir.path().join("b.json"), b"[]").unwrap();
        write_atomically(&dir.path().join("a.json"), b"[]").unwrap();
        write_atomically(&dir.path().join("notes.txt"), b"x").unwrap();

        let files = list_files_with_extension(dir.path(), "json").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
        assert!(!dir.path().join("a.json.tmp").exists());
        assert!(latest_file_with_extension(dir.path(), "txt").unwrap().is_some());
    }
}
