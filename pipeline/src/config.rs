use crate::error::{PipelineError, Result};
use chrono::{DateTime, Datelike, Utc};
use env_logger::Builder;
use lazy_static::lazy_static;
use log::{info, LevelFilter};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Hard limit of the search and videos endpoints.
pub const API_MAX_RESULTS: u32 = 50;

pub const SEARCH_LANGUAGE: &str = "en";
pub const SEARCH_ORDER: &str = "relevance";
pub const SEARCH_TYPE: &str = "video";

/// A configured IT subject and the queries issued for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub name: &'static str,
    pub queries: &'static [&'static str],
}

pub static IT_TOPICS: &[Topic] = &[
    Topic {
        name: "cybersecurity",
        queries: &["cybersecurity tutorial"],
    },
    Topic {
        name: "machine learning",
        queries: &["machine learning tutorial"],
    },
    Topic {
        name: "cloud computing",
        queries: &["cloud computing tutorial"],
    },
    Topic {
        name: "python programming",
        queries: &["python programming tutorial"],
    },
    Topic {
        name: "web development",
        queries: &["web development tutorial"],
    },
    Topic {
        name: "data science",
        queries: &["data science tutorial"],
    },
];

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

lazy_static! {
    pub static ref YOUTUBE_API_KEY: Option<String> = env::var("YOUTUBE_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty());
    pub static ref RAW_DATA_DIR: String =
        env::var("RAW_DATA_DIR").unwrap_or_else(|_| "data/raw".to_string());
    pub static ref PROCESSED_DATA_DIR: String =
        env::var("PROCESSED_DATA_DIR").unwrap_or_else(|_| "data/processed".to_string());
    pub static ref RESULTS_DIR: String =
        env::var("RESULTS_DIR").unwrap_or_else(|_| "results".to_string());
    pub static ref MAX_RESULTS_PER_QUERY: u32 = env_or("MAX_RESULTS_PER_QUERY", API_MAX_RESULTS);
    pub static ref MAX_QUERIES_PER_TOPIC: u32 = env_or("MAX_QUERIES_PER_TOPIC", 10);
    pub static ref PUBLISHED_AFTER: String =
        env::var("PUBLISHED_AFTER").unwrap_or_else(|_| "2019-01-01T00:00:00Z".to_string());
    pub static ref PUBLISHED_BEFORE: Option<String> = env::var("PUBLISHED_BEFORE")
        .ok()
        .filter(|v| !v.trim().is_empty());
    pub static ref DAILY_QUOTA_BUDGET: u32 = env_or("DAILY_QUOTA_BUDGET", 10_000);
    pub static ref MAX_RETRIES: u32 = env_or("MAX_RETRIES", 3);
    pub static ref REQUEST_TIMEOUT_SECS: u64 = env_or("REQUEST_TIMEOUT_SECS", 30);
}

pub fn init_logger() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}

/// Everything a stage needs to know, resolved once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_key: Option<String>,
    pub topics: Vec<Topic>,
    pub raw_data_dir: PathBuf,
    pub processed_data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub max_results_per_query: u32,
    pub max_queries_per_topic: u32,
    pub published_after: DateTime<Utc>,
    pub published_before: Option<DateTime<Utc>>,
    pub quota_budget: u32,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub page_delay: Duration,
    pub topic_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            api_key: None,
            topics: IT_TOPICS.to_vec(),
            raw_data_dir: PathBuf::from("data/raw"),
            processed_data_dir: PathBuf::from("data/processed"),
            results_dir: PathBuf::from("results"),
            max_results_per_query: API_MAX_RESULTS,
            max_queries_per_topic: 10,
            published_after: DateTime::parse_from_rfc3339("2019-01-01T00:00:00Z")
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_default(),
            published_before: None,
            quota_budget: 10_000,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            page_delay: Duration::from_millis(100),
            topic_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn parse_window_bound(key: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            PipelineError::Config(format!("{key}={value:?} is not an RFC 3339 timestamp: {e}"))
        })
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        let published_after = parse_window_bound("PUBLISHED_AFTER", &PUBLISHED_AFTER)?;
        let published_before = PUBLISHED_BEFORE
            .as_deref()
            .map(|v| parse_window_bound("PUBLISHED_BEFORE", v))
            .transpose()?;

        if let Some(before) = published_before {
            if before <= published_after {
                return Err(PipelineError::Config(format!(
                    "PUBLISHED_BEFORE ({before}) must be later than PUBLISHED_AFTER ({published_after})"
                )));
            }
        }

        let config = PipelineConfig {
            api_key: YOUTUBE_API_KEY.clone(),
            raw_data_dir: PathBuf::from(&*RAW_DATA_DIR),
            processed_data_dir: PathBuf::from(&*PROCESSED_DATA_DIR),
            results_dir: PathBuf::from(&*RESULTS_DIR),
            max_results_per_query: (*MAX_RESULTS_PER_QUERY).clamp(1, API_MAX_RESULTS),
            max_queries_per_topic: *MAX_QUERIES_PER_TOPIC,
            published_after,
            published_before,
            quota_budget: *DAILY_QUOTA_BUDGET,
            max_retries: *MAX_RETRIES,
            request_timeout: Duration::from_secs(*REQUEST_TIMEOUT_SECS),
            ..PipelineConfig::default()
        };

        info!(
            "Configuration: {} topic(s), window from {}, quota budget {} unit(s)",
            config.topics.len(),
            config.published_after.format("%Y-%m-%d"),
            config.quota_budget
        );
        Ok(config)
    }

    /// The API key, or a fatal configuration error when it is missing.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            PipelineError::Config(
                "YOUTUBE_API_KEY environment variable must be set (e.g. in a .env file)".to_string(),
            )
        })
    }

    /// Earliest publication year kept by the cleaner.
    pub fn window_start_year(&self) -> i32 {
        self.published_after.year()
    }

    /// Maps a stored topic label onto a configured topic name.
    ///
    /// Older raw files carry the full search phrase ("cybersecurity tutorial"),
    /// so a trailing " tutorial" is ignored.
    pub fn resolve_topic(&self, label: &str) -> Option<&'static str> {
        let label = label.trim();
        let lowered = label.to_lowercase();
        let base = lowered
            .strip_suffix(" tutorial")
            .unwrap_or(&lowered)
            .trim();

        self.topics
            .iter()
            .find(|t| {
                t.name.eq_ignore_ascii_case(base)
                    || t.queries.iter().any(|q| q.eq_ignore_ascii_case(label))
            })
            .map(|t| t.name)
    }

    pub fn topic_names(&self) -> Vec<&'static str> {
        self.topics.iter().map(|t| t.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_configured_and_legacy_topic_labels() {
        let config = PipelineConfig::default();
        assert_eq!(config.resolve_topic("cybersecurity"), Some("cybersecurity"));
        assert_eq!(
            config.resolve_topic("Machine Learning tutorial"),
            Some("machine learning")
        );
        assert_eq!(config.resolve_topic(" data science "), Some("data science"));
        assert_eq!(config.resolve_topic("cooking"), None);
        assert_eq!(config.resolve_topic(""), None);
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let config = PipelineConfig::default();
        let err = config.require_api_key().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(err.to_string().contains("YOUTUBE_API_KEY"));
    }

    #[test]
    fn default_window_starts_in_2019() {
        assert_eq!(PipelineConfig::default().window_start_year(), 2019);
    }

    #[test]
    fn rejects_malformed_window_bound() {
        assert!(parse_window_bound("PUBLISHED_AFTER", "last year").is_err());
        assert!(parse_window_bound("PUBLISHED_AFTER", "2020-06-01T00:00:00Z").is_ok());
    }
}
