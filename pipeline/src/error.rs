use std::path::PathBuf;
use thiserror::Error;

/// Error reasons the Data API reports when a caller is being throttled.
const RATE_LIMIT_REASONS: &[&str] = &["rateLimitExceeded", "userRateLimitExceeded"];

/// Error reasons the Data API reports once the daily quota is gone.
const QUOTA_REASONS: &[&str] = &["quotaExceeded", "dailyLimitExceeded"];

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request to {endpoint} failed: {message}")]
    Network {
        endpoint: &'static str,
        message: String,
    },

    #[error("{endpoint} returned HTTP {status}{}: {message}", reason_suffix(.reason))]
    Api {
        endpoint: &'static str,
        status: u16,
        reason: Option<String>,
        message: String,
    },

    #[error("quota budget exhausted: {needed} unit(s) needed, {remaining} remaining")]
    QuotaExhausted { needed: u32, remaining: u32 },

    #[error("no input files found in {}", .0.display())]
    NoInputFiles(PathBuf),

    #[error("no valid records remain after cleaning {0} raw record(s)")]
    NoValidRecords(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(" ({r})"))
        .unwrap_or_default()
}

impl PipelineError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Network { .. } => true,
            PipelineError::Api { status, reason, .. } => {
                *status == 429
                    || *status >= 500
                    || reason
                        .as_deref()
                        .is_some_and(|r| RATE_LIMIT_REASONS.contains(&r))
            }
            _ => false,
        }
    }

    /// Whether the run has to stop issuing requests altogether.
    pub fn is_quota_exhausted(&self) -> bool {
        match self {
            PipelineError::QuotaExhausted { .. } => true,
            PipelineError::Api {
                status: 403,
                reason: Some(reason),
                ..
            } => QUOTA_REASONS.contains(&reason.as_str()),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
