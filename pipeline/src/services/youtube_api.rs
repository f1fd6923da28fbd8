use crate::config::{SEARCH_LANGUAGE, SEARCH_ORDER, SEARCH_TYPE};
use crate::error::{PipelineError, Result};
use crate::models::{SearchListResponse, VideoListResponse};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use url::Url;

pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Parameters of one `search.list` call.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    pub max_results: u32,
    pub published_after: DateTime<Utc>,
    pub published_before: Option<DateTime<Utc>>,
    pub page_token: Option<&'a str>,
}

/// The two Data API endpoints the collector talks to.
#[async_trait]
pub trait VideoApi: Send + Sync {
    async fn search_videos(&self, request: &SearchRequest<'_>) -> Result<SearchListResponse>;

    async fn get_video_details(&self, video_ids: &[String]) -> Result<VideoListResponse>;
}

pub struct YouTubeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self> {
        Self::with_base_url(api_key, timeout, YOUTUBE_API_BASE)
    }

    pub fn with_base_url(api_key: &str, timeout: Duration, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(YouTubeClient {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint_url(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{endpoint}", self.base_url))
            .map_err(|e| PipelineError::Config(format!("invalid API base URL {}: {e}", self.base_url)))?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = self.endpoint_url(endpoint, params)?;
        debug!("GET {endpoint} {params:?}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network_error(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(endpoint, status.as_u16(), &body));
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                PipelineError::Api {
                    endpoint,
                    status: status.as_u16(),
                    reason: Some("invalidResponse".to_string()),
                    message: e.to_string(),
                }
            } else {
                network_error(endpoint, e)
            }
        })
    }
}

fn network_error(endpoint: &'static str, e: reqwest::Error) -> PipelineError {
    PipelineError::Network {
        endpoint,
        message: e.to_string(),
    }
}

/// Builds an error from a failed response, keeping the platform's `reason`.
/// Error body: {"error": {"code": 403, "message": "...", "errors": [{"reason": "quotaExceeded"}]}}
fn api_error(endpoint: &'static str, status: u16, body: &str) -> PipelineError {
    let parsed: Value = serde_json::from_str(body).unwrap_or_default();
    let error = &parsed["error"];

    PipelineError::Api {
        endpoint,
        status,
        reason: error["errors"][0]["reason"].as_str().map(String::from),
        message: error["message"]
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| body.chars().take(200).collect()),
    }
}

fn rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl VideoApi for YouTubeClient {
    // Documentation: https://developers.google.com/youtube/v3/docs/search/list
    async fn search_videos(&self, request: &SearchRequest<'_>) -> Result<SearchListResponse> {
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("q", request.query.to_string()),
            ("type", SEARCH_TYPE.to_string()),
            ("maxResults", request.max_results.to_string()),
            ("order", SEARCH_ORDER.to_string()),
            ("relevanceLanguage", SEARCH_LANGUAGE.to_string()),
            ("publishedAfter", rfc3339(&request.published_after)),
        ];
        if let Some(before) = &request.published_before {
            params.push(("publishedBefore", rfc3339(before)));
        }
        if let Some(token) = request.page_token {
            params.push(("pageToken", token.to_string()));
        }

        self.get_json("search", &params).await
    }

    // Documentation: https://developers.google.com/youtube/v3/docs/videos/list
    async fn get_video_details(&self, video_ids: &[String]) -> Result<VideoListResponse> {
        let params = [
            ("part", "statistics,snippet,contentDetails".to_string()),
            ("id", video_ids.join(",")),
        ];

        self.get_json("videos", &params).await
    }
}
