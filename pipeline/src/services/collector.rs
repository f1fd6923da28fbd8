use crate::config::{PipelineConfig, Topic, API_MAX_RESULTS};
use crate::error::Result;
use crate::models::RawVideoRecord;
use crate::services::quota::{Endpoint, QuotaBudget};
use crate::services::youtube_api::{SearchRequest, VideoApi};
use crate::utils::{run_timestamp, write_atomically};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::time::sleep;

#[derive(Debug, Clone, Default)]
pub struct CollectionSummary {
    pub topics_completed: usize,
    pub topics_skipped: Vec<String>,
    pub topics_not_attempted: Vec<String>,
    pub quota_exhausted: bool,
    pub requests: u32,
    pub units_used: u32,
    pub units_remaining: u32,
    pub total_videos: usize,
    pub unique_videos: usize,
    pub output: Option<PathBuf>,
}

pub struct Collector<'a, A: VideoApi> {
    api: &'a A,
    config: &'a PipelineConfig,
    quota: QuotaBudget,
}

impl<'a, A: VideoApi> Collector<'a, A> {
    pub fn new(api: &'a A, config: &'a PipelineConfig) -> Self {
        Collector {
            api,
            config,
            quota: QuotaBudget::new(config.quota_budget),
        }
    }

    /// Charges the budget and sends the request, retrying transient failures
    /// with exponential backoff. Every attempt is charged.
    async fn request<T, F, Fut>(&mut self, endpoint: Endpoint, call: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            self.quota.charge(endpoint)?;
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_base_delay * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(
                        "{} request failed ({e}), retry {attempt}/{} in {:?}",
                        endpoint.name(),
                        self.config.max_retries,
                        delay
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn collect_topic(&mut self, topic: &Topic) -> Result<Vec<RawVideoRecord>> {
        info!("Collecting data for topic: {}", topic.name);

        let api = self.api;
        let max_pages = self.config.max_queries_per_topic;
        let max_results = self.config.max_results_per_query.clamp(1, API_MAX_RESULTS);
        let mut seen_video_ids: HashSet<String> = HashSet::new();
        let mut videos = Vec::new();

        for query in topic.queries {
            let mut next_page_token: Option<String> = None;

            for page in 1..=max_pages {
                info!("  Query '{query}' page {page}/{max_pages}...");

                let request = SearchRequest {
                    query,
                    max_results,
                    published_after: self.config.published_after,
                    published_before: self.config.published_before,
                    page_token: next_page_token.as_deref(),
                };
                let search_response = self
                    .request(Endpoint::Search, || api.search_videos(&request))
                    .await?;

                let new_video_ids: Vec<String> = search_response
                    .video_ids()
                    .into_iter()
                    .filter(|id| !seen_video_ids.contains(id))
                    .collect();
                if new_video_ids.is_empty() {
                    info!("  No new videos found on page {page}");
                    break;
                }
                seen_video_ids.extend(new_video_ids.iter().cloned());

                info!("  Fetching details for {} videos...", new_video_ids.len());
                let collected_at = Utc::now().to_rfc3339();
                for batch in new_video_ids.chunks(API_MAX_RESULTS as usize) {
                    let details = self
                        .request(Endpoint::Videos, || api.get_video_details(batch))
                        .await?;
                    videos.extend(details.items.into_iter().map(|item| {
                        RawVideoRecord::from_item(item, topic.name, query, &collected_at)
                    }));
                }

                next_page_token = search_response.next_page_token;
                if next_page_token.is_none() {
                    info!("  No more pages available for '{query}'");
                    break;
                }

                sleep(self.config.page_delay).await;
            }
        }

        info!(
            "  Collected {} unique videos for topic: {}",
            videos.len(),
            topic.name
        );
        Ok(videos)
    }

    /// Collects every configured topic. A failing topic is skipped; running out
    /// of quota stops the run and leaves the remaining topics unattempted.
    pub async fn collect_all(&mut self) -> (Vec<RawVideoRecord>, CollectionSummary) {
        let mut all_videos = Vec::new();
        let mut summary = CollectionSummary::default();
        let config = self.config;
        let topics = &config.topics;

        for (index, topic) in topics.iter().enumerate() {
            if index > 0 {
                sleep(config.topic_delay).await;
            }

            match self.collect_topic(topic).await {
                Ok(videos) => {
                    all_videos.extend(videos);
                    summary.topics_completed += 1;
                }
                Err(e) if e.is_quota_exhausted() => {
                    warn!(
                        "Quota exhausted while collecting '{}': {e}. {}/{} topic(s) completed.",
                        topic.name,
                        summary.topics_completed,
                        topics.len()
                    );
                    summary.quota_exhausted = true;
                    summary.topics_not_attempted = topics[index..]
                        .iter()
                        .map(|t| t.name.to_string())
                        .collect();
                    break;
                }
                Err(e) => {
                    error!("Error collecting data for topic '{}', skipping: {e}", topic.name);
                    summary.topics_skipped.push(topic.name.to_string());
                }
            }
        }

        summary.requests = self.quota.requests();
        summary.units_used = self.quota.used();
        summary.units_remaining = self.quota.remaining();
        summary.total_videos = all_videos.len();
        summary.unique_videos = all_videos
            .iter()
            .map(|v| v.video_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        (all_videos, summary)
    }
}

/// Raw output file name; runs cut short by quota are marked partial.
pub fn raw_file_name(now: DateTime<Utc>, partial: bool) -> String {
    let suffix = if partial { "_partial" } else { "" };
    format!("youtube_data_{}{suffix}.json", run_timestamp(now))
}

pub fn save_raw_data(
    videos: &[RawVideoRecord],
    dir: &Path,
    now: DateTime<Utc>,
    partial: bool,
) -> Result<PathBuf> {
    let path = dir.join(raw_file_name(now, partial));
    let json = serde_json::to_vec_pretty(videos)?;
    write_atomically(&path, &json)?;
    info!("Data saved to: {}", path.display());
    Ok(path)
}

pub async fn run_collection<A: VideoApi>(
    api: &A,
    config: &PipelineConfig,
) -> Result<CollectionSummary> {
    let mut collector = Collector::new(api, config);
    let (videos, mut summary) = collector.collect_all().await;

    if videos.is_empty() {
        warn!("No videos collected, nothing written");
    } else {
        let partial = summary.quota_exhausted;
        let path = save_raw_data(&videos, &config.raw_data_dir, Utc::now(), partial)?;
        summary.output = Some(path);
    }

    Ok(summary)
}
