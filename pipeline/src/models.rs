use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Documentation: https://developers.google.com/youtube/v3/docs/search/list
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchListResponse {
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub items: Vec<SearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub id: SearchResultId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultId {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub video_id: Option<String>,
}

impl SearchListResponse {
    /// Video IDs of the page, skipping channels and playlists.
    pub fn video_ids(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| item.id.kind == "youtube#video")
            .filter_map(|item| item.id.video_id.clone())
            .collect()
    }
}

// Documentation: https://developers.google.com/youtube/v3/docs/videos
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: String,
    #[serde(default)]
    pub snippet: VideoSnippet,
    #[serde(default)]
    pub statistics: VideoStatistics,
    #[serde(default)]
    pub content_details: ContentDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoSnippet {
    pub title: String,
    pub description: String,
    pub published_at: String,
    pub channel_id: String,
    pub channel_title: String,
    pub tags: Vec<String>,
    pub category_id: String,
}

/// Counters arrive as decimal strings and are absent when hidden by the uploader.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoStatistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContentDetails {
    pub duration: String,
}

/// One collected video as persisted in the raw-data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVideoRecord {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub published_at: String,
    pub channel_id: String,
    pub channel_title: String,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub duration: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub topic: String,
    pub query: String,
    pub collected_at: String,
}

fn parse_counter(value: &Option<String>) -> Option<u64> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}

impl RawVideoRecord {
    pub fn from_item(item: VideoItem, topic: &str, query: &str, collected_at: &str) -> Self {
        RawVideoRecord {
            view_count: parse_counter(&item.statistics.view_count),
            like_count: parse_counter(&item.statistics.like_count),
            comment_count: parse_counter(&item.statistics.comment_count),
            video_id: item.id,
            title: item.snippet.title,
            description: item.snippet.description,
            published_at: item.snippet.published_at,
            channel_id: item.snippet.channel_id,
            channel_title: item.snippet.channel_title,
            duration: item.content_details.duration,
            tags: item.snippet.tags,
            category_id: item.snippet.category_id,
            topic: topic.to_string(),
            query: query.to_string(),
            collected_at: collected_at.to_string(),
        }
    }
}

/// Column order of the cleaned table.
pub const CLEANED_CSV_HEADER: &[&str] = &[
    "video_id",
    "title",
    "description",
    "channel_id",
    "channel_title",
    "published_at",
    "publication_year",
    "publication_month",
    "duration_seconds",
    "view_count",
    "like_count",
    "comment_count",
    "years_since_publication",
    "avg_views_per_year",
    "engagement_rate",
    "engagement_ratio",
    "topic",
    "tags",
];

/// One row of the cleaned table. Field order matches [`CLEANED_CSV_HEADER`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedVideoRecord {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: DateTime<Utc>,
    pub publication_year: i32,
    pub publication_month: u32,
    pub duration_seconds: i64,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub years_since_publication: i32,
    pub avg_views_per_year: f64,
    pub engagement_rate: f64,
    /// `None` when the video has no views.
    pub engagement_ratio: Option<f64>,
    pub topic: String,
    /// Tags joined with `|`.
    pub tags: String,
}

/// Metrics for one topic in one year. Means are `None` for empty buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicYearStats {
    pub topic: String,
    pub year: i32,
    pub video_count: usize,
    pub mean_views: Option<f64>,
    pub median_views: Option<f64>,
    pub mean_likes: Option<f64>,
    pub mean_views_per_year: Option<f64>,
    pub mean_engagement_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRate {
    pub topic: String,
    pub year: i32,
    pub video_count_growth_pct: f64,
    pub avg_views_growth_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub topic: String,
    pub video_count: usize,
    pub mean_views: Option<f64>,
    pub mean_engagement_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub total_videos: usize,
    pub topics: Vec<String>,
    pub years: Vec<i32>,
    pub buckets: Vec<TopicYearStats>,
    pub yearly_totals: Vec<(i32, usize)>,
    pub topic_totals: Vec<TopicSummary>,
    pub growth: Vec<GrowthRate>,
}

impl AnalysisResult {
    pub fn bucket(&self, topic: &str, year: i32) -> Option<&TopicYearStats> {
        self.buckets
            .iter()
            .find(|b| b.topic == topic && b.year == year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_page_keeps_only_videos() {
        let page: SearchListResponse = serde_json::from_str(
            r#"{
                "nextPageToken": "CDIQAA",
                "items": [
                    {"id": {"kind": "youtube#video", "videoId": "abc"}},
                    {"id": {"kind": "youtube#channel", "channelId": "UC1"}},
                    {"id": {"kind": "youtube#video", "videoId": "def"}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("CDIQAA"));
        assert_eq!(page.video_ids(), vec!["abc", "def"]);
    }

    #[test]
    fn raw_record_from_video_item_parses_counters() {
        let item: VideoItem = serde_json::from_str(
            r#"{
                "id": "abc",
                "snippet": {
                    "title": "Intro to Rust",
                    "publishedAt": "2022-03-01T10:00:00Z",
                    "channelId": "UC1",
                    "channelTitle": "Chan",
                    "tags": ["rust"]
                },
                "statistics": {"viewCount": "1200", "commentCount": "x"},
                "contentDetails": {"duration": "PT10M"}
            }"#,
        )
        .unwrap();
        let record = RawVideoRecord::from_item(item, "python programming", "python programming tutorial", "now");
        assert_eq!(record.video_id, "abc");
        assert_eq!(record.view_count, Some(1200));
        assert_eq!(record.like_count, None);
        assert_eq!(record.comment_count, None);
        assert_eq!(record.duration, "PT10M");
        assert_eq!(record.topic, "python programming");
        assert_eq!(record.description, "");
    }
}
