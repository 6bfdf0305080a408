use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// A post as returned by the forum listing, before any scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    pub id: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub num_comments: u64,
}

impl RawPost {
    /// Title and body joined the way the scorer reads them.
    pub fn text(&self) -> String {
        format!("{}\n{}", self.title, self.body).trim().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    #[serde(rename = "Very Negative")]
    VeryNegative,
    #[serde(rename = "Negative")]
    Negative,
    #[serde(rename = "Neutral")]
    Neutral,
    #[serde(rename = "Positive")]
    Positive,
    #[serde(rename = "Very Positive")]
    VeryPositive,
}

impl SentimentLabel {
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity <= -0.6 {
            Self::VeryNegative
        } else if polarity <= -0.15 {
            Self::Negative
        } else if polarity < 0.15 {
            Self::Neutral
        } else if polarity < 0.6 {
            Self::Positive
        } else {
            Self::VeryPositive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryNegative => "Very Negative",
            Self::Negative => "Negative",
            Self::Neutral => "Neutral",
            Self::Positive => "Positive",
            Self::VeryPositive => "Very Positive",
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, Self::VeryNegative | Self::Negative)
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive | Self::VeryPositive)
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored post. Only first occurrences of an id are ever analyzed, so
/// `is_duplicate` is false for every value the aggregator sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedPost {
    #[serde(flatten)]
    pub post: RawPost,
    pub sentiment: f64,
    pub sentiment_label: SentimentLabel,
    pub matched_topics: BTreeSet<String>,
    pub is_duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub topic: String,
    pub category: String,
    pub mention_count: u64,
    pub sentiment_sum: f64,
    pub sentiment_mean: f64,
    pub positive_count: u64,
    pub negative_count: u64,
    pub pct_positive: f64,
    pub pct_negative: f64,
    pub top_forum: String,
    pub sample_quote: String,
}

/// One bubble per topic: x is mean sentiment, y is the category lane, size is volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BubbleRow {
    pub topic: String,
    pub category: String,
    pub mention_count: u64,
    pub sentiment_mean: f64,
    pub y_position: u32,
    pub color_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandMention {
    pub brand: String,
    pub forum: String,
    pub post_id: String,
    pub sentiment_label: SentimentLabel,
    pub context_snippet: String,
    pub post_url: String,
}

/// One page of a forum listing. `next == None` marks the end of the listing.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub posts: Vec<RawPost>,
    pub next: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub api_base: String,
    pub oauth_base: String,
    pub token_url: String,
    pub page_size: u32,
    pub timeout_seconds: u64,
    pub min_request_interval_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "social-listening/0.1".to_string(),
            api_base: "https://www.reddit.com".to_string(),
            oauth_base: "https://oauth.reddit.com".to_string(),
            token_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            page_size: 100,
            timeout_seconds: 20,
            min_request_interval_ms: 1_000,
            max_retries: 3,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicState {
    Pending,
    Fetching,
    PageReceived,
    FailedEarly,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub topic: String,
    pub page_token: Option<String>,
    pub status: Option<u16>,
    pub message: String,
}

impl From<&FetchError> for FetchFailure {
    fn from(err: &FetchError) -> Self {
        Self {
            topic: err.topic.clone(),
            page_token: err.page_token.clone(),
            status: err.status,
            message: err.message.clone(),
        }
    }
}

/// Per-topic bookkeeping for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicReport {
    pub topic: String,
    pub state: TopicState,
    pub failed_early: bool,
    pub pages_fetched: u32,
    pub posts_fetched: u64,
    pub new_posts: u64,
    pub duplicates_skipped: u64,
    pub filtered: u64,
    pub failure: Option<FetchFailure>,
}

impl TopicReport {
    pub fn pending(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            state: TopicState::Pending,
            failed_early: false,
            pages_fetched: 0,
            posts_fetched: 0,
            new_posts: 0,
            duplicates_skipped: 0,
            filtered: 0,
            failure: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub min: Option<DateTime<Utc>>,
    pub max: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopTopics {
    pub most_negative: Option<String>,
    pub most_positive: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub topics_requested: Vec<String>,
    pub pages_per_topic: u32,
    pub total_posts_fetched: u64,
    pub total_duplicates_skipped: u64,
    pub total_filtered: u64,
    pub total_analyzed: u64,
    pub topic_reports: Vec<TopicReport>,
    pub failures: Vec<FetchFailure>,
    pub date_range: DateRange,
    pub top_topics: TopTopics,
    pub output_files: Vec<PathBuf>,
}

/// A listing request that could not be completed. Recoverable: the pipeline
/// stops the affected topic and moves on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("fetch failed for r/{topic} at page {}: {message}", .page_token.as_deref().unwrap_or("<first>"))]
pub struct FetchError {
    pub topic: String,
    pub page_token: Option<String>,
    pub status: Option<u16>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoringError {
    #[error("text contains undecodable characters")]
    Undecodable,
}

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Listing parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ListenerError>;
