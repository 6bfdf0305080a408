use crate::scorer::{KeywordGroup, Lexicon, DEFAULT_NEGATIVE_WORDS, DEFAULT_POSITIVE_WORDS};
use crate::types::{Credentials, FetchConfig, ListenerError, RawPost, Result};
use crate::utils::text;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Collect forum posts, score sentiment and topics, and export report tables.
#[derive(Debug, Parser)]
#[command(name = "social-listening")]
#[command(version)]
pub struct Cli {
    /// Forums to collect from, comma separated
    #[arg(
        long,
        env = "SOCIAL_LISTENING_TOPICS",
        value_delimiter = ',',
        default_value = "technology,startups,gadgets"
    )]
    pub topics: Vec<String>,

    /// Pages to fetch per forum
    #[arg(long, default_value_t = 3)]
    pub max_pages: u32,

    /// Directory for generated files
    #[arg(long, env = "SOCIAL_LISTENING_OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// JSON file with topic aliases, brand keywords and optional polarity word lists
    #[arg(long, env = "SOCIAL_LISTENING_KEYWORDS")]
    pub keywords: Option<PathBuf>,

    /// OAuth application id
    #[arg(long, env = "REDDIT_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// OAuth application secret
    #[arg(long, env = "REDDIT_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    #[arg(long, env = "SOCIAL_LISTENING_USER_AGENT", default_value = "social-listening/0.1")]
    pub user_agent: String,

    /// Minimum delay between two requests, in milliseconds
    #[arg(long, default_value_t = 1_000)]
    pub min_request_interval_ms: u64,

    /// Retries per page after the first attempt
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    #[arg(long, default_value_t = 1_000)]
    pub backoff_base_ms: u64,

    #[arg(long, default_value_t = 30_000)]
    pub backoff_max_ms: u64,

    #[arg(long, default_value_t = 20)]
    pub timeout_seconds: u64,

    /// Drop posts with fewer upvotes than this
    #[arg(long, allow_negative_numbers = true)]
    pub min_score: Option<i64>,

    /// Drop posts with fewer comments than this
    #[arg(long)]
    pub min_comments: Option<u64>,

    /// Drop posts created before this instant (RFC 3339 or YYYY-MM-DD, UTC)
    #[arg(long, value_parser = parse_cutoff)]
    pub date_cutoff: Option<DateTime<Utc>>,

    /// Keep posts whose text is empty or deleted
    #[arg(long)]
    pub keep_deleted: bool,

    /// Replay a JSON fixture instead of calling the API
    #[arg(long, value_name = "FIXTURE")]
    pub dry_run: Option<PathBuf>,

    /// Mirror log output into this file
    #[arg(long, env = "SOCIAL_LISTENING_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_cutoff(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| format!("expected RFC 3339 or YYYY-MM-DD, got {:?}", value))
}

impl Cli {
    pub fn into_config(self) -> Result<ListenerConfig> {
        let keywords = match &self.keywords {
            Some(path) => KeywordFile::load(path)?,
            None => KeywordFile::builtin(),
        };

        let credentials = match (self.client_id, self.client_secret) {
            (Some(client_id), Some(client_secret)) => Some(Credentials {
                client_id,
                client_secret,
            }),
            (None, None) => None,
            _ => {
                return Err(ListenerError::Config(
                    "client id and client secret must be given together".to_string(),
                ))
            }
        };

        let fetch = FetchConfig {
            user_agent: self.user_agent,
            timeout_seconds: self.timeout_seconds,
            min_request_interval_ms: self.min_request_interval_ms,
            max_retries: self.max_retries,
            backoff_base_ms: self.backoff_base_ms,
            backoff_max_ms: self.backoff_max_ms,
            ..FetchConfig::default()
        };

        let config = ListenerConfig {
            topics: self
                .topics
                .into_iter()
                .map(|topic| topic.trim().to_string())
                .filter(|topic| !topic.is_empty())
                .collect(),
            max_pages_per_topic: self.max_pages,
            output_dir: self.output_dir,
            credentials,
            fetch,
            lexicon: keywords.lexicon(),
            brands: keywords.brand_groups(),
            categories: keywords.categories,
            filters: PostFilters {
                skip_deleted: !self.keep_deleted,
                min_score: self.min_score,
                min_comments: self.min_comments,
                date_cutoff: self.date_cutoff,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// Pre-scoring filters. Posts they reject are counted but never analyzed.
#[derive(Debug, Clone, PartialEq)]
pub struct PostFilters {
    pub skip_deleted: bool,
    pub min_score: Option<i64>,
    pub min_comments: Option<u64>,
    pub date_cutoff: Option<DateTime<Utc>>,
}

impl Default for PostFilters {
    fn default() -> Self {
        Self {
            skip_deleted: true,
            min_score: None,
            min_comments: None,
            date_cutoff: None,
        }
    }
}

impl PostFilters {
    pub fn rejects(&self, post: &RawPost) -> bool {
        if self.skip_deleted && text::is_empty_or_deleted(&post.body) && text::is_empty_or_deleted(&post.title) {
            debug!("Filtering empty or deleted post {}", post.id);
            return true;
        }
        if let Some(min) = self.min_score {
            if post.score < min {
                debug!("Filtering post {} with score {} < {}", post.id, post.score, min);
                return true;
            }
        }
        if let Some(min) = self.min_comments {
            if post.num_comments < min {
                debug!("Filtering post {} with {} comments < {}", post.id, post.num_comments, min);
                return true;
            }
        }
        match self.date_cutoff {
            Some(cutoff) if post.created_at < cutoff => {
                debug!("Filtering post {} created {} before {}", post.id, post.created_at, cutoff);
                true
            }
            _ => false,
        }
    }
}

/// Everything a run needs, already loaded.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub topics: Vec<String>,
    pub max_pages_per_topic: u32,
    pub output_dir: PathBuf,
    pub credentials: Option<Credentials>,
    pub fetch: FetchConfig,
    pub lexicon: Lexicon,
    pub brands: Vec<KeywordGroup>,
    /// Topic name to summary category; unlisted topics fall under "Other".
    pub categories: BTreeMap<String, String>,
    pub filters: PostFilters,
}

impl ListenerConfig {
    /// Defaults for everything except the topics and their keywords.
    pub fn new(topics: Vec<String>, lexicon: Lexicon) -> Self {
        Self {
            topics,
            max_pages_per_topic: 3,
            output_dir: PathBuf::from("output"),
            credentials: None,
            fetch: FetchConfig::default(),
            lexicon,
            brands: Vec::new(),
            categories: BTreeMap::new(),
            filters: PostFilters::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.topics.is_empty() {
            return Err(ListenerError::Config("at least one topic is required".to_string()));
        }

        let mut seen = HashSet::new();
        for topic in &self.topics {
            if topic.is_empty() || !topic.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ListenerError::Config(format!("invalid topic name: {:?}", topic)));
            }
            if !seen.insert(topic.to_lowercase()) {
                return Err(ListenerError::Config(format!("topic listed twice: {}", topic)));
            }
        }

        if self.max_pages_per_topic == 0 {
            return Err(ListenerError::Config("max pages per topic must be greater than zero".to_string()));
        }

        if self.fetch.page_size == 0 || self.fetch.page_size > 100 {
            return Err(ListenerError::Config(format!(
                "page size must be between 1 and 100, got {}",
                self.fetch.page_size
            )));
        }

        if let Some(credentials) = &self.credentials {
            if credentials.client_id.trim().is_empty() || credentials.client_secret.trim().is_empty() {
                return Err(ListenerError::Config("credentials must not be blank".to_string()));
            }
        }

        Ok(())
    }
}

/// On-disk keyword configuration.
///
/// ```json
/// {
///   "topics": { "cats": ["cat", "kitten"] },
///   "categories": { "cats": "Pets" },
///   "brands": { "Acme": ["acme"] }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeywordFile {
    pub topics: BTreeMap<String, Vec<String>>,
    pub brands: BTreeMap<String, Vec<String>>,
    pub categories: BTreeMap<String, String>,
    pub positive: Option<Vec<String>>,
    pub negative: Option<Vec<String>>,
}

impl KeywordFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ListenerError::Config(format!("cannot read keyword file {}: {}", path.display(), e))
        })?;
        let keywords: Self = serde_json::from_str(&content).map_err(|e| {
            ListenerError::Config(format!("invalid keyword file {}: {}", path.display(), e))
        })?;
        info!(
            "Loaded {} topics and {} brands from {}",
            keywords.topics.len(),
            keywords.brands.len(),
            path.display()
        );
        Ok(keywords)
    }

    /// Product-feedback topics and AI vendors, used when no keyword file is given.
    pub fn builtin() -> Self {
        let group = |aliases: &[&str]| aliases.iter().map(|a| a.to_string()).collect::<Vec<_>>();

        let topics = BTreeMap::from([
            ("Pricing".to_string(), group(&["price", "pricing", "cost", "expensive", "cheap", "value"])),
            ("Reliability".to_string(), group(&["reliable", "downtime", "bug", "broken", "outage", "stable"])),
            ("Support".to_string(), group(&["support", "help desk", "ticket", "customer service"])),
            ("Features".to_string(), group(&["feature", "roadmap", "integration", "release"])),
            ("Security".to_string(), group(&["security", "privacy", "breach", "compliance", "gdpr", "soc2"])),
        ]);

        let brands = BTreeMap::from([
            ("OpenAI".to_string(), group(&["openai", "chatgpt", "gpt"])),
            ("Google".to_string(), group(&["google", "gemini", "bard"])),
            ("Anthropic".to_string(), group(&["anthropic", "claude"])),
            ("Meta".to_string(), group(&["meta", "llama"])),
            ("Microsoft".to_string(), group(&["microsoft", "copilot", "azure"])),
        ]);

        let categories = BTreeMap::from([
            ("Pricing".to_string(), "Business".to_string()),
            ("Reliability".to_string(), "Product".to_string()),
            ("Support".to_string(), "Operations".to_string()),
            ("Features".to_string(), "Product".to_string()),
            ("Security".to_string(), "Trust".to_string()),
        ]);

        Self {
            topics,
            brands,
            categories,
            positive: None,
            negative: None,
        }
    }

    pub fn lexicon(&self) -> Lexicon {
        let topics = self
            .topics
            .iter()
            .map(|(name, aliases)| KeywordGroup::new(name.clone(), aliases))
            .collect();

        let positive: Vec<String> = match &self.positive {
            Some(words) => words.clone(),
            None => DEFAULT_POSITIVE_WORDS.iter().map(|w| w.to_string()).collect(),
        };
        let negative: Vec<String> = match &self.negative {
            Some(words) => words.clone(),
            None => DEFAULT_NEGATIVE_WORDS.iter().map(|w| w.to_string()).collect(),
        };

        Lexicon::new(positive, negative, topics)
    }

    pub fn brand_groups(&self) -> Vec<KeywordGroup> {
        self.brands
            .iter()
            .map(|(name, aliases)| KeywordGroup::new(name.clone(), aliases))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config(topics: &[&str]) -> ListenerConfig {
        ListenerConfig::new(
            topics.iter().map(|t| t.to_string()).collect(),
            Lexicon::with_topics(Vec::new()),
        )
    }

    #[test]
    fn zero_topics_is_a_config_error() {
        assert!(matches!(config(&[]).validate(), Err(ListenerError::Config(_))));
    }

    #[test]
    fn zero_pages_is_a_config_error() {
        let mut cfg = config(&["cats"]);
        cfg.max_pages_per_topic = 0;
        assert!(matches!(cfg.validate(), Err(ListenerError::Config(_))));
    }

    #[test]
    fn bad_or_repeated_topic_names_are_rejected() {
        assert!(config(&["cats/../x"]).validate().is_err());
        assert!(config(&["cats", "Cats"]).validate().is_err());
        assert!(config(&["cats", "dogs_2"]).validate().is_ok());
    }

    #[test]
    fn cli_defaults_build_a_valid_config() {
        let cli = Cli::parse_from(["social-listening", "--topics", "cats,dogs", "--max-pages", "2"]);
        let cfg = cli.into_config().unwrap();
        assert_eq!(cfg.topics, vec!["cats", "dogs"]);
        assert_eq!(cfg.max_pages_per_topic, 2);
        assert!(cfg.filters.skip_deleted);
        assert!(cfg.lexicon.has_topic("Pricing"));
        assert_eq!(cfg.brands.len(), 5);
        assert_eq!(cfg.categories.get("Security").map(String::as_str), Some("Trust"));
        assert_eq!(cfg.filters.min_comments, None);
    }

    #[test]
    fn cutoff_and_comment_flags_reach_the_filters() {
        let cli = Cli::parse_from([
            "social-listening",
            "--date-cutoff",
            "2025-01-01",
            "--min-comments",
            "1",
        ]);
        let cfg = cli.into_config().unwrap();
        assert_eq!(
            cfg.filters.date_cutoff,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(cfg.filters.min_comments, Some(1));

        let cutoff = parse_cutoff("2025-03-01T12:00:00+02:00").unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap());
        assert!(parse_cutoff("yesterday").is_err());
    }

    #[test]
    fn half_a_credential_pair_is_rejected() {
        let cli = Cli::parse_from(["social-listening", "--client-id", "abc"]);
        assert!(matches!(cli.into_config(), Err(ListenerError::Config(_))));
    }

    #[test]
    fn keyword_file_overrides_builtin_lists() {
        let keywords: KeywordFile = serde_json::from_str(
            r#"{ "topics": { "cats": ["Cat", "kitten"] }, "positive": ["purr"] }"#,
        )
        .unwrap();
        let lexicon = keywords.lexicon();
        assert!(lexicon.has_topic("cats"));
        assert_eq!(lexicon.topics()[0].aliases, vec!["cat", "kitten"]);
        assert!(keywords.brand_groups().is_empty());
        assert!(keywords.categories.is_empty());
    }

    #[test]
    fn filters_drop_deleted_and_low_score_posts() {
        let post = |title: &str, body: &str, score: i64| RawPost {
            id: "x".to_string(),
            topic: "cats".to_string(),
            created_at: Default::default(),
            title: title.to_string(),
            body: body.to_string(),
            score,
            author: String::new(),
            permalink: String::new(),
            num_comments: 0,
        };
        let filters = PostFilters {
            skip_deleted: true,
            min_score: Some(3),
            ..PostFilters::default()
        };
        assert!(filters.rejects(&post("", "[deleted]", 10)));
        assert!(filters.rejects(&post("hello", "", 1)));
        assert!(!filters.rejects(&post("hello", "", 3)));
        assert!(!PostFilters::default().rejects(&post("", "no match here", -5)));

        let strict = PostFilters {
            min_comments: Some(1),
            date_cutoff: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            ..PostFilters::default()
        };
        let mut recent = post("hello", "", 0);
        recent.created_at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert!(strict.rejects(&recent), "zero comments");
        recent.num_comments = 2;
        assert!(!strict.rejects(&recent));
        recent.created_at = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert!(strict.rejects(&recent), "before cutoff");
    }
}
