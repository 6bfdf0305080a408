use crate::types::{AnalyzedPost, BubbleRow, TopicSummary};
use crate::utils::text;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

const SAMPLE_QUOTE_CHARS: usize = 220;

/// Category for topics missing from the category map.
pub const DEFAULT_CATEGORY: &str = "Other";

/// Running totals for one topic. Count and sum only ever change together in
/// `record`, and the mean is derived from them on demand.
#[derive(Debug, Default)]
struct TopicTally {
    mention_count: u64,
    sentiment_sum: f64,
    positive_count: u64,
    negative_count: u64,
    forum_counts: HashMap<String, u64>,
    sample_quote: Option<String>,
}

impl TopicTally {
    fn record(&mut self, post: &AnalyzedPost) {
        self.mention_count += 1;
        self.sentiment_sum += post.sentiment;

        if post.sentiment_label.is_positive() {
            self.positive_count += 1;
        } else if post.sentiment_label.is_negative() {
            self.negative_count += 1;
        }

        *self.forum_counts.entry(post.post.topic.clone()).or_insert(0) += 1;

        if self.sample_quote.is_none() {
            let quote = text::normalize_whitespace(&post.post.text());
            self.sample_quote = Some(text::snippet(&quote, SAMPLE_QUOTE_CHARS));
        }
    }

    fn summarize(&self, topic: &str, category: &str) -> TopicSummary {
        let percent = |count: u64| {
            if self.mention_count == 0 {
                0.0
            } else {
                count as f64 * 100.0 / self.mention_count as f64
            }
        };

        TopicSummary {
            topic: topic.to_string(),
            category: category.to_string(),
            mention_count: self.mention_count,
            sentiment_sum: self.sentiment_sum,
            sentiment_mean: if self.mention_count == 0 {
                0.0
            } else {
                self.sentiment_sum / self.mention_count as f64
            },
            positive_count: self.positive_count,
            negative_count: self.negative_count,
            pct_positive: percent(self.positive_count),
            pct_negative: percent(self.negative_count),
            top_forum: self.top_forum(),
            sample_quote: self.sample_quote.clone().unwrap_or_default(),
        }
    }

    fn top_forum(&self) -> String {
        self.forum_counts
            .iter()
            .max_by(|(a_name, a_count), (b_name, b_count)| {
                a_count.cmp(b_count).then_with(|| b_name.cmp(a_name))
            })
            .map(|(name, _)| name.clone())
            .unwrap_or_default()
    }
}

/// Everything the aggregator accumulated, handed over at the end of a run.
#[derive(Debug, Clone)]
pub struct AggregateReport {
    pub summaries: Vec<TopicSummary>,
    pub rows: Vec<AnalyzedPost>,
}

impl AggregateReport {
    /// Categories are laid out on the y axis in name order, starting at 1,
    /// and each lane gets a matching `C<n>` color code.
    pub fn bubble_rows(&self) -> Vec<BubbleRow> {
        let lanes: BTreeSet<&str> = self.summaries.iter().map(|s| s.category.as_str()).collect();
        let lane_of = |category: &str| {
            lanes
                .iter()
                .position(|lane| *lane == category)
                .map_or(0, |index| index as u32 + 1)
        };

        self.summaries
            .iter()
            .map(|summary| {
                let y_position = lane_of(&summary.category);
                BubbleRow {
                    topic: summary.topic.clone(),
                    category: summary.category.clone(),
                    mention_count: summary.mention_count,
                    sentiment_mean: summary.sentiment_mean,
                    y_position,
                    color_code: format!("C{}", y_position),
                }
            })
            .collect()
    }
}

/// Streams analyzed posts into per-topic summaries in arrival order.
#[derive(Debug, Default)]
pub struct TopicAggregator {
    categories: BTreeMap<String, String>,
    tallies: HashMap<String, TopicTally>,
    rows: Vec<AnalyzedPost>,
}

impl TopicAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `categories` maps topic names to the category shown in the summary.
    pub fn with_categories(categories: BTreeMap<String, String>) -> Self {
        Self {
            categories,
            ..Self::default()
        }
    }

    fn category_of(&self, topic: &str) -> &str {
        self.categories
            .get(topic)
            .map_or(DEFAULT_CATEGORY, String::as_str)
    }

    pub fn ingest(&mut self, post: AnalyzedPost) {
        for topic in &post.matched_topics {
            self.tallies.entry(topic.clone()).or_default().record(&post);
        }
        if post.matched_topics.is_empty() {
            debug!("Post {} matched no topics", post.post.id);
        }
        self.rows.push(post);
    }

    /// Current summaries, most-mentioned first, ties by topic name.
    pub fn snapshot(&self) -> Vec<TopicSummary> {
        let mut summaries: Vec<TopicSummary> = self
            .tallies
            .iter()
            .map(|(topic, tally)| tally.summarize(topic, self.category_of(topic)))
            .collect();
        summaries.sort_by(|a, b| {
            b.mention_count
                .cmp(&a.mention_count)
                .then_with(|| a.topic.cmp(&b.topic))
        });
        summaries
    }

    pub fn finalize(self) -> AggregateReport {
        let summaries = self.snapshot();
        info!(
            "Aggregated {} posts into {} topic summaries",
            self.rows.len(),
            summaries.len()
        );
        AggregateReport {
            summaries,
            rows: self.rows,
        }
    }
}
