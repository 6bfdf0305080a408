use crate::aggregators::{BrandTracker, TopicAggregator};
use crate::config::{ListenerConfig, PostFilters};
use crate::dedup::Deduplicator;
use crate::output::Table;
use crate::scorer::{KeywordGroup, Score, Scorer};
use crate::traits::{PostSource, ReportSink};
use crate::types::{
    AnalyzedPost, DateRange, FetchFailure, RawPost, Result, RunMetadata, TopTopics, TopicReport,
    TopicState, TopicSummary,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Everything that lives for exactly one run.
struct RunState {
    dedup: Deduplicator,
    aggregator: TopicAggregator,
    brands: BrandTracker,
    reports: Vec<TopicReport>,
    date_range: DateRange,
}

impl RunState {
    fn new(brands: Vec<KeywordGroup>, categories: BTreeMap<String, String>) -> Self {
        Self {
            dedup: Deduplicator::new(),
            aggregator: TopicAggregator::with_categories(categories),
            brands: BrandTracker::new(brands),
            reports: Vec::new(),
            date_range: DateRange::default(),
        }
    }

    fn track_date(&mut self, created_at: DateTime<Utc>) {
        let range = &mut self.date_range;
        if range.min.map_or(true, |min| created_at < min) {
            range.min = Some(created_at);
        }
        if range.max.map_or(true, |max| created_at > max) {
            range.max = Some(created_at);
        }
    }
}

/// Drives a run: topics one at a time, pages one at a time, posts one at a time.
pub struct ListeningPipeline<S: PostSource> {
    source: S,
    scorer: Scorer,
    brands: Vec<KeywordGroup>,
    categories: BTreeMap<String, String>,
    topics: Vec<String>,
    max_pages_per_topic: u32,
    filters: PostFilters,
}

impl<S: PostSource> ListeningPipeline<S> {
    /// Validates the configuration. Nothing is fetched or written here.
    pub fn new(source: S, config: &ListenerConfig) -> Result<Self> {
        config.validate()?;

        let mut lexicon = config.lexicon.clone();
        for topic in &config.topics {
            if lexicon.ensure_topic(topic) {
                debug!("Topic {} has no configured aliases, matching on its name", topic);
            }
        }

        Ok(Self {
            source,
            scorer: Scorer::new(lexicon),
            brands: config.brands.clone(),
            categories: config.categories.clone(),
            topics: config.topics.clone(),
            max_pages_per_topic: config.max_pages_per_topic,
            filters: config.filters.clone(),
        })
    }

    pub async fn run<W: ReportSink>(&self, sink: &mut W) -> Result<RunMetadata> {
        let started_at = Utc::now();
        info!(
            "Starting run over {} topics from {} ({} pages each)",
            self.topics.len(),
            self.source.source_name(),
            self.max_pages_per_topic
        );

        self.source.authenticate().await?;

        let mut output_files = vec![sink.start()?];
        let mut state = RunState::new(self.brands.clone(), self.categories.clone());

        for topic in &self.topics {
            let report = self.collect_topic(topic, &mut state, sink).await?;
            state.reports.push(report);
        }

        let RunState {
            aggregator,
            brands,
            reports,
            date_range,
            ..
        } = state;

        let aggregate = aggregator.finalize();
        let bubble_rows = aggregate.bubble_rows();
        let mentions = brands.into_mentions();

        let tables = [
            Table::from_records("posts_analyzed", &aggregate.rows),
            Table::from_records("topic_summary", &aggregate.summaries),
            Table::from_records("bubble_chart_data", &bubble_rows),
            Table::from_records("brand_mentions", &mentions),
        ];
        for table in &tables {
            output_files.push(sink.write_table(table)?);
        }

        let metadata = RunMetadata {
            started_at,
            finished_at: Utc::now(),
            topics_requested: self.topics.clone(),
            pages_per_topic: self.max_pages_per_topic,
            total_posts_fetched: reports.iter().map(|r| r.posts_fetched).sum(),
            total_duplicates_skipped: reports.iter().map(|r| r.duplicates_skipped).sum(),
            total_filtered: reports.iter().map(|r| r.filtered).sum(),
            total_analyzed: aggregate.rows.len() as u64,
            failures: reports.iter().filter_map(|r| r.failure.clone()).collect(),
            topic_reports: reports,
            date_range,
            top_topics: top_topics(&aggregate.summaries),
            output_files,
        };

        let metadata_path = sink.write_metadata(&metadata)?;
        info!(
            "Run complete: {} fetched, {} duplicates, {} filtered, {} analyzed, {} failed topics; metadata at {}",
            metadata.total_posts_fetched,
            metadata.total_duplicates_skipped,
            metadata.total_filtered,
            metadata.total_analyzed,
            metadata.failures.len(),
            metadata_path.display()
        );

        Ok(metadata)
    }

    async fn collect_topic<W: ReportSink>(
        &self,
        topic: &str,
        state: &mut RunState,
        sink: &mut W,
    ) -> Result<TopicReport> {
        let mut report = TopicReport::pending(topic);
        let mut cursor: Option<String> = None;
        info!("Collecting r/{}", topic);

        while report.pages_fetched < self.max_pages_per_topic {
            report.state = TopicState::Fetching;

            let page = match self.source.fetch_page(topic, cursor.as_deref()).await {
                Ok(page) => page,
                Err(err) => {
                    warn!("Stopping r/{} early: {}", topic, err);
                    report.state = TopicState::FailedEarly;
                    report.failed_early = true;
                    report.failure = Some(FetchFailure::from(&err));
                    break;
                }
            };

            report.state = TopicState::PageReceived;
            report.pages_fetched += 1;
            debug!(
                "r/{} page {}: {} posts",
                topic,
                report.pages_fetched,
                page.posts.len()
            );

            for post in page.posts {
                self.process_post(post, &mut report, state, sink)?;
            }

            match page.next {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        report.state = TopicState::Done;
        info!(
            "Finished r/{}: {} pages, {} posts, {} new, {} duplicates, {} filtered{}",
            topic,
            report.pages_fetched,
            report.posts_fetched,
            report.new_posts,
            report.duplicates_skipped,
            report.filtered,
            if report.failed_early { " (failed early)" } else { "" }
        );
        Ok(report)
    }

    fn process_post<W: ReportSink>(
        &self,
        mut post: RawPost,
        report: &mut TopicReport,
        state: &mut RunState,
        sink: &mut W,
    ) -> Result<()> {
        report.posts_fetched += 1;

        if !state.dedup.is_new(&post.id) {
            debug!("Skipping duplicate post {}", post.id);
            report.duplicates_skipped += 1;
            return Ok(());
        }

        if self.filters.rejects(&post) {
            report.filtered += 1;
            return Ok(());
        }

        if post.topic.is_empty() {
            post.topic = report.topic.clone();
        }

        let score = match self.scorer.score(&post.text()) {
            Ok(score) => score,
            Err(e) => {
                warn!("Scoring post {} as neutral: {}", post.id, e);
                Score::neutral()
            }
        };

        let analyzed = AnalyzedPost {
            post,
            sentiment: score.sentiment,
            sentiment_label: score.label,
            matched_topics: score.matched_topics,
            is_duplicate: false,
        };

        sink.write_row(&analyzed)?;
        state.brands.observe(&analyzed);
        state.track_date(analyzed.post.created_at);
        state.aggregator.ingest(analyzed);
        report.new_posts += 1;
        Ok(())
    }
}

fn top_topics(summaries: &[TopicSummary]) -> TopTopics {
    let most_negative = summaries
        .iter()
        .min_by(|a, b| a.sentiment_mean.total_cmp(&b.sentiment_mean))
        .map(|s| s.topic.clone());
    let most_positive = summaries
        .iter()
        .rev()
        .max_by(|a, b| a.sentiment_mean.total_cmp(&b.sentiment_mean))
        .map(|s| s.topic.clone());
    TopTopics {
        most_negative,
        most_positive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(topic: &str, mean: f64) -> TopicSummary {
        TopicSummary {
            topic: topic.to_string(),
            category: "Other".to_string(),
            mention_count: 1,
            sentiment_sum: mean,
            sentiment_mean: mean,
            positive_count: 0,
            negative_count: 0,
            pct_positive: 0.0,
            pct_negative: 0.0,
            top_forum: String::new(),
            sample_quote: String::new(),
        }
    }

    #[test]
    fn top_topics_pick_extremes_and_prefer_earlier_on_ties() {
        let summaries = vec![summary("a", 0.5), summary("b", -0.2), summary("c", 0.5), summary("d", -0.2)];
        let top = top_topics(&summaries);
        assert_eq!(top.most_negative.as_deref(), Some("b"));
        assert_eq!(top.most_positive.as_deref(), Some("a"));
    }

    #[test]
    fn top_topics_are_empty_without_summaries() {
        assert_eq!(top_topics(&[]), TopTopics::default());
    }
}
