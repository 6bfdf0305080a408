use crate::scorer::KeywordGroup;
use crate::types::{AnalyzedPost, BrandMention};
use crate::utils::text;

const CONTEXT_SNIPPET_CHARS: usize = 220;

/// Collects one row per (post, brand) pair whose keywords appear in the post.
#[derive(Debug, Default)]
pub struct BrandTracker {
    brands: Vec<KeywordGroup>,
    mentions: Vec<BrandMention>,
}

impl BrandTracker {
    pub fn new(brands: Vec<KeywordGroup>) -> Self {
        Self {
            brands,
            mentions: Vec::new(),
        }
    }

    pub fn observe(&mut self, post: &AnalyzedPost) {
        if self.brands.is_empty() {
            return;
        }
        let context = text::normalize_whitespace(&post.post.text());
        let lowered = context.to_lowercase();

        for brand in &self.brands {
            if brand.matches(&lowered) {
                self.mentions.push(BrandMention {
                    brand: brand.name.clone(),
                    forum: post.post.topic.clone(),
                    post_id: post.post.id.clone(),
                    sentiment_label: post.sentiment_label,
                    context_snippet: text::snippet(&context, CONTEXT_SNIPPET_CHARS),
                    post_url: post.post.permalink.clone(),
                });
            }
        }
    }

    pub fn mentions(&self) -> &[BrandMention] {
        &self.mentions
    }

    pub fn into_mentions(self) -> Vec<BrandMention> {
        self.mentions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawPost, SentimentLabel};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn post(id: &str, body: &str) -> AnalyzedPost {
        AnalyzedPost {
            post: RawPost {
                id: id.to_string(),
                topic: "technology".to_string(),
                created_at: Utc::now(),
                title: String::new(),
                body: body.to_string(),
                score: 5,
                author: "a".to_string(),
                permalink: format!("https://www.reddit.com/r/technology/{}", id),
                num_comments: 0,
            },
            sentiment: 0.5,
            sentiment_label: SentimentLabel::Positive,
            matched_topics: BTreeSet::new(),
            is_duplicate: false,
        }
    }

    #[test]
    fn records_each_matching_brand() {
        let mut tracker = BrandTracker::new(vec![
            KeywordGroup::new("OpenAI", ["openai", "chatgpt"]),
            KeywordGroup::new("Google", ["gemini"]),
        ]);
        tracker.observe(&post("1", "ChatGPT vs Gemini, which is better?"));
        tracker.observe(&post("2", "nothing relevant"));

        let mentions = tracker.into_mentions();
        assert_eq!(mentions.len(), 2);
        assert_eq!(mentions[0].brand, "OpenAI");
        assert_eq!(mentions[1].brand, "Google");
        assert_eq!(mentions[0].post_url, "https://www.reddit.com/r/technology/1");
    }

    #[test]
    fn no_brands_means_no_mentions() {
        let mut tracker = BrandTracker::default();
        tracker.observe(&post("1", "ChatGPT"));
        assert!(tracker.mentions().is_empty());
    }
}
