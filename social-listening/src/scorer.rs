use crate::types::{ScoringError, SentimentLabel};
use std::collections::{BTreeSet, HashSet};

pub const DEFAULT_POSITIVE_WORDS: &[&str] = &[
    "love", "loved", "loving", "like", "liked", "great", "good", "awesome", "amazing",
    "excellent", "fantastic", "happy", "glad", "best", "better", "nice", "wonderful",
    "perfect", "enjoy", "enjoyed", "fun", "cute", "beautiful", "helpful", "recommend",
    "thanks", "thank", "reliable", "fast", "easy", "impressed", "worth", "favorite",
    "success", "win", "works", "solid",
];

pub const DEFAULT_NEGATIVE_WORDS: &[&str] = &[
    "hate", "hated", "bad", "worse", "worst", "awful", "terrible", "horrible", "sad",
    "angry", "annoying", "broken", "bug", "buggy", "crash", "crashed", "problem", "issue",
    "fail", "failed", "failure", "slow", "expensive", "useless", "disappointed",
    "disappointing", "scam", "poor", "sick", "hurt", "pain", "worried", "anxious",
    "scared", "lost", "ugly", "waste",
];

/// A named group of keyword aliases (a topic or a brand). Aliases are stored
/// lowercased and matched as substrings.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordGroup {
    pub name: String,
    pub aliases: Vec<String>,
}

impl KeywordGroup {
    pub fn new<I, S>(name: impl Into<String>, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let aliases = aliases
            .into_iter()
            .map(|alias| alias.as_ref().trim().to_lowercase())
            .filter(|alias| !alias.is_empty())
            .collect();
        Self {
            name: name.into(),
            aliases,
        }
    }

    /// `lowered` must already be lowercase.
    pub fn matches(&self, lowered: &str) -> bool {
        self.aliases.iter().any(|alias| lowered.contains(alias.as_str()))
    }
}

/// Immutable keyword data the scorer works from. Built once per process.
#[derive(Debug, Clone)]
pub struct Lexicon {
    positive: HashSet<String>,
    negative: HashSet<String>,
    topics: Vec<KeywordGroup>,
}

impl Lexicon {
    pub fn new<P, N, S>(positive: P, negative: N, topics: Vec<KeywordGroup>) -> Self
    where
        P: IntoIterator<Item = S>,
        N: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalize = |word: S| word.as_ref().trim().to_lowercase();
        Self {
            positive: positive.into_iter().map(normalize).collect(),
            negative: negative.into_iter().map(normalize).collect(),
            topics,
        }
    }

    /// Built-in polarity lists with the given topics.
    pub fn with_topics(topics: Vec<KeywordGroup>) -> Self {
        Self::new(
            DEFAULT_POSITIVE_WORDS.iter().copied(),
            DEFAULT_NEGATIVE_WORDS.iter().copied(),
            topics,
        )
    }

    pub fn topics(&self) -> &[KeywordGroup] {
        &self.topics
    }

    pub fn has_topic(&self, name: &str) -> bool {
        self.topics.iter().any(|group| group.name == name)
    }

    /// Adds `name` as its own alias unless a group with that name exists,
    /// ignoring ASCII case.
    pub fn ensure_topic(&mut self, name: &str) -> bool {
        if self.topics.iter().any(|group| group.name.eq_ignore_ascii_case(name)) {
            return false;
        }
        self.topics.push(KeywordGroup::new(name, [name]));
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub sentiment: f64,
    pub label: SentimentLabel,
    pub matched_topics: BTreeSet<String>,
}

impl Score {
    /// What a post gets when its text cannot be scored.
    pub fn neutral() -> Self {
        Self {
            sentiment: 0.0,
            label: SentimentLabel::Neutral,
            matched_topics: BTreeSet::new(),
        }
    }
}

pub struct Scorer {
    lexicon: Lexicon,
}

impl Scorer {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    /// Lexical polarity plus keyword topic tags. Deterministic for a given text
    /// and lexicon.
    pub fn score(&self, text: &str) -> Result<Score, ScoringError> {
        if text.contains(char::REPLACEMENT_CHARACTER) {
            return Err(ScoringError::Undecodable);
        }

        let lowered = text.to_lowercase();
        let sentiment = self.polarity(&lowered);
        let matched_topics = self
            .lexicon
            .topics
            .iter()
            .filter(|group| group.matches(&lowered))
            .map(|group| group.name.clone())
            .collect();

        Ok(Score {
            sentiment,
            label: SentimentLabel::from_polarity(sentiment),
            matched_topics,
        })
    }

    fn polarity(&self, lowered: &str) -> f64 {
        let mut positive = 0u32;
        let mut negative = 0u32;
        for token in lowered.split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            if self.lexicon.positive.contains(token) {
                positive += 1;
            } else if self.lexicon.negative.contains(token) {
                negative += 1;
            }
        }

        let matched = positive + negative;
        (f64::from(positive) - f64::from(negative)) / f64::from(matched.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> Scorer {
        Scorer::new(Lexicon::with_topics(vec![
            KeywordGroup::new("cats", ["cat", "kitten"]),
            KeywordGroup::new("Pricing", ["price", "expensive"]),
        ]))
    }

    #[test]
    fn positive_words_give_positive_sentiment() {
        let score = scorer().score("I love my cat").unwrap();
        assert_eq!(score.sentiment, 1.0);
        assert_eq!(score.label, SentimentLabel::VeryPositive);
        assert_eq!(score.matched_topics, BTreeSet::from(["cats".to_string()]));
    }

    #[test]
    fn mixed_words_are_normalized() {
        let score = scorer().score("Great kitten, terrible price, awful vet").unwrap();
        assert!((score.sentiment - (-1.0 / 3.0)).abs() < 1e-9);
        assert_eq!(score.label, SentimentLabel::Negative);
        assert_eq!(score.matched_topics.len(), 2);
    }

    #[test]
    fn no_keywords_is_neutral() {
        let score = scorer().score("no match here").unwrap();
        assert_eq!(score.sentiment, 0.0);
        assert_eq!(score.label, SentimentLabel::Neutral);
        assert!(score.matched_topics.is_empty());
    }

    #[test]
    fn polarity_uses_word_boundaries() {
        // "glove" must not count as "love"
        let score = scorer().score("GLOVE unlikely").unwrap();
        assert_eq!(score.sentiment, 0.0);
        let score = scorer().score("LOVE!!!").unwrap();
        assert_eq!(score.sentiment, 1.0);
    }

    #[test]
    fn topic_aliases_match_substrings_case_insensitively() {
        let score = scorer().score("CATS everywhere").unwrap();
        assert!(score.matched_topics.contains("cats"));
    }

    #[test]
    fn scoring_is_idempotent() {
        let scorer = scorer();
        let text = "Best kitten ever, but the price is a problem";
        assert_eq!(scorer.score(text).unwrap(), scorer.score(text).unwrap());
    }

    #[test]
    fn replacement_characters_are_rejected() {
        let err = scorer().score("broken \u{FFFD} text").unwrap_err();
        assert_eq!(err, ScoringError::Undecodable);
    }

    #[test]
    fn unknown_forums_fall_back_to_their_own_name() {
        let mut lexicon = Lexicon::with_topics(vec![KeywordGroup::new("cats", ["cat"])]);
        assert!(!lexicon.ensure_topic("cats"));
        assert!(!lexicon.ensure_topic("CATS"));
        assert!(lexicon.ensure_topic("Dogs"));
        assert_eq!(lexicon.topics().len(), 2);
        let score = Scorer::new(lexicon).score("my dogs are loud").unwrap();
        assert!(score.matched_topics.contains("Dogs"));
    }

    #[test]
    fn sentiment_stays_in_range() {
        let scorer = scorer();
        for text in ["hate hate hate", "love love", "love hate", ""] {
            let s = scorer.score(text).unwrap().sentiment;
            assert!((-1.0..=1.0).contains(&s));
        }
    }
}
