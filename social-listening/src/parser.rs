use crate::types::{ListenerError, Page, RawPost, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

/// Kind tag Reddit uses for link posts inside a listing.
const LINK_KIND: &str = "t3";

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct LinkData {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    selftext: Option<String>,
    #[serde(default)]
    created_utc: Option<f64>,
    #[serde(default)]
    score: Option<i64>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    num_comments: Option<u64>,
}

/// Turns listing responses into [`Page`]s.
pub struct ListingParser {
    site_base: String,
}

impl ListingParser {
    pub fn new(site_base: impl Into<String>) -> Self {
        Self {
            site_base: site_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Parse a raw response body. Invalid UTF-8 is replaced rather than rejected,
    /// so one bad post cannot sink the whole page.
    pub fn parse_listing(&self, topic: &str, body: &[u8]) -> Result<Page> {
        let content = String::from_utf8_lossy(body);
        let listing: Listing = serde_json::from_str(&content)
            .map_err(|e| ListenerError::Parse(format!("invalid listing for r/{}: {}", topic, e)))?;

        let mut posts = Vec::with_capacity(listing.data.children.len());
        for thing in listing.data.children {
            if thing.kind != LINK_KIND {
                debug!("Skipping non-link listing child of kind {}", thing.kind);
                continue;
            }
            let link: LinkData = serde_json::from_value(thing.data)
                .map_err(|e| ListenerError::Parse(format!("invalid post in r/{}: {}", topic, e)))?;
            posts.push(self.to_raw_post(topic, link));
        }

        // an empty page ends the listing even if the server hands out a cursor
        let next = if posts.is_empty() {
            None
        } else {
            listing.data.after.filter(|after| !after.is_empty())
        };
        debug!("Parsed {} posts for r/{} (next: {:?})", posts.len(), topic, next);

        Ok(Page { posts, next })
    }

    fn to_raw_post(&self, topic: &str, link: LinkData) -> RawPost {
        let created_at = link
            .created_utc
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs.trunc() as i64, 0))
            .unwrap_or_default();

        let permalink = match link.permalink {
            Some(path) if path.starts_with('/') => format!("{}{}", self.site_base, path),
            Some(url) => url,
            None => String::new(),
        };

        RawPost {
            id: link.id,
            topic: topic.to_string(),
            created_at,
            title: link.title.unwrap_or_default(),
            body: link.selftext.unwrap_or_default(),
            score: link.score.unwrap_or(0),
            author: link.author.unwrap_or_default(),
            permalink,
            num_comments: link.num_comments.unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing(children: serde_json::Value, after: Option<&str>) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "kind": "Listing",
            "data": { "children": children, "after": after }
        }))
        .unwrap()
    }

    #[test]
    fn parses_link_posts_and_cursor() {
        let parser = ListingParser::new("https://www.reddit.com/");
        let body = listing(
            json!([
                { "kind": "t3", "data": {
                    "id": "abc", "title": "Hello", "selftext": "I love my cat",
                    "created_utc": 1735689600.0, "score": 12, "author": "someone",
                    "permalink": "/r/cats/comments/abc/hello/", "num_comments": 4
                }},
                { "kind": "t1", "data": { "id": "comment" } }
            ]),
            Some("t3_abc"),
        );

        let page = parser.parse_listing("cats", &body).unwrap();

        assert_eq!(page.next.as_deref(), Some("t3_abc"));
        assert_eq!(page.posts.len(), 1);
        let post = &page.posts[0];
        assert_eq!(post.id, "abc");
        assert_eq!(post.topic, "cats");
        assert_eq!(post.score, 12);
        assert_eq!(post.num_comments, 4);
        assert_eq!(post.created_at.timestamp(), 1_735_689_600);
        assert_eq!(post.permalink, "https://www.reddit.com/r/cats/comments/abc/hello/");
    }

    #[test]
    fn empty_after_is_end_of_listing() {
        let parser = ListingParser::new("https://www.reddit.com");
        let page = parser.parse_listing("cats", &listing(json!([]), Some(""))).unwrap();
        assert!(page.posts.is_empty());
        assert!(page.next.is_none());
    }

    #[test]
    fn page_without_posts_ends_the_listing() {
        let parser = ListingParser::new("https://www.reddit.com");
        let only_comments = json!([{ "kind": "t1", "data": { "id": "c1" } }]);
        for children in [json!([]), only_comments] {
            let page = parser
                .parse_listing("cats", &listing(children, Some("t3_z")))
                .unwrap();
            assert!(page.posts.is_empty());
            assert!(page.next.is_none());
        }
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parser = ListingParser::new("https://www.reddit.com");
        let body = listing(json!([{ "kind": "t3", "data": { "id": "bare" } }]), None);
        let page = parser.parse_listing("cats", &body).unwrap();
        let post = &page.posts[0];
        assert_eq!(post.title, "");
        assert_eq!(post.score, 0);
        assert_eq!(post.created_at.timestamp(), 0);
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let parser = ListingParser::new("https://www.reddit.com");
        let mut body = br#"{"data":{"children":[{"kind":"t3","data":{"id":"x","selftext":"bad "#.to_vec();
        body.push(0xff);
        body.extend_from_slice(br#""}}],"after":null}}"#);

        let page = parser.parse_listing("cats", &body).unwrap();
        assert!(page.posts[0].body.contains('\u{FFFD}'));
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        let parser = ListingParser::new("https://www.reddit.com");
        let err = parser.parse_listing("cats", b"<html>nope</html>").unwrap_err();
        assert!(matches!(err, ListenerError::Parse(_)));
    }
}
