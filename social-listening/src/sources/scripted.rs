use crate::traits::PostSource;
use crate::types::{FetchError, ListenerError, Page, RawPost, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

/// One scripted response in a topic's page sequence.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedPage {
    Page {
        #[serde(default)]
        posts: Vec<RawPost>,
        #[serde(default)]
        next: Option<String>,
    },
    Failure {
        #[serde(default)]
        status: Option<u16>,
        message: String,
    },
}

#[derive(Debug, Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    topics: HashMap<String, Vec<ScriptedPage>>,
}

/// In-memory [`PostSource`] that replays pre-recorded pages, in order, per topic.
/// Topics without a script return a single empty, final page.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    pages: HashMap<String, Vec<ScriptedPage>>,
    served: Mutex<HashMap<String, usize>>,
    reject_auth: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON fixture of the form `{"topics": {"cats": [{"page": {...}}, {"failure": {...}}]}}`.
    pub fn from_fixture(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let fixture: Fixture = serde_json::from_str(&content)?;
        info!(
            "Loaded scripted source from {} ({} topics)",
            path.display(),
            fixture.topics.len()
        );
        Ok(Self {
            pages: fixture.topics,
            ..Self::default()
        })
    }

    pub fn with_page(mut self, topic: &str, posts: Vec<RawPost>, next: Option<&str>) -> Self {
        self.pages
            .entry(topic.to_string())
            .or_default()
            .push(ScriptedPage::Page {
                posts,
                next: next.map(str::to_string),
            });
        self
    }

    pub fn with_failure(mut self, topic: &str, status: Option<u16>, message: &str) -> Self {
        self.pages
            .entry(topic.to_string())
            .or_default()
            .push(ScriptedPage::Failure {
                status,
                message: message.to_string(),
            });
        self
    }

    pub fn rejecting_auth(mut self, message: &str) -> Self {
        self.reject_auth = Some(message.to_string());
        self
    }

    /// Number of `authenticate` and `fetch_page` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_index(&self, topic: &str) -> usize {
        let mut served = match self.served.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let index = served.entry(topic.to_string()).or_insert(0);
        let current = *index;
        *index += 1;
        current
    }
}

#[async_trait]
impl PostSource for ScriptedSource {
    fn source_name(&self) -> String {
        "scripted".to_string()
    }

    async fn authenticate(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reject_auth {
            Some(message) => Err(ListenerError::Auth(message.clone())),
            None => Ok(()),
        }
    }

    async fn fetch_page(
        &self,
        topic: &str,
        cursor: Option<&str>,
    ) -> std::result::Result<Page, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = self.next_index(topic);
        debug!("Scripted fetch for r/{} page {} (cursor {:?})", topic, index, cursor);

        match self.pages.get(topic).and_then(|pages| pages.get(index)) {
            Some(ScriptedPage::Page { posts, next }) => Ok(Page {
                posts: posts
                    .iter()
                    .cloned()
                    .map(|mut post| {
                        if post.topic.is_empty() {
                            post.topic = topic.to_string();
                        }
                        post
                    })
                    .collect(),
                next: next.clone(),
            }),
            Some(ScriptedPage::Failure { status, message }) => Err(FetchError {
                topic: topic.to_string(),
                page_token: cursor.map(str::to_string),
                status: *status,
                message: message.clone(),
            }),
            None => Ok(Page::default()),
        }
    }
}
