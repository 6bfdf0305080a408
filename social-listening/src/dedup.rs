use std::collections::HashSet;
use tracing::debug;

/// Remembers post ids seen during one run. Never persisted.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen_ids: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time an id is offered and marks it seen.
    pub fn is_new(&mut self, post_id: &str) -> bool {
        if self.seen_ids.contains(post_id) {
            debug!("Skipping duplicate post with id: {}", post_id);
            return false;
        }
        self.seen_ids.insert(post_id.to_string());
        true
    }

    pub fn seen_count(&self) -> usize {
        self.seen_ids.len()
    }
}
