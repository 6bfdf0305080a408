use crate::output::Table;
use crate::types::{AnalyzedPost, FetchError, Page, Result, RunMetadata};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Trait for paginated forum listings (the Reddit API, scripted fixtures, etc.)
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Human-readable name for logs
    fn source_name(&self) -> String;

    /// Verify credentials before the first page is requested.
    /// Failing here is fatal to the run.
    async fn authenticate(&self) -> Result<()>;

    /// Fetch one page of posts for a topic. `cursor` is `None` on the first call;
    /// the returned `Page::next` is `None` once the listing is exhausted.
    async fn fetch_page(
        &self,
        topic: &str,
        cursor: Option<&str>,
    ) -> std::result::Result<Page, FetchError>;
}

#[async_trait]
impl<T: PostSource + ?Sized> PostSource for Arc<T> {
    fn source_name(&self) -> String {
        (**self).source_name()
    }

    async fn authenticate(&self) -> Result<()> {
        (**self).authenticate().await
    }

    async fn fetch_page(
        &self,
        topic: &str,
        cursor: Option<&str>,
    ) -> std::result::Result<Page, FetchError> {
        (**self).fetch_page(topic, cursor).await
    }
}

/// Destination for everything a run produces.
///
/// Calls arrive in a fixed order: `start` once, `write_row` once per analyzed
/// post, `write_table` once per table, and `write_metadata` last.
pub trait ReportSink {
    /// Prepare the incremental row stream; returns its location.
    fn start(&mut self) -> Result<PathBuf>;

    /// Append one row. Must be durable once this returns.
    fn write_row(&mut self, post: &AnalyzedPost) -> Result<()>;

    fn write_table(&mut self, table: &Table) -> Result<PathBuf>;

    fn write_metadata(&mut self, metadata: &RunMetadata) -> Result<PathBuf>;
}
