use crate::traits::ReportSink;
use crate::types::{
    AnalyzedPost, BrandMention, BubbleRow, ListenerError, Result, RunMetadata, TopicSummary,
};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info};

pub const ROWS_FILE: &str = "posts_analyzed.jsonl";
pub const METADATA_FILE: &str = "run_metadata.json";

/// A record type that can be laid out as one table row.
pub trait TableRecord {
    const COLUMNS: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

/// A named, fully materialized table ready for writing.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn from_records<R: TableRecord>(name: &str, records: &[R]) -> Self {
        Self {
            name: name.to_string(),
            columns: R::COLUMNS.to_vec(),
            rows: records.iter().map(TableRecord::cells).collect(),
        }
    }

    /// RFC 4180 CSV with a header line.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_csv_line(&mut out, self.columns.iter().copied());
        for row in &self.rows {
            push_csv_line(&mut out, row.iter().map(String::as_str));
        }
        out
    }
}

fn push_csv_line<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push_str("\r\n");
}

fn ratio(value: f64) -> String {
    format!("{:.4}", value)
}

impl TableRecord for AnalyzedPost {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "topic",
        "created_at",
        "title",
        "body",
        "score",
        "num_comments",
        "author",
        "permalink",
        "sentiment",
        "sentiment_label",
        "matched_topics",
        "is_duplicate",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.post.id.clone(),
            self.post.topic.clone(),
            self.post.created_at.to_rfc3339(),
            self.post.title.clone(),
            self.post.body.clone(),
            self.post.score.to_string(),
            self.post.num_comments.to_string(),
            self.post.author.clone(),
            self.post.permalink.clone(),
            ratio(self.sentiment),
            self.sentiment_label.to_string(),
            self.matched_topics.iter().cloned().collect::<Vec<_>>().join("; "),
            self.is_duplicate.to_string(),
        ]
    }
}

impl TableRecord for TopicSummary {
    const COLUMNS: &'static [&'static str] = &[
        "topic",
        "category",
        "mention_count",
        "sentiment_sum",
        "sentiment_mean",
        "pct_positive",
        "pct_negative",
        "top_forum",
        "sample_quote",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.topic.clone(),
            self.category.clone(),
            self.mention_count.to_string(),
            ratio(self.sentiment_sum),
            ratio(self.sentiment_mean),
            format!("{:.2}", self.pct_positive),
            format!("{:.2}", self.pct_negative),
            self.top_forum.clone(),
            self.sample_quote.clone(),
        ]
    }
}

impl TableRecord for BubbleRow {
    const COLUMNS: &'static [&'static str] = &[
        "topic",
        "category",
        "sentiment_mean",
        "y_position",
        "mention_count",
        "color_code",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.topic.clone(),
            self.category.clone(),
            ratio(self.sentiment_mean),
            self.y_position.to_string(),
            self.mention_count.to_string(),
            self.color_code.clone(),
        ]
    }
}

impl TableRecord for BrandMention {
    const COLUMNS: &'static [&'static str] = &[
        "brand",
        "forum",
        "post_id",
        "sentiment_label",
        "context_snippet",
        "post_url",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.brand.clone(),
            self.forum.clone(),
            self.post_id.clone(),
            self.sentiment_label.to_string(),
            self.context_snippet.clone(),
            self.post_url.clone(),
        ]
    }
}

/// Writes run artifacts into a directory: a JSONL row stream, one CSV per
/// table and a pretty-printed metadata document.
pub struct FileSink {
    output_dir: PathBuf,
    rows: Option<BufWriter<File>>,
}

impl FileSink {
    /// Nothing touches the disk until [`ReportSink::start`] is called.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            rows: None,
        }
    }
}

impl ReportSink for FileSink {
    fn start(&mut self) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(ROWS_FILE);
        self.rows = Some(BufWriter::new(File::create(&path)?));
        info!("Streaming analyzed rows to {}", path.display());
        Ok(path)
    }

    fn write_row(&mut self, post: &AnalyzedPost) -> Result<()> {
        let writer = self.rows.as_mut().ok_or_else(|| {
            ListenerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "row stream written before start",
            ))
        })?;

        serde_json::to_writer(&mut *writer, post)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }

    fn write_table(&mut self, table: &Table) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.csv", table.name));
        fs::write(&path, table.to_csv())?;
        debug!("Wrote {} rows to {}", table.rows.len(), path.display());
        Ok(path)
    }

    fn write_metadata(&mut self, metadata: &RunMetadata) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(METADATA_FILE);
        fs::write(&path, serde_json::to_string_pretty(metadata)?)?;
        Ok(path)
    }
}

/// Keeps every artifact in memory. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub started: bool,
    pub rows: Vec<AnalyzedPost>,
    pub tables: Vec<Table>,
    pub metadata: Option<RunMetadata>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }
}

impl ReportSink for MemorySink {
    fn start(&mut self) -> Result<PathBuf> {
        self.started = true;
        Ok(PathBuf::from(ROWS_FILE))
    }

    fn write_row(&mut self, post: &AnalyzedPost) -> Result<()> {
        self.rows.push(post.clone());
        Ok(())
    }

    fn write_table(&mut self, table: &Table) -> Result<PathBuf> {
        self.tables.push(table.clone());
        Ok(PathBuf::from(format!("{}.csv", table.name)))
    }

    fn write_metadata(&mut self, metadata: &RunMetadata) -> Result<PathBuf> {
        self.metadata = Some(metadata.clone());
        Ok(PathBuf::from(METADATA_FILE))
    }
}
