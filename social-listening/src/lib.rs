pub mod aggregators;
pub mod config;
pub mod dedup;
pub mod fetcher;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod scorer;
pub mod sources;
pub mod traits;
pub mod types;
pub mod utils;

pub use types::*;
pub use aggregators::{AggregateReport, BrandTracker, TopicAggregator};
pub use config::{Cli, KeywordFile, ListenerConfig, PostFilters};
pub use dedup::Deduplicator;
pub use fetcher::Fetcher;
pub use output::{FileSink, MemorySink, Table, TableRecord};
pub use parser::ListingParser;
pub use pipeline::ListeningPipeline;
pub use scorer::{KeywordGroup, Lexicon, Score, Scorer};
pub use sources::{ScriptedPage, ScriptedSource};
pub use traits::{PostSource, ReportSink};
