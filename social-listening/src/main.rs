use anyhow::{Context, Result};
use clap::Parser;
use social_listening::{
    Cli, FileSink, Fetcher, ListenerConfig, ListeningPipeline, PostSource, RunMetadata,
    ScriptedSource,
};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose {
        "social_listening=debug"
    } else {
        "social_listening=info"
    };
    let filter = EnvFilter::from_default_env().add_directive(default_level.parse()?);

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

async fn execute<S: PostSource>(source: S, config: &ListenerConfig) -> Result<RunMetadata> {
    let pipeline = ListeningPipeline::new(source, config)?;
    let mut sink = FileSink::new(&config.output_dir);
    Ok(pipeline.run(&mut sink).await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let dry_run = cli.dry_run.clone();
    let config = cli.into_config()?;

    let metadata = match dry_run {
        Some(fixture) => {
            info!("Dry run: replaying {}", fixture.display());
            let source = ScriptedSource::from_fixture(&fixture)
                .with_context(|| format!("cannot load fixture {}", fixture.display()))?;
            execute(source, &config).await?
        }
        None => {
            let source = Fetcher::new(config.fetch.clone(), config.credentials.clone())?;
            execute(source, &config).await?
        }
    };

    for failure in &metadata.failures {
        warn!("r/{} did not complete: {}", failure.topic, failure.message);
    }
    info!(
        "Analyzed {} posts across {} topics; outputs in {}",
        metadata.total_analyzed,
        metadata.topics_requested.len(),
        config.output_dir.display()
    );
    if let (Some(negative), Some(positive)) =
        (&metadata.top_topics.most_negative, &metadata.top_topics.most_positive)
    {
        info!("Most negative topic: {}, most positive topic: {}", negative, positive);
    }

    Ok(())
}
