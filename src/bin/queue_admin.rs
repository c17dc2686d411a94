use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};

use vodscribe::chunker::chunk_segments;
use vodscribe::config::Config;
use vodscribe::models::{JobPayload, TranscriptSegment};
use vodscribe::queue::JobQueue;

#[derive(Parser)]
#[command(name = "queue-admin")]
#[command(about = "Queue administration and chunker tuning utility")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a local self-check of queue semantics (enqueue, consume, ack,
    /// fail, stats, purge)
    SelfCheck,
    /// Preview chunk boundaries for a JSON segments file with the current
    /// chunker settings
    PreviewChunks {
        /// JSON array of {start, end, text}
        segments_file: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
struct SegmentEntry {
    start: f64,
    end: f64,
    text: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("vodscribe=info,warn")
        .init();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    match cli.command {
        Commands::SelfCheck => self_check(&config).await,
        Commands::PreviewChunks { segments_file } => preview_chunks(&config, &segments_file).await,
    }
}

async fn self_check(config: &Config) -> Result<()> {
    let queue = JobQueue::new(Duration::from_secs(config.queue.lease_timeout_secs));

    info!("🔍 Enqueueing 4 jobs...");
    for i in 0..4 {
        queue
            .enqueue(JobPayload::process_video(format!("selfcheck-{}", i)))
            .await?;
    }

    let a = queue.consume().await;
    let b = queue.consume().await;
    queue.ack(a.id).await?;
    queue.fail(b.id, "self-check simulated failure").await?;

    let stats = queue.stats().await;
    info!(
        "📊 Stats: {} waiting, {} active, {} completed, {} failed, {} total",
        stats.waiting, stats.active, stats.completed, stats.failed, stats.total
    );
    anyhow::ensure!(
        stats.total == stats.waiting + stats.active + stats.completed + stats.failed,
        "stats total does not match the sum of states"
    );

    let removed = queue.purge(false, false).await?;
    info!("🧹 Purged {} non-terminal job(s)", removed);
    let removed = queue.purge(true, true).await?;
    info!("🧹 Purged {} terminal record(s)", removed);
    anyhow::ensure!(queue.stats().await.total == 0, "queue not empty after full purge");
    anyhow::ensure!(
        queue.purge(true, true).await? == 0,
        "purge of an empty queue should remove nothing"
    );

    info!("✅ Queue self-check passed");
    Ok(())
}

async fn preview_chunks(config: &Config, segments_file: &PathBuf) -> Result<()> {
    let raw = tokio::fs::read_to_string(segments_file).await?;
    let entries: Vec<SegmentEntry> = serde_json::from_str(&raw)?;
    let segments: Vec<TranscriptSegment> = entries
        .into_iter()
        .map(|e| TranscriptSegment::new("preview", e.start, e.end, e.text))
        .collect();

    info!("📝 {} segments loaded from {}", segments.len(), segments_file.display());
    let chunks = chunk_segments(&segments, &config.chunker);
    info!(
        "📦 {} chunks with min_words={}, max_words={}, pause={}s",
        chunks.len(),
        config.chunker.min_words,
        config.chunker.max_words,
        config.chunker.pause_threshold_secs
    );

    for (i, chunk) in chunks.iter().enumerate() {
        let preview: String = chunk.text.chars().take(60).collect();
        info!(
            "  {:>3}. [{:>8.1}s - {:>8.1}s] {:>3} words | {}...",
            i + 1,
            chunk.start,
            chunk.end,
            chunk.word_count(),
            preview
        );
    }

    Ok(())
}
