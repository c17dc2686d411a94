use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Arg, Command};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{info, warn};

use vodscribe::config::Config;
use vodscribe::models::{JobPayload, Video};
use vodscribe::pipeline::{Pipeline, Worker};
use vodscribe::queue::JobQueue;
use vodscribe::store::{MemoryStore, VideoStore};
use vodscribe::transcription::{HttpSpeechToText, TranscriptionAdapter};

/// One video entry in an ingest manifest (JSON array)
#[derive(Debug, Deserialize)]
struct IngestVideo {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    source_url: String,
    duration_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("vodscribe-worker")
        .version("0.1.0")
        .about("Video transcription and chunking pipeline worker")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to a TOML configuration file"),
        )
        .arg(
            Arg::new("ingest")
                .short('i')
                .long("ingest")
                .value_name("FILE")
                .help("JSON manifest of videos to register and enqueue, then drain and exit"),
        )
        .arg(
            Arg::new("worker-name")
                .long("worker-name")
                .value_name("NAME")
                .help("Name for this worker instance"),
        )
        .arg(
            Arg::new("export-srt-dir")
                .long("export-srt-dir")
                .value_name("DIR")
                .help("Write an SRT transcript per processed video into this directory"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if matches.get_flag("verbose") {
        tracing_subscriber::fmt()
            .with_env_filter("vodscribe=debug,info")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("vodscribe=info,warn")
            .init();
    }

    // Load configuration
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(&PathBuf::from(path))?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };
    if let Some(name) = matches.get_one::<String>("worker-name") {
        config.worker.worker_name = name.clone();
    }
    if let Some(dir) = matches.get_one::<String>("export-srt-dir") {
        config.worker.export_srt_dir = Some(PathBuf::from(dir));
    }

    info!("🚀 vodscribe worker starting...");
    info!("🔧 Worker name: {}", config.worker.worker_name);
    info!("🎤 Transcription endpoint: {}", config.transcription.api_endpoint);

    // Wire up the queue, stores, and pipeline
    let queue = JobQueue::new(Duration::from_secs(config.queue.lease_timeout_secs));
    let store = MemoryStore::new();
    let provider = Arc::new(HttpSpeechToText::new(&config.transcription)?);
    let adapter = Arc::new(TranscriptionAdapter::new(provider, &config.transcription)?);

    let mut pipeline = Pipeline::new(
        store.clone(),
        store.clone(),
        store.clone(),
        adapter,
        config.chunker.clone(),
    );
    if let Some(ref dir) = config.worker.export_srt_dir {
        info!("💾 SRT export directory: {}", dir.display());
        pipeline = pipeline.with_export_srt_dir(dir.clone());
    }

    // Register and enqueue videos from the ingest manifest, if any
    let batch_mode = matches.contains_id("ingest");
    if let Some(path) = matches.get_one::<String>("ingest") {
        let manifest = tokio::fs::read_to_string(path).await?;
        let videos: Vec<IngestVideo> = serde_json::from_str(&manifest)?;
        info!("📥 Ingesting {} video(s) from {}", videos.len(), path);

        for entry in videos {
            let video = Video::new(&entry.id, &entry.title, &entry.source_url, entry.duration_secs)
                .with_description(&entry.description);
            store.insert(video).await?;
            queue.enqueue(JobPayload::process_video(&entry.id)).await?;
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_queue = queue.clone();
    let worker_name = config.worker.worker_name.clone();
    let worker_handle = tokio::spawn(async move {
        let mut worker = Worker::new(worker_queue, Arc::new(pipeline), worker_name);
        worker.run(shutdown_rx).await?;
        anyhow::Ok(worker.stats().clone())
    });

    if batch_mode {
        // Drain the queue, then stop
        loop {
            let stats = queue.stats().await;
            if stats.waiting == 0 && stats.active == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    } else {
        tokio::signal::ctrl_c().await?;
        info!("🛑 Shutdown signal received");
    }

    shutdown_tx.send(true)?;
    let stats = worker_handle.await??;

    let queue_stats = queue.stats().await;
    info!("✅ Jobs processed: {}", stats.jobs_processed);
    info!("❌ Jobs failed: {}", stats.jobs_failed);
    info!(
        "📊 Queue: {} waiting, {} active, {} completed, {} failed",
        queue_stats.waiting, queue_stats.active, queue_stats.completed, queue_stats.failed
    );

    for job in queue.failed_jobs().await {
        warn!(
            "⚠️  Job {} for video {} failed: {}",
            job.id,
            job.payload.video_id,
            job.error.as_deref().unwrap_or("unknown error")
        );
    }

    if stats.jobs_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
