//! Pipeline orchestration: per-job stage machine and the consume-loop worker
//!
//! Stages run sequentially per job: fetch video -> transcribe -> chunk ->
//! persist -> mark ready. Any stage failure marks the video failed
//! (best-effort) and propagates to the queue, which records the job as
//! failed with the error detail attached. Redelivered jobs re-run every
//! stage from scratch; persistence is delete-then-insert, so a re-run never
//! duplicates records.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::chunker::{chunk_segments, ChunkerConfig};
use crate::error::{PipelineError, Result};
use crate::models::{TranscriptSegment, VideoStatus};
use crate::queue::{Job, JobQueue};
use crate::store::{ChunkStore, SegmentStore, VideoStore};
use crate::transcription::{SrtGenerator, Transcriber};

/// Per-job pipeline executor
pub struct Pipeline {
    videos: Arc<dyn VideoStore>,
    segments: Arc<dyn SegmentStore>,
    chunks: Arc<dyn ChunkStore>,
    transcriber: Arc<dyn Transcriber>,
    chunker_config: ChunkerConfig,
    export_srt_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        videos: Arc<dyn VideoStore>,
        segments: Arc<dyn SegmentStore>,
        chunks: Arc<dyn ChunkStore>,
        transcriber: Arc<dyn Transcriber>,
        chunker_config: ChunkerConfig,
    ) -> Self {
        Self {
            videos,
            segments,
            chunks,
            transcriber,
            chunker_config,
            export_srt_dir: None,
        }
    }

    /// Write an SRT artifact per processed video into this directory
    pub fn with_export_srt_dir(mut self, dir: PathBuf) -> Self {
        self.export_srt_dir = Some(dir);
        self
    }

    /// Run one job through the full pipeline
    ///
    /// On failure, attempts to mark the video failed before re-raising. A
    /// secondary failure of that status write is logged but never replaces
    /// the primary error.
    pub async fn process(&self, job: &Job) -> Result<()> {
        let video_id = job.payload.video_id.as_str();
        let start_time = Instant::now();

        info!(
            "🎬 Processing job {} for video {} (attempt {})",
            job.id, video_id, job.attempts
        );

        let result = self.run_stages(video_id).await;

        match &result {
            Ok(()) => {
                info!(
                    "✅ Completed video {} in {:.2}s",
                    video_id,
                    start_time.elapsed().as_secs_f64()
                );
            }
            Err(e) => {
                warn!("❌ Pipeline failed for video {}: {}", video_id, e);
                if let Err(status_err) = self
                    .videos
                    .update_status(video_id, VideoStatus::Failed)
                    .await
                {
                    error!(
                        "Could not mark video {} failed after pipeline error '{}': {}",
                        video_id, e, status_err
                    );
                }
            }
        }

        result
    }

    async fn run_stages(&self, video_id: &str) -> Result<()> {
        // Stage 1: fetch the video record
        let video = self.videos.fetch(video_id).await?;
        debug!("📹 Fetched video {}: {}", video.id, video.title);

        // Stage 2: transcription (download, extract, provider call)
        let segments = self.transcriber.transcribe(video_id, &video.source_url).await?;
        if segments.is_empty() {
            return Err(PipelineError::Chunking(format!(
                "empty transcript for video {}",
                video_id
            )));
        }
        info!("📝 Transcript for video {}: {} segments", video_id, segments.len());

        // Stage 3: semantic chunking
        let chunks = chunk_segments(&segments, &self.chunker_config);
        if chunks.is_empty() {
            return Err(PipelineError::Chunking(format!(
                "no chunks produced for video {}",
                video_id
            )));
        }
        info!("📦 Chunked video {}: {} chunks", video_id, chunks.len());

        // Stage 4: persist, replacing any previous run's records
        self.segments.delete_for_video(video_id).await?;
        self.segments.insert_many(segments.clone()).await?;
        self.chunks.delete_for_video(video_id).await?;
        self.chunks.insert_many(chunks).await?;

        // Stage 5: status transition
        self.videos.update_status(video_id, VideoStatus::Ready).await?;

        // Transcript artifact export is a convenience, never a failure
        if let Some(ref dir) = self.export_srt_dir {
            self.export_srt(video_id, dir, &segments).await;
        }

        Ok(())
    }

    async fn export_srt(&self, video_id: &str, dir: &Path, segments: &[TranscriptSegment]) {
        let path = dir.join(format!("{}.srt", video_id));
        let write = async {
            tokio::fs::create_dir_all(dir).await?;
            SrtGenerator::from_segments(segments).save_to_file(&path).await
        };
        match write.await {
            Ok(()) => debug!("💾 SRT saved to {}", path.display()),
            Err(e) => warn!("Failed to write SRT for video {}: {}", video_id, e),
        }
    }
}

/// Worker run statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerStats {
    pub jobs_processed: usize,
    pub jobs_failed: usize,
    pub total_processing_time_secs: f64,
}

/// Queue consumer driving the pipeline, one job in flight
///
/// Multiple worker processes may consume the same queue; they share nothing
/// beyond the queue and the document store, and no cross-job ordering is
/// assumed.
pub struct Worker {
    queue: JobQueue,
    pipeline: Arc<Pipeline>,
    worker_name: String,
    stats: WorkerStats,
}

impl Worker {
    pub fn new(queue: JobQueue, pipeline: Arc<Pipeline>, worker_name: impl Into<String>) -> Self {
        Self {
            queue,
            pipeline,
            worker_name: worker_name.into(),
            stats: WorkerStats::default(),
        }
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Consume jobs until the shutdown signal fires
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("🚀 Worker {} started", self.worker_name);

        loop {
            let job = tokio::select! {
                job = self.queue.consume() => job,
                _ = shutdown.changed() => {
                    info!("🛑 Worker {} shutting down", self.worker_name);
                    break;
                }
            };

            let start_time = Instant::now();
            match self.pipeline.process(&job).await {
                Ok(()) => {
                    self.queue.ack(job.id).await?;
                    self.stats.jobs_processed += 1;
                }
                Err(e) => {
                    self.queue.fail(job.id, e.to_string()).await?;
                    self.stats.jobs_failed += 1;
                }
            }
            self.stats.total_processing_time_secs += start_time.elapsed().as_secs_f64();
        }

        Ok(())
    }
}
