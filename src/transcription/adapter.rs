//! Transcription adapter: temp-file lifecycle around the provider call
//!
//! Owns the download -> extract -> transcribe -> validate chain for one
//! pipeline execution. Both temporary artifacts (the downloaded video and
//! the extracted audio) live in a scoped temp directory released on every
//! exit path; release failure is logged, never silent.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use super::{RawSegment, SpeechToText, Transcriber};
use crate::config::TranscriptionConfig;
use crate::error::{PipelineError, Result};
use crate::models::TranscriptSegment;

pub struct TranscriptionAdapter {
    provider: Arc<dyn SpeechToText>,
    client: reqwest::Client,
    target_sample_rate: u32,
}

impl TranscriptionAdapter {
    pub fn new(provider: Arc<dyn SpeechToText>, config: &TranscriptionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| PipelineError::Transcription(format!("HTTP client setup: {}", e)))?;

        Ok(Self {
            provider,
            client,
            target_sample_rate: config.target_sample_rate,
        })
    }
}

#[async_trait]
impl Transcriber for TranscriptionAdapter {
    /// Produce ordered, validated transcript segments for a remote video
    ///
    /// No internal retry: any failure in the chain propagates as a
    /// transcription error, and retry is the queue's redelivery concern.
    async fn transcribe(&self, video_id: &str, source_url: &str) -> Result<Vec<TranscriptSegment>> {
        let temp_dir = tempfile::Builder::new()
            .prefix("vodscribe-")
            .tempdir()
            .map_err(|e| PipelineError::Transcription(format!("creating temp dir: {}", e)))?;

        let result = self.run(video_id, source_url, temp_dir.path()).await;

        // Temp files must never leak; a failed release is an operational
        // hazard worth surfacing in logs
        if let Err(e) = temp_dir.close() {
            warn!("⚠️ Failed to remove temp dir for video {}: {}", video_id, e);
        }

        result
    }
}

impl TranscriptionAdapter {
    async fn run(&self, video_id: &str, source_url: &str, work_dir: &Path) -> Result<Vec<TranscriptSegment>> {
        let url = Url::parse(source_url)
            .map_err(|e| PipelineError::Transcription(format!("invalid source url: {}", e)))?;

        let video_path = work_dir.join("source_video");
        self.download(&url, &video_path).await?;

        let audio_path = work_dir.join("audio.wav");
        self.extract_audio(&video_path, &audio_path).await?;

        let raw = self.provider.transcribe(&audio_path).await?;
        let segments = validate_segments(video_id, raw);
        if segments.is_empty() {
            return Err(PipelineError::Transcription(format!(
                "no usable segments for video {}",
                video_id
            )));
        }

        info!("✅ Transcribed video {}: {} segments", video_id, segments.len());
        Ok(segments)
    }

    /// Stream the remote video into a local temp file
    async fn download(&self, url: &Url, dest: &Path) -> Result<()> {
        info!("⬇️ Downloading {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PipelineError::Transcription(format!("download failed: {}", e)))?
            .error_for_status()
            .map_err(|e| PipelineError::Transcription(format!("download failed: {}", e)))?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| PipelineError::Transcription(format!("creating temp video: {}", e)))?;

        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;
        while let Some(item) = stream.next().await {
            let bytes =
                item.map_err(|e| PipelineError::Transcription(format!("download failed: {}", e)))?;
            file.write_all(&bytes)
                .await
                .map_err(|e| PipelineError::Transcription(format!("writing temp video: {}", e)))?;
            bytes_written += bytes.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| PipelineError::Transcription(format!("writing temp video: {}", e)))?;

        debug!("Downloaded {:.1} MB to {}", bytes_written as f64 / 1_000_000.0, dest.display());
        Ok(())
    }

    /// Extract mono 16-bit PCM audio at the target sample rate via ffmpeg
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!("🎵 Extracting audio from {}", video_path.display());

        let status = tokio::process::Command::new("ffmpeg")
            .args([
                "-i",
                &video_path.to_string_lossy(),
                "-vn", // No video stream
                "-acodec",
                "pcm_s16le", // 16-bit PCM
                "-ar",
                &self.target_sample_rate.to_string(),
                "-ac",
                "1", // Mono channel
                "-f",
                "wav",
                "-y", // Overwrite existing
                &audio_path.to_string_lossy(),
            ])
            .status()
            .await
            .map_err(|e| {
                PipelineError::Transcription(format!(
                    "failed to run ffmpeg (is it installed?): {}",
                    e
                ))
            })?;

        if !status.success() {
            return Err(PipelineError::Transcription(format!(
                "audio extraction failed for {}",
                video_path.display()
            )));
        }

        Ok(())
    }
}

/// Filter provider output down to well-formed segments, ordered by start
///
/// A segment must have finite timestamps with end > start and non-empty
/// trimmed text. Invalid segments are dropped with a warning rather than
/// failing the whole transcript.
pub fn validate_segments(video_id: &str, raw: Vec<RawSegment>) -> Vec<TranscriptSegment> {
    let mut segments: Vec<TranscriptSegment> = raw
        .into_iter()
        .filter_map(|r| {
            let text = r.text.trim();
            let valid = r.start.is_finite()
                && r.end.is_finite()
                && r.start >= 0.0
                && r.end > r.start
                && !text.is_empty();
            if !valid {
                warn!(
                    "Dropping invalid segment for video {} (start={}, end={}, {} chars)",
                    video_id,
                    r.start,
                    r.end,
                    text.len()
                );
                return None;
            }
            Some(TranscriptSegment::new(video_id, r.start, r.end, text))
        })
        .collect();

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    segments
}
