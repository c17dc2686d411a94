//! Transcription: speech-to-text provider seam and the pipeline-facing adapter

pub mod adapter;
pub mod srt;

pub use adapter::TranscriptionAdapter;
pub use srt::{SrtEntry, SrtGenerator};

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::TranscriptionConfig;
use crate::error::{PipelineError, Result};
use crate::models::TranscriptSegment;

/// The adapter contract the pipeline consumes: source URL in, ordered
/// validated segments out
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, video_id: &str, source_url: &str)
        -> Result<Vec<TranscriptSegment>>;
}

/// A raw segment as returned by a speech-to-text provider, prior to validation
#[derive(Debug, Clone, Deserialize)]
pub struct RawSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// External speech-to-text provider
///
/// Implementations receive a local audio file and return segment-level
/// timestamped text. Timeout handling belongs to the provider client, not
/// the pipeline.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<RawSegment>>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    segments: Vec<RawSegment>,
}

/// Whisper-style HTTP transcription provider (multipart audio upload)
pub struct HttpSpeechToText {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpSpeechToText {
    pub fn new(config: &TranscriptionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PipelineError::Transcription(format!("HTTP client setup: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.api_endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl SpeechToText for HttpSpeechToText {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<RawSegment>> {
        let file_bytes = tokio::fs::read(audio_path)
            .await
            .map_err(|e| PipelineError::Transcription(format!("reading audio file: {}", e)))?;
        let filename = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.wav".to_string());

        info!(
            "🎤 Uploading {:.1} MB of audio to {}",
            file_bytes.len() as f64 / 1_000_000.0,
            self.endpoint
        );

        let part = reqwest::multipart::Part::bytes(file_bytes)
            .file_name(filename)
            .mime_str("audio/wav")
            .map_err(|e| PipelineError::Transcription(format!("building upload: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Transcription(format!("provider request: {}", e)))?
            .error_for_status()
            .map_err(|e| PipelineError::Transcription(format!("provider error: {}", e)))?;

        let parsed: TranscriptionResponse = response.json().await.map_err(|e| {
            PipelineError::Transcription(format!("malformed provider response: {}", e))
        })?;

        debug!("Provider returned {} raw segments", parsed.segments.len());
        Ok(parsed.segments)
    }
}
