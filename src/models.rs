//! Core data model: videos, transcript segments, chunks, and job payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Job kind for the video processing pipeline
pub const PROCESS_VIDEO_KIND: &str = "process-video";

/// Current job payload schema version
pub const JOB_PAYLOAD_VERSION: u32 = 1;

/// Processing status of a video, the sole durable signal of pipeline outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    /// Upload accepted, pipeline not yet finished
    Processing,
    /// Transcript and chunks persisted, ready for summaries and chat
    Ready,
    /// Pipeline failed; requires manual re-trigger
    Failed,
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// An uploaded video tracked through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Location of the uploaded video in object storage
    pub source_url: String,
    /// Duration in whole seconds, at least 1
    pub duration_secs: u64,
    pub status: VideoStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Create a new video in `processing` status
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        source_url: impl Into<String>,
        duration_secs: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            source_url: source_url.into(),
            duration_secs,
            status: VideoStatus::Processing,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A single timestamped line of transcribed speech
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub video_id: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds, strictly greater than start
    pub end: f64,
    /// Transcribed text, non-empty after trimming
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(video_id: impl Into<String>, start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            start,
            end,
            text: text.into(),
        }
    }

    /// Whitespace-delimited word count of the trimmed text
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// A merged run of consecutive segments, the retrieval and summarization unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub video_id: String,
    /// Start of the first constituent segment
    pub start: f64,
    /// End of the last constituent segment
    pub end: f64,
    /// Space-joined trimmed segment texts
    pub text: String,
    /// Embedding vector attached by downstream enrichment, absent initially
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Whether a timestamp falls inside this chunk (start <= t <= end)
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Tagged, versioned job payload shared through the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub kind: String,
    pub version: u32,
    pub video_id: String,
}

impl JobPayload {
    /// Build a process-video payload for the current schema version
    pub fn process_video(video_id: impl Into<String>) -> Self {
        Self {
            kind: PROCESS_VIDEO_KIND.to_string(),
            version: JOB_PAYLOAD_VERSION,
            video_id: video_id.into(),
        }
    }

    /// Validate the payload before it is accepted by the queue
    pub fn validate(&self) -> Result<()> {
        if self.kind != PROCESS_VIDEO_KIND {
            return Err(PipelineError::Validation(format!(
                "unknown job kind: {}",
                self.kind
            )));
        }
        if self.version != JOB_PAYLOAD_VERSION {
            return Err(PipelineError::Validation(format!(
                "unsupported payload version: {}",
                self.version
            )));
        }
        if self.video_id.trim().is_empty() {
            return Err(PipelineError::Validation(
                "job payload has empty video id".to_string(),
            ));
        }
        Ok(())
    }
}
