/// vodscribe - asynchronous video transcription pipeline
///
/// Ingests an uploaded video through a durable job queue, produces a
/// time-aligned transcript, splits it into semantically coherent chunks,
/// and persists both for downstream summarization and retrieval.

pub mod chunker;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod store;
pub mod transcription;

// Re-export main types for easy access
pub use crate::chunker::{chunk_segments, ChunkerConfig};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{PipelineError, Result};
pub use crate::models::{Chunk, JobPayload, TranscriptSegment, Video, VideoStatus};
pub use crate::pipeline::{Pipeline, Worker, WorkerStats};
pub use crate::queue::{Job, JobHandle, JobQueue, QueueStats};
pub use crate::store::{ChunkStore, MemoryStore, SegmentStore, VideoStore};
pub use crate::transcription::{
    HttpSpeechToText, RawSegment, SpeechToText, Transcriber, TranscriptionAdapter,
};
