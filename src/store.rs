//! Document-store interfaces consumed by the pipeline
//!
//! The persistence layer is an external collaborator; the pipeline only sees
//! these traits. The in-memory implementation backs tests and single-process
//! deployments, and is safe for concurrent access from multiple worker tasks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::models::{Chunk, TranscriptSegment, Video, VideoStatus};

/// Video source store: lookup and status transitions
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<Video>;
    async fn insert(&self, video: Video) -> Result<()>;
    async fn update_status(&self, id: &str, status: VideoStatus) -> Result<()>;
}

/// Transcript segment store, replaced wholesale per pipeline run
#[async_trait]
pub trait SegmentStore: Send + Sync {
    async fn delete_for_video(&self, video_id: &str) -> Result<()>;
    async fn insert_many(&self, segments: Vec<TranscriptSegment>) -> Result<()>;
    /// Segments ordered by start ascending
    async fn find_for_video(&self, video_id: &str) -> Result<Vec<TranscriptSegment>>;
}

/// Chunk store, replaced wholesale per pipeline run
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn delete_for_video(&self, video_id: &str) -> Result<()>;
    async fn insert_many(&self, chunks: Vec<Chunk>) -> Result<()>;
    /// Chunks ordered by start ascending
    async fn find_for_video(&self, video_id: &str) -> Result<Vec<Chunk>>;
    /// Range lookup (start <= t <= end) for the summary/chat path
    async fn find_at_timestamp(&self, video_id: &str, t: f64) -> Result<Chunk>;
}

/// In-memory reference implementation of all three stores
#[derive(Default)]
pub struct MemoryStore {
    videos: RwLock<HashMap<String, Video>>,
    segments: RwLock<HashMap<String, Vec<TranscriptSegment>>>,
    chunks: RwLock<HashMap<String, Vec<Chunk>>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl VideoStore for MemoryStore {
    async fn fetch(&self, id: &str) -> Result<Video> {
        self.videos
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("video {}", id)))
    }

    async fn insert(&self, video: Video) -> Result<()> {
        self.videos.write().await.insert(video.id.clone(), video);
        Ok(())
    }

    async fn update_status(&self, id: &str, status: VideoStatus) -> Result<()> {
        let mut videos = self.videos.write().await;
        let video = videos
            .get_mut(id)
            .ok_or_else(|| PipelineError::NotFound(format!("video {}", id)))?;
        debug!("📝 Video {} status: {} -> {}", id, video.status, status);
        video.status = status;
        video.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl SegmentStore for MemoryStore {
    async fn delete_for_video(&self, video_id: &str) -> Result<()> {
        self.segments.write().await.remove(video_id);
        Ok(())
    }

    async fn insert_many(&self, segments: Vec<TranscriptSegment>) -> Result<()> {
        let mut by_video = self.segments.write().await;
        for segment in segments {
            by_video
                .entry(segment.video_id.clone())
                .or_default()
                .push(segment);
        }
        for list in by_video.values_mut() {
            list.sort_by(|a, b| a.start.total_cmp(&b.start));
        }
        Ok(())
    }

    async fn find_for_video(&self, video_id: &str) -> Result<Vec<TranscriptSegment>> {
        Ok(self
            .segments
            .read()
            .await
            .get(video_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn delete_for_video(&self, video_id: &str) -> Result<()> {
        self.chunks.write().await.remove(video_id);
        Ok(())
    }

    async fn insert_many(&self, chunks: Vec<Chunk>) -> Result<()> {
        let mut by_video = self.chunks.write().await;
        for chunk in chunks {
            by_video
                .entry(chunk.video_id.clone())
                .or_default()
                .push(chunk);
        }
        for list in by_video.values_mut() {
            list.sort_by(|a, b| a.start.total_cmp(&b.start));
        }
        Ok(())
    }

    async fn find_for_video(&self, video_id: &str) -> Result<Vec<Chunk>> {
        Ok(self
            .chunks
            .read()
            .await
            .get(video_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_at_timestamp(&self, video_id: &str, t: f64) -> Result<Chunk> {
        self.chunks
            .read()
            .await
            .get(video_id)
            .and_then(|list| list.iter().find(|c| c.contains(t)))
            .cloned()
            .ok_or_else(|| {
                PipelineError::NotFound(format!("no chunk of video {} covers t={}", video_id, t))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment::new("vid-1", start, end, text)
    }

    #[tokio::test]
    async fn test_fetch_missing_video_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.fetch("nope").await,
            Err(PipelineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_status_touches_updated_at() {
        let store = MemoryStore::new();
        let video = Video::new("vid-1", "Test", "https://cdn.example/v.mp4", 120);
        let created = video.created_at;
        store.insert(video).await.unwrap();

        store
            .update_status("vid-1", VideoStatus::Ready)
            .await
            .unwrap();
        let video = store.fetch("vid-1").await.unwrap();
        assert_eq!(video.status, VideoStatus::Ready);
        assert!(video.updated_at >= created);
    }

    #[tokio::test]
    async fn test_segments_returned_in_start_order() {
        let store = MemoryStore::new();
        SegmentStore::insert_many(
            &*store,
            vec![seg(10.0, 15.0, "second"), seg(0.0, 5.0, "first")],
        )
        .await
        .unwrap();

        let found = SegmentStore::find_for_video(&*store, "vid-1").await.unwrap();
        assert_eq!(found[0].text, "first");
        assert_eq!(found[1].text, "second");
    }

    #[tokio::test]
    async fn test_delete_then_insert_replaces() {
        let store = MemoryStore::new();
        SegmentStore::insert_many(&*store, vec![seg(0.0, 5.0, "old")])
            .await
            .unwrap();

        SegmentStore::delete_for_video(&*store, "vid-1").await.unwrap();
        SegmentStore::insert_many(&*store, vec![seg(0.0, 5.0, "new")])
            .await
            .unwrap();

        let found = SegmentStore::find_for_video(&*store, "vid-1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "new");
    }

    #[tokio::test]
    async fn test_find_chunk_at_timestamp() {
        let store = MemoryStore::new();
        let chunk = |start: f64, end: f64| Chunk {
            video_id: "vid-1".to_string(),
            start,
            end,
            text: "text".to_string(),
            embedding: None,
        };
        ChunkStore::insert_many(&*store, vec![chunk(0.0, 10.0), chunk(10.5, 20.0)])
            .await
            .unwrap();

        let hit = store.find_at_timestamp("vid-1", 12.0).await.unwrap();
        assert_eq!(hit.start, 10.5);

        // Timestamp falls in the gap between chunks
        assert!(store.find_at_timestamp("vid-1", 10.2).await.is_err());
    }
}
