//! End-to-end pipeline tests with an injected fake speech-to-text chain

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use vodscribe::chunker::ChunkerConfig;
use vodscribe::error::{PipelineError, Result};
use vodscribe::models::{JobPayload, TranscriptSegment, Video, VideoStatus};
use vodscribe::pipeline::{Pipeline, Worker};
use vodscribe::queue::JobQueue;
use vodscribe::store::{ChunkStore, MemoryStore, SegmentStore, VideoStore};
use vodscribe::transcription::Transcriber;

/// Stands in for the download -> extract -> provider chain
struct ScriptedTranscriber {
    segments: Vec<(f64, f64, String)>,
}

impl ScriptedTranscriber {
    fn new(segments: Vec<(f64, f64, String)>) -> Arc<Self> {
        Arc::new(Self { segments })
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, video_id: &str, _source_url: &str) -> Result<Vec<TranscriptSegment>> {
        if self.segments.is_empty() {
            return Err(PipelineError::Transcription(format!(
                "no usable segments for video {}",
                video_id
            )));
        }
        Ok(self
            .segments
            .iter()
            .map(|(s, e, t)| TranscriptSegment::new(video_id, *s, *e, t.clone()))
            .collect())
    }
}

fn sentence(words: usize) -> String {
    format!("{}.", vec!["word"; words].join(" "))
}

/// A lecture-shaped transcript: several spoken sentences with one long pause
fn lecture_segments() -> Vec<(f64, f64, String)> {
    vec![
        (0.0, 12.0, sentence(45)),
        (12.0, 25.0, sentence(40)), // 85 words + sentence end -> boundary
        (25.0, 40.0, sentence(45)),
        (43.5, 55.0, sentence(50)), // follows a 3.5s pause
        (55.0, 60.0, "And that wraps it up".to_string()),
    ]
}

async fn seed(store: &Arc<MemoryStore>, id: &str) {
    store
        .insert(Video::new(id, "Lecture 1", "https://cdn.example/lecture1.mp4", 3600))
        .await
        .unwrap();
}

fn build_pipeline(store: &Arc<MemoryStore>, transcriber: Arc<dyn Transcriber>) -> Arc<Pipeline> {
    Arc::new(Pipeline::new(
        store.clone(),
        store.clone(),
        store.clone(),
        transcriber,
        ChunkerConfig::default(),
    ))
}

#[tokio::test]
async fn test_full_pipeline_happy_path() {
    let store = MemoryStore::new();
    seed(&store, "vid-1").await;

    let queue = JobQueue::new(Duration::from_secs(30));
    let pipeline = build_pipeline(&store, ScriptedTranscriber::new(lecture_segments()));

    // Producer enqueues; the job is immediately visible
    queue
        .enqueue(JobPayload::process_video("vid-1"))
        .await
        .unwrap();
    assert_eq!(queue.stats().await.waiting, 1);

    // Worker consumes and runs the pipeline to completion
    let job = queue.consume().await;
    pipeline.process(&job).await.unwrap();
    queue.ack(job.id).await.unwrap();

    let video = store.fetch("vid-1").await.unwrap();
    assert_eq!(video.status, VideoStatus::Ready);

    let segments = SegmentStore::find_for_video(&*store, "vid-1").await.unwrap();
    assert_eq!(segments.len(), 5);

    let chunks = ChunkStore::find_for_video(&*store, "vid-1").await.unwrap();
    assert!(chunks.len() >= 2);

    // Chunks are ordered, non-overlapping, and cover the transcript
    for pair in chunks.windows(2) {
        assert!(pair[0].end <= pair[1].start);
    }
    assert_eq!(chunks.first().unwrap().start, 0.0);
    assert_eq!(chunks.last().unwrap().end, 60.0);

    // The retrieval path can resolve a timestamp to its covering chunk
    let hit = store.find_at_timestamp("vid-1", 30.0).await.unwrap();
    assert!(hit.contains(30.0));
    assert!(hit.embedding.is_none());

    let stats = queue.stats().await;
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.total, 1);
}

#[tokio::test]
async fn test_failed_transcription_leaves_video_failed_and_job_inspectable() {
    let store = MemoryStore::new();
    seed(&store, "vid-1").await;

    let queue = JobQueue::new(Duration::from_secs(30));
    let pipeline = build_pipeline(&store, ScriptedTranscriber::new(vec![]));

    queue
        .enqueue(JobPayload::process_video("vid-1"))
        .await
        .unwrap();

    let job = queue.consume().await;
    let err = pipeline.process(&job).await.unwrap_err();
    queue.fail(job.id, err.to_string()).await.unwrap();

    // The video status is the durable signal for API consumers
    let video = store.fetch("vid-1").await.unwrap();
    assert_eq!(video.status, VideoStatus::Failed);

    // No partial records were persisted
    assert!(SegmentStore::find_for_video(&*store, "vid-1")
        .await
        .unwrap()
        .is_empty());
    assert!(ChunkStore::find_for_video(&*store, "vid-1")
        .await
        .unwrap()
        .is_empty());

    // The failed job retains the error for the operator; no auto-retry
    let failed = queue.failed_jobs().await;
    assert_eq!(failed.len(), 1);
    assert!(failed[0]
        .error
        .as_deref()
        .unwrap()
        .contains("no usable segments"));
    assert_eq!(queue.stats().await.waiting, 0);
}

#[tokio::test]
async fn test_redelivery_after_stall_does_not_duplicate_records() {
    let store = MemoryStore::new();
    seed(&store, "vid-1").await;

    let queue = JobQueue::new(Duration::from_millis(50));
    let pipeline = build_pipeline(&store, ScriptedTranscriber::new(lecture_segments()));

    queue
        .enqueue(JobPayload::process_video("vid-1"))
        .await
        .unwrap();

    // First consumer claims the job, persists everything, then crashes
    // before acking
    let first = queue.consume().await;
    pipeline.process(&first).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;

    // Redelivery: the job comes back and the pipeline re-runs all stages
    let second = queue.consume().await;
    assert_eq!(second.id, first.id);
    assert_eq!(second.attempts, 2);
    pipeline.process(&second).await.unwrap();
    queue.ack(second.id).await.unwrap();

    // Delete-then-insert kept exactly one run's worth of records
    let segments = SegmentStore::find_for_video(&*store, "vid-1").await.unwrap();
    assert_eq!(segments.len(), 5);

    // Chunk count equals a single run's output, not doubled
    let expected = vodscribe::chunker::chunk_segments(&segments, &ChunkerConfig::default());
    let chunks = ChunkStore::find_for_video(&*store, "vid-1").await.unwrap();
    assert_eq!(chunks.len(), expected.len());
}

#[tokio::test]
async fn test_worker_loop_end_to_end_with_mixed_outcomes() {
    let store = MemoryStore::new();
    seed(&store, "vid-good").await;
    seed(&store, "vid-bad").await;

    let queue = JobQueue::new(Duration::from_secs(30));

    // vid-bad fails in transcription because its transcript is empty;
    // script per-video by keying off the id
    struct PerVideo;
    #[async_trait]
    impl Transcriber for PerVideo {
        async fn transcribe(
            &self,
            video_id: &str,
            _source_url: &str,
        ) -> Result<Vec<TranscriptSegment>> {
            if video_id == "vid-bad" {
                return Err(PipelineError::Transcription("corrupt audio stream".into()));
            }
            Ok(vec![TranscriptSegment::new(video_id, 0.0, 5.0, "Hello world.")])
        }
    }

    let pipeline = build_pipeline(&store, Arc::new(PerVideo));

    queue
        .enqueue(JobPayload::process_video("vid-good"))
        .await
        .unwrap();
    queue
        .enqueue(JobPayload::process_video("vid-bad"))
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_queue = queue.clone();
    let handle = tokio::spawn(async move {
        let mut worker = Worker::new(worker_queue, pipeline, "itest-worker");
        worker.run(shutdown_rx).await.unwrap();
        worker.stats().clone()
    });

    loop {
        let stats = queue.stats().await;
        if stats.completed + stats.failed == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    shutdown_tx.send(true).unwrap();
    let worker_stats = handle.await.unwrap();

    assert_eq!(worker_stats.jobs_processed, 1);
    assert_eq!(worker_stats.jobs_failed, 1);

    assert_eq!(
        store.fetch("vid-good").await.unwrap().status,
        VideoStatus::Ready
    );
    assert_eq!(
        store.fetch("vid-bad").await.unwrap().status,
        VideoStatus::Failed
    );

    let stats = queue.stats().await;
    assert_eq!(
        stats.total,
        stats.waiting + stats.active + stats.completed + stats.failed
    );
}
