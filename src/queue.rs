//! Durable-interface job queue with at-least-once delivery
//!
//! Reference in-memory backend behind the queue contract: approximate FIFO
//! per job type, lease-based stalled-job redelivery, and terminal
//! completed/failed records retained for operator inspection. The queue
//! client is injected into producers and workers explicitly; there is no
//! process-wide singleton.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::models::JobPayload;

/// A unit of queued work as seen by a consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Queue-assigned identifier
    pub id: u64,
    pub payload: JobPayload,
    /// Number of times this job has been delivered to a consumer
    pub attempts: u32,
    /// Error detail attached when the job failed
    pub error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

/// Handle returned to the producer at enqueue time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHandle {
    pub id: u64,
}

/// Point-in-time queue counters; total is the sum of the four states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

struct ActiveJob {
    job: Job,
    claimed_at: Instant,
}

#[derive(Default)]
struct QueueInner {
    next_id: u64,
    waiting: VecDeque<Job>,
    active: HashMap<u64, ActiveJob>,
    completed: Vec<Job>,
    failed: Vec<Job>,
}

impl QueueInner {
    /// Move lease-expired active jobs back to the front of the waiting line
    fn reclaim_stalled(&mut self, lease_timeout: Duration) {
        let stalled: Vec<u64> = self
            .active
            .iter()
            .filter(|(_, a)| a.claimed_at.elapsed() >= lease_timeout)
            .map(|(id, _)| *id)
            .collect();

        for id in stalled {
            if let Some(active) = self.active.remove(&id) {
                warn!(
                    "⏰ Job {} stalled after {} attempt(s), requeueing",
                    id, active.job.attempts
                );
                self.waiting.push_front(active.job);
            }
        }
    }
}

/// In-memory job queue client
///
/// Cloning shares the underlying queue state, so a producer and any number
/// of worker tasks can hold their own handle.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Mutex<QueueInner>>,
    notify: Arc<Notify>,
    lease_timeout: Duration,
}

impl JobQueue {
    pub fn new(lease_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner::default())),
            notify: Arc::new(Notify::new()),
            lease_timeout,
        }
    }

    /// Enqueue a validated payload; the job is visible to consumers before
    /// this returns
    pub async fn enqueue(&self, payload: JobPayload) -> Result<JobHandle> {
        payload.validate()?;

        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = inner.next_id;
        let job = Job {
            id,
            payload,
            attempts: 0,
            error: None,
            enqueued_at: Utc::now(),
        };

        debug!("📥 Enqueued job {} for video {}", id, job.payload.video_id);
        inner.waiting.push_back(job);
        drop(inner);

        self.notify.notify_one();
        Ok(JobHandle { id })
    }

    /// Block until a job is available and claim it
    ///
    /// At-least-once delivery: a job claimed by a consumer that never acks
    /// within the lease window is redelivered, so every pipeline stage must
    /// be safe to re-run from scratch.
    pub async fn consume(&self) -> Job {
        loop {
            {
                let mut inner = self.inner.lock().await;
                inner.reclaim_stalled(self.lease_timeout);

                if let Some(mut job) = inner.waiting.pop_front() {
                    job.attempts += 1;
                    let claimed = job.clone();
                    inner.active.insert(
                        job.id,
                        ActiveJob {
                            job,
                            claimed_at: Instant::now(),
                        },
                    );
                    return claimed;
                }
            }

            // Wake on enqueue, or periodically to re-check for stalled leases
            let _ = tokio::time::timeout(self.lease_timeout, self.notify.notified()).await;
        }
    }

    /// Mark a claimed job completed
    pub async fn ack(&self, job_id: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.active.remove(&job_id) {
            Some(active) => {
                inner.completed.push(active.job);
                Ok(())
            }
            None => {
                // Lease expired and the job was reclaimed, or an admin purged it
                warn!("Ack for job {} which is no longer active, ignoring", job_id);
                Ok(())
            }
        }
    }

    /// Mark a claimed job failed, retaining the error detail for inspection
    ///
    /// Reference policy: attempt once, report failure, leave the video in
    /// failed status for manual re-trigger. No automatic retry.
    pub async fn fail(&self, job_id: u64, error: impl Into<String>) -> Result<()> {
        let error = error.into();
        let mut inner = self.inner.lock().await;
        match inner.active.remove(&job_id) {
            Some(mut active) => {
                active.job.error = Some(error);
                inner.failed.push(active.job);
                Ok(())
            }
            None => {
                warn!("Fail for job {} which is no longer active, ignoring", job_id);
                Ok(())
            }
        }
    }

    /// Point-in-time counters across all job states
    pub async fn stats(&self) -> QueueStats {
        let inner = self.inner.lock().await;
        let waiting = inner.waiting.len();
        let active = inner.active.len();
        let completed = inner.completed.len();
        let failed = inner.failed.len();
        QueueStats {
            waiting,
            active,
            completed,
            failed,
            total: waiting + active + completed + failed,
        }
    }

    /// Failed jobs retained for operator inspection
    pub async fn failed_jobs(&self) -> Vec<Job> {
        let inner = self.inner.lock().await;
        inner.failed.clone()
    }

    /// Administrative bulk clear
    ///
    /// Waiting and active jobs are removed unconditionally; completed and
    /// failed records only when the corresponding flag is set. Idempotent:
    /// purging an empty queue succeeds trivially.
    pub async fn purge(&self, include_failed: bool, include_completed: bool) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        let mut removed = inner.waiting.len() + inner.active.len();
        inner.waiting.clear();
        inner.active.clear();

        if include_completed {
            removed += inner.completed.len();
            inner.completed.clear();
        }
        if include_failed {
            removed += inner.failed.len();
            inner.failed.clear();
        }

        info!("🧹 Purged {} job(s) from queue", removed);
        Ok(removed)
    }

    /// Re-enqueue the payload of a failed job, dropping the failed record
    pub async fn retry_failed(&self, job_id: u64) -> Result<JobHandle> {
        let payload = {
            let mut inner = self.inner.lock().await;
            let pos = inner
                .failed
                .iter()
                .position(|j| j.id == job_id)
                .ok_or_else(|| {
                    PipelineError::Queue(format!("no failed job with id {}", job_id))
                })?;
            inner.failed.remove(pos).payload
        };
        self.enqueue(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(video_id: &str) -> JobPayload {
        JobPayload::process_video(video_id)
    }

    #[tokio::test]
    async fn test_enqueue_consume_ack() {
        let queue = JobQueue::new(Duration::from_secs(30));
        let handle = queue.enqueue(payload("vid-1")).await.unwrap();

        let job = queue.consume().await;
        assert_eq!(job.id, handle.id);
        assert_eq!(job.payload.video_id, "vid-1");
        assert_eq!(job.attempts, 1);

        queue.ack(job.id).await.unwrap();
        let stats = queue.stats().await;
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.active, 0);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_malformed_payload() {
        let queue = JobQueue::new(Duration::from_secs(30));
        let mut bad = payload("vid-1");
        bad.kind = "mystery".to_string();
        assert!(matches!(
            queue.enqueue(bad).await,
            Err(PipelineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = JobQueue::new(Duration::from_secs(30));
        for i in 0..3 {
            queue.enqueue(payload(&format!("vid-{}", i))).await.unwrap();
        }
        for i in 0..3 {
            let job = queue.consume().await;
            assert_eq!(job.payload.video_id, format!("vid-{}", i));
            queue.ack(job.id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_stats_total_is_sum_of_states() {
        let queue = JobQueue::new(Duration::from_secs(30));
        for i in 0..4 {
            queue.enqueue(payload(&format!("vid-{}", i))).await.unwrap();
        }

        let a = queue.consume().await;
        let b = queue.consume().await;
        queue.ack(a.id).await.unwrap();
        queue.fail(b.id, "provider exploded").await.unwrap();
        let _held = queue.consume().await;

        let stats = queue.stats().await;
        assert_eq!(stats.waiting, 1);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(
            stats.total,
            stats.waiting + stats.active + stats.completed + stats.failed
        );
    }

    #[tokio::test]
    async fn test_stalled_job_is_redelivered() {
        let queue = JobQueue::new(Duration::from_millis(50));
        queue.enqueue(payload("vid-1")).await.unwrap();

        // First consumer claims the job and then "crashes" without acking
        let first = queue.consume().await;
        assert_eq!(first.attempts, 1);

        tokio::time::sleep(Duration::from_millis(80)).await;

        let second = queue.consume().await;
        assert_eq!(second.id, first.id);
        assert_eq!(second.attempts, 2);

        // Ack from the dead consumer is ignored without poisoning state
        queue.ack(second.id).await.unwrap();
        queue.ack(first.id).await.unwrap();
        assert_eq!(queue.stats().await.completed, 1);
    }

    #[tokio::test]
    async fn test_failed_jobs_retained_with_error() {
        let queue = JobQueue::new(Duration::from_secs(30));
        queue.enqueue(payload("vid-1")).await.unwrap();
        let job = queue.consume().await;
        queue.fail(job.id, "download failed: 403").await.unwrap();

        let failed = queue.failed_jobs().await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error.as_deref(), Some("download failed: 403"));
    }

    #[tokio::test]
    async fn test_purge_flags() {
        let queue = JobQueue::new(Duration::from_secs(30));
        for i in 0..4 {
            queue.enqueue(payload(&format!("vid-{}", i))).await.unwrap();
        }
        let a = queue.consume().await;
        let b = queue.consume().await;
        queue.ack(a.id).await.unwrap();
        queue.fail(b.id, "boom").await.unwrap();

        // Waiting removed unconditionally; terminal records kept
        let removed = queue.purge(false, false).await.unwrap();
        assert_eq!(removed, 2);
        let stats = queue.stats().await;
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);

        let removed = queue.purge(true, true).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(queue.stats().await.total, 0);

        // Idempotent on an empty queue
        assert_eq!(queue.purge(true, true).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_retry_failed_reenqueues_payload() {
        let queue = JobQueue::new(Duration::from_secs(30));
        queue.enqueue(payload("vid-1")).await.unwrap();
        let job = queue.consume().await;
        queue.fail(job.id, "boom").await.unwrap();

        queue.retry_failed(job.id).await.unwrap();
        let stats = queue.stats().await;
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.waiting, 1);

        let retried = queue.consume().await;
        assert_eq!(retried.payload.video_id, "vid-1");
        assert!(queue.retry_failed(999).await.is_err());
    }
}
