//! Request batching with a bounded pull window
//!
//! This module groups concurrent prediction requests into batches to
//! amortize per-call inference overhead. A single background consumer
//! drains a lock-free queue; each additional pull is bounded by the
//! configured latency window.

use crate::classifier::Sentiment;
use crossbeam::queue::SegQueue;
use sentiloop_common::config::BatchingConfig;
use sentiloop_common::{Result, SentiloopError, METRICS};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{debug, trace};

/// One-shot result slot handed back to the caller on submit.
///
/// Fulfilled exactly once by the batch consumer, with either a result or
/// the error shared by the whole batch.
pub struct CompletionHandle {
    rx: oneshot::Receiver<Result<Sentiment>>,
}

impl CompletionHandle {
    /// Suspend until the owning batch completes or fails
    pub async fn wait(self) -> Result<Sentiment> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(SentiloopError::internal(
                "request dropped without a result",
            )),
        }
    }
}

/// A single prediction request waiting to be batched
pub struct PendingRequest {
    /// Input text
    pub text: String,

    /// Request arrival time
    pub enqueued_at: Instant,

    /// Write-once completion slot
    tx: oneshot::Sender<Result<Sentiment>>,
}

impl PendingRequest {
    fn new(text: String) -> (Self, CompletionHandle) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                text,
                enqueued_at: Instant::now(),
                tx,
            },
            CompletionHandle { rx },
        )
    }

    /// Fulfill the request. A send failure means the caller gave up
    /// waiting, which is not an error for the consumer.
    pub fn fulfill(self, result: Result<Sentiment>) {
        let _ = self.tx.send(result);
    }
}

/// Batched requests ready for dispatch
pub struct RequestBatch {
    /// Requests in arrival order
    pub requests: Vec<PendingRequest>,

    /// Batch creation time
    pub created_at: Instant,
}

impl RequestBatch {
    fn new() -> Self {
        Self {
            requests: Vec::new(),
            created_at: Instant::now(),
        }
    }

    fn add(&mut self, request: PendingRequest) {
        self.requests.push(request);
    }

    /// Get the batch size
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Check if the batch is empty
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Input texts in batch order
    pub fn texts(&self) -> Vec<String> {
        self.requests.iter().map(|r| r.text.clone()).collect()
    }

    /// Get the age of the batch (time since creation)
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Batch scheduler with a bounded queue and per-pull latency window.
///
/// Submissions beyond `max_queue_size` are rejected (admission control
/// rather than unbounded growth). The consumer dispatches a batch once
/// `max_batch_size` requests are collected or no further request arrives
/// within `max_latency` of the previous pull. An empty batch is never
/// dispatched.
pub struct BatchScheduler {
    /// Configuration
    config: BatchingConfig,

    /// Request queue (lock-free)
    queue: Arc<SegQueue<PendingRequest>>,

    /// Current queue depth
    queue_depth: Arc<AtomicUsize>,

    /// Shutdown flag
    shutdown: Arc<AtomicBool>,

    /// Notification for new requests
    notify: Arc<Notify>,
}

impl BatchScheduler {
    /// Create a new batch scheduler
    pub fn new(config: BatchingConfig) -> Self {
        Self {
            config,
            queue: Arc::new(SegQueue::new()),
            queue_depth: Arc::new(AtomicUsize::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Submit a request, returning its completion handle.
    ///
    /// Returns `QueueFull` when the queue is at capacity.
    pub fn submit(&self, text: String) -> Result<CompletionHandle> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(SentiloopError::internal("scheduler is shut down"));
        }

        // reserve a slot before pushing so racing producers cannot
        // overshoot the bound
        let reserved = self
            .queue_depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |depth| {
                (depth < self.config.max_queue_size).then_some(depth + 1)
            });
        let depth = match reserved {
            Ok(prev) => prev + 1,
            Err(_) => {
                return Err(SentiloopError::queue_full(
                    "request queue is full, rejecting new request",
                ));
            }
        };

        let (request, handle) = PendingRequest::new(text);
        self.queue.push(request);
        METRICS.batching.queue_depth.set(depth as i64);
        self.notify.notify_one();

        trace!("Request submitted, queue depth: {depth}");

        Ok(handle)
    }

    fn pop(&self) -> Option<PendingRequest> {
        let request = self.queue.pop()?;
        let depth = self
            .queue_depth
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        METRICS.batching.queue_depth.set(depth as i64);
        Some(request)
    }

    /// Get the next batch of requests.
    ///
    /// Blocks until at least one request is available, then keeps pulling
    /// until the batch fills or a pull window expires. Returns `None` only
    /// on shutdown, after failing any still-queued requests.
    pub async fn next_batch(&self) -> Option<RequestBatch> {
        let max_latency = Duration::from_millis(self.config.max_latency_ms);
        let mut batch = RequestBatch::new();

        // Wait for the first request of the batch
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                self.drain_pending();
                return None;
            }

            if let Some(request) = self.pop() {
                batch.add(request);
                break;
            }

            let _ = timeout(max_latency, self.notify.notified()).await;
        }

        // Keep pulling until the batch fills or no request arrives within
        // max_latency of the previous pull
        'collect: while batch.len() < self.config.max_batch_size {
            if let Some(request) = self.pop() {
                batch.add(request);
                continue;
            }

            let deadline = Instant::now() + max_latency;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break 'collect;
                }
                if timeout(remaining, self.notify.notified()).await.is_err() {
                    break 'collect;
                }
                if let Some(request) = self.pop() {
                    batch.add(request);
                    // window restarts from this pull
                    break;
                }
            }
        }

        debug!(
            "Created batch: {} requests, age: {:?}",
            batch.len(),
            batch.age()
        );

        Some(batch)
    }

    /// Get the current queue depth
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// Shutdown the scheduler and wake the consumer
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.notify.notify_waiters();
    }

    /// Fail every still-queued request so no handle is left pending
    fn drain_pending(&self) {
        while let Some(request) = self.pop() {
            request.fulfill(Err(SentiloopError::internal("service shutting down")));
        }
    }
}
