//! Prediction facade
//!
//! `SentimentService` is the single entry point: it validates input, owns
//! the batch scheduler and its consumer task, the model lifecycle manager,
//! and the artifact change watcher.

use crate::batching::{BatchScheduler, RequestBatch};
use crate::classifier::{ModelLoader, Sentiment};
use crate::lifecycle::ModelManager;
use crate::watcher::ChangeWatcher;
use sentiloop_common::{Result, SentiloopError, ServiceConfig, METRICS};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The assembled prediction service
pub struct SentimentService {
    scheduler: Arc<BatchScheduler>,
    manager: Arc<ModelManager>,
    consumer: JoinHandle<()>,
    watcher: Option<ChangeWatcher>,
}

impl SentimentService {
    /// Load the initial model and start the batch consumer and artifact
    /// watcher. Fails when no model can be loaded (first-boot policy).
    pub async fn start(config: ServiceConfig, loader: Box<dyn ModelLoader>) -> Result<Self> {
        config.validate()?;

        let manager = Arc::new(ModelManager::new(config.model.clone(), loader));
        manager.load().await?;

        let scheduler = Arc::new(BatchScheduler::new(config.batching.clone()));
        let consumer = tokio::spawn(run_batch_loop(scheduler.clone(), manager.clone()));

        let watcher = ChangeWatcher::spawn(&config.watcher, &config.model, manager.clone())?;

        info!("Sentiment service started");

        Ok(Self {
            scheduler,
            manager,
            consumer,
            watcher: Some(watcher),
        })
    }

    /// Predict the sentiment of a single text.
    ///
    /// Empty or whitespace-only input is rejected synchronously and never
    /// reaches the queue. Otherwise the call suspends until the request's
    /// batch completes or fails.
    pub async fn predict(&self, text: &str) -> Result<Sentiment> {
        if text.trim().is_empty() {
            METRICS.prediction.requests_rejected.inc();
            return Err(SentiloopError::invalid_input("text input cannot be empty"));
        }

        METRICS.prediction.requests_total.inc();
        METRICS.prediction.active_requests.inc();
        let start = Instant::now();

        let handle = match self.scheduler.submit(text.to_string()) {
            Ok(handle) => handle,
            Err(e) => {
                // admission-control rejection, not a served-then-failed request
                METRICS.prediction.requests_rejected.inc();
                METRICS.prediction.active_requests.dec();
                return Err(e);
            }
        };

        let result = handle.wait().await;

        METRICS.prediction.active_requests.dec();
        METRICS
            .prediction
            .request_duration
            .observe(start.elapsed().as_secs_f64());
        if result.is_err() {
            METRICS.prediction.requests_failed.inc();
        }

        result
    }

    /// The lifecycle manager, for operational introspection
    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }

    /// Stop the watcher and the batch consumer. Still-queued requests are
    /// failed rather than left pending.
    pub async fn shutdown(mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.stop();
        }
        self.scheduler.shutdown();
        if let Err(e) = self.consumer.await {
            warn!("Batch consumer did not stop cleanly: {e}");
        }
        info!("Sentiment service stopped");
    }
}

/// Drain batches from the scheduler until shutdown
pub(crate) async fn run_batch_loop(scheduler: Arc<BatchScheduler>, manager: Arc<ModelManager>) {
    while let Some(batch) = scheduler.next_batch().await {
        dispatch_batch(batch, &manager).await;
    }
    debug!("Batch consumer stopped");
}

/// Run one batch through the model and fan results out positionally.
///
/// On inference failure every request in the batch receives the same
/// error; there is no partial-batch success.
async fn dispatch_batch(batch: RequestBatch, manager: &ModelManager) {
    let texts = batch.texts();

    METRICS.batching.batches_total.inc();
    METRICS.batching.batch_size.observe(batch.len() as f64);
    for request in &batch.requests {
        METRICS
            .batching
            .queue_time
            .observe(request.enqueued_at.elapsed().as_secs_f64());
    }

    let start = Instant::now();
    match manager.predict_batch(&texts).await {
        Ok(results) if results.len() == batch.len() => {
            let elapsed = start.elapsed();
            METRICS
                .batching
                .inference_duration
                .observe(elapsed.as_secs_f64());
            debug!("Processed batch of {} requests in {elapsed:?}", batch.len());

            for (request, result) in batch.requests.into_iter().zip(results) {
                request.fulfill(Ok(result));
            }
        }
        Ok(results) => {
            let err = SentiloopError::inference(format!(
                "model returned {} results for {} inputs",
                results.len(),
                batch.len()
            ));
            error!("{err}");
            for request in batch.requests {
                request.fulfill(Err(err.for_fanout()));
            }
        }
        Err(e) => {
            warn!("Error processing batch of {} requests: {e}", batch.len());
            for request in batch.requests {
                request.fulfill(Err(e.for_fanout()));
            }
        }
    }
}
