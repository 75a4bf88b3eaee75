//! Metrics collection for Sentiloop
//!
//! This module provides Prometheus metrics for observability.
//! All metrics are carefully designed to minimize overhead in the hot path.

use lazy_static::lazy_static;
use prometheus::{Histogram, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics registry for Sentiloop
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub prediction: PredictionMetrics,
    pub batching: BatchingMetrics,
    pub model: ModelMetrics,
}

/// Prediction-related metrics
#[derive(Debug, Clone)]
pub struct PredictionMetrics {
    /// Total number of prediction requests
    pub requests_total: IntCounter,

    /// Total number of rejected requests (invalid input or queue full)
    pub requests_rejected: IntCounter,

    /// Total number of failed requests
    pub requests_failed: IntCounter,

    /// End-to-end request duration histogram
    pub request_duration: Histogram,

    /// Current in-flight requests
    pub active_requests: IntGauge,
}

/// Batching-related metrics
#[derive(Debug, Clone)]
pub struct BatchingMetrics {
    /// Batches dispatched total
    pub batches_total: IntCounter,

    /// Batch size histogram
    pub batch_size: Histogram,

    /// Current queue depth
    pub queue_depth: IntGauge,

    /// Time requests spend queued before dispatch
    pub queue_time: Histogram,

    /// Batch inference duration
    pub inference_duration: Histogram,
}

/// Model lifecycle metrics
#[derive(Debug, Clone)]
pub struct ModelMetrics {
    /// Successful model loads (initial and reloads)
    pub loads_total: IntCounter,

    /// Failed model loads
    pub load_failures_total: IntCounter,

    /// Model load duration
    pub load_duration: Histogram,

    /// Epoch of the currently served model
    pub model_epoch: IntGauge,
}

lazy_static! {
    /// Global metrics registry instance
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        // Prediction metrics
        let requests_total = IntCounter::new(
            "prediction_requests_total",
            "Total number of prediction requests",
        )
        .unwrap();

        let requests_rejected = IntCounter::new(
            "prediction_requests_rejected_total",
            "Total number of requests rejected before queueing",
        )
        .unwrap();

        let requests_failed = IntCounter::new(
            "prediction_requests_failed_total",
            "Total number of failed prediction requests",
        )
        .unwrap();

        let request_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "prediction_request_duration_seconds",
                "End-to-end prediction request duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )
        .unwrap();

        let active_requests = IntGauge::new(
            "prediction_active_requests",
            "Current number of in-flight prediction requests",
        )
        .unwrap();

        // Batching metrics
        let batches_total =
            IntCounter::new("batching_batches_total", "Total number of batches dispatched")
                .unwrap();

        let batch_size = Histogram::with_opts(
            prometheus::HistogramOpts::new("batching_batch_size", "Batch size distribution")
                .buckets(vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0]),
        )
        .unwrap();

        let queue_depth =
            IntGauge::new("batching_queue_depth", "Current depth of the request queue").unwrap();

        let queue_time = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "batching_queue_time_seconds",
                "Time requests spend in queue before dispatch",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1]),
        )
        .unwrap();

        let inference_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "batching_inference_duration_seconds",
                "Batch inference duration in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        )
        .unwrap();

        // Model metrics
        let loads_total =
            IntCounter::new("model_loads_total", "Total number of successful model loads")
                .unwrap();

        let load_failures_total =
            IntCounter::new("model_load_failures_total", "Total number of failed model loads")
                .unwrap();

        let load_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "model_load_duration_seconds",
                "Model load duration in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )
        .unwrap();

        let model_epoch =
            IntGauge::new("model_epoch", "Epoch of the currently served model").unwrap();

        // Register all metrics
        registry.register(Box::new(requests_total.clone())).unwrap();
        registry.register(Box::new(requests_rejected.clone())).unwrap();
        registry.register(Box::new(requests_failed.clone())).unwrap();
        registry.register(Box::new(request_duration.clone())).unwrap();
        registry.register(Box::new(active_requests.clone())).unwrap();

        registry.register(Box::new(batches_total.clone())).unwrap();
        registry.register(Box::new(batch_size.clone())).unwrap();
        registry.register(Box::new(queue_depth.clone())).unwrap();
        registry.register(Box::new(queue_time.clone())).unwrap();
        registry.register(Box::new(inference_duration.clone())).unwrap();

        registry.register(Box::new(loads_total.clone())).unwrap();
        registry.register(Box::new(load_failures_total.clone())).unwrap();
        registry.register(Box::new(load_duration.clone())).unwrap();
        registry.register(Box::new(model_epoch.clone())).unwrap();

        let prediction = PredictionMetrics {
            requests_total,
            requests_rejected,
            requests_failed,
            request_duration,
            active_requests,
        };

        let batching = BatchingMetrics {
            batches_total,
            batch_size,
            queue_depth,
            queue_time,
            inference_duration,
        };

        let model = ModelMetrics {
            loads_total,
            load_failures_total,
            load_duration,
            model_epoch,
        };

        MetricsRegistry {
            registry,
            prediction,
            batching,
            model,
        }
    }

    /// Gather all metrics in the Prometheus text exposition format
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        let _ = encoder.encode(&self.registry.gather(), &mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_once() {
        let metrics = MetricsRegistry::new();
        metrics.prediction.requests_total.inc();
        metrics.batching.batch_size.observe(3.0);
        metrics.model.model_epoch.set(1);

        let exported = metrics.gather();
        assert!(exported.contains("prediction_requests_total"));
        assert!(exported.contains("batching_batch_size"));
        assert!(exported.contains("model_epoch"));
    }

    #[test]
    fn test_global_registry_accessible() {
        METRICS.prediction.active_requests.set(0);
        assert_eq!(METRICS.prediction.active_requests.get(), 0);
    }
}
