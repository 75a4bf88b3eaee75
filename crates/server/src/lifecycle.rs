//! Model lifecycle management
//!
//! This module owns the currently active model handle. A single exclusive
//! lock guards both model replacement and model invocation, so a reload
//! never observes or produces a partially-constructed model and inference
//! never runs against a model mid-swap.

use crate::classifier::{Classifier, ModelLoader, ModelSource, Sentiment};
use sentiloop_common::config::ModelConfig;
use sentiloop_common::{Result, METRICS};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// A loaded model with its provenance and load epoch
pub struct ModelHandle {
    classifier: Box<dyn Classifier>,

    /// Monotonic load counter, starting at 1 for the first successful load
    pub epoch: u64,

    /// Where this model came from
    pub source: ModelSource,
}

/// Owns the active model and serializes swap against use.
///
/// `reload` resolves the model source on every call: the fine-tuned
/// artifact directory when its weights marker file exists, otherwise the
/// configured pretrained baseline. A failed reload keeps the prior model
/// serving; only a first-boot failure (no prior model) is fatal.
pub struct ModelManager {
    config: ModelConfig,
    loader: Box<dyn ModelLoader>,

    /// The single swap/use lock. Batch inference and reload contend here.
    current: Mutex<Option<ModelHandle>>,

    epoch: AtomicU64,
}

impl ModelManager {
    /// Create a manager with no model loaded yet
    pub fn new(config: ModelConfig, loader: Box<dyn ModelLoader>) -> Self {
        Self {
            config,
            loader,
            current: Mutex::new(None),
            epoch: AtomicU64::new(0),
        }
    }

    /// Initial model load. Fails the whole startup when no model can be
    /// loaded and none is active.
    pub async fn load(&self) -> Result<()> {
        self.reload().await
    }

    /// Load the resolved model source and atomically replace the current
    /// handle on success.
    ///
    /// On failure with a prior model, the prior model stays current and
    /// the failure is downgraded to a logged warning. On failure with no
    /// prior model, the error propagates.
    pub async fn reload(&self) -> Result<()> {
        let mut slot = self.current.lock().await;
        let source = self.resolve_source();
        info!("Loading model: {source}");

        let start = Instant::now();
        match self.loader.load(&source) {
            Ok(classifier) => {
                let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
                let elapsed = start.elapsed();
                METRICS.model.loads_total.inc();
                METRICS.model.load_duration.observe(elapsed.as_secs_f64());
                METRICS.model.model_epoch.set(epoch as i64);
                info!("Model loaded: {source}, epoch {epoch}, took {elapsed:?}");

                *slot = Some(ModelHandle {
                    classifier,
                    epoch,
                    source,
                });
                Ok(())
            }
            Err(e) => {
                METRICS.model.load_failures_total.inc();
                if slot.is_some() {
                    warn!("Model reload failed, keeping previous model: {e}");
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Run batch inference against the current model, under the swap lock.
    ///
    /// Returns `ModelUnavailable` if no model has ever loaded.
    pub async fn predict_batch(&self, texts: &[String]) -> Result<Vec<Sentiment>> {
        let slot = self.current.lock().await;
        let handle = slot
            .as_ref()
            .ok_or(sentiloop_common::SentiloopError::ModelUnavailable)?;
        handle.classifier.predict_batch(texts)
    }

    /// Epoch of the current model, if any
    pub async fn current_epoch(&self) -> Option<u64> {
        self.current.lock().await.as_ref().map(|h| h.epoch)
    }

    /// Source of the current model, if any
    pub async fn current_source(&self) -> Option<ModelSource> {
        self.current.lock().await.as_ref().map(|h| h.source.clone())
    }

    /// Pick the fine-tuned artifacts when the weights marker file exists,
    /// otherwise fall back to the pretrained baseline
    fn resolve_source(&self) -> ModelSource {
        let marker = self.config.artifact_dir.join(&self.config.weights_file);
        if marker.exists() {
            ModelSource::FineTuned(self.config.artifact_dir.clone())
        } else {
            ModelSource::Pretrained(self.config.baseline_id.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Label;
    use sentiloop_common::SentiloopError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex as StdMutex};

    struct StubClassifier {
        score: f32,
    }

    impl Classifier for StubClassifier {
        fn predict_batch(&self, texts: &[String]) -> Result<Vec<Sentiment>> {
            Ok(texts
                .iter()
                .map(|_| Sentiment {
                    label: Label::Positive,
                    score: self.score,
                })
                .collect())
        }
    }

    /// Loader that fails from the nth call on and records resolved sources
    struct StubLoader {
        calls: Arc<AtomicUsize>,
        fail_from_call: usize,
        sources: Arc<StdMutex<Vec<ModelSource>>>,
    }

    impl StubLoader {
        fn new(fail_from_call: usize) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                fail_from_call,
                sources: Arc::new(StdMutex::new(Vec::new())),
            }
        }
    }

    impl ModelLoader for StubLoader {
        fn load(&self, source: &ModelSource) -> Result<Box<dyn Classifier>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.sources.lock().unwrap().push(source.clone());
            if call >= self.fail_from_call {
                return Err(SentiloopError::model_load("stub load failure"));
            }
            Ok(Box::new(StubClassifier {
                score: call as f32 / 10.0,
            }))
        }
    }

    fn test_config(artifact_dir: std::path::PathBuf) -> ModelConfig {
        ModelConfig {
            baseline_id: "test-baseline".to_string(),
            artifact_dir,
            weights_file: "model.safetensors".to_string(),
            watched_files: vec!["model.safetensors".to_string()],
        }
    }

    #[tokio::test]
    async fn test_falls_back_to_baseline_without_marker() {
        let dir = tempfile::tempdir().unwrap();
        let loader = StubLoader::new(usize::MAX);
        let sources = loader.sources.clone();
        let manager = ModelManager::new(test_config(dir.path().to_path_buf()), Box::new(loader));

        manager.load().await.unwrap();
        assert_eq!(
            sources.lock().unwrap()[0],
            ModelSource::Pretrained("test-baseline".to_string())
        );
        assert_eq!(manager.current_epoch().await, Some(1));
    }

    #[tokio::test]
    async fn test_prefers_finetuned_when_marker_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.safetensors"), b"weights").unwrap();

        let loader = StubLoader::new(usize::MAX);
        let sources = loader.sources.clone();
        let manager = ModelManager::new(test_config(dir.path().to_path_buf()), Box::new(loader));

        manager.load().await.unwrap();
        assert_eq!(
            sources.lock().unwrap()[0],
            ModelSource::FineTuned(dir.path().to_path_buf())
        );
    }

    #[tokio::test]
    async fn test_first_boot_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            ModelManager::new(test_config(dir.path().to_path_buf()), Box::new(StubLoader::new(1)));

        assert!(manager.load().await.is_err());
        let result = manager.predict_batch(&["hello".to_string()]).await;
        assert!(matches!(result, Err(SentiloopError::ModelUnavailable)));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_prior_model() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            ModelManager::new(test_config(dir.path().to_path_buf()), Box::new(StubLoader::new(2)));

        manager.load().await.unwrap();
        assert_eq!(manager.current_epoch().await, Some(1));

        // second load fails; downgraded to a warning
        manager.reload().await.unwrap();
        assert_eq!(manager.current_epoch().await, Some(1));

        let results = manager.predict_batch(&["still serving".to_string()]).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.1).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_epoch_increments_on_successful_reload() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(
            test_config(dir.path().to_path_buf()),
            Box::new(StubLoader::new(usize::MAX)),
        );

        manager.load().await.unwrap();
        manager.reload().await.unwrap();
        manager.reload().await.unwrap();
        assert_eq!(manager.current_epoch().await, Some(3));

        // the served classifier is the one from the latest load
        let results = manager.predict_batch(&["x".to_string()]).await.unwrap();
        assert!((results[0].score - 0.3).abs() < f32::EPSILON);
    }
}
