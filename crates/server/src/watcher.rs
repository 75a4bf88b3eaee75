//! Model artifact change watcher
//!
//! Observes the artifact directory recursively and triggers lifecycle
//! reloads. Two debounce timers are applied: a cooldown since the last
//! triggered reload collapses the burst of file events produced by one
//! save operation, and a settle delay between detection and reload avoids
//! reading an artifact mid-write.

use crate::lifecycle::ModelManager;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sentiloop_common::config::{ModelConfig, WatcherConfig};
use sentiloop_common::{Result, SentiloopError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Watches the artifact directory and drives lifecycle reloads
pub struct ChangeWatcher {
    /// Keeps the filesystem watch alive; dropping it stops event delivery
    _watcher: RecommendedWatcher,

    task: JoinHandle<()>,
}

impl ChangeWatcher {
    /// Establish the filesystem watch and spawn the reload loop.
    ///
    /// The artifact directory is created if missing; the watch cannot be
    /// established otherwise.
    pub fn spawn(
        watcher_config: &WatcherConfig,
        model_config: &ModelConfig,
        manager: Arc<ModelManager>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&model_config.artifact_dir)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut fs_watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        })
        .map_err(|e| SentiloopError::watch(e.to_string()))?;

        fs_watcher
            .watch(&model_config.artifact_dir, RecursiveMode::Recursive)
            .map_err(|e| SentiloopError::watch(e.to_string()))?;

        info!(
            "Watching {} for model artifact changes",
            model_config.artifact_dir.display()
        );

        let task = tokio::spawn(run_reload_loop(
            rx,
            model_config.watched_files.clone(),
            Duration::from_millis(watcher_config.reload_cooldown_ms),
            Duration::from_millis(watcher_config.settle_delay_ms),
            manager,
        ));

        Ok(Self {
            _watcher: fs_watcher,
            task,
        })
    }

    /// Stop watching and cancel any pending reload trigger
    pub fn stop(self) {
        self.task.abort();
    }
}

/// Consume filesystem events and trigger debounced reloads.
///
/// Reload failures are logged here; the retained-model policy lives in
/// the lifecycle manager.
pub(crate) async fn run_reload_loop(
    mut rx: mpsc::UnboundedReceiver<Event>,
    watched_files: Vec<String>,
    cooldown: Duration,
    settle_delay: Duration,
    manager: Arc<ModelManager>,
) {
    let mut last_trigger: Option<Instant> = None;

    while let Some(event) = rx.recv().await {
        let Some(path) = qualifying_path(&event, &watched_files) else {
            continue;
        };

        if let Some(at) = last_trigger {
            if at.elapsed() < cooldown {
                continue;
            }
        }
        last_trigger = Some(Instant::now());

        info!(
            "Detected change in model artifact {}, triggering reload",
            path.display()
        );
        tokio::time::sleep(settle_delay).await;

        if let Err(e) = manager.reload().await {
            error!("Triggered reload failed: {e}");
        }
    }
}

/// The path of a create/modify event naming a watched artifact file, if any
fn qualifying_path(event: &Event, watched_files: &[String]) -> Option<PathBuf> {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return None;
    }

    event
        .paths
        .iter()
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| watched_files.iter().any(|allowed| allowed == name))
                .unwrap_or(false)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classifier, Label, ModelLoader, ModelSource, Sentiment};
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use sentiloop_common::Result;

    struct StubClassifier;

    impl Classifier for StubClassifier {
        fn predict_batch(&self, texts: &[String]) -> Result<Vec<Sentiment>> {
            Ok(texts
                .iter()
                .map(|_| Sentiment {
                    label: Label::Positive,
                    score: 1.0,
                })
                .collect())
        }
    }

    struct StubLoader;

    impl ModelLoader for StubLoader {
        fn load(&self, _source: &ModelSource) -> Result<Box<dyn Classifier>> {
            Ok(Box::new(StubClassifier))
        }
    }

    fn watched() -> Vec<String> {
        vec!["model.safetensors".to_string(), "config.json".to_string()]
    }

    fn manager_for(dir: &std::path::Path) -> Arc<ModelManager> {
        let config = ModelConfig {
            baseline_id: "baseline".to_string(),
            artifact_dir: dir.to_path_buf(),
            weights_file: "model.safetensors".to_string(),
            watched_files: watched(),
        };
        Arc::new(ModelManager::new(config, Box::new(StubLoader)))
    }

    #[test]
    fn test_qualifying_path_filters_by_name_and_kind() {
        let modify = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/models/model.safetensors"));
        assert!(qualifying_path(&modify, &watched()).is_some());

        let create = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/models/config.json"));
        assert!(qualifying_path(&create, &watched()).is_some());

        let unrelated = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/models/training.log"));
        assert!(qualifying_path(&unrelated, &watched()).is_none());

        let remove = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/models/model.safetensors"));
        assert!(qualifying_path(&remove, &watched()).is_none());
    }

    #[tokio::test]
    async fn test_event_burst_collapses_to_one_reload() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(dir.path());
        manager.load().await.unwrap();
        assert_eq!(manager.current_epoch().await, Some(1));

        let (tx, rx) = mpsc::unbounded_channel();
        let loop_task = tokio::spawn(run_reload_loop(
            rx,
            watched(),
            Duration::from_millis(500),
            Duration::from_millis(10),
            manager.clone(),
        ));

        // one save operation produces several events in quick succession
        for _ in 0..4 {
            tx.send(
                Event::new(EventKind::Modify(ModifyKind::Any))
                    .add_path(dir.path().join("model.safetensors")),
            )
            .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.current_epoch().await, Some(2));

        loop_task.abort();
    }

    #[tokio::test]
    async fn test_reload_fires_again_after_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(dir.path());
        manager.load().await.unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let loop_task = tokio::spawn(run_reload_loop(
            rx,
            watched(),
            Duration::from_millis(50),
            Duration::from_millis(1),
            manager.clone(),
        ));

        let event = || {
            Event::new(EventKind::Modify(ModifyKind::Any))
                .add_path(dir.path().join("config.json"))
        };

        tx.send(event()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(event()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(manager.current_epoch().await, Some(3));

        loop_task.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_filesystem_write_triggers_reload() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(dir.path());
        manager.load().await.unwrap();

        let watcher_config = WatcherConfig {
            reload_cooldown_ms: 100,
            settle_delay_ms: 10,
        };
        let model_config = ModelConfig {
            baseline_id: "baseline".to_string(),
            artifact_dir: dir.path().to_path_buf(),
            weights_file: "model.safetensors".to_string(),
            watched_files: watched(),
        };

        let watcher =
            ChangeWatcher::spawn(&watcher_config, &model_config, manager.clone()).unwrap();

        std::fs::write(dir.path().join("model.safetensors"), b"new weights").unwrap();

        let mut reloaded = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if manager.current_epoch().await.unwrap_or(1) >= 2 {
                reloaded = true;
                break;
            }
        }
        assert!(reloaded, "watcher did not trigger a reload within 5s");

        watcher.stop();
    }
}
