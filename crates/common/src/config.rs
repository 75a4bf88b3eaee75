//! Configuration structures for Sentiloop
//!
//! This module defines all configuration types for the prediction service.
//! Configurations are loaded from YAML files and can be overridden by environment variables.

use crate::error::{Result, SentiloopError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for the Sentiloop service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Model selection and artifact locations
    #[serde(default)]
    pub model: ModelConfig,

    /// Request batching configuration
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Artifact change watcher configuration
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Pretrained baseline model identifier, used when no fine-tuned
    /// artifact set is present on disk
    #[serde(default = "default_baseline_id")]
    pub baseline_id: String,

    /// Directory holding fine-tuned model artifacts
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Weights file whose presence in `artifact_dir` marks a usable
    /// fine-tuned model
    #[serde(default = "default_weights_file")]
    pub weights_file: String,

    /// Artifact file names whose creation/modification triggers a reload
    #[serde(default = "default_watched_files")]
    pub watched_files: Vec<String>,
}

/// Batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Maximum batch size
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Maximum wait per queue pull in milliseconds
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,

    /// Maximum queue size before submissions are rejected
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

/// Artifact change watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Minimum time between triggered reloads in milliseconds,
    /// collapsing bursts of file events from a single save
    #[serde(default = "default_reload_cooldown_ms")]
    pub reload_cooldown_ms: u64,

    /// Delay between detecting a change and reloading in milliseconds,
    /// allowing in-progress writes to settle
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Default value functions
fn default_baseline_id() -> String {
    "distilbert-base-uncased-finetuned-sst-2-english".to_string()
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("./model")
}

fn default_weights_file() -> String {
    "model.safetensors".to_string()
}

fn default_watched_files() -> Vec<String> {
    vec![
        "model.safetensors".to_string(),
        "config.json".to_string(),
        "tokenizer.json".to_string(),
        "tokenizer_config.json".to_string(),
    ]
}

fn default_max_batch_size() -> usize {
    8
}

fn default_max_latency_ms() -> u64 {
    50
}

fn default_max_queue_size() -> usize {
    1024
}

fn default_reload_cooldown_ms() -> u64 {
    2000
}

fn default_settle_delay_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            baseline_id: default_baseline_id(),
            artifact_dir: default_artifact_dir(),
            weights_file: default_weights_file(),
            watched_files: default_watched_files(),
        }
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        BatchingConfig {
            max_batch_size: default_max_batch_size(),
            max_latency_ms: default_max_latency_ms(),
            max_queue_size: default_max_queue_size(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        WatcherConfig {
            reload_cooldown_ms: default_reload_cooldown_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        ObservabilityConfig {
            log_level: default_log_level(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            model: ModelConfig::default(),
            batching: BatchingConfig::default(),
            watcher: WatcherConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            SentiloopError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: ServiceConfig = serde_yaml::from_str(&content).map_err(|e| {
            SentiloopError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides for model selection,
    /// matching the deployment contract of the service
    pub fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("SENTILOOP_MODEL_ID") {
            self.model.baseline_id = id;
        }
        if let Ok(dir) = std::env::var("SENTILOOP_MODEL_DIR") {
            self.model.artifact_dir = PathBuf::from(dir);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.batching.max_batch_size == 0 {
            return Err(SentiloopError::config("max_batch_size must be at least 1"));
        }
        if self.batching.max_latency_ms == 0 {
            return Err(SentiloopError::config("max_latency_ms must be at least 1"));
        }
        if self.batching.max_queue_size < self.batching.max_batch_size {
            return Err(SentiloopError::config(
                "max_queue_size must be at least max_batch_size",
            ));
        }
        if self.model.baseline_id.is_empty() {
            return Err(SentiloopError::config("baseline_id must not be empty"));
        }
        if self.model.watched_files.is_empty() {
            return Err(SentiloopError::config(
                "watched_files must name at least one artifact file",
            ));
        }
        Ok(())
    }

    /// Get the per-pull batching wait as Duration
    pub fn max_latency(&self) -> Duration {
        Duration::from_millis(self.batching.max_latency_ms)
    }

    /// Get the reload cooldown as Duration
    pub fn reload_cooldown(&self) -> Duration {
        Duration::from_millis(self.watcher.reload_cooldown_ms)
    }

    /// Get the settle delay as Duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.watcher.settle_delay_ms)
    }
}
