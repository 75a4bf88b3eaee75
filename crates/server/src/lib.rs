//! Sentiloop Server
//!
//! Batched sentiment prediction service with runtime model hot-swap.
//! Concurrent requests are grouped into bounded batches, and the active
//! model is replaced on artifact changes without downtime.

pub mod batching;
pub mod classifier;
pub mod lifecycle;
pub mod service;
pub mod watcher;

pub use batching::{BatchScheduler, CompletionHandle, RequestBatch};
pub use classifier::{Classifier, Label, LexiconLoader, ModelLoader, ModelSource, Sentiment};
pub use lifecycle::{ModelHandle, ModelManager};
pub use service::SentimentService;
pub use watcher::ChangeWatcher;
