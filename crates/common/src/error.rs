//! Common error types for Sentiloop
//!
//! This module defines all error types used across the Sentiloop system,
//! mirroring the failure taxonomy of the prediction pipeline: client input
//! errors, model load/availability errors, and batch inference errors.

use thiserror::Error;

/// Main error type for Sentiloop
#[derive(Error, Debug)]
pub enum SentiloopError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid client input, rejected before queueing
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model loading errors
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// No model has ever been successfully loaded
    #[error("No model is currently loaded")]
    ModelUnavailable,

    /// Batch inference errors, fanned out to every request in the batch
    #[error("Batch inference error: {0}")]
    Inference(String),

    /// Queue full (backpressure)
    #[error("Queue full: {0}")]
    QueueFull(String),

    /// Filesystem watcher errors
    #[error("Watch error: {0}")]
    Watch(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SentiloopError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        SentiloopError::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        SentiloopError::InvalidInput(msg.into())
    }

    /// Create a model load error
    pub fn model_load(msg: impl Into<String>) -> Self {
        SentiloopError::ModelLoad(msg.into())
    }

    /// Create a batch inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        SentiloopError::Inference(msg.into())
    }

    /// Create a queue full error
    pub fn queue_full(msg: impl Into<String>) -> Self {
        SentiloopError::QueueFull(msg.into())
    }

    /// Create a watcher error
    pub fn watch(msg: impl Into<String>) -> Self {
        SentiloopError::Watch(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        SentiloopError::Internal(msg.into())
    }

    /// Whether the error was caused by the client rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, SentiloopError::InvalidInput(_))
    }

    /// Rebuild the error for fan-out to every request in a failed batch.
    ///
    /// Errors carrying non-clonable payloads are flattened to their message.
    pub fn for_fanout(&self) -> Self {
        match self {
            SentiloopError::ModelUnavailable => SentiloopError::ModelUnavailable,
            SentiloopError::Inference(msg) => SentiloopError::Inference(msg.clone()),
            other => SentiloopError::Inference(other.to_string()),
        }
    }
}

/// Result type alias for Sentiloop operations
pub type Result<T> = std::result::Result<T, SentiloopError>;
