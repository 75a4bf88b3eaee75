//! Sentiloop common library
//!
//! This crate contains shared code used across Sentiloop components.

pub mod config;
pub mod error;
pub mod metrics;

// Re-export commonly used types
pub use config::ServiceConfig;
pub use error::{Result, SentiloopError};
pub use metrics::{MetricsRegistry, METRICS};
