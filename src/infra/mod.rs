//! Infrastructure - configuration, persisted state, and metrics
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, defaults)
//! - `store` - Key-value state store (in-memory and JSON file backends)
//! - `metrics` - Lock-free metrics collection

pub mod config;
pub mod metrics;
pub mod store;

// Re-export commonly used types
pub use config::{Config, Platform};
pub use metrics::Metrics;
pub use store::{FileStore, KeyValueStore, MemoryStore, StateStore};
