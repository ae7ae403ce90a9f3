//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `camera` - capture host trait and cancellable feed handle
//! - `serial_scanner` - serial-attached QR scanners as a capture host
//! - `analytics` - typed channel for scan analytics events
//! - `analytics_log` - analytics events to file (JSONL format)
//! - `analytics_publisher` - drains analytics to MQTT and file

pub mod analytics;
pub mod analytics_log;
pub mod analytics_publisher;
pub mod camera;
pub mod serial_scanner;

// Re-export commonly used types
pub use analytics::{create_analytics_channel, AnalyticsEvent, AnalyticsSender, ScanCategory};
pub use analytics_publisher::AnalyticsPublisher;
pub use camera::{CameraHost, CaptureFeed, FeedEvent};
pub use serial_scanner::SerialScannerHost;
