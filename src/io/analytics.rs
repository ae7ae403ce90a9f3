//! Typed channel for scan analytics events
//!
//! Provides a non-blocking way to hand events to the analytics publisher.
//! Uses a bounded mpsc channel; when it is full the event is dropped and
//! counted.

use crate::domain::types::epoch_ms;
use crate::infra::metrics::Metrics;
use serde::Serialize;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Outcome category of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanCategory {
    ScanSuccess,
    ScanRejected,
}

impl ScanCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanCategory::ScanSuccess => "scan_success",
            ScanCategory::ScanRejected => "scan_rejected",
        }
    }
}

/// One analytics event
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsEvent {
    /// Kiosk identifier
    pub site: String,
    /// Guest session, renewed on every reset
    pub session: Uuid,
    /// Timestamp (epoch ms)
    pub ts: u64,
    /// Timestamp (RFC 3339, UTC)
    pub at: String,
    pub category: ScanCategory,
    /// Raw scanned text
    pub label: String,
}

impl AnalyticsEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// Sender handle for analytics events
///
/// Clone this to share across producers. Never blocks.
#[derive(Clone)]
pub struct AnalyticsSender {
    tx: mpsc::Sender<AnalyticsEvent>,
    site_id: String,
    metrics: Arc<Metrics>,
}

impl AnalyticsSender {
    pub fn new(tx: mpsc::Sender<AnalyticsEvent>, site_id: String, metrics: Arc<Metrics>) -> Self {
        Self { tx, site_id, metrics }
    }

    /// Queue a scan event; drops it if the channel is full or closed
    pub fn send_scan(&self, session: Uuid, category: ScanCategory, label: &str) {
        let event = AnalyticsEvent {
            site: self.site_id.clone(),
            session,
            ts: epoch_ms(),
            at: now_rfc3339(),
            category,
            label: label.to_string(),
        };
        if let Err(e) = self.tx.try_send(event) {
            self.metrics.record_analytics_dropped();
            debug!(error = %e, category = %category.as_str(), "analytics_event_dropped");
        }
    }
}

/// Create a new analytics channel pair
///
/// Returns (sender, receiver) where sender can be cloned and shared.
pub fn create_analytics_channel(
    buffer_size: usize,
    site_id: String,
    metrics: Arc<Metrics>,
) -> (AnalyticsSender, mpsc::Receiver<AnalyticsEvent>) {
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    (AnalyticsSender::new(tx, site_id, metrics), rx)
}
