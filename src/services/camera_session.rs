//! Camera session lifecycle
//!
//! Owns one live capture feed bound to the selected device and drives the
//! scanner status machine:
//!
//! ```text
//! loading -> waiting   feed bound
//! waiting -> loading   periodic refresh, device switch, camera cycle
//! waiting -> error     capture fault
//! loading -> error     bind failure
//! error   -> loading   periodic refresh or user action
//! ```
//!
//! Continuous decoding held open for hours exhausts memory on some capture
//! stacks, so the feed is torn down and rebound on a fixed interval. The old
//! feed is always fully released before the next one is opened.

use crate::domain::types::OVERCONSTRAINED_ERROR;
use crate::domain::{
    CameraDevice, CaptureErrorKind, CaptureFault, CaptureNotice, DeviceId, ScannerStatus,
};
use crate::infra::metrics::Metrics;
use crate::infra::store::StateStore;
use crate::io::camera::{CameraHost, CaptureFeed, FeedEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Result of the "switch camera" action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Exactly two devices: switched to the other one
    Switched(DeviceId),
    /// Any other count: the caller should let the user pick
    ChooseFrom(Vec<CameraDevice>),
}

/// Lifecycle manager for the capture feed
pub struct CameraSession {
    host: Arc<dyn CameraHost>,
    store: StateStore,
    metrics: Arc<Metrics>,
    status: ScannerStatus,
    status_tx: broadcast::Sender<ScannerStatus>,
    /// Devices in host enumeration order
    devices: Vec<CameraDevice>,
    current_device: Option<DeviceId>,
    feed: Option<CaptureFeed>,
    /// Last classified failure, until dismissed
    notice: Option<CaptureNotice>,
    remount_delay: Duration,
    /// Feed intentionally closed while a pass is displayed
    suspended: bool,
}

impl CameraSession {
    pub fn new(
        host: Arc<dyn CameraHost>,
        store: StateStore,
        metrics: Arc<Metrics>,
        remount_delay: Duration,
    ) -> Self {
        let current_device = store.camera_device_id();
        let (status_tx, _) = broadcast::channel(64);
        Self {
            host,
            store,
            metrics,
            status: ScannerStatus::Loading,
            status_tx,
            devices: Vec::new(),
            current_device,
            feed: None,
            notice: None,
            remount_delay,
            suspended: false,
        }
    }

    pub fn status(&self) -> ScannerStatus {
        self.status
    }

    pub fn devices(&self) -> &[CameraDevice] {
        &self.devices
    }

    pub fn current_device(&self) -> Option<&DeviceId> {
        self.current_device.as_ref()
    }

    pub fn notice(&self) -> Option<&CaptureNotice> {
        self.notice.as_ref()
    }

    pub fn has_feed(&self) -> bool {
        self.feed.is_some()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Every status transition, in order
    pub fn subscribe_status(&self) -> broadcast::Receiver<ScannerStatus> {
        self.status_tx.subscribe()
    }

    fn set_status(&mut self, status: ScannerStatus) {
        if self.status == status {
            return;
        }
        debug!(from = %self.status.as_str(), to = %status.as_str(), "scanner_status");
        self.status = status;
        let _ = self.status_tx.send(status);
    }

    /// Enumerate devices and bind the first feed
    pub async fn start(&mut self) {
        self.suspended = false;
        self.enumerate_devices().await;
        self.start_feed().await;
    }

    /// Refresh the device list from the host
    ///
    /// Selects the first device when nothing usable is selected. Host
    /// failures are logged and leave the current list in place.
    pub async fn enumerate_devices(&mut self) {
        let devices = match self.host.enumerate_devices().await {
            Ok(devices) => devices,
            Err(fault) => {
                self.metrics.record_enumeration_failure();
                warn!(host = %self.host.name(), error = %fault, "camera_enumeration_failed");
                return;
            }
        };

        let selection_usable = self
            .current_device
            .as_ref()
            .is_some_and(|id| devices.iter().any(|d| &d.device_id == id));

        if !selection_usable {
            if let Some(first) = devices.first() {
                if let Some(stale) = &self.current_device {
                    info!(stale = %stale, replacement = %first.device_id, "camera_selection_stale");
                }
                self.current_device = Some(first.device_id.clone());
            }
        }

        info!(
            host = %self.host.name(),
            count = devices.len(),
            current = ?self.current_device.as_ref().map(DeviceId::as_str),
            "camera_devices_enumerated"
        );
        self.devices = devices;
    }

    /// Bind a feed to the current device, replacing any existing one
    pub async fn start_feed(&mut self) {
        self.set_status(ScannerStatus::Loading);
        self.release_feed().await;

        let Some(device_id) = self.current_device.clone() else {
            self.handle_fault(CaptureFault::new(OVERCONSTRAINED_ERROR, "no capture device selected"));
            return;
        };

        match self.host.open_feed(&device_id).await {
            Ok(feed) => {
                self.feed = Some(feed);
                self.metrics.record_feed_bound();
                info!(device = %device_id, "camera_feed_bound");
                self.set_status(ScannerStatus::Waiting);
            }
            Err(fault) => {
                self.handle_fault(fault);
            }
        }
    }

    /// Periodic hard remount of the feed
    pub async fn refresh_feed(&mut self) {
        if self.suspended {
            debug!("camera_refresh_skipped_suspended");
            return;
        }
        self.metrics.record_feed_refresh();
        info!(device = ?self.current_device.as_ref().map(DeviceId::as_str), "camera_feed_refresh");
        self.remount().await;
    }

    /// Close, wait one scheduling tick, rebind
    async fn remount(&mut self) {
        self.set_status(ScannerStatus::Loading);
        self.release_feed().await;
        tokio::time::sleep(self.remount_delay).await;
        self.start_feed().await;
    }

    async fn release_feed(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.close().await;
        }
    }

    /// Select another known device and rebind to it
    ///
    /// Returns false for unknown ids and for the already-selected device.
    pub async fn switch_to_device(&mut self, device_id: &DeviceId) -> bool {
        if !self.devices.iter().any(|d| &d.device_id == device_id) {
            warn!(device = %device_id, "camera_switch_unknown_device");
            return false;
        }
        if self.current_device.as_ref() == Some(device_id) {
            return false;
        }

        self.store.set_camera_device_id(device_id);
        self.current_device = Some(device_id.clone());
        info!(device = %device_id, "camera_switched");

        if !self.suspended {
            self.remount().await;
        }
        true
    }

    /// "Switch camera" button
    ///
    /// Two devices toggle directly; any other count is handed back to the
    /// caller as a choice instead of guessing.
    pub async fn cycle_camera(&mut self) -> CycleOutcome {
        let previous = self.status;
        self.set_status(ScannerStatus::Loading);
        self.enumerate_devices().await;

        if self.devices.len() == 2 {
            let other = self
                .devices
                .iter()
                .find(|d| Some(&d.device_id) != self.current_device.as_ref())
                .map(|d| d.device_id.clone());
            if let Some(other) = other {
                self.switch_to_device(&other).await;
                return CycleOutcome::Switched(other);
            }
        }

        self.set_status(previous);
        CycleOutcome::ChooseFrom(self.devices.clone())
    }

    /// Map a host error into its user-facing category
    pub fn classify_error(&self, fault: &CaptureFault) -> CaptureErrorKind {
        CaptureErrorKind::classify(fault)
    }

    /// Record a capture failure and surface it
    ///
    /// Capture is not retried here; the next periodic refresh or a user
    /// action rebinds the feed.
    pub fn handle_fault(&mut self, fault: CaptureFault) -> Option<CaptureNotice> {
        self.metrics.record_capture_error();
        self.set_status(ScannerStatus::Error);

        if fault.is_benign() {
            debug!(error = %fault, "camera_benign_fault");
            return None;
        }

        let kind = self.classify_error(&fault);
        warn!(
            kind = %kind.as_str(),
            name = %fault.name,
            message = %fault.message,
            device = ?self.current_device.as_ref().map(DeviceId::as_str),
            "camera_capture_error"
        );
        let notice = CaptureNotice::new(kind);
        self.notice = Some(notice.clone());
        Some(notice)
    }

    /// Next event from the live feed; pends forever without one
    pub async fn next_feed_event(&mut self) -> Option<FeedEvent> {
        match self.feed.as_mut() {
            Some(feed) => feed.next_event().await,
            None => std::future::pending().await,
        }
    }

    /// A decode arrived, so the live feed works again
    pub fn decode_received(&mut self) {
        if self.feed.is_some() && self.status == ScannerStatus::Error {
            self.set_status(ScannerStatus::Waiting);
        }
    }

    /// The feed's reader stopped on its own
    pub async fn feed_ended(&mut self) {
        warn!(device = ?self.current_device.as_ref().map(DeviceId::as_str), "camera_feed_ended");
        self.release_feed().await;
        self.set_status(ScannerStatus::Error);
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Close the feed while the guest's pass is shown
    pub async fn suspend_feed(&mut self) {
        self.suspended = true;
        self.release_feed().await;
        self.set_status(ScannerStatus::Loading);
        debug!("camera_feed_suspended");
    }

    /// Re-enumerate and rebind after a suspension
    pub async fn resume_feed(&mut self) {
        debug!("camera_feed_resumed");
        self.start().await;
    }

    /// Release the device for good
    pub async fn shutdown(&mut self) {
        self.release_feed().await;
        info!("camera_session_shutdown");
    }
}
