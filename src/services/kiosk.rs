//! Kiosk runtime - the single event loop behind every display
//!
//! Joins four event sources in one task:
//! - decoded text and faults from the live capture feed
//! - the forced-refresh timer
//! - operator/guest commands
//! - shutdown
//!
//! After each event the current `KioskView` is published on a watch channel.

use crate::domain::{CameraDevice, CaptureNotice, DeviceId, QrPayload, ScannerStatus};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::infra::store::StateStore;
use crate::io::analytics::AnalyticsSender;
use crate::io::camera::{CameraHost, FeedEvent};
use crate::services::camera_session::{CameraSession, CycleOutcome};
use crate::services::checkin::{CheckinSession, ScanOutcome, SessionKind};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Inputs from the kiosk's user interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KioskCommand {
    /// "Start over" after a pass was shown
    Reset,
    /// "Switch camera" button
    CycleCamera,
    /// Device picked from the picker
    SelectDevice(DeviceId),
    /// Close the capture error notice
    DismissNotice,
    /// Close the device picker without choosing
    ClosePicker,
    /// Code typed in by staff, handled like a decode
    ManualEntry(String),
}

/// The guest's pass as displayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestPass {
    pub guest_id: String,
    /// `123 456 786` form
    pub display: String,
    pub qr: QrPayload,
}

/// Snapshot of everything a display needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KioskView {
    pub session: SessionKind,
    /// Last scan did not look like a guest identifier
    pub invalid: bool,
    pub pass: Option<GuestPass>,
    pub scanner_status: ScannerStatus,
    pub devices: Vec<CameraDevice>,
    pub current_device: Option<DeviceId>,
    pub notice: Option<CaptureNotice>,
    pub picker_open: bool,
}

impl Default for KioskView {
    fn default() -> Self {
        Self {
            session: SessionKind::Waiting,
            invalid: false,
            pass: None,
            scanner_status: ScannerStatus::Loading,
            devices: Vec::new(),
            current_device: None,
            notice: None,
            picker_open: false,
        }
    }
}

pub struct Kiosk {
    camera: CameraSession,
    checkin: CheckinSession,
    refresh_interval: Duration,
    picker_open: bool,
    view_tx: watch::Sender<KioskView>,
}

impl Kiosk {
    pub fn new(
        config: &Config,
        host: Arc<dyn CameraHost>,
        store: StateStore,
        analytics: Option<AnalyticsSender>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let camera =
            CameraSession::new(host, store.clone(), metrics.clone(), config.remount_delay());
        let checkin = CheckinSession::new(store, analytics, metrics);
        let (view_tx, _) = watch::channel(KioskView::default());
        Self {
            camera,
            checkin,
            refresh_interval: config.refresh_interval(),
            picker_open: false,
            view_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<KioskView> {
        self.view_tx.subscribe()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Build the current view
    pub fn view(&self) -> KioskView {
        let pass = self.checkin.guest_id().map(|id| GuestPass {
            guest_id: id.as_str().to_string(),
            display: id.display_groups(),
            qr: id.qr_payload(),
        });
        KioskView {
            session: self.checkin.state().kind(),
            invalid: self.checkin.invalid(),
            pass,
            scanner_status: self.camera.status(),
            devices: self.camera.devices().to_vec(),
            current_device: self.camera.current_device().cloned(),
            notice: self.camera.notice().cloned(),
            picker_open: self.picker_open,
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }

    /// Bring the scanner up; every run starts waiting for a scan
    pub async fn start(&mut self) {
        self.camera.start().await;
        self.sync_capture_state();
        self.publish();
    }

    /// Mirror scanner status into the guest session
    fn sync_capture_state(&mut self) {
        match self.camera.status() {
            ScannerStatus::Error => self.checkin.capture_failed(),
            ScannerStatus::Waiting => self.checkin.capture_recovered(),
            ScannerStatus::Loading => {}
        }
    }

    async fn handle_decoded(&mut self, text: &str) {
        if let ScanOutcome::Accepted(_) = self.checkin.handle_scan(text) {
            self.picker_open = false;
            self.camera.suspend_feed().await;
        }
    }

    /// Apply one feed event; `None` means the feed stopped
    pub async fn handle_feed_event(&mut self, event: Option<FeedEvent>) {
        match event {
            Some(FeedEvent::Decoded(text)) => {
                self.camera.decode_received();
                self.handle_decoded(&text).await;
            }
            Some(FeedEvent::Fault(fault)) => {
                self.camera.handle_fault(fault);
            }
            None => self.camera.feed_ended().await,
        }
        self.sync_capture_state();
    }

    /// Apply one user command
    pub async fn handle_command(&mut self, command: KioskCommand) {
        debug!(command = ?command, "kiosk_command");
        match command {
            KioskCommand::Reset => {
                if self.checkin.reset() {
                    self.camera.resume_feed().await;
                }
            }
            KioskCommand::CycleCamera => {
                if !self.checkin.camera_active() {
                    return;
                }
                match self.camera.cycle_camera().await {
                    CycleOutcome::Switched(_) => self.picker_open = false,
                    CycleOutcome::ChooseFrom(_) => self.picker_open = true,
                }
            }
            KioskCommand::SelectDevice(device_id) => {
                self.camera.switch_to_device(&device_id).await;
                self.picker_open = false;
            }
            KioskCommand::DismissNotice => self.camera.dismiss_notice(),
            KioskCommand::ClosePicker => self.picker_open = false,
            KioskCommand::ManualEntry(text) => self.handle_decoded(text.trim()).await,
        }
        self.sync_capture_state();
    }

    /// Forced refresh timer fired
    pub async fn tick_refresh(&mut self) {
        if self.checkin.camera_active() {
            self.camera.refresh_feed().await;
            self.sync_capture_state();
        }
    }

    /// Run until shutdown
    ///
    /// A closed command channel only stops command handling; the scanner
    /// keeps running.
    pub async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<KioskCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(refresh_interval_secs = self.refresh_interval.as_secs(), "kiosk_started");
        self.start().await;

        let period = self.refresh_interval;
        let mut refresh = interval_at(Instant::now() + period, period);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut commands_open = true;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                command = command_rx.recv(), if commands_open => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            debug!("kiosk_command_channel_closed");
                            commands_open = false;
                        }
                    }
                }
                event = self.camera.next_feed_event() => {
                    self.handle_feed_event(event).await;
                }
                _ = refresh.tick() => {
                    self.tick_refresh().await;
                }
            }
            self.publish();
        }

        self.camera.shutdown().await;
        info!("kiosk_stopped");
    }
}
