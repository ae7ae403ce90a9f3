//! Shared test fixtures: an in-memory capture host

#![allow(dead_code)]

use async_trait::async_trait;
use checkin_kiosk::domain::{CameraDevice, CaptureFault, DeviceId};
use checkin_kiosk::io::{CameraHost, CaptureFeed, FeedEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Capture host whose devices, failures and feeds are driven by the test
#[derive(Default)]
pub struct FakeHost {
    devices: Mutex<Vec<CameraDevice>>,
    fail_enumeration: AtomicBool,
    open_fault: Mutex<Option<CaptureFault>>,
    opened: Mutex<Vec<DeviceId>>,
    sender: Mutex<Option<mpsc::Sender<FeedEvent>>>,
    active: Arc<AtomicUsize>,
    max_active: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl FakeHost {
    pub fn with_devices(ids: &[&str]) -> Arc<Self> {
        let host = Self::default();
        host.set_devices(ids);
        Arc::new(host)
    }

    pub fn set_devices(&self, ids: &[&str]) {
        *self.devices.lock() =
            ids.iter().map(|id| CameraDevice::new(*id, format!("Camera {}", id))).collect();
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.fail_enumeration.store(fail, Ordering::SeqCst);
    }

    pub fn fail_open(&self, fault: Option<CaptureFault>) {
        *self.open_fault.lock() = fault;
    }

    /// Devices feeds were opened on, in order
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().iter().map(|id| id.as_str().to_string()).collect()
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open feeds
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Push an event into the most recently opened feed
    pub async fn emit(&self, event: FeedEvent) -> bool {
        let sender = self.sender.lock().clone();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Drop the feed's sender, as if the reader died
    pub fn end_feed(&self) {
        self.sender.lock().take();
    }
}

#[async_trait]
impl CameraHost for FakeHost {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn enumerate_devices(&self) -> Result<Vec<CameraDevice>, CaptureFault> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(CaptureFault::new("NotAllowedError", "enumeration denied"));
        }
        Ok(self.devices.lock().clone())
    }

    async fn open_feed(&self, device_id: &DeviceId) -> Result<CaptureFeed, CaptureFault> {
        if let Some(fault) = self.open_fault.lock().clone() {
            return Err(fault);
        }

        self.opened.lock().push(device_id.clone());
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(16);
        *self.sender.lock() = Some(tx);

        let active = self.active.clone();
        let released = self.released.clone();
        Ok(CaptureFeed::from_receiver(device_id.clone(), rx).on_release(move || {
            active.fetch_sub(1, Ordering::SeqCst);
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }
}
