//! Capture host seam
//!
//! A `CameraHost` enumerates capture devices and binds a `CaptureFeed` to one
//! of them. A feed is a cancellable subscription: closing it aborts the
//! reader and waits until the device has been released.

use crate::domain::{CameraDevice, CaptureFault, DeviceId};
use async_trait::async_trait;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// One decode attempt reported by a live feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Text decoded from a frame
    Decoded(String),
    /// Frame-level or device-level failure
    Fault(CaptureFault),
}

/// Platform capability that lists capture devices and binds feeds to them
#[async_trait]
pub trait CameraHost: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// All video-input capable devices, in host order
    async fn enumerate_devices(&self) -> Result<Vec<CameraDevice>, CaptureFault>;

    /// Bind a live feed to `device_id`
    async fn open_feed(&self, device_id: &DeviceId) -> Result<CaptureFeed, CaptureFault>;
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Handle to a bound capture feed
///
/// Dropping the handle aborts the reader; `close` additionally waits for it.
pub struct CaptureFeed {
    device_id: DeviceId,
    events: mpsc::Receiver<FeedEvent>,
    task: Option<JoinHandle<()>>,
    on_release: Option<ReleaseHook>,
}

impl CaptureFeed {
    /// Spawn `reader` as the task producing this feed's events
    ///
    /// The reader owns the device; it is dropped when the feed closes.
    pub fn spawn<F, Fut>(device_id: DeviceId, buffer: usize, reader: F) -> Self
    where
        F: FnOnce(mpsc::Sender<FeedEvent>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let task = tokio::spawn(reader(tx));
        Self { device_id, events: rx, task: Some(task), on_release: None }
    }

    /// Wrap an externally driven event stream
    pub fn from_receiver(device_id: DeviceId, events: mpsc::Receiver<FeedEvent>) -> Self {
        Self { device_id, events, task: None, on_release: None }
    }

    /// Run `hook` once the feed has been released
    pub fn on_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Next event; `None` once the reader has stopped
    pub async fn next_event(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    /// Tear the feed down and wait until the device is released
    pub async fn close(mut self) {
        self.events.close();
        if let Some(task) = self.task.take() {
            task.abort();
            // Resolves only after the reader future has been dropped
            let _ = task.await;
        }
        if let Some(hook) = self.on_release.take() {
            hook();
        }
        debug!(device_id = %self.device_id, "camera_feed_released");
    }
}

impl Drop for CaptureFeed {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

impl std::fmt::Debug for CaptureFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureFeed")
            .field("device_id", &self.device_id)
            .field("has_task", &self.task.is_some())
            .finish()
    }
}
