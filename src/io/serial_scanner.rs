//! Serial-attached QR scanners as a capture host
//!
//! USB CDC and RS-232 scanners decode on the device and emit one code per
//! line, terminated by CR, LF or CRLF depending on the scanner profile.
//! Each serial port is one capture device; the port path is its handle.

use crate::domain::types::{NOT_ALLOWED_ERROR, NOT_READABLE_ERROR, OVERCONSTRAINED_ERROR};
use crate::domain::{CameraDevice, CaptureFault, DeviceId};
use crate::infra::config::Config;
use crate::io::camera::{CameraHost, CaptureFeed, FeedEvent};
use async_trait::async_trait;
use std::io::ErrorKind as IoErrorKind;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_serial::{SerialPortBuilderExt, SerialPortType};
use tracing::{debug, info, warn};

/// Longest line accepted before the buffer is discarded
const MAX_CODE_LEN: usize = 4096;
/// Feed channel capacity
const FEED_BUFFER: usize = 32;

/// Capture host over serial QR scanners
pub struct SerialScannerHost {
    baud: u32,
    usb_only: bool,
}

impl SerialScannerHost {
    pub fn new(config: &Config) -> Self {
        Self { baud: config.scanner_baud(), usb_only: config.scanner_usb_only() }
    }

    fn device_from_port(&self, port: tokio_serial::SerialPortInfo) -> Option<CameraDevice> {
        let label = match port.port_type {
            SerialPortType::UsbPort(info) => {
                let name = info
                    .product
                    .or(info.manufacturer)
                    .unwrap_or_else(|| format!("USB {:04x}:{:04x}", info.vid, info.pid));
                format!("{} ({})", name, port.port_name)
            }
            _ if self.usb_only => return None,
            _ => port.port_name.clone(),
        };
        Some(CameraDevice { device_id: DeviceId(port.port_name), label })
    }
}

#[async_trait]
impl CameraHost for SerialScannerHost {
    fn name(&self) -> &'static str {
        "serial"
    }

    async fn enumerate_devices(&self) -> Result<Vec<CameraDevice>, CaptureFault> {
        // udev enumeration blocks
        let ports = tokio::task::spawn_blocking(tokio_serial::available_ports)
            .await
            .map_err(|e| CaptureFault::new("EnumerationError", e.to_string()))?
            .map_err(fault_from_serial)?;

        let devices: Vec<CameraDevice> =
            ports.into_iter().filter_map(|p| self.device_from_port(p)).collect();
        debug!(count = devices.len(), usb_only = self.usb_only, "serial_ports_enumerated");
        Ok(devices)
    }

    async fn open_feed(&self, device_id: &DeviceId) -> Result<CaptureFeed, CaptureFault> {
        let port = tokio_serial::new(device_id.as_str(), self.baud)
            .timeout(Duration::from_millis(100))
            .open_native_async()
            .map_err(fault_from_serial)?;

        info!(device = %device_id, baud = %self.baud, "serial_scanner_opened");

        let device = device_id.clone();
        Ok(CaptureFeed::spawn(device_id.clone(), FEED_BUFFER, move |tx| {
            read_codes(port, device, tx)
        }))
    }
}

/// Reader task: frame incoming bytes into codes until the port fails
///
/// EOF (scanner unplugged) ends the task without a fault; the closed channel
/// is how the session learns the feed is gone.
async fn read_codes<R>(mut port: R, device: DeviceId, tx: mpsc::Sender<FeedEvent>)
where
    R: AsyncRead + Unpin,
{
    // Persistent buffer: a code can arrive split across reads
    let mut buffer: Vec<u8> = Vec::with_capacity(256);
    let mut chunk = [0u8; 256];

    loop {
        match port.read(&mut chunk).await {
            Ok(0) => {
                warn!(device = %device, "serial_scanner_eof");
                return;
            }
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                for code in extract_codes(&mut buffer) {
                    tracing::trace!(device = %device, len = code.len(), "serial_code_framed");
                    if tx.send(FeedEvent::Decoded(code)).await.is_err() {
                        return;
                    }
                }
                if buffer.len() > MAX_CODE_LEN {
                    warn!(device = %device, discarded = buffer.len(), "serial_line_too_long");
                    buffer.clear();
                }
            }
            // Idle port
            Err(e) if e.kind() == IoErrorKind::TimedOut || e.kind() == IoErrorKind::Interrupted => {}
            Err(e) => {
                warn!(device = %device, error = %e, "serial_scanner_read_error");
                let _ = tx.send(FeedEvent::Fault(CaptureFault::from(e))).await;
                return;
            }
        }
    }
}

/// Drain every complete line from `buffer`, leaving any partial tail
///
/// CR, LF and CRLF all terminate a code; empty lines are skipped.
pub fn extract_codes(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut codes = Vec::new();
    while let Some(end) = buffer.iter().position(|&b| b == b'\r' || b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=end).collect();
        let text = String::from_utf8_lossy(&line[..line.len() - 1]);
        let text = text.trim();
        if !text.is_empty() {
            codes.push(text.to_string());
        }
    }
    codes
}

/// Translate a serial open/enumerate error into the capture vocabulary
pub fn fault_from_serial(e: tokio_serial::Error) -> CaptureFault {
    use tokio_serial::ErrorKind;
    let name = match e.kind {
        ErrorKind::NoDevice => OVERCONSTRAINED_ERROR,
        ErrorKind::Io(IoErrorKind::PermissionDenied) => NOT_ALLOWED_ERROR,
        ErrorKind::Io(IoErrorKind::NotFound) => OVERCONSTRAINED_ERROR,
        ErrorKind::Io(_) if e.description.to_lowercase().contains("busy") => NOT_READABLE_ERROR,
        _ => "SerialError",
    };
    CaptureFault::new(name, e.description)
}
