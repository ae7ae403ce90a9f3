//! Shared types for the check-in kiosk

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host error name for a camera held by another application
pub const NOT_READABLE_ERROR: &str = "NotReadableError";
/// Host error name for denied camera access
pub const NOT_ALLOWED_ERROR: &str = "NotAllowedError";
/// Host error name for no device satisfying the requested constraints
pub const OVERCONSTRAINED_ERROR: &str = "OverconstrainedError";
/// Decoder noise that reports a frame without usable dimensions
pub const BENIGN_DIMENSIONS_MESSAGE: &str = "Dimensions could be not found.";

/// Newtype wrapper for opaque capture device handles
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A video-input capable device reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraDevice {
    pub device_id: DeviceId,
    pub label: String,
}

impl CameraDevice {
    pub fn new(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { device_id: DeviceId::new(device_id), label: label.into() }
    }
}

/// Capture pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerStatus {
    Loading,
    Waiting,
    Error,
}

impl ScannerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScannerStatus::Loading => "loading",
            ScannerStatus::Waiting => "waiting",
            ScannerStatus::Error => "error",
        }
    }
}

/// Host-level capture error, named with the media-capture vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFault {
    pub name: String,
    pub message: String,
}

impl CaptureFault {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), message: message.into() }
    }

    /// Decoder noise that should not be shown to the guest
    pub fn is_benign(&self) -> bool {
        self.message == BENIGN_DIMENSIONS_MESSAGE
    }
}

impl fmt::Display for CaptureFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.name, self.message)
    }
}

impl std::error::Error for CaptureFault {}

impl From<std::io::Error> for CaptureFault {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        // EBUSY: another process holds the device (Linux errno 16)
        const EBUSY: i32 = 16;
        let name = match e.kind() {
            ErrorKind::PermissionDenied => NOT_ALLOWED_ERROR,
            ErrorKind::NotFound => OVERCONSTRAINED_ERROR,
            _ if e.raw_os_error() == Some(EBUSY) => NOT_READABLE_ERROR,
            _ => "IoError",
        };
        Self::new(name, e.to_string())
    }
}

/// User-facing category of a capture failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureErrorKind {
    DeviceInUse,
    PermissionDenied,
    NoSuitableDevice,
    Unknown { name: String, message: String },
}

impl CaptureErrorKind {
    /// Map a host error into its category
    pub fn classify(fault: &CaptureFault) -> Self {
        match fault.name.as_str() {
            NOT_READABLE_ERROR => CaptureErrorKind::DeviceInUse,
            NOT_ALLOWED_ERROR => CaptureErrorKind::PermissionDenied,
            OVERCONSTRAINED_ERROR => CaptureErrorKind::NoSuitableDevice,
            _ => CaptureErrorKind::Unknown {
                name: fault.name.clone(),
                message: fault.message.clone(),
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureErrorKind::DeviceInUse => "device_in_use",
            CaptureErrorKind::PermissionDenied => "permission_denied",
            CaptureErrorKind::NoSuitableDevice => "no_suitable_device",
            CaptureErrorKind::Unknown { .. } => "unknown",
        }
    }

    /// Explanation shown to the guest
    pub fn message(&self) -> String {
        match self {
            CaptureErrorKind::DeviceInUse => "The camera is being used by another application. \
                 Is a camera app or video call open, or is the flashlight on?"
                .to_string(),
            CaptureErrorKind::PermissionDenied => {
                "No permission to use the camera. Please check the device settings.".to_string()
            }
            CaptureErrorKind::NoSuitableDevice => {
                "No usable camera is available on this device.".to_string()
            }
            CaptureErrorKind::Unknown { name, message } => {
                format!("Unknown error. [{}] {}", name, message)
            }
        }
    }
}

/// A classified capture failure awaiting dismissal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureNotice {
    pub kind: CaptureErrorKind,
    pub message: String,
}

impl CaptureNotice {
    pub fn new(kind: CaptureErrorKind) -> Self {
        let message = kind.message();
        Self { kind, message }
    }
}

/// Get current epoch time in milliseconds
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
