//! Domain models - guest identifiers and capture types
//!
//! - `guest_id` - checksum validation and display formatting for guest identifiers
//! - `types` - camera devices, scanner status, capture faults and their classification

pub mod guest_id;
pub mod types;

// Re-export commonly used types at module level
pub use guest_id::{validate, GuestId, GuestIdError, QrPayload};
pub use types::{
    CameraDevice, CaptureErrorKind, CaptureFault, CaptureNotice, DeviceId, ScannerStatus,
};
