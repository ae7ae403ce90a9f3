//! Services - session logic and the kiosk event loop
//!
//! - `camera_session` - capture feed lifecycle, forced refresh, error classification
//! - `checkin` - guest session state driven by scan outcomes
//! - `kiosk` - single-task runtime joining feed, timer, commands and shutdown

pub mod camera_session;
pub mod checkin;
pub mod kiosk;

// Re-export commonly used types
pub use camera_session::{CameraSession, CycleOutcome};
pub use checkin::{CheckinSession, ScanOutcome, SessionKind, SessionState};
pub use kiosk::{GuestPass, Kiosk, KioskCommand, KioskView};
