//! Camera session lifecycle tests against a fake capture host

mod common;

use checkin_kiosk::domain::types::{BENIGN_DIMENSIONS_MESSAGE, NOT_ALLOWED_ERROR, NOT_READABLE_ERROR};
use checkin_kiosk::domain::{CaptureErrorKind, CaptureFault, DeviceId, ScannerStatus};
use checkin_kiosk::infra::{Metrics, StateStore};
use checkin_kiosk::services::{CameraSession, CycleOutcome};
use common::FakeHost;
use std::sync::Arc;
use std::time::Duration;

fn session(host: Arc<FakeHost>, store: StateStore) -> (CameraSession, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let session = CameraSession::new(host, store, metrics.clone(), Duration::ZERO);
    (session, metrics)
}

#[tokio::test]
async fn test_start_binds_first_device() {
    let host = FakeHost::with_devices(&["cam0", "cam1"]);
    let (mut session, metrics) = session(host.clone(), StateStore::in_memory());

    assert_eq!(session.status(), ScannerStatus::Loading);
    session.start().await;

    assert_eq!(session.status(), ScannerStatus::Waiting);
    assert_eq!(session.current_device(), Some(&DeviceId::new("cam0")));
    assert_eq!(host.opened(), vec!["cam0"]);
    assert_eq!(host.active(), 1);
    assert_eq!(metrics.feed_binds(), 1);
}

#[tokio::test]
async fn test_start_uses_stored_device() {
    let host = FakeHost::with_devices(&["cam0", "cam1"]);
    let store = StateStore::in_memory();
    store.set_camera_device_id(&DeviceId::new("cam1"));
    let (mut session, _) = session(host.clone(), store);

    session.start().await;
    assert_eq!(host.opened(), vec!["cam1"]);
}

#[tokio::test]
async fn test_cycle_alternates_between_two_devices() {
    let host = FakeHost::with_devices(&["front", "back"]);
    let store = StateStore::in_memory();
    let (mut session, _) = session(host.clone(), store.clone());
    session.start().await;

    assert_eq!(session.cycle_camera().await, CycleOutcome::Switched(DeviceId::new("back")));
    assert_eq!(store.camera_device_id(), Some(DeviceId::new("back")));
    assert_eq!(session.cycle_camera().await, CycleOutcome::Switched(DeviceId::new("front")));
    assert_eq!(store.camera_device_id(), Some(DeviceId::new("front")));

    assert_eq!(host.opened(), vec!["front", "back", "front"]);
    assert_eq!(session.status(), ScannerStatus::Waiting);
    assert_eq!(host.max_active(), 1);
}

#[tokio::test]
async fn test_cycle_with_other_counts_offers_choice() {
    let host = FakeHost::with_devices(&["a", "b", "c"]);
    let (mut session, _) = session(host.clone(), StateStore::in_memory());
    session.start().await;

    match session.cycle_camera().await {
        CycleOutcome::ChooseFrom(devices) => assert_eq!(devices.len(), 3),
        other => panic!("expected a choice, got {:?}", other),
    }
    // No remount, previous status restored
    assert_eq!(session.status(), ScannerStatus::Waiting);
    assert_eq!(host.opened(), vec!["a"]);

    host.set_devices(&["a"]);
    assert!(matches!(session.cycle_camera().await, CycleOutcome::ChooseFrom(d) if d.len() == 1));
}

#[tokio::test]
async fn test_enumeration_failure_keeps_state() {
    let host = FakeHost::with_devices(&["cam0", "cam1"]);
    let (mut session, metrics) = session(host.clone(), StateStore::in_memory());
    session.start().await;

    host.set_devices(&["other"]);
    host.fail_enumeration(true);
    session.enumerate_devices().await;

    assert_eq!(session.devices().len(), 2);
    assert_eq!(session.current_device(), Some(&DeviceId::new("cam0")));
    assert_eq!(session.status(), ScannerStatus::Waiting);
    assert_eq!(metrics.enumeration_failures(), 1);
}

#[tokio::test]
async fn test_stale_selection_replaced_but_not_persisted() {
    let host = FakeHost::with_devices(&["cam0", "cam1"]);
    let store = StateStore::in_memory();
    store.set_camera_device_id(&DeviceId::new("unplugged"));
    let (mut session, _) = session(host.clone(), store.clone());

    session.enumerate_devices().await;
    assert_eq!(session.current_device(), Some(&DeviceId::new("cam0")));
    assert_eq!(store.camera_device_id(), Some(DeviceId::new("unplugged")));
}

#[tokio::test]
async fn test_empty_enumeration_keeps_selection() {
    let host = FakeHost::with_devices(&[]);
    let store = StateStore::in_memory();
    store.set_camera_device_id(&DeviceId::new("cam0"));
    let (mut session, _) = session(host, store);

    session.enumerate_devices().await;
    assert!(session.devices().is_empty());
    assert_eq!(session.current_device(), Some(&DeviceId::new("cam0")));
}

#[tokio::test]
async fn test_switch_ignores_unknown_and_current() {
    let host = FakeHost::with_devices(&["cam0", "cam1"]);
    let store = StateStore::in_memory();
    let (mut session, _) = session(host.clone(), store.clone());
    session.start().await;

    assert!(!session.switch_to_device(&DeviceId::new("ghost")).await);
    assert!(!session.switch_to_device(&DeviceId::new("cam0")).await);
    assert!(store.camera_device_id().is_none());
    assert_eq!(host.opened(), vec!["cam0"]);

    assert!(session.switch_to_device(&DeviceId::new("cam1")).await);
    assert_eq!(store.camera_device_id(), Some(DeviceId::new("cam1")));
    assert_eq!(host.opened(), vec!["cam0", "cam1"]);
    assert_eq!(host.released(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_passes_through_loading_without_overlap() {
    let host = FakeHost::with_devices(&["cam0"]);
    let metrics = Arc::new(Metrics::new());
    let mut session = CameraSession::new(
        host.clone(),
        StateStore::in_memory(),
        metrics.clone(),
        Duration::from_millis(100),
    );
    session.start().await;
    let mut statuses = session.subscribe_status();

    session.refresh_feed().await;

    assert_eq!(statuses.try_recv().unwrap(), ScannerStatus::Loading);
    assert_eq!(statuses.try_recv().unwrap(), ScannerStatus::Waiting);
    assert!(statuses.try_recv().is_err());

    assert_eq!(host.opened(), vec!["cam0", "cam0"]);
    assert_eq!(host.max_active(), 1);
    assert_eq!(host.released(), 1);
    assert_eq!(metrics.feed_refreshes(), 1);
}

#[tokio::test]
async fn test_refresh_skipped_while_suspended() {
    let host = FakeHost::with_devices(&["cam0"]);
    let (mut session, _) = session(host.clone(), StateStore::in_memory());
    session.start().await;

    session.suspend_feed().await;
    assert!(session.is_suspended());
    assert!(!session.has_feed());
    assert_eq!(host.active(), 0);

    session.refresh_feed().await;
    assert_eq!(host.opened(), vec!["cam0"]);

    session.resume_feed().await;
    assert!(!session.is_suspended());
    assert!(session.has_feed());
    assert_eq!(session.status(), ScannerStatus::Waiting);
}

#[tokio::test]
async fn test_fault_sets_error_with_notice() {
    let host = FakeHost::with_devices(&["cam0"]);
    let (mut session, metrics) = session(host, StateStore::in_memory());
    session.start().await;

    let notice = session.handle_fault(CaptureFault::new(NOT_READABLE_ERROR, "busy")).unwrap();
    assert_eq!(notice.kind, CaptureErrorKind::DeviceInUse);
    assert_eq!(session.status(), ScannerStatus::Error);
    assert_eq!(session.notice(), Some(&notice));
    assert_eq!(metrics.capture_errors(), 1);

    session.dismiss_notice();
    assert!(session.notice().is_none());
}

#[tokio::test]
async fn test_benign_fault_has_no_notice() {
    let host = FakeHost::with_devices(&["cam0"]);
    let (mut session, _) = session(host, StateStore::in_memory());
    session.start().await;

    let fault = CaptureFault::new("Error", BENIGN_DIMENSIONS_MESSAGE);
    assert!(session.handle_fault(fault).is_none());
    assert_eq!(session.status(), ScannerStatus::Error);
    assert!(session.notice().is_none());
}

#[tokio::test]
async fn test_unknown_fault_message_carries_name_and_text() {
    let host = FakeHost::with_devices(&["cam0"]);
    let (session, _) = session(host, StateStore::in_memory());

    let kind = session.classify_error(&CaptureFault::new("AbortError", "stream aborted"));
    assert_eq!(kind.message(), "Unknown error. [AbortError] stream aborted");
}

#[tokio::test]
async fn test_bind_failure_and_recovery_on_refresh() {
    let host = FakeHost::with_devices(&["cam0"]);
    host.fail_open(Some(CaptureFault::new(NOT_ALLOWED_ERROR, "denied")));
    let (mut session, _) = session(host.clone(), StateStore::in_memory());

    session.start().await;
    assert_eq!(session.status(), ScannerStatus::Error);
    assert_eq!(session.notice().unwrap().kind, CaptureErrorKind::PermissionDenied);

    host.fail_open(None);
    session.refresh_feed().await;
    assert_eq!(session.status(), ScannerStatus::Waiting);
}

#[tokio::test]
async fn test_no_devices_reports_no_suitable_device() {
    let host = FakeHost::with_devices(&[]);
    let (mut session, _) = session(host.clone(), StateStore::in_memory());

    session.start().await;
    assert_eq!(session.status(), ScannerStatus::Error);
    assert_eq!(session.notice().unwrap().kind, CaptureErrorKind::NoSuitableDevice);
    assert!(host.opened().is_empty());
}

#[tokio::test]
async fn test_feed_events_and_end() {
    let host = FakeHost::with_devices(&["cam0"]);
    let (mut session, _) = session(host.clone(), StateStore::in_memory());
    session.start().await;

    assert!(host.emit(checkin_kiosk::io::FeedEvent::Decoded("hello".into())).await);
    assert_eq!(
        session.next_feed_event().await,
        Some(checkin_kiosk::io::FeedEvent::Decoded("hello".into()))
    );

    host.end_feed();
    assert_eq!(session.next_feed_event().await, None);
    session.feed_ended().await;
    assert_eq!(session.status(), ScannerStatus::Error);
    assert!(!session.has_feed());
    assert_eq!(host.active(), 0);
}
