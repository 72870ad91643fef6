use std::sync::Arc;
use std::time::Duration;

use qrscan_core::prelude::*;
use qrscan_core::{
    BarcodeFormat, CameraFacing, CameraSessionState, FormatFilter, HostEvent, PermissionGrant,
    PermissionState, Rect, ScanPhase,
};
use qrscan_device::test_utils::{
    FakeCamera, FakeCameraHandle, FakePermissions, GatedDecoder, PlacedSymbolDecoder,
};
use qrscan_device::{Decoder, Frame};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_test::{assert_pending, assert_ready, task};

use super::*;
use crate::context::{EventSender, HostContext, HostLifecycle};

const VIEW_ID: i32 = 7;
const CODE: i32 = 513469796 + VIEW_ID;

struct Harness {
    session: ScanSession,
    camera: FakeCameraHandle,
    permissions: FakePermissions,
    events: UnboundedReceiver<HostEvent>,
    lifecycle: HostLifecycle,
}

fn harness_with(
    camera: (FakeCamera, FakeCameraHandle),
    permissions: FakePermissions,
    decoder: Arc<dyn Decoder>,
    density: f32,
) -> Harness {
    let (camera, camera_handle) = camera;
    let (events, rx) = EventSender::channel();
    let lifecycle = HostLifecycle::new();
    let context = HostContext::new(VIEW_ID, density, events, lifecycle.clone());

    let session = ScanSession::new(
        context,
        Box::new(camera),
        Arc::new(permissions.clone()),
        decoder,
        SessionOptions::default(),
    );

    Harness {
        session,
        camera: camera_handle,
        permissions,
        events: rx,
        lifecycle,
    }
}

/// Granted, fully featured device with one QR symbol in the middle of the
/// 1080x1920 preview and one EAN-13 next to it.
fn harness() -> Harness {
    let decoder = PlacedSymbolDecoder::new()
        .with_symbol(540, 960, "qr-centre", BarcodeFormat::QrCode)
        .with_symbol(600, 960, "4006381333931", BarcodeFormat::Ean13);
    harness_with(
        FakeCamera::full_featured(),
        FakePermissions::granted(),
        Arc::new(decoder),
        1.0,
    )
}

fn preview_frame() -> Frame {
    Frame::blank(1080, 1920, 0)
}

async fn next_event(rx: &mut UnboundedReceiver<HostEvent>) -> Option<HostEvent> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .ok()
        .flatten()
}

/// Collect everything emitted within a short quiet period
async fn drain(rx: &mut UnboundedReceiver<HostEvent>) -> Vec<HostEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
        events.push(event);
    }
    events
}

fn recognized(events: &[HostEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            HostEvent::RecognizeQr(code) => code.code.clone(),
            _ => None,
        })
        .collect()
}

async fn wait_until<F: Fn() -> bool>(f: F) {
    for _ in 0..400 {
        if f() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

// ─────────────────────────────────────────────────────────
// startScan
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_scan_without_filter_delivers_everything() {
    let mut h = harness();

    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();
    assert_eq!(h.session.phase(), ScanPhase::Scanning);
    assert!(h.camera.preview_active());
    assert_eq!(
        next_event(&mut h.events).await,
        Some(HostEvent::PermissionSet(true))
    );

    assert!(h.camera.push_frame(preview_frame()));
    let events = drain(&mut h.events).await;
    let mut codes = recognized(&events);
    codes.sort();
    assert_eq!(codes, vec!["4006381333931", "qr-centre"]);
}

#[tokio::test]
async fn test_filter_blocks_unlisted_formats() {
    let mut h = harness();

    h.session
        .start_scan(FormatFilter::new([BarcodeFormat::Ean13]))
        .await
        .unwrap();
    h.camera.push_frame(preview_frame());

    let events = drain(&mut h.events).await;
    assert_eq!(recognized(&events), vec!["4006381333931"]);
    assert_eq!(h.session.dispatch_stats().filtered, 1);
}

#[tokio::test]
async fn test_start_scan_while_scanning_only_updates_filter() {
    let mut h = harness();
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();
    h.session
        .start_scan(FormatFilter::new([BarcodeFormat::QrCode]))
        .await
        .unwrap();

    assert_eq!(h.camera.count("open:0"), 1);
    assert_eq!(h.camera.count("start_preview"), 1);

    h.camera.push_frame(preview_frame());
    let events = drain(&mut h.events).await;
    assert_eq!(recognized(&events), vec!["qr-centre"]);
}

#[tokio::test]
async fn test_second_start_while_permission_pending() {
    let h = harness_with(
        FakeCamera::full_featured(),
        FakePermissions::prompting(),
        Arc::new(PlacedSymbolDecoder::new()),
        1.0,
    );

    let mut first = task::spawn(h.session.start_scan(FormatFilter::accept_all()));
    assert_pending!(first.poll());
    assert_eq!(h.session.phase(), ScanPhase::PermissionPending);

    let err = h
        .session
        .start_scan(FormatFilter::accept_all())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyRunning));

    let err = h.session.request_permissions().await.unwrap_err();
    assert!(matches!(err, Error::PermissionInProgress));
    assert_eq!(h.permissions.requests(), vec![CODE]);

    assert!(h
        .session
        .on_request_permissions_result(CODE, &[PermissionGrant::Granted]));
    assert_ready!(first.poll()).unwrap();
    assert_eq!(h.session.phase(), ScanPhase::Scanning);
}

#[tokio::test]
async fn test_denied_permission_leaves_session_idle() {
    let mut h = harness_with(
        FakeCamera::full_featured(),
        FakePermissions::prompting(),
        Arc::new(PlacedSymbolDecoder::new()),
        1.0,
    );

    let mut start = task::spawn(h.session.start_scan(FormatFilter::accept_all()));
    assert_pending!(start.poll());
    h.session
        .on_request_permissions_result(CODE, &[PermissionGrant::Denied]);

    let err = assert_ready!(start.poll()).unwrap_err();
    assert!(matches!(err, Error::PermissionDenied));
    assert_eq!(err.code(), "cameraPermission");
    drop(start);

    assert_eq!(h.session.phase(), ScanPhase::Idle);
    assert!(!h.camera.is_open());
    assert_eq!(
        next_event(&mut h.events).await,
        Some(HostEvent::PermissionSet(false))
    );
}

#[tokio::test]
async fn test_dispose_while_waiting_for_permission() {
    let h = harness_with(
        FakeCamera::full_featured(),
        FakePermissions::prompting(),
        Arc::new(PlacedSymbolDecoder::new()),
        1.0,
    );

    let mut start = task::spawn(h.session.start_scan(FormatFilter::accept_all()));
    assert_pending!(start.poll());
    h.session.dispose();

    let err = assert_ready!(start.poll()).unwrap_err();
    assert!(matches!(err, Error::ViewNotSet));
    assert!(!h.camera.is_open());
    assert_eq!(h.camera.count("open:0"), 0);
}

#[tokio::test]
async fn test_preview_failure_reports_camera_error() {
    let h = harness();
    h.camera.fail_start(true);

    let err = h
        .session
        .start_scan(FormatFilter::accept_all())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CAMERA_ERROR");
    assert_eq!(h.session.phase(), ScanPhase::CameraReady);

    // Hardware recovered: the next start succeeds without reopening
    h.camera.fail_start(false);
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();
    assert_eq!(h.session.phase(), ScanPhase::Scanning);
    assert_eq!(h.camera.count("open:0"), 1);
}

// ─────────────────────────────────────────────────────────
// Camera control
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_camera_ops_before_start_report_view_not_set() {
    let h = harness();
    assert!(matches!(h.session.pause_camera(), Err(Error::ViewNotSet)));
    assert!(matches!(h.session.resume_camera(), Err(Error::ViewNotSet)));
    assert!(matches!(h.session.flip_camera(), Err(Error::ViewNotSet)));
    assert!(matches!(h.session.toggle_flash(), Err(Error::ViewNotSet)));
    assert_eq!(h.session.camera_info().unwrap(), CameraFacing::Back);
    assert!(!h.session.flash_info().unwrap());
}

#[tokio::test]
async fn test_pause_resume_repeated() {
    let h = harness();
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();

    for _ in 0..3 {
        assert!(h.session.pause_camera().unwrap());
        assert_eq!(h.session.phase(), ScanPhase::Paused);
    }
    assert_eq!(h.camera.count("stop_preview"), 1);

    for _ in 0..3 {
        assert!(h.session.resume_camera().unwrap());
        assert_eq!(h.session.phase(), ScanPhase::Scanning);
    }
    assert_eq!(h.camera.count("start_preview"), 2);
}

#[tokio::test]
async fn test_flip_on_single_camera_device() {
    let h = harness_with(
        FakeCamera::back_only(),
        FakePermissions::granted(),
        Arc::new(PlacedSymbolDecoder::new()),
        1.0,
    );
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();

    assert_eq!(h.session.flip_camera().unwrap(), CameraFacing::Back);
    assert_eq!(h.session.camera_info().unwrap(), CameraFacing::Back);
    assert_eq!(h.session.phase(), ScanPhase::Scanning);
}

#[tokio::test]
async fn test_flip_and_flash_on_full_device() {
    let h = harness();
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();

    assert_eq!(h.session.flip_camera().unwrap(), CameraFacing::Front);
    assert_eq!(h.session.camera_info().unwrap().id(), 1);
    assert!(h.camera.preview_active());

    assert!(h.session.toggle_flash().unwrap());
    assert!(h.session.flash_info().unwrap());
    assert!(!h.session.toggle_flash().unwrap());
}

#[tokio::test]
async fn test_flash_less_device() {
    let h = harness_with(
        FakeCamera::back_only(),
        FakePermissions::granted(),
        Arc::new(PlacedSymbolDecoder::new()),
        1.0,
    );
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();

    let err = h.session.toggle_flash().unwrap_err();
    assert!(matches!(err, Error::UnsupportedFeature { .. }));
    assert_eq!(err.to_string(), "This device doesn't support flash");
    assert!(!h.session.flash_info().unwrap());
    assert!(!h.camera.torch());
}

#[tokio::test]
async fn test_system_features_reports_active_camera() {
    let h = harness();
    let before = h.session.system_features().unwrap();
    assert_eq!(before.active_camera, None);
    assert!(before.has_flash);

    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();
    assert_eq!(h.session.system_features().unwrap().active_camera, Some(0));
}

#[tokio::test]
async fn test_change_scan_area_uses_density() {
    let h = harness_with(
        FakeCamera::full_featured(),
        FakePermissions::granted(),
        Arc::new(PlacedSymbolDecoder::new()),
        2.0,
    );
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();

    assert!(h.session.change_scan_area(100.0, 100.0, 25.0).unwrap());
    // 200x200 px centred in 1080x1920, raised by 50 px
    assert_eq!(
        h.session.snapshot().framing,
        Some(Rect::new(440, 810, 640, 1010))
    );
}

#[tokio::test]
async fn test_scan_area_excludes_symbols_outside() {
    let decoder = PlacedSymbolDecoder::new()
        .with_symbol(540, 900, "inside", BarcodeFormat::QrCode)
        .with_symbol(540, 1030, "below", BarcodeFormat::QrCode);
    let mut h = harness_with(
        FakeCamera::full_featured(),
        FakePermissions::granted(),
        Arc::new(decoder),
        1.0,
    );
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();
    h.session.change_scan_area(200.0, 200.0, 50.0).unwrap();

    h.camera.push_frame(preview_frame());
    let events = drain(&mut h.events).await;
    assert_eq!(recognized(&events), vec!["inside"]);
}

#[tokio::test]
async fn test_invert_scan_finds_light_on_dark() {
    let decoder =
        PlacedSymbolDecoder::new().with_inverted_symbol(540, 960, "inverted", BarcodeFormat::QrCode);
    let mut h = harness_with(
        FakeCamera::full_featured(),
        FakePermissions::granted(),
        Arc::new(decoder),
        1.0,
    );
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();

    h.camera.push_frame(preview_frame());
    assert!(recognized(&drain(&mut h.events).await).is_empty());

    h.session.invert_scan(true).unwrap();
    h.camera.push_frame(preview_frame());
    assert_eq!(recognized(&drain(&mut h.events).await), vec!["inverted"]);
}

// ─────────────────────────────────────────────────────────
// stopScan and dispose
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stop_scan_keeps_camera_but_drops_results() {
    let mut h = harness();
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();
    drain(&mut h.events).await;

    h.session.stop_scan().unwrap();
    assert_eq!(h.session.phase(), ScanPhase::CameraReady);
    assert!(h.camera.is_open());
    assert!(!h.camera.released());

    h.camera.push_frame(preview_frame());
    assert!(recognized(&drain(&mut h.events).await).is_empty());
    assert!(h.session.dispatch_stats().dropped > 0);
}

#[tokio::test]
async fn test_dispose_during_in_flight_decode() {
    let (decoder, gate) = GatedDecoder::new(PlacedSymbolDecoder::new().with_symbol(
        540,
        960,
        "late",
        BarcodeFormat::QrCode,
    ));
    let mut h = harness_with(
        FakeCamera::full_featured(),
        FakePermissions::granted(),
        Arc::new(decoder),
        1.0,
    );
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();
    assert_eq!(
        next_event(&mut h.events).await,
        Some(HostEvent::PermissionSet(true))
    );

    h.camera.push_frame(preview_frame());
    gate.wait_started(1).await;
    h.session.dispose();
    gate.release(1);

    assert!(drain(&mut h.events).await.is_empty());
    assert_eq!(h.session.phase(), ScanPhase::Disposed);
    assert!(h.camera.released());

    assert!(matches!(
        h.session.start_scan(FormatFilter::accept_all()).await,
        Err(Error::ViewNotSet)
    ));
    assert!(matches!(h.session.pause_camera(), Err(Error::ViewNotSet)));
    assert!(matches!(h.session.camera_info(), Err(Error::ViewNotSet)));
    assert!(matches!(
        h.session.request_permissions().await,
        Err(Error::ViewNotSet)
    ));
}

#[tokio::test]
async fn test_dispose_is_idempotent() {
    let h = harness();
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();
    h.session.dispose();
    h.session.dispose();

    assert_eq!(h.camera.count("release"), 1);
    assert_eq!(h.session.snapshot().camera, CameraSessionState::Disposed);
}

// ─────────────────────────────────────────────────────────
// Host lifecycle
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_host_pause_and_resume_follow_camera() {
    let h = harness();
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();

    h.lifecycle.paused();
    wait_until(|| h.session.phase() == ScanPhase::Paused).await;
    assert!(!h.camera.preview_active());

    h.lifecycle.resumed();
    wait_until(|| h.session.phase() == ScanPhase::Scanning).await;
    assert!(h.camera.preview_active());
}

#[tokio::test]
async fn test_explicit_pause_survives_host_resume() {
    let h = harness();
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();
    h.session.pause_camera().unwrap();

    h.lifecycle.paused();
    h.lifecycle.resumed();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.session.phase(), ScanPhase::Paused);
    assert!(h.session.snapshot().explicit_pause);
    assert!(!h.camera.preview_active());
}

#[tokio::test]
async fn test_host_resume_reasks_revoked_permission() {
    let h = harness();
    h.session.start_scan(FormatFilter::accept_all()).await.unwrap();

    h.lifecycle.paused();
    wait_until(|| h.session.phase() == ScanPhase::Paused).await;

    h.permissions.set_granted(false);
    h.lifecycle.resumed();
    wait_until(|| h.permissions.requests() == vec![CODE]).await;
    assert_eq!(h.session.phase(), ScanPhase::Paused);
    assert_eq!(
        h.session.permission_gate().state(),
        PermissionState::Requesting
    );

    h.permissions.set_granted(true);
    assert!(h
        .session
        .on_request_permissions_result(CODE, &[PermissionGrant::Granted]));
    wait_until(|| h.session.phase() == ScanPhase::Scanning).await;
}

#[tokio::test]
async fn test_lifecycle_ignored_before_camera_opens() {
    let h = harness();
    h.lifecycle.paused();
    h.lifecycle.resumed();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(h.session.phase(), ScanPhase::Idle);
    assert!(h.camera.calls().is_empty());
}
