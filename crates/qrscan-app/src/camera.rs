//! Camera session: one exclusively owned camera plus its decode worker

use qrscan_core::prelude::*;
use qrscan_core::{CameraFacing, CameraFeatures, CameraSessionState, Rect, ScanAreaConfig};
use qrscan_device::{CameraHardware, DecodeWorker, WorkerStats};

use crate::scan_area::framing_rect;

/// Owns the camera handle for one view.
///
/// Operations are synchronous and expected to run on the control loop.
/// Once closed the session is terminal: every later operation reports
/// `ViewNotSet`.
pub struct CameraSession {
    hardware: Box<dyn CameraHardware>,
    worker: Option<DecodeWorker>,
    state: CameraSessionState,
    facing: CameraFacing,
    torch: bool,
    invert: bool,
    scan_area: Option<ScanAreaConfig>,
    margin_fraction: f64,
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("state", &self.state)
            .field("facing", &self.facing)
            .field("torch", &self.torch)
            .field("scan_area", &self.scan_area)
            .finish()
    }
}

impl CameraSession {
    pub fn new(hardware: Box<dyn CameraHardware>, margin_fraction: f64) -> Self {
        Self {
            hardware,
            worker: None,
            state: CameraSessionState::Uninitialized,
            facing: CameraFacing::Back,
            torch: false,
            invert: false,
            scan_area: None,
            margin_fraction,
        }
    }

    pub fn state(&self) -> CameraSessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    pub fn features(&self) -> CameraFeatures {
        self.hardware.features()
    }

    /// Current lens, or the one that will be requested on open
    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    pub fn torch(&self) -> bool {
        self.torch
    }

    pub fn invert(&self) -> bool {
        self.invert
    }

    pub fn scan_area(&self) -> Option<ScanAreaConfig> {
        self.scan_area
    }

    pub fn worker_stats(&self) -> Option<WorkerStats> {
        self.worker.as_ref().map(DecodeWorker::stats)
    }

    /// Region of the preview currently decoded
    pub fn framing(&self) -> Option<Rect> {
        framing_rect(
            &self.hardware.preview_geometry(),
            self.scan_area.as_ref(),
            self.margin_fraction,
        )
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state.is_open() {
            Ok(())
        } else {
            Err(Error::ViewNotSet)
        }
    }

    fn ensure_not_closed(&self) -> Result<()> {
        if self.state == CameraSessionState::Disposed {
            Err(Error::ViewNotSet)
        } else {
            Ok(())
        }
    }

    fn apply_options(&self) {
        if let Some(worker) = &self.worker {
            worker.set_framing(self.framing());
            worker.set_invert(self.invert);
        }
    }

    /// Acquire the camera and attach `worker` to its frames.
    ///
    /// Falls back to the other lens if `facing` is missing. Opening an
    /// already open session is a no-op and `worker` is dropped.
    pub fn open(&mut self, facing: CameraFacing, worker: DecodeWorker) -> Result<()> {
        self.ensure_not_closed()?;
        if self.state.is_open() {
            worker.shutdown();
            return Ok(());
        }

        let features = self.hardware.features();
        let facing = features.resolve(facing).ok_or(Error::CameraUnavailable)?;
        if let Err(e) = self.hardware.open(facing, worker.frame_sink()) {
            worker.shutdown();
            return Err(e);
        }

        self.facing = facing;
        self.worker = Some(worker);
        self.state = CameraSessionState::Ready;
        self.apply_options();
        info!("camera opened facing {:?}", facing);
        Ok(())
    }

    /// Start (or restart) the preview. Already scanning is a no-op.
    ///
    /// On failure the session stays where it was.
    pub fn resume(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.state == CameraSessionState::Scanning {
            return Ok(());
        }

        if !self.hardware.is_preview_active() {
            self.hardware.start_preview().map_err(|e| {
                warn!("camera preview failed to start: {}", e);
                match e {
                    Error::CameraConfig { .. } => e,
                    other => Error::camera_config(other.to_string()),
                }
            })?;
        }
        self.state = CameraSessionState::Scanning;
        // Layout is only settled once the preview runs
        self.apply_options();
        debug!("camera preview running");
        Ok(())
    }

    /// Stop the preview. Paused or never-started sessions are left alone.
    pub fn pause(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.state != CameraSessionState::Scanning {
            return Ok(());
        }

        if self.hardware.is_preview_active() {
            self.hardware.stop_preview();
        }
        self.state = CameraSessionState::Paused;
        debug!("camera preview paused");
        Ok(())
    }

    /// Switch lens, keeping the preview running if it was.
    ///
    /// Devices without both cameras keep the current lens.
    pub fn flip(&mut self) -> Result<CameraFacing> {
        self.ensure_open()?;
        if !self.hardware.features().can_flip() {
            debug!("flip ignored, only one camera");
            return Ok(self.facing);
        }

        let was_scanning = self.state == CameraSessionState::Scanning;
        if was_scanning {
            self.pause()?;
        }

        let target = self.facing.opposite();
        let switched = self.hardware.switch_camera(target);
        if switched.is_ok() {
            self.facing = target;
            self.torch = false;
            self.apply_options();
            info!("camera flipped to {:?}", target);
        }

        if was_scanning {
            self.resume()?;
        }
        switched.map(|()| self.facing)
    }

    pub fn set_torch(&mut self, on: bool) -> Result<bool> {
        self.ensure_open()?;
        if !self.hardware.features().has_flash {
            return Err(Error::unsupported("flash"));
        }
        self.hardware.set_torch(on)?;
        self.torch = on;
        Ok(on)
    }

    pub fn toggle_torch(&mut self) -> Result<bool> {
        self.set_torch(!self.torch)
    }

    /// Store a new scan area and re-frame the decoder
    pub fn set_scan_area(&mut self, config: ScanAreaConfig) -> Result<Option<Rect>> {
        self.ensure_not_closed()?;
        self.scan_area = Some(config);
        self.apply_options();
        Ok(self.framing())
    }

    pub fn set_invert(&mut self, invert: bool) -> Result<()> {
        self.ensure_not_closed()?;
        self.invert = invert;
        self.apply_options();
        Ok(())
    }

    /// Release the camera and stop the worker. Terminal and idempotent.
    pub fn close(&mut self) {
        if self.state == CameraSessionState::Disposed {
            return;
        }

        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        if self.hardware.is_preview_active() {
            self.hardware.stop_preview();
        }
        self.hardware.release();
        self.torch = false;
        self.state = CameraSessionState::Disposed;
        info!("camera released");
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrscan_device::test_utils::{CollectingSink, FakeCamera, FakeCameraHandle, PlacedSymbolDecoder};
    use qrscan_device::PreviewGeometry;
    use std::sync::Arc;

    fn worker() -> DecodeWorker {
        DecodeWorker::spawn(
            Arc::new(PlacedSymbolDecoder::new()),
            Arc::new(CollectingSink::default()),
        )
    }

    fn open_session(
        (camera, handle): (FakeCamera, FakeCameraHandle),
    ) -> (CameraSession, FakeCameraHandle) {
        let mut session = CameraSession::new(Box::new(camera), 0.1);
        session.open(CameraFacing::Back, worker()).unwrap();
        (session, handle)
    }

    #[tokio::test]
    async fn test_operations_before_open_report_view_not_set() {
        let (camera, _handle) = FakeCamera::full_featured();
        let mut session = CameraSession::new(Box::new(camera), 0.1);

        assert!(matches!(session.pause(), Err(Error::ViewNotSet)));
        assert!(matches!(session.resume(), Err(Error::ViewNotSet)));
        assert!(matches!(session.flip(), Err(Error::ViewNotSet)));
        assert!(matches!(session.toggle_torch(), Err(Error::ViewNotSet)));
    }

    #[tokio::test]
    async fn test_pause_resume_idempotent() {
        let (mut session, handle) = open_session(FakeCamera::full_featured());
        assert_eq!(session.state(), CameraSessionState::Ready);

        // Never started: pause is a quiet no-op
        session.pause().unwrap();
        assert_eq!(session.state(), CameraSessionState::Ready);

        session.resume().unwrap();
        session.resume().unwrap();
        assert_eq!(handle.count("start_preview"), 1);

        for _ in 0..3 {
            session.pause().unwrap();
            assert_eq!(session.state(), CameraSessionState::Paused);
        }
        assert_eq!(handle.count("stop_preview"), 1);

        session.resume().unwrap();
        assert_eq!(session.state(), CameraSessionState::Scanning);
        assert!(handle.preview_active());
    }

    #[tokio::test]
    async fn test_open_falls_back_to_existing_lens() {
        let (camera, handle) = FakeCamera::new(CameraFeatures {
            has_back_camera: false,
            has_front_camera: true,
            has_flash: false,
        });
        let mut session = CameraSession::new(Box::new(camera), 0.1);
        session.open(CameraFacing::Back, worker()).unwrap();
        assert_eq!(session.facing(), CameraFacing::Front);
        assert_eq!(handle.facing(), Some(CameraFacing::Front));
    }

    #[tokio::test]
    async fn test_open_without_any_camera() {
        let (camera, _handle) = FakeCamera::new(CameraFeatures::default());
        let mut session = CameraSession::new(Box::new(camera), 0.1);
        let err = session.open(CameraFacing::Back, worker()).unwrap_err();
        assert!(matches!(err, Error::CameraUnavailable));
        assert_eq!(session.state(), CameraSessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_flip_restores_preview_state() {
        let (mut session, handle) = open_session(FakeCamera::full_featured());
        session.resume().unwrap();

        assert_eq!(session.flip().unwrap(), CameraFacing::Front);
        assert_eq!(session.state(), CameraSessionState::Scanning);
        assert!(handle.preview_active());

        session.pause().unwrap();
        assert_eq!(session.flip().unwrap(), CameraFacing::Back);
        assert_eq!(session.state(), CameraSessionState::Paused);
        assert!(!handle.preview_active());
    }

    #[tokio::test]
    async fn test_flip_single_camera_is_noop() {
        let (mut session, handle) = open_session(FakeCamera::back_only());
        session.resume().unwrap();

        assert_eq!(session.flip().unwrap(), CameraFacing::Back);
        assert_eq!(session.state(), CameraSessionState::Scanning);
        assert_eq!(handle.count("switch:1"), 0);
    }

    #[tokio::test]
    async fn test_torch_without_flash_never_changes_state() {
        let (mut session, handle) = open_session(FakeCamera::back_only());
        for _ in 0..3 {
            let err = session.toggle_torch().unwrap_err();
            assert!(matches!(err, Error::UnsupportedFeature { .. }));
            assert_eq!(err.code(), "404");
        }
        assert!(!session.torch());
        assert!(!handle.torch());
    }

    #[tokio::test]
    async fn test_torch_toggles() {
        let (mut session, handle) = open_session(FakeCamera::full_featured());
        assert!(session.toggle_torch().unwrap());
        assert!(handle.torch());
        assert!(!session.toggle_torch().unwrap());
    }

    #[tokio::test]
    async fn test_preview_failure_keeps_ready() {
        let (mut session, handle) = open_session(FakeCamera::full_featured());
        handle.fail_start(true);

        let err = session.resume().unwrap_err();
        assert_eq!(err.code(), "CAMERA_ERROR");
        assert_eq!(session.state(), CameraSessionState::Ready);
    }

    #[tokio::test]
    async fn test_scan_area_updates_framing() {
        let (camera, handle) = FakeCamera::full_featured();
        let camera = camera.with_geometry(PreviewGeometry::full(1000, 1000));
        let (mut session, _handle) = open_session((camera, handle));

        let rect = session
            .set_scan_area(ScanAreaConfig::new(400, 400, 100))
            .unwrap();
        assert_eq!(rect, Some(Rect::new(300, 200, 700, 600)));
    }

    #[tokio::test]
    async fn test_resume_reframes_after_layout_change() {
        let (camera, handle) = FakeCamera::full_featured();
        let camera = camera.with_geometry(PreviewGeometry::default());
        let (mut session, handle) = open_session((camera, handle));
        let framing = |session: &CameraSession| session.worker.as_ref().unwrap().options().framing;

        session.set_scan_area(ScanAreaConfig::new(400, 400, 0)).unwrap();
        assert_eq!(framing(&session), None);

        handle.set_geometry(PreviewGeometry::full(1000, 1000));
        session.resume().unwrap();
        assert_eq!(framing(&session), Some(Rect::new(300, 300, 700, 700)));

        session.pause().unwrap();
        handle.set_geometry(PreviewGeometry::full(600, 600));
        session.resume().unwrap();
        assert_eq!(framing(&session), Some(Rect::new(100, 100, 500, 500)));
    }

    #[tokio::test]
    async fn test_close_is_terminal() {
        let (mut session, handle) = open_session(FakeCamera::full_featured());
        session.resume().unwrap();
        session.close();
        session.close();

        assert_eq!(session.state(), CameraSessionState::Disposed);
        assert!(handle.released());
        assert_eq!(handle.count("release"), 1);
        assert!(matches!(session.pause(), Err(Error::ViewNotSet)));
        assert!(matches!(session.flip(), Err(Error::ViewNotSet)));
        assert!(matches!(
            session.set_scan_area(ScanAreaConfig::new(1, 1, 0)),
            Err(Error::ViewNotSet)
        ));
        assert!(matches!(
            session.open(CameraFacing::Back, worker()),
            Err(Error::ViewNotSet)
        ));
    }
}
