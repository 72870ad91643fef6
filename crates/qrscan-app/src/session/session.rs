//! Scan session: the coordinating state machine of one scan view

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use qrscan_core::prelude::*;
use qrscan_core::{
    CameraFacing, CameraSessionState, FormatFilter, PermissionGrant, PermissionState, Rect,
    ScanAreaConfig, ScanPhase, SystemFeatures,
};
use qrscan_device::{
    request_code, CameraHardware, DecodeWorker, Decoder, PermissionPlatform, WorkerStats,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::dispatch::{DispatchStats, ResultDispatch};
use crate::camera::CameraSession;
use crate::config::ScanSettings;
use crate::context::{HostContext, LifecycleEvent};
use crate::permission_gate::PermissionGate;
use crate::scan_area::DEFAULT_MARGIN_FRACTION;

/// Construction-time knobs, usually taken from [`ScanSettings`]
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub default_facing: CameraFacing,
    pub request_code_base: i32,
    pub margin_fraction: f64,
    pub invert_scan: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_facing: CameraFacing::Back,
            request_code_base: qrscan_device::DEFAULT_REQUEST_CODE_BASE,
            margin_fraction: DEFAULT_MARGIN_FRACTION,
            invert_scan: false,
        }
    }
}

impl From<&ScanSettings> for SessionOptions {
    fn from(settings: &ScanSettings) -> Self {
        Self {
            default_facing: settings.camera.default_facing,
            request_code_base: settings.permission.request_code_base,
            margin_fraction: settings.scan_area.margin_fraction,
            invert_scan: settings.decoder.invert_scan,
        }
    }
}

/// Point-in-time view of a session, for logs and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: ScanPhase,
    pub camera: CameraSessionState,
    pub permission: PermissionState,
    pub facing: CameraFacing,
    pub torch: bool,
    pub explicit_pause: bool,
    pub framing: Option<Rect>,
}

struct SessionState {
    phase: ScanPhase,
    camera: CameraSession,
    explicit_pause: bool,
}

struct SessionCore {
    view_id: i32,
    density: f32,
    default_facing: CameraFacing,
    gate: Arc<PermissionGate>,
    decoder: Arc<dyn Decoder>,
    dispatch: Arc<ResultDispatch>,
    state: Mutex<SessionState>,
}

/// One scan view's session.
///
/// All state sits behind a synchronous lock that is never held across an
/// await, so permission prompts can suspend without blocking other calls.
pub struct ScanSession {
    core: Arc<SessionCore>,
    lifecycle_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("view_id", &self.core.view_id)
            .field("phase", &self.phase())
            .finish()
    }
}

impl ScanSession {
    /// Build a session for the view described by `context`.
    ///
    /// Must be called inside a tokio runtime: the session subscribes to the
    /// host lifecycle on a background task.
    pub fn new(
        context: HostContext,
        camera: Box<dyn CameraHardware>,
        permissions: Arc<dyn PermissionPlatform>,
        decoder: Arc<dyn Decoder>,
        options: SessionOptions,
    ) -> Self {
        let code = request_code(options.request_code_base, context.view_id);
        let gate = Arc::new(PermissionGate::new(
            permissions,
            code,
            context.events.clone(),
        ));
        let dispatch = Arc::new(ResultDispatch::new(context.events.clone()));

        let mut camera = CameraSession::new(camera, options.margin_fraction);
        if options.invert_scan {
            // Camera is not open yet, so this only records the mode
            let _ = camera.set_invert(true);
        }

        let core = Arc::new(SessionCore {
            view_id: context.view_id,
            density: context.density,
            default_facing: options.default_facing,
            gate,
            decoder,
            dispatch,
            state: Mutex::new(SessionState {
                phase: ScanPhase::Idle,
                camera,
                explicit_pause: false,
            }),
        });

        let lifecycle_task = spawn_lifecycle_listener(Arc::downgrade(&core), &context);
        info!("scan session created for view {}", context.view_id);

        Self {
            core,
            lifecycle_task: Mutex::new(Some(lifecycle_task)),
        }
    }

    pub fn view_id(&self) -> i32 {
        self.core.view_id
    }

    pub fn phase(&self) -> ScanPhase {
        self.core.lock().phase
    }

    pub fn is_disposed(&self) -> bool {
        self.phase() == ScanPhase::Disposed
    }

    pub fn permission_gate(&self) -> Arc<PermissionGate> {
        self.core.gate.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.core.lock();
        SessionSnapshot {
            phase: state.phase,
            camera: state.camera.state(),
            permission: self.core.gate.state(),
            facing: state.camera.facing(),
            torch: state.camera.torch(),
            explicit_pause: state.explicit_pause,
            framing: state.camera.framing(),
        }
    }

    pub fn worker_stats(&self) -> Option<WorkerStats> {
        self.core.lock().camera.worker_stats()
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.core.dispatch.stats()
    }

    /// Route a platform permission answer to this view's gate
    pub fn on_request_permissions_result(
        &self,
        request_code: i32,
        grants: &[PermissionGrant],
    ) -> bool {
        self.core
            .gate
            .on_request_permissions_result(request_code, grants)
    }

    // ─────────────────────────────────────────────────────────
    // Scanning
    // ─────────────────────────────────────────────────────────

    /// Start delivering decoded symbols, prompting for permission and
    /// opening the camera as needed.
    ///
    /// While already scanning only the format filter changes. A second
    /// call while the first is waiting for permission fails with
    /// `AlreadyRunning`.
    pub async fn start_scan(&self, formats: FormatFilter) -> Result<()> {
        let previous = {
            let mut state = self.core.lock();
            let current = state.phase;
            match current {
                ScanPhase::Disposed => return Err(Error::ViewNotSet),
                ScanPhase::PermissionPending => return Err(Error::AlreadyRunning),
                ScanPhase::Scanning => {
                    self.core.dispatch.set_filter(formats);
                    debug!("view {} already scanning, filter updated", self.core.view_id);
                    return Ok(());
                }
                phase => {
                    state.phase = ScanPhase::PermissionPending;
                    phase
                }
            }
        };

        let permission = self.core.gate.ensure_permission().await;

        let mut state = self.core.lock();
        if state.phase == ScanPhase::Disposed {
            debug!("view {} disposed while waiting for permission", self.core.view_id);
            return Err(Error::ViewNotSet);
        }

        match permission {
            Ok(true) => {}
            Ok(false) => {
                state.phase = previous;
                return Err(Error::PermissionDenied);
            }
            Err(e) => {
                state.phase = previous;
                return Err(e);
            }
        }

        self.core.dispatch.set_filter(formats);
        if !state.camera.is_open() {
            let worker = DecodeWorker::spawn(
                self.core.decoder.clone(),
                self.core.dispatch.clone(),
            );
            if let Err(e) = state.camera.open(self.core.default_facing, worker) {
                state.phase = previous;
                return Err(e);
            }
        }

        state.phase = ScanPhase::CameraReady;
        state.explicit_pause = false;
        self.core.dispatch.activate();

        match state.camera.resume() {
            Ok(()) => {
                state.phase = ScanPhase::Scanning;
                info!("view {} scanning", self.core.view_id);
                Ok(())
            }
            Err(e) => {
                error!("view {} could not start preview: {}", self.core.view_id, e);
                Err(e)
            }
        }
    }

    /// Stop delivering results but keep the camera.
    pub fn stop_scan(&self) -> Result<()> {
        let mut state = self.core.lock_live()?;
        self.core.dispatch.deactivate();
        if matches!(state.phase, ScanPhase::Scanning | ScanPhase::Paused) {
            state.phase = ScanPhase::CameraReady;
        }
        info!("view {} stopped scanning", self.core.view_id);
        Ok(())
    }

    /// Replace the format filter without starting a scan
    pub fn set_allowed_formats(&self, formats: FormatFilter) -> Result<bool> {
        let _state = self.core.lock_live()?;
        self.core.dispatch.set_filter(formats);
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────
    // Camera Control
    // ─────────────────────────────────────────────────────────

    /// Pause the preview on request of the host; survives host resumes
    pub fn pause_camera(&self) -> Result<bool> {
        let mut state = self.core.lock_live()?;
        state.camera.pause()?;
        state.explicit_pause = true;
        if state.phase == ScanPhase::Scanning {
            state.phase = ScanPhase::Paused;
        }
        Ok(true)
    }

    pub fn resume_camera(&self) -> Result<bool> {
        let mut state = self.core.lock_live()?;
        state.camera.resume()?;
        state.explicit_pause = false;
        if state.phase == ScanPhase::Paused {
            state.phase = ScanPhase::Scanning;
        }
        Ok(true)
    }

    pub fn flip_camera(&self) -> Result<CameraFacing> {
        self.core.lock_live()?.camera.flip()
    }

    pub fn toggle_flash(&self) -> Result<bool> {
        self.core.lock_live()?.camera.toggle_torch()
    }

    /// Active lens, or the lens `startScan` will request
    pub fn camera_info(&self) -> Result<CameraFacing> {
        let state = self.core.lock_live()?;
        if state.camera.is_open() {
            Ok(state.camera.facing())
        } else {
            Ok(self.core.default_facing)
        }
    }

    pub fn flash_info(&self) -> Result<bool> {
        Ok(self.core.lock_live()?.camera.torch())
    }

    pub fn system_features(&self) -> Result<SystemFeatures> {
        let state = self.core.lock_live()?;
        let active = state
            .camera
            .is_open()
            .then(|| state.camera.facing());
        Ok(SystemFeatures::new(state.camera.features(), active))
    }

    /// Restrict decoding to a centred area, given in dp
    pub fn change_scan_area(&self, width: f64, height: f64, bottom_offset: f64) -> Result<bool> {
        let config = ScanAreaConfig::from_dp(width, height, bottom_offset, self.core.density);
        let mut state = self.core.lock_live()?;
        let framing = state.camera.set_scan_area(config)?;
        debug!(
            "view {} scan area {:?} framing {:?}",
            self.core.view_id, config, framing
        );
        Ok(true)
    }

    pub fn invert_scan(&self, invert: bool) -> Result<()> {
        self.core.lock_live()?.camera.set_invert(invert)
    }

    /// Run the permission gate on behalf of the host
    pub async fn request_permissions(&self) -> Result<bool> {
        if self.is_disposed() {
            return Err(Error::ViewNotSet);
        }
        self.core.gate.ensure_permission().await
    }

    // ─────────────────────────────────────────────────────────
    // Teardown
    // ─────────────────────────────────────────────────────────

    /// Release everything the session holds. Idempotent.
    ///
    /// No `onRecognizeQR` is emitted after this returns, even for a decode
    /// that is still running.
    pub fn dispose(&self) {
        self.core.dispatch.dispose();
        self.core.gate.cancel();

        let task = self
            .lifecycle_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }

        let mut state = self.core.lock();
        if state.phase == ScanPhase::Disposed {
            return;
        }
        if state.camera.is_open() {
            if let Err(e) = state.camera.pause() {
                debug!("pause during dispose failed: {}", e);
            }
        }
        state.camera.close();
        state.phase = ScanPhase::Disposed;
        info!("view {} disposed", self.core.view_id);
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl SessionCore {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock for an operation that is invalid once disposed
    fn lock_live(&self) -> Result<MutexGuard<'_, SessionState>> {
        let state = self.lock();
        if state.phase == ScanPhase::Disposed {
            return Err(Error::ViewNotSet);
        }
        Ok(state)
    }

    async fn on_lifecycle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Paused => self.on_host_paused(),
            LifecycleEvent::Resumed => self.on_host_resumed().await,
        }
    }

    fn on_host_paused(&self) {
        let mut state = self.lock();
        if state.phase == ScanPhase::Disposed || state.explicit_pause || !state.camera.is_open() {
            return;
        }
        if let Err(e) = state.camera.pause() {
            warn!("view {} failed to pause with host: {}", self.view_id, e);
            return;
        }
        if state.phase == ScanPhase::Scanning {
            state.phase = ScanPhase::Paused;
        }
        debug!("view {} paused with host", self.view_id);
    }

    async fn on_host_resumed(&self) {
        let needs_permission = {
            let state = self.lock();
            if state.phase == ScanPhase::Disposed
                || state.explicit_pause
                || !state.camera.is_open()
            {
                return;
            }
            !self.gate.refresh()
        };

        if needs_permission {
            info!("view {} lost camera permission, asking again", self.view_id);
            match self.gate.ensure_permission().await {
                Ok(true) => {}
                Ok(false) => return,
                Err(e) => {
                    debug!("view {} permission on resume: {}", self.view_id, e);
                    return;
                }
            }
        }

        let mut state = self.lock();
        if state.phase == ScanPhase::Disposed || state.explicit_pause {
            return;
        }
        match state.camera.resume() {
            Ok(()) => {
                if state.phase == ScanPhase::Paused {
                    state.phase = ScanPhase::Scanning;
                }
                debug!("view {} resumed with host", self.view_id);
            }
            Err(e) => warn!("view {} failed to resume with host: {}", self.view_id, e),
        }
    }
}

fn spawn_lifecycle_listener(core: Weak<SessionCore>, context: &HostContext) -> JoinHandle<()> {
    let mut events = context.lifecycle.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("lifecycle listener lagged, skipped {} event(s)", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let Some(core) = core.upgrade() else {
                break;
            };
            core.on_lifecycle(event).await;
        }
    })
}
