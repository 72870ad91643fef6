//! Test doubles for camera, permission and decoder seams
//!
//! Shared with dependant crates through the `test-helpers` feature.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use qrscan_core::prelude::*;
use qrscan_core::{BarcodeFormat, BarcodeResult, CameraFacing, CameraFeatures};

use crate::camera::{CameraHardware, PreviewGeometry};
use crate::decoder::Decoder;
use crate::frame::Frame;
use crate::permission::PermissionPlatform;
use crate::worker::{FrameSink, ResultSink};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ─────────────────────────────────────────────────────────
// Camera
// ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct FakeCameraState {
    calls: Vec<String>,
    frames: Option<FrameSink>,
    facing: Option<CameraFacing>,
    preview_active: bool,
    torch: bool,
    released: bool,
    fail_start: bool,
    geometry: PreviewGeometry,
}

/// Scriptable camera. Inspect and drive it through [`FakeCameraHandle`].
pub struct FakeCamera {
    features: CameraFeatures,
    state: Arc<Mutex<FakeCameraState>>,
}

/// Test-side view of a [`FakeCamera`] owned by a session
#[derive(Clone)]
pub struct FakeCameraHandle {
    state: Arc<Mutex<FakeCameraState>>,
}

impl FakeCamera {
    pub fn new(features: CameraFeatures) -> (Self, FakeCameraHandle) {
        let state = Arc::new(Mutex::new(FakeCameraState {
            geometry: PreviewGeometry::full(1080, 1920),
            ..Default::default()
        }));
        let camera = Self {
            features,
            state: state.clone(),
        };
        (camera, FakeCameraHandle { state })
    }

    /// Front and back cameras plus a flash
    pub fn full_featured() -> (Self, FakeCameraHandle) {
        Self::new(CameraFeatures {
            has_back_camera: true,
            has_front_camera: true,
            has_flash: true,
        })
    }

    /// Back camera only, no flash
    pub fn back_only() -> (Self, FakeCameraHandle) {
        Self::new(CameraFeatures {
            has_back_camera: true,
            has_front_camera: false,
            has_flash: false,
        })
    }

    pub fn with_geometry(self, geometry: PreviewGeometry) -> Self {
        lock(&self.state).geometry = geometry;
        self
    }

    fn record(&self, call: impl Into<String>) -> MutexGuard<'_, FakeCameraState> {
        let mut state = lock(&self.state);
        state.calls.push(call.into());
        state
    }
}

impl CameraHardware for FakeCamera {
    fn features(&self) -> CameraFeatures {
        self.features
    }

    fn open(&mut self, facing: CameraFacing, frames: FrameSink) -> Result<()> {
        let mut state = self.record(format!("open:{}", facing.id()));
        state.facing = Some(facing);
        state.frames = Some(frames);
        state.released = false;
        Ok(())
    }

    fn start_preview(&mut self) -> Result<()> {
        let mut state = self.record("start_preview");
        if state.fail_start {
            return Err(Error::camera_config("preview configuration failed"));
        }
        state.preview_active = true;
        Ok(())
    }

    fn stop_preview(&mut self) {
        self.record("stop_preview").preview_active = false;
    }

    fn is_preview_active(&self) -> bool {
        lock(&self.state).preview_active
    }

    fn switch_camera(&mut self, facing: CameraFacing) -> Result<()> {
        self.record(format!("switch:{}", facing.id())).facing = Some(facing);
        Ok(())
    }

    fn set_torch(&mut self, on: bool) -> Result<()> {
        self.record(format!("torch:{}", on)).torch = on;
        Ok(())
    }

    fn preview_geometry(&self) -> PreviewGeometry {
        lock(&self.state).geometry
    }

    fn release(&mut self) {
        let mut state = self.record("release");
        state.preview_active = false;
        state.frames = None;
        state.released = true;
    }
}

impl FakeCameraHandle {
    /// Deliver a frame as the camera would. Dropped unless the preview runs.
    pub fn push_frame(&self, frame: Frame) -> bool {
        let state = lock(&self.state);
        match (&state.frames, state.preview_active) {
            (Some(frames), true) => frames.submit(frame),
            _ => false,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        lock(&self.state).calls.iter().filter(|c| *c == call).count()
    }

    pub fn preview_active(&self) -> bool {
        lock(&self.state).preview_active
    }

    pub fn torch(&self) -> bool {
        lock(&self.state).torch
    }

    pub fn facing(&self) -> Option<CameraFacing> {
        lock(&self.state).facing
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).frames.is_some()
    }

    pub fn released(&self) -> bool {
        lock(&self.state).released
    }

    /// Change the layout reported from now on
    pub fn set_geometry(&self, geometry: PreviewGeometry) {
        lock(&self.state).geometry = geometry;
    }

    /// Make the next `start_preview` calls fail
    pub fn fail_start(&self, fail: bool) {
        lock(&self.state).fail_start = fail;
    }
}

// ─────────────────────────────────────────────────────────
// Permissions
// ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct FakePermissionState {
    runtime: bool,
    granted: bool,
    requests: Vec<i32>,
}

/// Permission platform that records prompts instead of showing them
#[derive(Clone, Default)]
pub struct FakePermissions {
    state: Arc<Mutex<FakePermissionState>>,
}

impl FakePermissions {
    /// Runtime-prompting platform, not yet granted
    pub fn prompting() -> Self {
        let permissions = Self::default();
        lock(&permissions.state).runtime = true;
        permissions
    }

    /// Runtime-prompting platform where access was granted earlier
    pub fn granted() -> Self {
        let permissions = Self::prompting();
        permissions.set_granted(true);
        permissions
    }

    pub fn set_granted(&self, granted: bool) {
        lock(&self.state).granted = granted;
    }

    /// Request codes of every prompt shown so far
    pub fn requests(&self) -> Vec<i32> {
        lock(&self.state).requests.clone()
    }
}

impl PermissionPlatform for FakePermissions {
    fn requires_runtime_request(&self) -> bool {
        lock(&self.state).runtime
    }

    fn is_granted(&self) -> bool {
        lock(&self.state).granted
    }

    fn request(&self, request_code: i32) {
        lock(&self.state).requests.push(request_code);
    }
}

// ─────────────────────────────────────────────────────────
// Decoders
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct PlacedSymbol {
    x: i32,
    y: i32,
    result: BarcodeResult,
    inverted: bool,
}

/// Decoder that "sees" symbols at fixed preview coordinates.
///
/// A symbol is reported when its point lies inside the frame bounds, so
/// cropping by a framing rectangle hides symbols outside it.
#[derive(Debug, Clone, Default)]
pub struct PlacedSymbolDecoder {
    symbols: Vec<PlacedSymbol>,
    failing: bool,
}

impl PlacedSymbolDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder whose every call fails
    pub fn failing() -> Self {
        Self {
            symbols: Vec::new(),
            failing: true,
        }
    }

    pub fn with_symbol(self, x: i32, y: i32, text: &str, format: BarcodeFormat) -> Self {
        self.place(x, y, text, format, false)
    }

    /// Symbol only visible in the inverted image
    pub fn with_inverted_symbol(self, x: i32, y: i32, text: &str, format: BarcodeFormat) -> Self {
        self.place(x, y, text, format, true)
    }

    fn place(mut self, x: i32, y: i32, text: &str, format: BarcodeFormat, inverted: bool) -> Self {
        self.symbols.push(PlacedSymbol {
            x,
            y,
            result: BarcodeResult::new(Some(text.to_string()), Some(text.as_bytes().to_vec()), format),
            inverted,
        });
        self
    }
}

impl Decoder for PlacedSymbolDecoder {
    fn name(&self) -> &'static str {
        "placed"
    }

    fn decode(&self, frame: &Frame) -> Result<Vec<BarcodeResult>> {
        if self.failing {
            return Err(Error::decode_failed("scripted failure"));
        }
        let bounds = frame.bounds();
        Ok(self
            .symbols
            .iter()
            .filter(|s| s.inverted == frame.is_inverted() && bounds.contains(s.x, s.y))
            .map(|s| s.result.clone())
            .collect())
    }
}

#[derive(Debug, Default)]
struct GateState {
    started: AtomicUsize,
    last_value: Mutex<Option<u8>>,
    permits: Mutex<usize>,
    opened: Condvar,
}

/// Decoder that blocks each call until the test releases it
pub struct GatedDecoder {
    inner: PlacedSymbolDecoder,
    gate: Arc<GateState>,
}

/// Controls a [`GatedDecoder`]. Dropping it lets every pending decode finish.
pub struct DecodeGate {
    gate: Arc<GateState>,
}

impl GatedDecoder {
    pub fn new(inner: PlacedSymbolDecoder) -> (Self, DecodeGate) {
        let gate = Arc::new(GateState::default());
        (
            Self {
                inner,
                gate: gate.clone(),
            },
            DecodeGate { gate },
        )
    }
}

impl Decoder for GatedDecoder {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn decode(&self, frame: &Frame) -> Result<Vec<BarcodeResult>> {
        if frame.width() > 0 && frame.height() > 0 {
            *lock(&self.gate.last_value) = Some(frame.pixel(0, 0));
        }
        self.gate.started.fetch_add(1, Ordering::SeqCst);

        let mut permits = lock(&self.gate.permits);
        while *permits == 0 {
            permits = self
                .gate
                .opened
                .wait(permits)
                .unwrap_or_else(|e| e.into_inner());
        }
        *permits -= 1;
        drop(permits);

        self.inner.decode(frame)
    }
}

impl DecodeGate {
    pub fn release(&self, count: usize) {
        *lock(&self.gate.permits) += count;
        self.gate.opened.notify_all();
    }

    /// Number of decode calls that have started
    pub fn started(&self) -> usize {
        self.gate.started.load(Ordering::SeqCst)
    }

    /// Top-left pixel of the most recently started frame
    pub fn last_value(&self) -> Option<u8> {
        *lock(&self.gate.last_value)
    }

    /// Wait until at least `count` decodes have started
    pub async fn wait_started(&self, count: usize) {
        for _ in 0..400 {
            if self.started() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} decodes to start, saw {}", count, self.started());
    }
}

impl Drop for DecodeGate {
    fn drop(&mut self) {
        self.release(usize::MAX / 2);
    }
}

// ─────────────────────────────────────────────────────────
// Sinks
// ─────────────────────────────────────────────────────────

/// Result sink that keeps everything it receives
#[derive(Debug, Default)]
pub struct CollectingSink {
    results: Mutex<Vec<BarcodeResult>>,
}

impl CollectingSink {
    pub fn len(&self) -> usize {
        lock(&self.results).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn texts(&self) -> Vec<String> {
        lock(&self.results)
            .iter()
            .filter_map(|r| r.text.clone())
            .collect()
    }
}

impl ResultSink for CollectingSink {
    fn deliver(&self, results: Vec<BarcodeResult>) {
        lock(&self.results).extend(results);
    }
}
