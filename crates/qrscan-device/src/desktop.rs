//! Desktop adapters for running a scan session without mobile hardware
//!
//! [`StillImageCamera`] plays one image as a looping preview and
//! [`SystemPermissions`] models a platform that never prompts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use qrscan_core::prelude::*;
use qrscan_core::{CameraFacing, CameraFeatures};

use crate::camera::{CameraHardware, PreviewGeometry};
use crate::frame::Frame;
use crate::permission::PermissionPlatform;
use crate::worker::FrameSink;

struct PreviewThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Camera that delivers the same still image at a fixed rate
pub struct StillImageCamera {
    image: Frame,
    interval: Duration,
    features: CameraFeatures,
    facing: Option<CameraFacing>,
    torch: bool,
    frames: Option<FrameSink>,
    preview: Option<PreviewThread>,
}

impl StillImageCamera {
    pub fn new(image: Frame, fps: u32) -> Self {
        Self {
            image,
            interval: frame_interval(fps),
            features: CameraFeatures {
                has_back_camera: true,
                has_front_camera: false,
                has_flash: false,
            },
            facing: None,
            torch: false,
            frames: None,
            preview: None,
        }
    }

    /// Advertise a different hardware set, e.g. to exercise flip and torch
    pub fn with_features(mut self, features: CameraFeatures) -> Self {
        self.features = features;
        self
    }
}

/// Delay between preview frames, never below 1 ms
fn frame_interval(fps: u32) -> Duration {
    Duration::from_millis((1000 / u64::from(fps.max(1))).max(1))
}

impl CameraHardware for StillImageCamera {
    fn features(&self) -> CameraFeatures {
        self.features
    }

    fn open(&mut self, facing: CameraFacing, frames: FrameSink) -> Result<()> {
        if !self.features.has(facing) {
            return Err(Error::CameraUnavailable);
        }
        self.facing = Some(facing);
        self.frames = Some(frames);
        Ok(())
    }

    fn start_preview(&mut self) -> Result<()> {
        if self.preview.is_some() {
            return Ok(());
        }
        let frames = self
            .frames
            .clone()
            .ok_or_else(|| Error::camera_config("camera not open"))?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let image = self.image.clone();
        let interval = self.interval;

        let handle = std::thread::Builder::new()
            .name("still-camera".into())
            .spawn(move || {
                while !stop_flag.load(Ordering::Acquire) {
                    if !frames.submit(image.clone()) {
                        break;
                    }
                    std::thread::sleep(interval);
                }
            })?;

        self.preview = Some(PreviewThread { stop, handle });
        debug!("still camera preview started");
        Ok(())
    }

    fn stop_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            preview.stop.store(true, Ordering::Release);
            if preview.handle.join().is_err() {
                warn!("still camera thread panicked");
            }
            debug!("still camera preview stopped");
        }
    }

    fn is_preview_active(&self) -> bool {
        self.preview.is_some()
    }

    fn switch_camera(&mut self, facing: CameraFacing) -> Result<()> {
        if !self.features.has(facing) {
            return Err(Error::CameraUnavailable);
        }
        self.facing = Some(facing);
        Ok(())
    }

    fn set_torch(&mut self, on: bool) -> Result<()> {
        if !self.features.has_flash {
            return Err(Error::unsupported("flash"));
        }
        self.torch = on;
        Ok(())
    }

    fn preview_geometry(&self) -> PreviewGeometry {
        PreviewGeometry::full(self.image.width() as i32, self.image.height() as i32)
    }

    fn release(&mut self) {
        self.stop_preview();
        self.frames = None;
        self.facing = None;
        self.torch = false;
    }
}

impl Drop for StillImageCamera {
    fn drop(&mut self) {
        self.stop_preview();
    }
}

/// Platform where camera access is implied by running the program
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPermissions;

impl PermissionPlatform for SystemPermissions {
    fn requires_runtime_request(&self) -> bool {
        false
    }

    fn is_granted(&self) -> bool {
        true
    }

    fn request(&self, request_code: i32) {
        debug!("permission request {} ignored, no runtime prompt", request_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CollectingSink, PlacedSymbolDecoder};
    use crate::worker::DecodeWorker;
    use qrscan_core::BarcodeFormat;

    #[test]
    fn test_frame_interval_bounds() {
        assert_eq!(frame_interval(0), Duration::from_millis(1000));
        assert_eq!(frame_interval(10), Duration::from_millis(100));
        assert_eq!(frame_interval(1000), Duration::from_millis(1));
        assert_eq!(frame_interval(u32::MAX), Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_preview_feeds_worker_until_stopped() {
        let decoder = PlacedSymbolDecoder::new().with_symbol(2, 2, "still", BarcodeFormat::QrCode);
        let sink = Arc::new(CollectingSink::default());
        let worker = DecodeWorker::spawn(Arc::new(decoder), sink.clone());

        let mut camera = StillImageCamera::new(Frame::blank(8, 8, 0), 100);
        camera.open(CameraFacing::Back, worker.frame_sink()).unwrap();
        camera.start_preview().unwrap();
        assert!(camera.is_preview_active());

        for _ in 0..200 {
            if sink.len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(sink.len() >= 2);

        camera.stop_preview();
        assert!(!camera.is_preview_active());
        let submitted = worker.stats().submitted;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(worker.stats().submitted, submitted);
    }

    #[test]
    fn test_missing_camera_and_flash() {
        let mut camera = StillImageCamera::new(Frame::blank(4, 4, 0), 10);
        assert!(!camera.features().has_front_camera);
        assert!(matches!(
            camera.switch_camera(CameraFacing::Front),
            Err(Error::CameraUnavailable)
        ));
        assert!(matches!(
            camera.set_torch(true),
            Err(Error::UnsupportedFeature { .. })
        ));
        assert!(camera.start_preview().is_err());
    }

    #[test]
    fn test_geometry_matches_image() {
        let camera = StillImageCamera::new(Frame::blank(640, 480, 0), 10);
        assert_eq!(camera.preview_geometry(), PreviewGeometry::full(640, 480));
    }

    #[test]
    fn test_system_permissions_never_prompt() {
        let platform = SystemPermissions;
        assert!(!platform.requires_runtime_request());
        assert!(platform.is_granted());
    }
}
