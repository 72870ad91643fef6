//! Platform camera seam

use qrscan_core::prelude::*;
use qrscan_core::{CameraFacing, CameraFeatures, Rect};

use crate::worker::FrameSink;

/// Where the preview is drawn.
///
/// `container` is the view the camera preview lives in and `surface` the
/// area the camera image actually covers. Both use preview pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreviewGeometry {
    pub container: Rect,
    pub surface: Rect,
}

impl PreviewGeometry {
    /// Preview filling its container exactly
    pub fn full(width: i32, height: i32) -> Self {
        let rect = Rect::from_size(width, height);
        Self {
            container: rect,
            surface: rect,
        }
    }

    /// Area visible to the user, `None` if the preview is not laid out yet
    pub fn visible(&self) -> Option<Rect> {
        self.container.intersect(&self.surface)
    }
}

/// Exclusive handle to the device camera.
///
/// A handle belongs to exactly one camera session. Frames flow out through
/// the [`FrameSink`] passed to [`open`](CameraHardware::open) while the
/// preview is running.
pub trait CameraHardware: Send {
    fn features(&self) -> CameraFeatures;

    /// Acquire the camera and route its frames to `frames`
    fn open(&mut self, facing: CameraFacing, frames: FrameSink) -> Result<()>;

    fn start_preview(&mut self) -> Result<()>;

    fn stop_preview(&mut self);

    fn is_preview_active(&self) -> bool;

    /// Reconfigure for the other lens. Called with the preview stopped.
    fn switch_camera(&mut self, facing: CameraFacing) -> Result<()>;

    fn set_torch(&mut self, on: bool) -> Result<()>;

    fn preview_geometry(&self) -> PreviewGeometry;

    /// Give the camera back to the system. Safe to call more than once.
    fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_area_is_intersection() {
        let geometry = PreviewGeometry {
            container: Rect::from_size(1080, 1920),
            surface: Rect::new(0, 240, 1080, 1680),
        };
        assert_eq!(geometry.visible(), Some(Rect::new(0, 240, 1080, 1680)));
        assert_eq!(PreviewGeometry::default().visible(), None);
    }
}
