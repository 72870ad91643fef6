//! Scan controller service trait
//!
//! The host bridge talks to a scan view only through this trait, so the
//! bridge can be exercised against any implementation.

use qrscan_core::prelude::*;
use qrscan_core::{CameraFacing, FormatFilter, SystemFeatures};

use crate::session::ScanSession;

/// Operations a host may invoke on one scan view
#[trait_variant::make(ScanController: Send)]
pub trait LocalScanController {
    /// Start scanning, prompting for permission if needed
    async fn start_scan(&self, formats: FormatFilter) -> Result<()>;

    /// Stop delivering results, keep the camera
    async fn stop_scan(&self) -> Result<()>;

    async fn pause_camera(&self) -> Result<bool>;

    async fn resume_camera(&self) -> Result<bool>;

    /// Switch lens, returning the facing now in use
    async fn flip_camera(&self) -> Result<CameraFacing>;

    /// Toggle the torch, returning the new torch state
    async fn toggle_flash(&self) -> Result<bool>;

    async fn camera_info(&self) -> Result<CameraFacing>;

    async fn flash_info(&self) -> Result<bool>;

    async fn system_features(&self) -> Result<SystemFeatures>;

    /// Restrict decoding to a centred area, sizes in dp
    async fn change_scan_area(&self, width: f64, height: f64, bottom_offset: f64)
        -> Result<bool>;

    async fn invert_scan(&self, invert: bool) -> Result<()>;

    async fn request_permissions(&self) -> Result<bool>;

    async fn set_allowed_formats(&self, formats: FormatFilter) -> Result<bool>;

    /// Release the view. Later calls fail with `ViewNotSet`.
    async fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

impl ScanController for ScanSession {
    async fn start_scan(&self, formats: FormatFilter) -> Result<()> {
        ScanSession::start_scan(self, formats).await
    }

    async fn stop_scan(&self) -> Result<()> {
        ScanSession::stop_scan(self)
    }

    async fn pause_camera(&self) -> Result<bool> {
        ScanSession::pause_camera(self)
    }

    async fn resume_camera(&self) -> Result<bool> {
        ScanSession::resume_camera(self)
    }

    async fn flip_camera(&self) -> Result<CameraFacing> {
        ScanSession::flip_camera(self)
    }

    async fn toggle_flash(&self) -> Result<bool> {
        ScanSession::toggle_flash(self)
    }

    async fn camera_info(&self) -> Result<CameraFacing> {
        ScanSession::camera_info(self)
    }

    async fn flash_info(&self) -> Result<bool> {
        ScanSession::flash_info(self)
    }

    async fn system_features(&self) -> Result<SystemFeatures> {
        ScanSession::system_features(self)
    }

    async fn change_scan_area(
        &self,
        width: f64,
        height: f64,
        bottom_offset: f64,
    ) -> Result<bool> {
        ScanSession::change_scan_area(self, width, height, bottom_offset)
    }

    async fn invert_scan(&self, invert: bool) -> Result<()> {
        ScanSession::invert_scan(self, invert)
    }

    async fn request_permissions(&self) -> Result<bool> {
        ScanSession::request_permissions(self).await
    }

    async fn set_allowed_formats(&self, formats: FormatFilter) -> Result<bool> {
        ScanSession::set_allowed_formats(self, formats)
    }

    async fn dispose(&self) {
        ScanSession::dispose(self)
    }

    fn is_disposed(&self) -> bool {
        ScanSession::is_disposed(self)
    }
}
