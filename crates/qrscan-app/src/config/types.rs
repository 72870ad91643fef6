//! Configuration types for qrscan
//!
//! Defines `ScanSettings`, the contents of `.qrscan/config.toml`, and its
//! per-section sub-types.

use qrscan_core::CameraFacing;
use qrscan_device::{DecoderBackend, DEFAULT_REQUEST_CODE_BASE};
use serde::{Deserialize, Serialize};

/// Global scanner settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ScanSettings {
    #[serde(default)]
    pub camera: CameraSettings,

    #[serde(default)]
    pub permission: PermissionSettings,

    #[serde(default)]
    pub scan_area: ScanAreaSettings,

    #[serde(default)]
    pub gallery: GallerySettings,

    #[serde(default)]
    pub decoder: DecoderSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CameraSettings {
    /// Camera opened by `startScan`; falls back to the other lens if missing
    #[serde(default)]
    pub default_facing: CameraFacing,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PermissionSettings {
    /// Base of the per-view permission request code
    #[serde(default = "default_request_code_base")]
    pub request_code_base: i32,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            request_code_base: default_request_code_base(),
        }
    }
}

fn default_request_code_base() -> i32 {
    DEFAULT_REQUEST_CODE_BASE
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScanAreaSettings {
    /// Share of the shorter preview side left as margin when no explicit
    /// scan area is configured
    #[serde(default = "default_margin_fraction")]
    pub margin_fraction: f64,
}

impl Default for ScanAreaSettings {
    fn default() -> Self {
        Self {
            margin_fraction: default_margin_fraction(),
        }
    }
}

fn default_margin_fraction() -> f64 {
    0.1
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GallerySettings {
    /// Bitmaps taller than this are downsampled before decoding
    #[serde(default = "default_max_height")]
    pub max_height: u32,
}

impl Default for GallerySettings {
    fn default() -> Self {
        Self {
            max_height: default_max_height(),
        }
    }
}

fn default_max_height() -> u32 {
    qrscan_device::gallery::DEFAULT_MAX_HEIGHT
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DecoderSettings {
    #[serde(default)]
    pub backend: DecoderBackend,

    /// Initial invert-scan mode for new sessions
    #[serde(default)]
    pub invert_scan: bool,
}
