//! Domain types shared by every layer of the scanner

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────
// Barcode Formats
// ─────────────────────────────────────────────────────────

/// Symbologies a decoder backend may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BarcodeFormat {
    #[serde(rename = "AZTEC")]
    Aztec,
    #[serde(rename = "CODE_128")]
    Code128,
    #[serde(rename = "CODE_39")]
    Code39,
    #[serde(rename = "CODE_93")]
    Code93,
    #[serde(rename = "DATA_MATRIX")]
    DataMatrix,
    #[serde(rename = "EAN_13")]
    Ean13,
    #[serde(rename = "EAN_8")]
    Ean8,
    #[serde(rename = "ITF")]
    Itf,
    #[serde(rename = "PDF_417")]
    Pdf417,
    #[serde(rename = "QR_CODE")]
    QrCode,
    #[serde(rename = "UPC_E")]
    UpcE,
    #[serde(rename = "CODABAR")]
    Codabar,
    #[serde(rename = "UPC_A")]
    UpcA,
    #[serde(rename = "ALL_FORMATS")]
    AllFormats,
}

/// Ordinal table shared with host applications. Index == wire value.
///
/// Both platforms must agree on this mapping bit-for-bit, so it is a fixed
/// array rather than derived from declaration order.
pub const FORMAT_TABLE: [BarcodeFormat; 11] = [
    BarcodeFormat::Aztec,
    BarcodeFormat::Code128,
    BarcodeFormat::Code39,
    BarcodeFormat::Code93,
    BarcodeFormat::DataMatrix,
    BarcodeFormat::Ean13,
    BarcodeFormat::Ean8,
    BarcodeFormat::Itf,
    BarcodeFormat::Pdf417,
    BarcodeFormat::QrCode,
    BarcodeFormat::UpcE,
];

impl BarcodeFormat {
    /// Look up a format by its wire ordinal
    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| FORMAT_TABLE.get(i).copied())
    }

    /// Wire ordinal, `None` for formats outside the shared table
    pub fn index(&self) -> Option<usize> {
        FORMAT_TABLE.iter().position(|f| f == self)
    }

    /// Canonical name reported in `onRecognizeQR.type`
    pub fn name(&self) -> &'static str {
        match self {
            BarcodeFormat::Aztec => "AZTEC",
            BarcodeFormat::Code128 => "CODE_128",
            BarcodeFormat::Code39 => "CODE_39",
            BarcodeFormat::Code93 => "CODE_93",
            BarcodeFormat::DataMatrix => "DATA_MATRIX",
            BarcodeFormat::Ean13 => "EAN_13",
            BarcodeFormat::Ean8 => "EAN_8",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::Pdf417 => "PDF_417",
            BarcodeFormat::QrCode => "QR_CODE",
            BarcodeFormat::UpcE => "UPC_E",
            BarcodeFormat::Codabar => "CODABAR",
            BarcodeFormat::UpcA => "UPC_A",
            BarcodeFormat::AllFormats => "ALL_FORMATS",
        }
    }

    /// Parse a format name. Accepts the ML Kit spelling `PDF417` as well.
    pub fn from_name(name: &str) -> Option<Self> {
        let format = match name {
            "AZTEC" => BarcodeFormat::Aztec,
            "CODE_128" => BarcodeFormat::Code128,
            "CODE_39" => BarcodeFormat::Code39,
            "CODE_93" => BarcodeFormat::Code93,
            "DATA_MATRIX" => BarcodeFormat::DataMatrix,
            "EAN_13" => BarcodeFormat::Ean13,
            "EAN_8" => BarcodeFormat::Ean8,
            "ITF" => BarcodeFormat::Itf,
            "PDF_417" | "PDF417" => BarcodeFormat::Pdf417,
            "QR_CODE" => BarcodeFormat::QrCode,
            "UPC_E" => BarcodeFormat::UpcE,
            "CODABAR" => BarcodeFormat::Codabar,
            "UPC_A" => BarcodeFormat::UpcA,
            "ALL_FORMATS" => BarcodeFormat::AllFormats,
            _ => return None,
        };
        Some(format)
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of formats a session accepts. Empty means "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatFilter {
    allowed: BTreeSet<BarcodeFormat>,
}

impl FormatFilter {
    pub fn new(formats: impl IntoIterator<Item = BarcodeFormat>) -> Self {
        Self {
            allowed: formats.into_iter().collect(),
        }
    }

    /// Filter that lets every format through
    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn accepts(&self, format: BarcodeFormat) -> bool {
        self.allowed.is_empty()
            || self.allowed.contains(&BarcodeFormat::AllFormats)
            || self.allowed.contains(&format)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&BarcodeFormat::AllFormats)
    }

    pub fn formats(&self) -> impl Iterator<Item = BarcodeFormat> + '_ {
        self.allowed.iter().copied()
    }
}

// ─────────────────────────────────────────────────────────
// Decode Results
// ─────────────────────────────────────────────────────────

/// One decoded symbol. Forwarded to the host once, then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeResult {
    pub text: Option<String>,
    pub raw_bytes: Option<Vec<u8>>,
    pub format: BarcodeFormat,
}

impl BarcodeResult {
    pub fn new(text: Option<String>, raw_bytes: Option<Vec<u8>>, format: BarcodeFormat) -> Self {
        Self {
            text,
            raw_bytes,
            format,
        }
    }

    /// Result carrying text only
    pub fn text(text: impl Into<String>, format: BarcodeFormat) -> Self {
        Self::new(Some(text.into()), None, format)
    }
}

// ─────────────────────────────────────────────────────────
// Scan Area
// ─────────────────────────────────────────────────────────

/// Largest scan area dimension or offset accepted, in preview pixels
pub const MAX_SCAN_AREA_PX: i32 = 1 << 16;

/// Viewfinder restriction in preview pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanAreaConfig {
    pub width: i32,
    pub height: i32,
    pub bottom_offset: i32,
}

impl ScanAreaConfig {
    pub fn new(width: i32, height: i32, bottom_offset: i32) -> Self {
        Self {
            width,
            height,
            bottom_offset,
        }
    }

    /// Convert a host request in density-independent pixels.
    ///
    /// Every value is clamped to `±MAX_SCAN_AREA_PX`; NaN becomes 0.
    pub fn from_dp(width: f64, height: f64, bottom_offset: f64, density: f32) -> Self {
        let scale = f64::from(density);
        Self::new(
            to_px(width * scale),
            to_px(height * scale),
            to_px(bottom_offset * scale),
        )
    }
}

fn to_px(value: f64) -> i32 {
    let limit = f64::from(MAX_SCAN_AREA_PX);
    if value.is_nan() {
        return 0;
    }
    value.clamp(-limit, limit) as i32
}

// ─────────────────────────────────────────────────────────
// Camera
// ─────────────────────────────────────────────────────────

/// Which physical camera feeds the preview. Values match the wire ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    #[default]
    Back,
    Front,
}

impl CameraFacing {
    pub fn id(&self) -> i32 {
        match self {
            CameraFacing::Back => 0,
            CameraFacing::Front => 1,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            CameraFacing::Back => CameraFacing::Front,
            CameraFacing::Front => CameraFacing::Back,
        }
    }
}

/// Hardware present on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraFeatures {
    pub has_back_camera: bool,
    pub has_front_camera: bool,
    pub has_flash: bool,
}

impl CameraFeatures {
    pub fn has(&self, facing: CameraFacing) -> bool {
        match facing {
            CameraFacing::Back => self.has_back_camera,
            CameraFacing::Front => self.has_front_camera,
        }
    }

    /// Requested camera if present, else whichever exists
    pub fn resolve(&self, requested: CameraFacing) -> Option<CameraFacing> {
        if self.has(requested) {
            Some(requested)
        } else if self.has(requested.opposite()) {
            Some(requested.opposite())
        } else {
            None
        }
    }

    pub fn can_flip(&self) -> bool {
        self.has_back_camera && self.has_front_camera
    }
}

/// Reply to `getSystemFeatures`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemFeatures {
    pub has_front_camera: bool,
    pub has_back_camera: bool,
    pub has_flash: bool,
    pub active_camera: Option<i32>,
}

impl SystemFeatures {
    pub fn new(features: CameraFeatures, active: Option<CameraFacing>) -> Self {
        Self {
            has_front_camera: features.has_front_camera,
            has_back_camera: features.has_back_camera,
            has_flash: features.has_flash,
            active_camera: active.map(|f| f.id()),
        }
    }
}

// ─────────────────────────────────────────────────────────
// State Machines
// ─────────────────────────────────────────────────────────

/// Camera permission state for one view instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    #[default]
    Unknown,
    Requesting,
    Granted,
    Denied,
}

/// One entry of the platform's grant-result array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionGrant {
    Granted,
    Denied,
}

/// Lifecycle of the camera handle owned by one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraSessionState {
    #[default]
    Uninitialized,
    Ready,
    Scanning,
    Paused,
    Disposed,
}

impl CameraSessionState {
    /// Camera handle exists and accepts commands
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            CameraSessionState::Ready | CameraSessionState::Scanning | CameraSessionState::Paused
        )
    }
}

/// Coordinating state of a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPhase {
    #[default]
    Idle,
    PermissionPending,
    CameraReady,
    Scanning,
    Paused,
    Disposed,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScanPhase::Idle => "idle",
            ScanPhase::PermissionPending => "permission-pending",
            ScanPhase::CameraReady => "camera-ready",
            ScanPhase::Scanning => "scanning",
            ScanPhase::Paused => "paused",
            ScanPhase::Disposed => "disposed",
        };
        f.write_str(label)
    }
}
