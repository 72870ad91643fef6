//! Host bridge: method-call translation for one scan view
//!
//! Inbound calls arrive as a method name plus loosely typed arguments, the
//! way a host method channel delivers them. [`HostMethod::parse`] validates
//! and types them, [`HostBridge::handle`] runs them against a
//! [`ScanController`] and shapes the outcome into a [`MethodResponse`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use qrscan_core::prelude::*;
use qrscan_core::{BarcodeFormat, BarcodeResult, FormatFilter};
use qrscan_device::{gallery, Decoder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::controller::ScanController;

// ─────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────

/// Raw inbound call from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// Call without arguments
    pub fn bare(method: impl Into<String>) -> Self {
        Self::new(method, Value::Null)
    }
}

/// Answer to one [`MethodCall`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    Success { result: Value },
    Error { code: String, message: String },
    NotImplemented { method: String },
}

impl MethodResponse {
    pub fn success(result: Value) -> Self {
        Self::Success { result }
    }

    pub fn error(error: &Error) -> Self {
        Self::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Result payload of a successful call
    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Success { result } => Some(result),
            _ => None,
        }
    }

    /// Wire code of a failed call
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Error { code, .. } => Some(code),
            Self::NotImplemented { .. } => Some("404"),
            Self::Success { .. } => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Typed Methods
// ─────────────────────────────────────────────────────────────────

/// Validated host method
#[derive(Debug, Clone, PartialEq)]
pub enum HostMethod {
    StartScan(FormatFilter),
    StopScan,
    PauseCamera,
    ResumeCamera,
    FlipCamera,
    ToggleFlash,
    GetCameraInfo,
    GetFlashInfo,
    GetSystemFeatures,
    ChangeScanArea {
        width: f64,
        height: f64,
        bottom_offset: f64,
    },
    InvertScan(bool),
    RequestPermissions,
    ScanFromGallery(PathBuf),
    SetAllowedFormats(FormatFilter),
}

impl HostMethod {
    /// Type a raw call. `Ok(None)` means the method is unknown.
    pub fn parse(call: &MethodCall) -> Result<Option<Self>> {
        let args = &call.arguments;
        let method = match call.method.as_str() {
            "startScan" => HostMethod::StartScan(format_filter(args)?),
            "stopScan" | "stopCamera" => HostMethod::StopScan,
            "pauseCamera" => HostMethod::PauseCamera,
            "resumeCamera" => HostMethod::ResumeCamera,
            "flipCamera" => HostMethod::FlipCamera,
            "toggleFlash" => HostMethod::ToggleFlash,
            "getCameraInfo" => HostMethod::GetCameraInfo,
            "getFlashInfo" => HostMethod::GetFlashInfo,
            "getSystemFeatures" => HostMethod::GetSystemFeatures,
            "changeScanArea" => {
                let width = number_arg(args, "scanAreaWidth")?;
                let height = number_arg(args, "scanAreaHeight")?;
                let bottom_offset = number_arg(args, "cutOutBottomOffset")?;
                if width <= 0.0 || height <= 0.0 {
                    return Err(Error::invalid_argument(format!(
                        "scan area must be positive, got {}x{}",
                        width, height
                    )));
                }
                HostMethod::ChangeScanArea {
                    width,
                    height,
                    bottom_offset,
                }
            }
            "invertScan" => HostMethod::InvertScan(bool_arg(args, "isInvertScan")?),
            "requestPermissions" => HostMethod::RequestPermissions,
            "scanQrcodeFromGallery" => HostMethod::ScanFromGallery(path_arg(args)?),
            "setAllowedBarcodeFormats" => HostMethod::SetAllowedFormats(format_filter(args)?),
            _ => return Ok(None),
        };
        Ok(Some(method))
    }

    pub fn name(&self) -> &'static str {
        match self {
            HostMethod::StartScan(_) => "startScan",
            HostMethod::StopScan => "stopScan",
            HostMethod::PauseCamera => "pauseCamera",
            HostMethod::ResumeCamera => "resumeCamera",
            HostMethod::FlipCamera => "flipCamera",
            HostMethod::ToggleFlash => "toggleFlash",
            HostMethod::GetCameraInfo => "getCameraInfo",
            HostMethod::GetFlashInfo => "getFlashInfo",
            HostMethod::GetSystemFeatures => "getSystemFeatures",
            HostMethod::ChangeScanArea { .. } => "changeScanArea",
            HostMethod::InvertScan(_) => "invertScan",
            HostMethod::RequestPermissions => "requestPermissions",
            HostMethod::ScanFromGallery(_) => "scanQrcodeFromGallery",
            HostMethod::SetAllowedFormats(_) => "setAllowedBarcodeFormats",
        }
    }
}

/// Format ordinals come either as a bare list or as `{"allowedFormats": [...]}`.
/// `null` means no filter.
fn format_filter(args: &Value) -> Result<FormatFilter> {
    let list = match args {
        Value::Null => return Ok(FormatFilter::accept_all()),
        Value::Array(list) => list,
        Value::Object(map) => match map.get("allowedFormats") {
            None | Some(Value::Null) => return Ok(FormatFilter::accept_all()),
            Some(Value::Array(list)) => list,
            Some(other) => {
                return Err(Error::invalid_argument(format!(
                    "allowedFormats must be a list, got {}",
                    other
                )))
            }
        },
        other => {
            return Err(Error::invalid_argument(format!(
                "allowedFormats must be a list, got {}",
                other
            )))
        }
    };

    let formats = list
        .iter()
        .map(|value| {
            value
                .as_i64()
                .and_then(BarcodeFormat::from_index)
                .ok_or_else(|| {
                    Error::invalid_argument(format!("unknown barcode format index {}", value))
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FormatFilter::new(formats))
}

fn number_arg(args: &Value, key: &str) -> Result<f64> {
    args.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::invalid_argument(format!("missing numeric argument '{}'", key)))
}

fn bool_arg(args: &Value, key: &str) -> Result<bool> {
    args.as_bool()
        .or_else(|| args.get(key).and_then(Value::as_bool))
        .ok_or_else(|| Error::invalid_argument(format!("missing boolean argument '{}'", key)))
}

fn path_arg(args: &Value) -> Result<PathBuf> {
    args.as_str()
        .or_else(|| args.get("path").and_then(Value::as_str))
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| Error::invalid_argument("missing image path"))
}

// ─────────────────────────────────────────────────────────────────
// Gallery Scanning
// ─────────────────────────────────────────────────────────────────

/// Static-image decoding shared by all views of a host.
///
/// Only the newest request is answered with codes: each scan takes a
/// generation number and an older scan that finishes late reports
/// `DecodeCancelled` instead.
pub struct GalleryScanner {
    decoder: Arc<dyn Decoder>,
    max_height: u32,
    generation: AtomicU64,
}

impl std::fmt::Debug for GalleryScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalleryScanner")
            .field("decoder", &self.decoder.name())
            .field("max_height", &self.max_height)
            .finish()
    }
}

impl GalleryScanner {
    pub fn new(decoder: Arc<dyn Decoder>, max_height: u32) -> Self {
        Self {
            decoder,
            max_height,
            generation: AtomicU64::new(0),
        }
    }

    pub fn max_height(&self) -> u32 {
        self.max_height
    }

    /// Decode the image at `path` on the blocking pool
    pub async fn scan(&self, path: PathBuf) -> Result<Vec<BarcodeResult>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let decoder = Arc::clone(&self.decoder);
        let max_height = self.max_height;

        let outcome = tokio::task::spawn_blocking(move || {
            gallery::decode_image(decoder.as_ref(), &path, max_height)
        })
        .await
        .map_err(|e| Error::decode_failed(format!("gallery decode task failed: {}", e)))?;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("gallery scan {} superseded", generation);
            return Err(Error::DecodeCancelled);
        }
        outcome
    }

    /// Mark any running scan as superseded
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

// ─────────────────────────────────────────────────────────────────
// Bridge
// ─────────────────────────────────────────────────────────────────

/// Method-call front of one scan view
pub struct HostBridge<C> {
    view_id: i32,
    controller: Arc<C>,
    gallery: Arc<GalleryScanner>,
}

impl<C> std::fmt::Debug for HostBridge<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBridge")
            .field("view_id", &self.view_id)
            .finish()
    }
}

impl<C: ScanController + Sync> HostBridge<C> {
    pub fn new(view_id: i32, controller: Arc<C>, gallery: Arc<GalleryScanner>) -> Self {
        Self {
            view_id,
            controller,
            gallery,
        }
    }

    pub fn view_id(&self) -> i32 {
        self.view_id
    }

    pub fn controller(&self) -> &Arc<C> {
        &self.controller
    }

    /// Run one host call to completion.
    ///
    /// Failures never escape as Rust errors: they are logged and reported
    /// to the host as a `(code, message)` pair.
    pub async fn handle(&self, call: MethodCall) -> MethodResponse {
        let method = match HostMethod::parse(&call) {
            Ok(Some(method)) => method,
            Ok(None) => {
                debug!("view {}: unknown method {}", self.view_id, call.method);
                return MethodResponse::NotImplemented {
                    method: call.method,
                };
            }
            Err(e) => {
                warn!("view {}: bad {} call: {}", self.view_id, call.method, e);
                return MethodResponse::error(&e);
            }
        };

        let name = method.name();
        trace!("view {}: {}", self.view_id, name);
        match self.invoke(method).await {
            Ok(result) => MethodResponse::success(result),
            Err(e) => {
                if e.is_recoverable() || e.is_permission() {
                    info!("view {}: {} failed: {}", self.view_id, name, e);
                } else {
                    warn!("view {}: {} failed: {}", self.view_id, name, e);
                }
                MethodResponse::error(&e)
            }
        }
    }

    /// Execute a typed method and shape its result
    pub async fn invoke(&self, method: HostMethod) -> Result<Value> {
        let controller = self.controller.as_ref();
        let result = match method {
            HostMethod::StartScan(formats) => {
                controller.start_scan(formats).await?;
                Value::Null
            }
            HostMethod::StopScan => {
                controller.stop_scan().await?;
                Value::Null
            }
            HostMethod::PauseCamera => json!(controller.pause_camera().await?),
            HostMethod::ResumeCamera => json!(controller.resume_camera().await?),
            HostMethod::FlipCamera => json!(controller.flip_camera().await?.id()),
            HostMethod::ToggleFlash => json!(controller.toggle_flash().await?),
            HostMethod::GetCameraInfo => json!(controller.camera_info().await?.id()),
            HostMethod::GetFlashInfo => json!(controller.flash_info().await?),
            HostMethod::GetSystemFeatures => {
                serde_json::to_value(controller.system_features().await?)?
            }
            HostMethod::ChangeScanArea {
                width,
                height,
                bottom_offset,
            } => json!(
                controller
                    .change_scan_area(width, height, bottom_offset)
                    .await?
            ),
            HostMethod::InvertScan(invert) => {
                controller.invert_scan(invert).await?;
                Value::Null
            }
            HostMethod::RequestPermissions => json!(controller.request_permissions().await?),
            HostMethod::ScanFromGallery(path) => {
                if controller.is_disposed() {
                    return Err(Error::ViewNotSet);
                }
                let codes: Vec<String> = self
                    .gallery
                    .scan(path)
                    .await?
                    .into_iter()
                    .filter_map(|result| result.text)
                    .collect();
                json!(codes)
            }
            HostMethod::SetAllowedFormats(formats) => {
                json!(controller.set_allowed_formats(formats).await?)
            }
        };
        Ok(result)
    }

    /// Tear the view down. Safe to call more than once.
    pub async fn dispose(&self) {
        self.controller.dispose().await;
    }
}
