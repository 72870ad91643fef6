//! Scan-session error types with host wire codes

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Permission Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Camera permission not granted")]
    PermissionDenied,

    #[error("Camera permission request ongoing")]
    PermissionInProgress,

    #[error("Camera permission request was cancelled")]
    PermissionCancelled,

    // ─────────────────────────────────────────────────────────────
    // Camera Errors
    // ─────────────────────────────────────────────────────────────
    #[error("No barcode view found")]
    ViewNotSet,

    #[error("No camera available on this device")]
    CameraUnavailable,

    #[error("Camera configuration failed: {message}")]
    CameraConfig { message: String },

    #[error("This device doesn't support {feature}")]
    UnsupportedFeature { feature: String },

    #[error("Start cannot be called when already running")]
    AlreadyRunning,

    // ─────────────────────────────────────────────────────────────
    // Decode Errors
    // ─────────────────────────────────────────────────────────────
    #[error("invalid image path: {path}: {reason}")]
    InvalidImagePath { path: PathBuf, reason: String },

    #[error("failed to decode image: {message}")]
    DecodeFailed { message: String },

    #[error("decode superseded by a newer request")]
    DecodeCancelled,

    // ─────────────────────────────────────────────────────────────
    // Host Bridge Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Method not implemented: {method}")]
    NotImplemented { method: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn camera_config(message: impl Into<String>) -> Self {
        Self::CameraConfig {
            message: message.into(),
        }
    }

    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            feature: feature.into(),
        }
    }

    pub fn invalid_image_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidImagePath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn not_implemented(method: impl Into<String>) -> Self {
        Self::NotImplemented {
            method: method.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Wire code reported to the host alongside the message.
    ///
    /// Both platform implementations report "404" for a missing view and
    /// for missing hardware; gallery failures keep their numeric codes.
    pub fn code(&self) -> &'static str {
        match self {
            Error::ViewNotSet | Error::UnsupportedFeature { .. } | Error::NotImplemented { .. } => {
                "404"
            }
            Error::PermissionDenied | Error::PermissionInProgress | Error::PermissionCancelled => {
                "cameraPermission"
            }
            Error::AlreadyRunning => "ALREADY_RUNNING",
            Error::CameraUnavailable | Error::CameraConfig { .. } => "CAMERA_ERROR",
            Error::InvalidImagePath { .. } => "1",
            Error::DecodeFailed { .. } => "2",
            Error::DecodeCancelled => "CANCELLED",
            Error::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Error::Io(_) | Error::Json(_) | Error::Config { .. } => "INTERNAL",
        }
    }

    /// Check if this is a permission failure
    pub fn is_permission(&self) -> bool {
        matches!(
            self,
            Error::PermissionDenied | Error::PermissionInProgress | Error::PermissionCancelled
        )
    }

    /// Check if the caller can simply retry the same operation later
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::PermissionDenied
                | Error::PermissionInProgress
                | Error::AlreadyRunning
                | Error::CameraConfig { .. }
                | Error::DecodeCancelled
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
