//! # qrscan-core - Core Domain Types
//!
//! Foundation crate for qrscan. Provides the shared vocabulary of the scan
//! engine: barcode formats and results, camera and permission states, the
//! error taxonomy with its host wire codes, host events and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`BarcodeFormat`] - Symbology with its fixed wire ordinal
//! - [`BarcodeResult`] - One decoded symbol
//! - [`FormatFilter`] - Allowed formats for a session (empty = all)
//! - [`ScanAreaConfig`] - Requested viewfinder size and bottom offset
//! - [`PermissionState`], [`CameraSessionState`], [`ScanPhase`] - State machines
//!
//! ### Geometry (`geometry`)
//! - [`Rect`] - Integer rectangle in preview pixels
//!
//! ### Events (`events`)
//! - [`HostEvent`] - `onRecognizeQR` / `onPermissionSet` callbacks
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with host wire codes
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use qrscan_core::prelude::*;
//! ```

pub mod error;
pub mod events;
pub mod geometry;
pub mod logging;
pub mod prelude;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result, ResultExt};
pub use events::{HostEvent, RecognizedCode};
pub use geometry::Rect;
pub use types::{
    BarcodeFormat, BarcodeResult, CameraFacing, CameraFeatures, CameraSessionState, FormatFilter,
    PermissionGrant, PermissionState, ScanAreaConfig, ScanPhase, SystemFeatures, FORMAT_TABLE,
    MAX_SCAN_AREA_PX,
};
