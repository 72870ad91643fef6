//! # qrscan-device - Camera, Permission and Decoder Seams
//!
//! Everything that touches platform hardware or a decoding library sits
//! behind a trait in this crate, so the coordinating logic in `qrscan-app`
//! can run against real adapters, the desktop stand-ins or test fakes.
//!
//! Depends on [`qrscan_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Frames and Decoding
//! - [`Frame`] - Luminance image positioned in preview coordinates
//! - [`Decoder`] - Capability interface implemented by each backend
//! - [`DecoderBackend`], [`create_decoder()`] - Backend selection
//! - [`DecodeWorker`], [`FrameSink`] - Single-flight, latest-frame-wins decode loop
//!
//! ### Gallery
//! - [`gallery::decode_image()`] - Decode a still image from disk
//!
//! ### Platform Seams
//! - [`CameraHardware`] - Exclusive camera handle
//! - [`PermissionPlatform`] - Runtime camera permission API
//!
//! ### Desktop Adapters
//! - [`StillImageCamera`], [`SystemPermissions`]

pub mod camera;
pub mod decoder;
pub mod desktop;
pub mod frame;
pub mod gallery;
pub mod permission;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod worker;

pub use camera::{CameraHardware, PreviewGeometry};
pub use decoder::{create_decoder, decode_with_invert, Decoder, DecoderBackend, QrDecoder};
pub use desktop::{StillImageCamera, SystemPermissions};
pub use frame::Frame;
pub use permission::{request_code, PermissionPlatform, DEFAULT_REQUEST_CODE_BASE};
pub use worker::{DecodeOptions, DecodeWorker, FrameSink, ResultSink, WorkerStats};
