//! Decoder capability interface and backend selection

mod qr;

use std::sync::Arc;

use qrscan_core::prelude::*;
use qrscan_core::BarcodeResult;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

pub use qr::QrDecoder;

/// Turns one luminance frame into zero or more decoded symbols.
///
/// An empty vector means nothing was found, which is the normal outcome for
/// most preview frames. `Err` is reserved for failures of the backend itself.
pub trait Decoder: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    fn decode(&self, frame: &Frame) -> Result<Vec<BarcodeResult>>;
}

/// Available decoder backends, chosen once when a session is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderBackend {
    /// Pure-Rust QR code reader
    #[default]
    Qr,
}

impl DecoderBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecoderBackend::Qr => "qr",
        }
    }
}

pub fn create_decoder(backend: DecoderBackend) -> Arc<dyn Decoder> {
    match backend {
        DecoderBackend::Qr => Arc::new(QrDecoder::new()),
    }
}

/// Decode `frame`, retrying on the inverted image when `invert` is set and
/// the normal pass found nothing.
pub fn decode_with_invert(
    decoder: &dyn Decoder,
    frame: &Frame,
    invert: bool,
) -> Result<Vec<BarcodeResult>> {
    let results = decoder.decode(frame)?;
    if !results.is_empty() || !invert {
        return Ok(results);
    }

    trace!("{}: no symbol in normal pass, trying inverted", decoder.name());
    decoder.decode(&frame.inverted())
}
