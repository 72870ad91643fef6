//! QR backend built on `rqrr`

use qrscan_core::prelude::*;
use qrscan_core::{BarcodeFormat, BarcodeResult};

use super::Decoder;
use crate::frame::Frame;

/// Reads QR codes only. Grids that are located but fail error correction
/// count as "not found", matching how camera readers treat partial codes.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for QrDecoder {
    fn name(&self) -> &'static str {
        "qr"
    }

    fn decode(&self, frame: &Frame) -> Result<Vec<BarcodeResult>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(Error::decode_failed("empty frame"));
        }

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            frame.width() as usize,
            frame.height() as usize,
            |x, y| frame.pixel(x as u32, y as u32),
        );

        let grids = prepared.detect_grids();
        let mut results = Vec::with_capacity(grids.len());
        for grid in grids {
            let mut bytes = Vec::new();
            match grid.decode_to(&mut bytes) {
                Ok(_) => {
                    trace!("qr grid decoded ({} bytes)", bytes.len());
                    let text = String::from_utf8(bytes.clone()).ok();
                    results.push(BarcodeResult::new(text, Some(bytes), BarcodeFormat::QrCode));
                }
                Err(e) => {
                    debug!("qr grid located but not decodable: {:?}", e);
                }
            }
        }

        Ok(results)
    }
}
