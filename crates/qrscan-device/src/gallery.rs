//! Static image decoding for gallery picks

use std::path::Path;

use image::imageops::FilterType;
use qrscan_core::prelude::*;
use qrscan_core::BarcodeResult;

use crate::decoder::{decode_with_invert, Decoder};
use crate::frame::Frame;

/// Height gallery bitmaps are shrunk towards before decoding
pub const DEFAULT_MAX_HEIGHT: u32 = 500;

/// Load `path` as a luminance frame, downsampled by an integer factor so
/// tall photos stay cheap to scan.
pub fn load_bitmap(path: &Path, max_height: u32) -> Result<Frame> {
    let image = image::open(path).map_err(|e| Error::invalid_image_path(path, e.to_string()))?;

    let (width, height) = (image.width(), image.height());
    let sample = sample_factor(height, max_height);
    let image = if sample > 1 {
        let (w, h) = ((width / sample).max(1), (height / sample).max(1));
        debug!(
            "downsampling {} from {}x{} to {}x{}",
            path.display(),
            width,
            height,
            w,
            h
        );
        image.resize_exact(w, h, FilterType::Triangle)
    } else {
        image
    };

    Ok(Frame::from_gray_image(image.to_luma8()))
}

/// Decode every symbol in the image at `path`.
///
/// The whole bitmap is scanned once, then once more inverted if nothing
/// turned up. No symbol is an empty success.
pub fn decode_image(
    decoder: &dyn Decoder,
    path: &Path,
    max_height: u32,
) -> Result<Vec<BarcodeResult>> {
    let frame = load_bitmap(path, max_height)?;
    let results = decode_with_invert(decoder, &frame, true).map_err(|e| match e {
        Error::DecodeFailed { .. } => e,
        other => Error::decode_failed(other.to_string()),
    })?;

    info!(
        "gallery decode of {} found {} code(s)",
        path.display(),
        results.len()
    );
    Ok(results)
}

fn sample_factor(height: u32, max_height: u32) -> u32 {
    if max_height > 0 && height > max_height {
        height / max_height
    } else {
        1
    }
}
