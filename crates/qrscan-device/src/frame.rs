//! Luminance frames handed from the camera to the decoder

use image::GrayImage;
use qrscan_core::Rect;

/// One 8-bit luminance image plus its placement in preview coordinates.
///
/// `bounds` always has the same size as the pixel buffer. A full preview
/// frame sits at the origin; a cropped frame keeps the offset of the region
/// it was cut from so decoders can report positions in preview space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    luma: Vec<u8>,
    bounds: Rect,
    inverted: bool,
}

impl Frame {
    /// Wrap a row-major luminance buffer. Returns `None` if the buffer
    /// length does not match the dimensions.
    pub fn new(luma: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        let expected = (width as usize).checked_mul(height as usize)?;
        if luma.len() != expected {
            return None;
        }
        Some(Self {
            luma,
            bounds: Rect::from_size(width as i32, height as i32),
            inverted: false,
        })
    }

    /// Uniform frame, mostly useful as a stand-in preview image
    pub fn blank(width: u32, height: u32, value: u8) -> Self {
        Self {
            luma: vec![value; width as usize * height as usize],
            bounds: Rect::from_size(width as i32, height as i32),
            inverted: false,
        }
    }

    pub fn from_gray_image(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            luma: image.into_raw(),
            bounds: Rect::from_size(width as i32, height as i32),
            inverted: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.bounds.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.bounds.height() as u32
    }

    /// Region of the preview this frame covers
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn luma(&self) -> &[u8] {
        &self.luma
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Pixel at frame-local coordinates
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.luma[y as usize * self.width() as usize + x as usize]
    }

    /// Copy of the part of this frame inside `region` (preview coordinates).
    ///
    /// Returns `None` when the region does not overlap the frame.
    pub fn crop(&self, region: &Rect) -> Option<Frame> {
        let clipped = self.bounds.intersect(region)?;
        if clipped == self.bounds {
            return Some(self.clone());
        }

        let stride = self.width() as usize;
        let x0 = (clipped.left - self.bounds.left) as usize;
        let y0 = (clipped.top - self.bounds.top) as usize;
        let w = clipped.width() as usize;
        let h = clipped.height() as usize;

        let mut luma = Vec::with_capacity(w * h);
        for row in y0..y0 + h {
            let start = row * stride + x0;
            luma.extend_from_slice(&self.luma[start..start + w]);
        }

        Some(Frame {
            luma,
            bounds: clipped,
            inverted: self.inverted,
        })
    }

    /// Luminance-inverted copy (light-on-dark codes)
    pub fn inverted(&self) -> Frame {
        Frame {
            luma: self.luma.iter().map(|v| 255 - v).collect(),
            bounds: self.bounds,
            inverted: !self.inverted,
        }
    }
}
