// ============================================================================
// PIXEL BUFFER — decoded 8-bit BGR image, immutable once constructed
// ============================================================================
//
// Samples are stored row-major, interleaved per pixel in Blue, Green, Red
// order. There is no mutating API: every transform allocates a new buffer,
// which is what lets one original be shared by concurrent adjustments.
// ============================================================================

use std::fmt;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::error::{EngineError, Result};

/// Samples per pixel (Blue, Green, Red).
pub const CHANNELS: usize = 3;

pub const BLUE: usize = 0;
pub const GREEN: usize = 1;
pub const RED: usize = 2;

#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    samples: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw BGR samples. Fails unless both dimensions are positive and
    /// `samples.len() == width * height * 3`.
    pub fn from_raw(width: u32, height: u32, samples: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if width == 0 || height == 0 || samples.len() != expected {
            return Err(EngineError::InvalidBuffer {
                width,
                height,
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self { width, height, samples })
    }

    /// Wrap samples already known to match `width * height * 3`, such as a
    /// copy of another buffer's samples.
    pub(crate) fn from_raw_unchecked(width: u32, height: u32, samples: Vec<u8>) -> Self {
        debug_assert!(width > 0 && height > 0);
        debug_assert_eq!(samples.len(), width as usize * height as usize * CHANNELS);
        Self { width, height, samples }
    }

    /// A buffer with every pixel set to the same `[b, g, r]` triple.
    pub fn filled(width: u32, height: u32, bgr: [u8; 3]) -> Result<Self> {
        let count = width as usize * height as usize;
        let samples = bgr.iter().copied().cycle().take(count * CHANNELS).collect();
        Self::from_raw(width, height, samples)
    }

    /// Build a buffer by evaluating `f(x, y) -> [b, g, r]` for every pixel.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Result<Self>
    where
        F: FnMut(u32, u32) -> [u8; 3],
    {
        let mut samples = Vec::with_capacity(width as usize * height as usize * CHANNELS);
        for y in 0..height {
            for x in 0..width {
                samples.extend_from_slice(&f(x, y));
            }
        }
        Self::from_raw(width, height, samples)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * CHANNELS
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.samples
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.samples
    }

    /// `[b, g, r]` at (x, y), or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = y as usize * self.stride() + x as usize * CHANNELS;
        Some([self.samples[i], self.samples[i + 1], self.samples[i + 2]])
    }

    /// Convert from the `image` crate's RGB layout, swapping to BGR.
    pub fn from_rgb_image(img: &RgbImage) -> Result<Self> {
        let mut samples = Vec::with_capacity(img.as_raw().len());
        for px in img.pixels() {
            let [r, g, b] = px.0;
            samples.extend_from_slice(&[b, g, r]);
        }
        Self::from_raw(img.width(), img.height(), samples)
    }

    /// Convert to the `image` crate's RGB layout for encoding.
    pub fn to_rgb_image(&self) -> RgbImage {
        let stride = self.stride();
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let i = y as usize * stride + x as usize * CHANNELS;
            Rgb([
                self.samples[i + RED],
                self.samples[i + GREEN],
                self.samples[i + BLUE],
            ])
        })
    }

    /// Downscale so the longest edge is at most `max_edge`, preserving aspect
    /// ratio. Returns an unchanged copy when the image already fits.
    pub fn fit_within(&self, max_edge: u32) -> PixelBuffer {
        let longest = self.width.max(self.height);
        if max_edge == 0 || longest <= max_edge {
            return self.clone();
        }
        let scale = max_edge as f64 / longest as f64;
        let new_w = ((self.width as f64 * scale) as u32).max(1);
        let new_h = ((self.height as f64 * scale) as u32).max(1);
        let resized = imageops::resize(&self.to_rgb_image(), new_w, new_h, FilterType::Triangle);

        let mut samples = Vec::with_capacity(resized.as_raw().len());
        for px in resized.pixels() {
            let [r, g, b] = px.0;
            samples.extend_from_slice(&[b, g, r]);
        }
        PixelBuffer {
            width: new_w,
            height: new_h,
            samples,
        }
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("samples", &self.samples.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_rejects_length_mismatch() {
        let err = PixelBuffer::from_raw(2, 2, vec![0; 11]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidBuffer { expected: 12, actual: 11, .. }
        ));
    }

    #[test]
    fn from_raw_rejects_zero_dimensions() {
        assert!(PixelBuffer::from_raw(0, 4, Vec::new()).is_err());
        assert!(PixelBuffer::from_raw(4, 0, Vec::new()).is_err());
    }

    #[test]
    fn unchecked_constructor_keeps_samples() {
        let checked = PixelBuffer::from_raw(2, 1, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let unchecked = PixelBuffer::from_raw_unchecked(2, 1, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(unchecked, checked);
    }

    #[test]
    fn pixel_reads_bgr_triples() {
        let buf = PixelBuffer::from_fn(3, 2, |x, y| [x as u8, y as u8, 7]).unwrap();
        assert_eq!(buf.pixel(2, 1), Some([2, 1, 7]));
        assert_eq!(buf.pixel(3, 0), None);
        assert_eq!(buf.as_raw().len(), 3 * 2 * CHANNELS);
    }

    #[test]
    fn rgb_conversion_swaps_channel_order() {
        let buf = PixelBuffer::filled(2, 2, [10, 20, 30]).unwrap();
        let rgb = buf.to_rgb_image();
        assert_eq!(rgb.get_pixel(1, 1).0, [30, 20, 10]);
        assert_eq!(PixelBuffer::from_rgb_image(&rgb).unwrap(), buf);
    }

    #[test]
    fn fit_within_limits_longest_edge() {
        let buf = PixelBuffer::filled(1200, 300, [1, 2, 3]).unwrap();
        let small = buf.fit_within(600);
        assert_eq!(small.dimensions(), (600, 150));
        assert_eq!(small.pixel(0, 0), Some([1, 2, 3]));

        let same = buf.fit_within(2000);
        assert_eq!(same, buf);
    }
}
