// ============================================================================
// CHANNEL ADJUSTMENT — additive per-channel offsets with saturation
// ============================================================================
//
// The source buffer is never touched: the result is a fresh copy in which
// only the rows/columns of the region (or the whole image) are rewritten.
// Rows are processed in parallel via rayon.
// ============================================================================

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::buffer::{BLUE, CHANNELS, GREEN, PixelBuffer, RED};
use crate::region::Region;

/// Signed offsets added to each channel. The adjuster accepts any value;
/// range policy belongs to the request boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelOffsets {
    pub blue: i32,
    pub green: i32,
    pub red: i32,
}

impl ChannelOffsets {
    pub fn new(blue: i32, green: i32, red: i32) -> Self {
        Self { blue, green, red }
    }

    pub fn is_zero(&self) -> bool {
        self.blue == 0 && self.green == 0 && self.red == 0
    }

    /// Offsets in buffer sample order.
    fn as_bgr(&self) -> [i32; CHANNELS] {
        let mut out = [0; CHANNELS];
        out[BLUE] = self.blue;
        out[GREEN] = self.green;
        out[RED] = self.red;
        out
    }
}

/// `clamp(sample + offset, 0, 255)`. Never wraps.
#[inline]
pub fn saturating_offset(sample: u8, offset: i32) -> u8 {
    (sample as i32).saturating_add(offset).clamp(0, 255) as u8
}

/// Apply `offsets` to every pixel of `source` inside `region` (or all of it
/// when `region` is `None`) and return the result as a new buffer.
///
/// `region` must have been validated against `source`.
pub fn apply_channel_offsets(
    source: &PixelBuffer,
    offsets: ChannelOffsets,
    region: Option<Region>,
) -> PixelBuffer {
    let mut dst_raw = source.as_raw().to_vec();
    if offsets.is_zero() {
        return rebuild(source, dst_raw);
    }

    let region = region.unwrap_or_else(|| Region::full(source));
    let luts = offsets.as_bgr().map(build_offset_lut);
    let stride = source.stride();
    let col_start = region.x() as usize * CHANNELS;
    let col_end = region.right() as usize * CHANNELS;
    let (row_start, row_end) = (region.y() as usize, region.bottom() as usize);

    dst_raw
        .par_chunks_mut(stride)
        .enumerate()
        .filter(|(y, _)| *y >= row_start && *y < row_end)
        .for_each(|(_, row)| {
            for px in row[col_start..col_end].chunks_exact_mut(CHANNELS) {
                px[BLUE] = luts[BLUE][px[BLUE] as usize];
                px[GREEN] = luts[GREEN][px[GREEN] as usize];
                px[RED] = luts[RED][px[RED] as usize];
            }
        });

    rebuild(source, dst_raw)
}

fn build_offset_lut(offset: i32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = saturating_offset(i as u8, offset);
    }
    lut
}

fn rebuild(source: &PixelBuffer, raw: Vec<u8>) -> PixelBuffer {
    PixelBuffer::from_raw_unchecked(source.width(), source.height(), raw)
}
