// ============================================================================
// REGION OF INTEREST — validated rectangle inside a PixelBuffer
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::error::{EngineError, Result};

/// Untrusted rectangle as it arrives from a region picker or request payload.
/// Signed so that negative coordinates can be reported instead of wrapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRect {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl RawRect {
    pub fn new(x: i64, y: i64, w: i64, h: i64) -> Self {
        Self { x, y, w, h }
    }

    /// The picker's "nothing selected" sentinel, or any zero-area rectangle.
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Check the rectangle against `buffer` (always the original image).
    ///
    /// Returns `Ok(None)` for a zero-area rectangle, meaning "apply globally".
    /// Anything reaching outside `[0, width) x [0, height)` is rejected with
    /// [`EngineError::OutOfBounds`]; nothing is clamped.
    pub fn validate(&self, buffer: &PixelBuffer) -> Result<Option<Region>> {
        let (width, height) = buffer.dimensions();
        let out_of_bounds = || EngineError::OutOfBounds {
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
            width,
            height,
        };

        if self.x < 0 || self.y < 0 || self.w < 0 || self.h < 0 {
            return Err(out_of_bounds());
        }
        if self.is_empty() {
            return Ok(None);
        }
        let fits_x = self.x.checked_add(self.w).is_some_and(|end| end <= width as i64);
        let fits_y = self.y.checked_add(self.h).is_some_and(|end| end <= height as i64);
        if !fits_x || !fits_y {
            return Err(out_of_bounds());
        }

        Ok(Some(Region {
            x: self.x as u32,
            y: self.y as u32,
            w: self.w as u32,
            h: self.h as u32,
        }))
    }
}

impl From<(i64, i64, i64, i64)> for RawRect {
    fn from((x, y, w, h): (i64, i64, i64, i64)) -> Self {
        Self { x, y, w, h }
    }
}

/// A rectangle known to lie inside the buffer it was validated against,
/// with positive width and height.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl Region {
    /// The whole image.
    pub fn full(buffer: &PixelBuffer) -> Self {
        Self {
            x: 0,
            y: 0,
            w: buffer.width(),
            h: buffer.height(),
        }
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.w
    }

    pub fn height(&self) -> u32 {
        self.h
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::filled(w, h, [0, 0, 0]).unwrap()
    }

    #[test]
    fn zero_rect_means_no_region() {
        let buf = image(10, 10);
        assert_eq!(RawRect::default().validate(&buf).unwrap(), None);
        assert_eq!(RawRect::new(3, 3, 0, 5).validate(&buf).unwrap(), None);
    }

    #[test]
    fn rect_reaching_past_right_edge_is_rejected() {
        let buf = image(10, 10);
        let err = RawRect::new(8, 0, 5, 2).validate(&buf).unwrap_err();
        assert!(matches!(
            err,
            EngineError::OutOfBounds { x: 8, w: 5, width: 10, .. }
        ));
    }

    #[test]
    fn negative_fields_are_rejected() {
        let buf = image(10, 10);
        assert!(RawRect::new(-1, 0, 2, 2).validate(&buf).is_err());
        assert!(RawRect::new(0, 0, -2, 2).validate(&buf).is_err());
    }

    #[test]
    fn huge_extent_does_not_overflow() {
        let buf = image(10, 10);
        assert!(RawRect::new(1, 1, i64::MAX, 1).validate(&buf).is_err());
    }

    #[test]
    fn exact_fit_is_accepted() {
        let buf = image(10, 6);
        let region = RawRect::new(0, 0, 10, 6).validate(&buf).unwrap().unwrap();
        assert_eq!(region, Region::full(&buf));
        assert!(region.contains(9, 5));
        assert!(!region.contains(10, 5));
    }
}
