use std::sync::Arc;

use crate::buffer::PixelBuffer;
use crate::error::{EngineError, Result};
use crate::ops::adjustments::{ChannelOffsets, apply_channel_offsets};
use crate::region::RawRect;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No image loaded.
    Empty,
    /// Original set, nothing adjusted yet.
    Loaded,
    /// Original set and a preview has been produced.
    Adjusted,
}

/// Non-destructive edit context for one loaded image.
///
/// Every adjustment is computed from `original`; the previous preview is
/// only remembered so it can be saved, never used as input.
#[derive(Debug, Default)]
pub struct EditSession {
    original: Option<Arc<PixelBuffer>>,
    /// Sanitised file name of the loaded image.
    image_name: Option<String>,
    last_adjusted: Option<Arc<PixelBuffer>>,
    /// Bumped on every load so in-flight adjustments of a replaced image
    /// can be told apart.
    generation: u64,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(name: impl Into<String>, buffer: PixelBuffer) -> Self {
        let mut session = Self::new();
        session.load(name, buffer);
        session
    }

    pub fn state(&self) -> SessionState {
        match (&self.original, &self.last_adjusted) {
            (None, _) => SessionState::Empty,
            (Some(_), None) => SessionState::Loaded,
            (Some(_), Some(_)) => SessionState::Adjusted,
        }
    }

    /// Replace the original and drop any preview derived from the old one.
    pub fn load(&mut self, name: impl Into<String>, buffer: PixelBuffer) {
        self.original = Some(Arc::new(buffer));
        self.image_name = Some(name.into());
        self.last_adjusted = None;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Adjust the original by `offsets`, optionally restricted to `rect`.
    ///
    /// The rectangle is validated against the original's dimensions; on any
    /// error the previous preview is left as it was.
    pub fn adjust(&mut self, offsets: ChannelOffsets, rect: Option<RawRect>) -> Result<Arc<PixelBuffer>> {
        let (original, generation) = self.snapshot()?;
        let result = Arc::new(render(&original, offsets, rect)?);
        self.commit(generation, Arc::clone(&result));
        Ok(result)
    }

    /// Back to an unadjusted view of the original.
    pub fn reset(&mut self) -> Result<Arc<PixelBuffer>> {
        let original = self.original.clone().ok_or(EngineError::NoImage)?;
        self.last_adjusted = Some(Arc::clone(&original));
        Ok(original)
    }

    pub fn original(&self) -> Option<&Arc<PixelBuffer>> {
        self.original.as_ref()
    }

    pub fn last_adjusted(&self) -> Option<&Arc<PixelBuffer>> {
        self.last_adjusted.as_ref()
    }

    pub fn image_name(&self) -> Option<&str> {
        self.image_name.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The original and its generation, for computing outside a lock.
    pub(crate) fn snapshot(&self) -> Result<(Arc<PixelBuffer>, u64)> {
        let original = self.original.clone().ok_or(EngineError::NoImage)?;
        Ok((original, self.generation))
    }

    /// Record `result` as the latest preview unless the image was replaced
    /// since `generation` was read. Returns whether it was recorded.
    pub(crate) fn commit(&mut self, generation: u64, result: Arc<PixelBuffer>) -> bool {
        if self.original.is_none() || generation != self.generation {
            return false;
        }
        self.last_adjusted = Some(result);
        true
    }
}

/// Validate `rect` against `original` and apply `offsets`.
pub(crate) fn render(original: &PixelBuffer, offsets: ChannelOffsets, rect: Option<RawRect>) -> Result<PixelBuffer> {
    let region = match rect {
        Some(raw) => raw.validate(original)?,
        None => None,
    };
    Ok(apply_channel_offsets(original, offsets, region))
}
