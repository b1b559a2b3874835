//! Editor event dispatch.
//!
//! A front end (slider panel, region picker, reset/save buttons) turns user
//! input into [`EditorEvent`]s and feeds them to an [`EditorController`],
//! which keeps the current slider/region state for one session and issues
//! the matching engine calls.

use crate::engine::{Engine, ImageHandle, PreviewHandle, StoredHandle};
use crate::error::{EngineError, Result};
use crate::ops::adjustments::ChannelOffsets;
use crate::region::RawRect;
use crate::request::AdjustRequest;

/// Slider range exposed by the editor UI.
pub const SLIDER_MIN: i32 = -100;
pub const SLIDER_MAX: i32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Blue,
    Green,
    Red,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorEvent {
    /// A channel slider moved. Values are clamped to the slider range.
    SliderChanged { channel: Channel, value: i32 },
    /// The region picker produced a rectangle; `(0, 0, 0, 0)` means none.
    RegionPicked(RawRect),
    RegionCleared,
    /// All sliders back to zero.
    Reset,
    Save,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditorOutcome {
    Preview(PreviewHandle),
    Saved(StoredHandle),
}

pub struct EditorController<'a> {
    engine: &'a Engine,
    handle: ImageHandle,
    sliders: ChannelOffsets,
    region: Option<RawRect>,
    last_preview: Option<PreviewHandle>,
}

impl<'a> EditorController<'a> {
    pub fn new(engine: &'a Engine, handle: ImageHandle) -> Self {
        Self {
            engine,
            handle,
            sliders: ChannelOffsets::default(),
            region: None,
            last_preview: None,
        }
    }

    pub fn sliders(&self) -> ChannelOffsets {
        self.sliders
    }

    pub fn region(&self) -> Option<RawRect> {
        self.region
    }

    pub fn last_preview(&self) -> Option<&PreviewHandle> {
        self.last_preview.as_ref()
    }

    pub fn dispatch(&mut self, event: EditorEvent) -> Result<EditorOutcome> {
        match event {
            EditorEvent::SliderChanged { channel, value } => {
                let value = value.clamp(SLIDER_MIN, SLIDER_MAX);
                match channel {
                    Channel::Blue => self.sliders.blue = value,
                    Channel::Green => self.sliders.green = value,
                    Channel::Red => self.sliders.red = value,
                }
                self.render(self.region)
            }
            EditorEvent::RegionPicked(rect) => {
                // A rejected pick keeps the previous region.
                let candidate = if rect.is_empty() { None } else { Some(rect) };
                let outcome = self.render(candidate)?;
                self.region = candidate;
                Ok(outcome)
            }
            EditorEvent::RegionCleared => {
                self.region = None;
                self.render(None)
            }
            EditorEvent::Reset => {
                self.sliders = ChannelOffsets::default();
                let preview = self.engine.reset(self.handle)?;
                self.last_preview = Some(preview.clone());
                Ok(EditorOutcome::Preview(preview))
            }
            EditorEvent::Save => {
                let preview = self
                    .last_preview
                    .as_ref()
                    .ok_or_else(|| EngineError::NotFound("adjusted image".to_string()))?;
                self.engine.save(preview).map(EditorOutcome::Saved)
            }
        }
    }

    fn render(&mut self, region: Option<RawRect>) -> Result<EditorOutcome> {
        let request = AdjustRequest::new(self.sliders, region);
        let preview = self.engine.adjust(self.handle, &request)?;
        self.last_preview = Some(preview.clone());
        Ok(EditorOutcome::Preview(preview))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelBuffer;
    use crate::config::EngineConfig;

    fn setup() -> (Engine, ImageHandle) {
        let engine = Engine::in_memory(EngineConfig::default());
        let handle = engine.load_buffer(PixelBuffer::filled(4, 4, [120, 120, 120]).unwrap(), "demo.png");
        (engine, handle)
    }

    #[test]
    fn sliders_clamp_to_ui_range() {
        let (engine, handle) = setup();
        let mut ctl = EditorController::new(&engine, handle);
        ctl.dispatch(EditorEvent::SliderChanged { channel: Channel::Red, value: 180 })
            .unwrap();
        assert_eq!(ctl.sliders(), ChannelOffsets::new(0, 0, SLIDER_MAX));
        assert_eq!(engine.preview(handle).unwrap().pixel(0, 0), Some([120, 120, 220]));
    }

    #[test]
    fn sliders_combine_and_region_restricts() {
        let (engine, handle) = setup();
        let mut ctl = EditorController::new(&engine, handle);
        ctl.dispatch(EditorEvent::RegionPicked(RawRect::new(0, 0, 2, 2))).unwrap();
        ctl.dispatch(EditorEvent::SliderChanged { channel: Channel::Blue, value: -20 })
            .unwrap();
        ctl.dispatch(EditorEvent::SliderChanged { channel: Channel::Green, value: 30 })
            .unwrap();

        let view = engine.preview(handle).unwrap();
        assert_eq!(view.pixel(1, 1), Some([100, 150, 120]));
        assert_eq!(view.pixel(3, 3), Some([120, 120, 120]));
    }

    #[test]
    fn empty_pick_means_whole_image() {
        let (engine, handle) = setup();
        let mut ctl = EditorController::new(&engine, handle);
        ctl.dispatch(EditorEvent::RegionPicked(RawRect::default())).unwrap();
        assert_eq!(ctl.region(), None);
        ctl.dispatch(EditorEvent::SliderChanged { channel: Channel::Green, value: 5 })
            .unwrap();
        assert_eq!(engine.preview(handle).unwrap().pixel(3, 3), Some([120, 125, 120]));
    }

    #[test]
    fn out_of_bounds_pick_keeps_previous_region() {
        let (engine, handle) = setup();
        let mut ctl = EditorController::new(&engine, handle);
        ctl.dispatch(EditorEvent::RegionPicked(RawRect::new(0, 0, 1, 1))).unwrap();

        let err = ctl.dispatch(EditorEvent::RegionPicked(RawRect::new(3, 3, 5, 5))).unwrap_err();
        assert!(matches!(err, EngineError::OutOfBounds { width: 4, height: 4, .. }));
        assert_eq!(ctl.region(), Some(RawRect::new(0, 0, 1, 1)));

        ctl.dispatch(EditorEvent::SliderChanged { channel: Channel::Blue, value: 10 })
            .unwrap();
        let view = engine.preview(handle).unwrap();
        assert_eq!(view.pixel(0, 0), Some([130, 120, 120]));
        assert_eq!(view.pixel(1, 1), Some([120, 120, 120]));
    }

    #[test]
    fn reset_returns_to_original() {
        let (engine, handle) = setup();
        let mut ctl = EditorController::new(&engine, handle);
        ctl.dispatch(EditorEvent::SliderChanged { channel: Channel::Blue, value: 60 })
            .unwrap();
        ctl.dispatch(EditorEvent::Reset).unwrap();
        assert_eq!(ctl.sliders(), ChannelOffsets::default());
        assert_eq!(engine.preview(handle).unwrap().pixel(2, 2), Some([120, 120, 120]));
    }

    #[test]
    fn save_needs_a_preview() {
        let (engine, handle) = setup();
        let mut ctl = EditorController::new(&engine, handle);
        assert!(matches!(ctl.dispatch(EditorEvent::Save).unwrap_err(), EngineError::NotFound(_)));

        let preview = match ctl
            .dispatch(EditorEvent::SliderChanged { channel: Channel::Red, value: 10 })
            .unwrap()
        {
            EditorOutcome::Preview(p) => p,
            other => panic!("expected preview, got {other:?}"),
        };
        match ctl.dispatch(EditorEvent::Save).unwrap() {
            EditorOutcome::Saved(stored) => {
                assert_eq!(stored.key(), "saved_image.png");
                assert_eq!(
                    engine.fetch_bytes(stored.key()).unwrap(),
                    engine.fetch_bytes(preview.key()).unwrap()
                );
            }
            other => panic!("expected save, got {other:?}"),
        }
    }
}
