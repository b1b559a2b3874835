//! Typed adjustment payload accepted at the collaborator boundary.
//!
//! The web / GUI layer builds (or parses) an [`AdjustRequest`] and hands it
//! to [`crate::engine::Engine::adjust`]. Missing channel fields default to 0
//! and a missing `region` means "whole image".

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::ops::adjustments::ChannelOffsets;
use crate::region::RawRect;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustRequest {
    #[serde(default)]
    pub blue: i32,
    #[serde(default)]
    pub green: i32,
    #[serde(default)]
    pub red: i32,
    #[serde(default)]
    pub region: Option<RawRect>,
}

impl AdjustRequest {
    pub fn new(offsets: ChannelOffsets, region: Option<RawRect>) -> Self {
        Self {
            blue: offsets.blue,
            green: offsets.green,
            red: offsets.red,
            region,
        }
    }

    pub fn offsets(&self) -> ChannelOffsets {
        ChannelOffsets::new(self.blue, self.green, self.red)
    }

    /// Reject any offset whose magnitude exceeds `limit`.
    pub fn validate(&self, limit: i32) -> Result<()> {
        for (channel, value) in [("blue", self.blue), ("green", self.green), ("red", self.red)] {
            if value.unsigned_abs() > limit.unsigned_abs() {
                return Err(EngineError::OffsetOutOfRange {
                    channel,
                    value,
                    limit,
                });
            }
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| EngineError::Config(format!("bad adjust request: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| EngineError::Config(e.to_string()))
    }
}
