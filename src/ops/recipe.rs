// ============================================================================
// ADJUSTMENT RECIPES — .cfr files holding one reusable channel adjustment
// ============================================================================

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::ops::adjustments::ChannelOffsets;
use crate::region::RawRect;
use crate::request::AdjustRequest;

/// Magic header for recipe files (v1).
const RECIPE_MAGIC_V1: &str = "CFR1";

/// File extension used by the CLI for recipes.
pub const RECIPE_EXTENSION: &str = "cfr";

#[derive(Serialize, Deserialize)]
struct RecipeFileV1 {
    magic: String,
    offsets: ChannelOffsets,
    region: Option<RawRect>,
}

/// An adjustment captured for replay over other images. The region is kept
/// raw: it is validated against each image it is applied to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdjustRecipe {
    pub offsets: ChannelOffsets,
    pub region: Option<RawRect>,
}

impl AdjustRecipe {
    pub fn to_request(self) -> AdjustRequest {
        AdjustRequest {
            blue: self.offsets.blue,
            green: self.offsets.green,
            red: self.offsets.red,
            region: self.region,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.to_file())?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let file: RecipeFileV1 = bincode::deserialize(raw)?;
        if file.magic != RECIPE_MAGIC_V1 {
            return Err(EngineError::Recipe(format!("Unknown magic '{}'", file.magic)));
        }
        Ok(Self {
            offsets: file.offsets,
            region: file.region,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, &self.to_file())?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let file: RecipeFileV1 = bincode::deserialize_from(reader)?;
        if file.magic != RECIPE_MAGIC_V1 {
            return Err(EngineError::Recipe(format!("Unknown magic '{}'", file.magic)));
        }
        Ok(Self {
            offsets: file.offsets,
            region: file.region,
        })
    }

    fn to_file(&self) -> RecipeFileV1 {
        RecipeFileV1 {
            magic: RECIPE_MAGIC_V1.to_string(),
            offsets: self.offsets,
            region: self.region,
        }
    }
}

impl From<AdjustRequest> for AdjustRecipe {
    fn from(req: AdjustRequest) -> Self {
        Self {
            offsets: req.offsets(),
            region: req.region,
        }
    }
}
