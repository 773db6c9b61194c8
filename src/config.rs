use crate::error::{Result, TileMaskError};
use crate::output::OutputOptions;
use crate::tiling::ValueRange;

pub const DEFAULT_TILE_SIZE: usize = 512;
pub const DEFAULT_BATCH_SIZE: usize = 1;

/// Settings for one mask inference run.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskConfig {
    /// Square tile edge length in pixels.
    pub tile_size: usize,
    /// Tiles handed to the model per call.
    pub batch_size: usize,
    /// Write only the original extent instead of the padded one.
    pub crop_to_original: bool,
    /// Clamp applied to both channels after the invalid-pixel scan.
    pub clip: Option<ValueRange>,
    pub output: OutputOptions,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            crop_to_original: false,
            clip: None,
            output: OutputOptions::default(),
        }
    }
}

impl MaskConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(TileMaskError::InvalidTileSize(self.tile_size));
        }
        if self.batch_size == 0 {
            return Err(TileMaskError::InvalidBatchSize(self.batch_size));
        }
        self.output.validate()
    }
}

/// How two raster footprints are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapMode {
    #[default]
    Intersection,
    Union,
}

/// Settings for footprint overlap computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlapOptions {
    pub mode: OverlapMode,
    /// Skip the pixel-size and projection agreement checks.
    pub permissive: bool,
}
