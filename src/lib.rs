// Library exports for testing and reuse

pub mod cli;
pub mod config;
pub mod crs;
pub mod difference;
pub mod error;
pub mod inference;
pub mod io;
pub mod model;
pub mod output;
pub mod overlap;
pub mod raster;
pub mod tiling;

// Re-export commonly used types
pub use config::{MaskConfig, OverlapMode, OverlapOptions};
pub use difference::{difference, difference_from_files, DifferenceSummary};
pub use error::{Result, TileMaskError};
pub use inference::{create_mask, create_mask_from_files, create_masks, MaskJob};
pub use model::{ModelRunner, NamedModel, ThresholdRunner, TrainingHistory};
pub use output::OutputOptions;
pub use overlap::{footprint_polygon, overlap, overlap_indices, PixelWindow};
pub use raster::{GeoTransform, Raster, RasterMetadata};
pub use tiling::{pad, stitch, tile, valid_image, InvalidPixelSet, TileGrid};
