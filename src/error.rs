use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TileMaskError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Input raster has invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Invalid tile size: {0} (must be positive)")]
    InvalidTileSize(usize),

    #[error("Invalid batch size: {0} (must be positive)")]
    InvalidBatchSize(usize),

    #[error("Image must be evenly tileable: {height}x{width} is not a multiple of tile size {tile_size}")]
    NotTileable {
        height: usize,
        width: usize,
        tile_size: usize,
    },

    #[error("Expected {expected} tiles for stitching, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },

    #[error("Tile {index} has shape {actual:?}, expected ({tile_size}, {tile_size})")]
    TileShapeMismatch {
        index: usize,
        actual: (usize, usize),
        tile_size: usize,
    },

    #[error("Shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch((usize, usize), (usize, usize)),

    #[error("Rasters are not co-registered (geotransform or projection differ)")]
    NotCoRegistered,

    #[error("Rotated geotransforms are not supported: {0:?}")]
    RotatedGeoTransform([f64; 6]),

    #[error("Pixel size is non-positive: {0}")]
    InvalidPixelSize(f64),

    #[error("Pixel sizes differ: {0} vs {1}")]
    PixelSizeMismatch(f64, f64),

    #[error("Projections are not equivalent")]
    ProjectionMismatch,

    #[error("Raster footprints do not overlap")]
    NoOverlap,

    #[error("Model inference failed: {0}")]
    Model(String),

    #[error("Model returned shape {actual:?}, expected {expected:?}")]
    ModelOutputShape {
        expected: [usize; 4],
        actual: Vec<usize>,
    },

    #[error("Operation cancelled after {completed} of {total} images")]
    Cancelled { completed: usize, total: usize },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid compression type: {0}")]
    InvalidCompression(String),

    #[error("Invalid block size: {0} (must be multiple of 16)")]
    InvalidBlockSize(usize),
}

pub type Result<T> = std::result::Result<T, TileMaskError>;
