//! In-memory single-band raster with its georeferencing.

use crate::error::{Result, TileMaskError};
use ndarray::Array2;

/// Six-coefficient affine transform in GDAL order:
/// `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    pub fn origin_x(&self) -> f64 {
        self.0[0]
    }

    pub fn pixel_width(&self) -> f64 {
        self.0[1]
    }

    pub fn origin_y(&self) -> f64 {
        self.0[3]
    }

    /// Conventionally negative for north-up rasters.
    pub fn pixel_height(&self) -> f64 {
        self.0[5]
    }

    pub fn is_rotated(&self) -> bool {
        self.0[2] != 0.0 || self.0[4] != 0.0
    }

    /// Coefficient-wise bit equality, so `-0.0 != 0.0` and `NaN == NaN`.
    pub fn bit_eq(&self, other: &GeoTransform) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| a.to_bits() == b.to_bits())
    }

    /// Same transform with the origin moved to map coordinate `(x, y)`.
    pub fn with_origin(&self, x: f64, y: f64) -> GeoTransform {
        let mut gt = self.0;
        gt[0] = x;
        gt[3] = y;
        GeoTransform(gt)
    }
}

/// Georeferencing of a raster without its pixels.
#[derive(Debug, Clone)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub geotransform: GeoTransform,
    pub projection: String,
    pub nodata: Option<f64>,
}

impl RasterMetadata {
    /// Co-registration requires bit-identical geotransforms and projections.
    pub fn is_co_registered(&self, other: &RasterMetadata) -> bool {
        self.geotransform.bit_eq(&other.geotransform) && self.projection == other.projection
    }
}

#[derive(Debug, Clone)]
pub struct Raster {
    pub data: Array2<f32>,
    pub geotransform: GeoTransform,
    pub projection: String,
}

impl Raster {
    pub fn new(data: Array2<f32>, geotransform: GeoTransform, projection: impl Into<String>) -> Result<Self> {
        let (height, width) = data.dim();
        if width == 0 || height == 0 {
            return Err(TileMaskError::InvalidDimensions(width, height));
        }
        Ok(Self {
            data,
            geotransform,
            projection: projection.into(),
        })
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn metadata(&self) -> RasterMetadata {
        RasterMetadata {
            width: self.width(),
            height: self.height(),
            geotransform: self.geotransform,
            projection: self.projection.clone(),
            nodata: None,
        }
    }

    pub fn is_co_registered(&self, other: &Raster) -> bool {
        self.geotransform.bit_eq(&other.geotransform) && self.projection == other.projection
    }
}
