use crate::error::{Result, TileMaskError};
use log::debug;
use ndarray::{s, Array2, ArrayBase, ArrayView2, ArrayViewMut2, Data, Dimension, Ix2, Zip};

/// Zero-padded copy of a raster band sized to a whole number of square tiles.
#[derive(Debug, Clone)]
pub struct TileGrid {
    buffer: Array2<f32>,
    tile_size: usize,
    pub rows: usize,
    pub cols: usize,
    pub original_height: usize,
    pub original_width: usize,
}

impl TileGrid {
    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn total_tiles(&self) -> usize {
        self.rows * self.cols
    }

    pub fn buffer(&self) -> &Array2<f32> {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut Array2<f32> {
        &mut self.buffer
    }

    pub fn padded_dim(&self) -> (usize, usize) {
        self.buffer.dim()
    }

    pub fn original_dim(&self) -> (usize, usize) {
        (self.original_height, self.original_width)
    }

    /// Row-major `(T, T)` views into the padded buffer.
    pub fn tiles(&self) -> Result<Vec<ArrayView2<'_, f32>>> {
        tile(&self.buffer, self.tile_size)
    }

    pub fn tiles_mut(&mut self) -> Result<Vec<ArrayViewMut2<'_, f32>>> {
        let tile_size = self.tile_size;
        tile_mut(&mut self.buffer, tile_size)
    }

    /// Scan the padded buffer for exact zeros. Must run before any clipping.
    pub fn invalid_pixels(&self) -> InvalidPixelSet {
        InvalidPixelSet::from_buffer(&self.buffer)
    }
}

/// Copy `data` into the top-left of a zero buffer whose sides are multiples of `tile_size`.
pub fn pad<S>(data: &ArrayBase<S, Ix2>, tile_size: usize) -> Result<TileGrid>
where
    S: Data<Elem = f32>,
{
    if tile_size == 0 {
        return Err(TileMaskError::InvalidTileSize(tile_size));
    }

    let (height, width) = data.dim();
    if height == 0 || width == 0 {
        return Err(TileMaskError::InvalidDimensions(width, height));
    }

    let rows = height.div_ceil(tile_size);
    let cols = width.div_ceil(tile_size);

    let mut buffer = Array2::<f32>::zeros((rows * tile_size, cols * tile_size));
    buffer.slice_mut(s![..height, ..width]).assign(data);

    debug!(
        "TileGrid: {}x{} raster, tile_size={} → {}x{} tiles ({} total), padded to {}x{}",
        width,
        height,
        tile_size,
        cols,
        rows,
        rows * cols,
        cols * tile_size,
        rows * tile_size
    );

    Ok(TileGrid {
        buffer,
        tile_size,
        rows,
        cols,
        original_height: height,
        original_width: width,
    })
}

fn check_tileable(dim: (usize, usize), tile_size: usize) -> Result<()> {
    if tile_size == 0 {
        return Err(TileMaskError::InvalidTileSize(tile_size));
    }
    let (height, width) = dim;
    if height == 0 || width == 0 {
        return Err(TileMaskError::InvalidDimensions(width, height));
    }
    if height % tile_size != 0 || width % tile_size != 0 {
        return Err(TileMaskError::NotTileable {
            height,
            width,
            tile_size,
        });
    }
    Ok(())
}

/// Split an evenly tileable buffer into `(T, T)` views in row-major grid order.
///
/// Nothing is copied; the views borrow `buffer`.
pub fn tile<A, S>(buffer: &ArrayBase<S, Ix2>, tile_size: usize) -> Result<Vec<ArrayView2<'_, A>>>
where
    S: Data<Elem = A>,
{
    check_tileable(buffer.dim(), tile_size)?;
    Ok(buffer.exact_chunks((tile_size, tile_size)).into_iter().collect())
}

/// Mutable counterpart of [`tile`]; writes through a view land in `buffer`.
pub fn tile_mut<A>(buffer: &mut Array2<A>, tile_size: usize) -> Result<Vec<ArrayViewMut2<'_, A>>> {
    check_tileable(buffer.dim(), tile_size)?;
    Ok(buffer
        .exact_chunks_mut((tile_size, tile_size))
        .into_iter()
        .collect())
}

/// Reassemble a row-major sequence of `(T, T)` predictions into a `(rows*T, cols*T)` buffer.
///
/// Equivalent to reshaping to `(rows, cols, T, T)`, swapping the two middle axes and
/// reshaping to 2D. Tiles are written in parallel into disjoint regions.
pub fn stitch<S>(predictions: &[ArrayBase<S, Ix2>], rows: usize, cols: usize, tile_size: usize) -> Result<Array2<f32>>
where
    S: Data<Elem = f32> + Sync,
{
    if tile_size == 0 {
        return Err(TileMaskError::InvalidTileSize(tile_size));
    }

    let expected = rows * cols;
    if predictions.len() != expected {
        return Err(TileMaskError::TileCountMismatch {
            expected,
            actual: predictions.len(),
        });
    }

    for (index, prediction) in predictions.iter().enumerate() {
        if prediction.dim() != (tile_size, tile_size) {
            return Err(TileMaskError::TileShapeMismatch {
                index,
                actual: prediction.dim(),
                tile_size,
            });
        }
    }

    let mut stitched = Array2::<f32>::zeros((rows * tile_size, cols * tile_size));
    Zip::indexed(stitched.exact_chunks_mut((tile_size, tile_size))).par_for_each(|(r, c), mut target| {
        target.assign(&predictions[r * cols + c]);
    });

    debug!(
        "Stitched {} tiles into {}x{} buffer",
        expected,
        cols * tile_size,
        rows * tile_size
    );

    Ok(stitched)
}

/// Top-left `(height, width)` region of a stitched buffer.
pub fn crop<A: Clone>(stitched: &Array2<A>, height: usize, width: usize) -> Result<Array2<A>> {
    let (stitched_height, stitched_width) = stitched.dim();
    if height > stitched_height || width > stitched_width {
        return Err(TileMaskError::ShapeMismatch(
            (height, width),
            (stitched_height, stitched_width),
        ));
    }
    Ok(stitched.slice(s![..height, ..width]).to_owned())
}

/// Positions of a padded buffer whose value was exactly `0.0` (no-data or padding).
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidPixelSet {
    mask: Array2<bool>,
}

impl InvalidPixelSet {
    pub fn from_buffer<S>(buffer: &ArrayBase<S, Ix2>) -> Self
    where
        S: Data<Elem = f32>,
    {
        let mask = Zip::from(buffer).par_map_collect(|&value| value == 0.0);
        Self { mask }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.mask.dim()
    }

    pub fn count(&self) -> usize {
        self.mask.iter().filter(|&&invalid| invalid).count()
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.mask.get((row, col)).copied().unwrap_or(false)
    }

    /// Zero every invalid position of `target`, whatever was predicted there.
    pub fn apply(&self, target: &mut Array2<f32>) -> Result<()> {
        if target.dim() != self.mask.dim() {
            return Err(TileMaskError::ShapeMismatch(target.dim(), self.mask.dim()));
        }
        Zip::from(target)
            .and(&self.mask)
            .par_for_each(|value, &invalid| {
                if invalid {
                    *value = 0.0;
                }
            });
        Ok(())
    }
}

/// Inclusive clamp applied to tile values before inference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl std::str::FromStr for ValueRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<_> = s.split(',').map(|p| p.trim()).collect();
        if parts.len() != 2 {
            return Err("Expected 'min,max'".into());
        }
        let min: f32 = parts[0].parse().map_err(|e| format!("min parse error: {e}"))?;
        let max: f32 = parts[1].parse().map_err(|e| format!("max parse error: {e}"))?;
        if min.is_nan() || max.is_nan() || min > max {
            return Err(format!("min {min} is greater than max {max}"));
        }
        Ok(ValueRange { min, max })
    }
}

/// Clamp values into `range`; NaN becomes `0.0` (no-data).
pub fn clip_values(buffer: &mut Array2<f32>, range: ValueRange) {
    buffer.par_mapv_inplace(|value| {
        if value.is_nan() {
            0.0
        } else {
            value.clamp(range.min, range.max)
        }
    });
}

/// An image is usable for training only if it holds no zero and no NaN.
pub fn valid_image<S, D>(data: &ArrayBase<S, D>) -> bool
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    !data.is_empty() && data.iter().all(|&value| value != 0.0 && !value.is_nan())
}
