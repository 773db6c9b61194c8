use crate::config::MaskConfig;
use crate::error::{Result, TileMaskError};
use crate::io;
use crate::model::ModelRunner;
use crate::raster::Raster;
use crate::tiling::{self, clip_values, pad, stitch};
use log::{debug, info};
use ndarray::{s, Array2, Array4, ArrayView2, Axis};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Number of input channels stacked per tile: `[channel_a, channel_b]`.
pub const CHANNELS: usize = 2;

/// Stack paired tiles channel-wise into a `(N, T, T, 2)` batch.
pub fn stack_tiles(tiles_a: &[ArrayView2<'_, f32>], tiles_b: &[ArrayView2<'_, f32>]) -> Result<Array4<f32>> {
    if tiles_a.len() != tiles_b.len() {
        return Err(TileMaskError::TileCountMismatch {
            expected: tiles_a.len(),
            actual: tiles_b.len(),
        });
    }

    let Some(first) = tiles_a.first() else {
        return Ok(Array4::zeros((0, 0, 0, CHANNELS)));
    };
    let (height, width) = first.dim();

    for (a, b) in tiles_a.iter().zip(tiles_b) {
        if a.dim() != (height, width) || b.dim() != (height, width) {
            return Err(TileMaskError::ShapeMismatch(a.dim(), b.dim()));
        }
    }

    let mut batch = Array4::<f32>::zeros((tiles_a.len(), height, width, CHANNELS));
    batch
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(tiles_a.par_iter().zip(tiles_b.par_iter()))
        .for_each(|(mut item, (a, b))| {
            item.slice_mut(s![.., .., 0]).assign(a);
            item.slice_mut(s![.., .., 1]).assign(b);
        });

    Ok(batch)
}

/// Run the model over `batch` in chunks, returning one rounded `(T, T)` map per tile.
pub fn predict_tiles<R>(runner: &mut R, batch: &Array4<f32>, batch_size: usize) -> Result<Vec<Array2<f32>>>
where
    R: ModelRunner + ?Sized,
{
    if batch_size == 0 {
        return Err(TileMaskError::InvalidBatchSize(batch_size));
    }

    let (total, height, width, _) = batch.dim();
    let mut predictions = Vec::with_capacity(total);

    let mut start = 0;
    while start < total {
        let end = (start + batch_size).min(total);
        let chunk = batch.slice(s![start..end, .., .., ..]);
        let output = runner.predict(chunk)?;

        let expected = [end - start, height, width, 1];
        if output.shape() != expected {
            return Err(TileMaskError::ModelOutputShape {
                expected,
                actual: output.shape().to_vec(),
            });
        }

        for prediction in output.axis_iter(Axis(0)) {
            predictions.push(prediction.slice(s![.., .., 0]).mapv(f32::round));
        }

        debug!("Predicted tiles {}..{} of {}", start, end, total);
        start = end;
    }

    Ok(predictions)
}

/// Tile two co-registered polarization channels, run inference and stitch a binary mask.
///
/// No-data positions are taken from `channel_a` alone and forced to `0` in the
/// output. The result reuses `channel_a`'s geotransform and projection.
pub fn create_mask<R>(runner: &mut R, channel_a: &Raster, channel_b: &Raster, config: &MaskConfig) -> Result<Raster>
where
    R: ModelRunner + ?Sized,
{
    config.validate()?;

    if !channel_a.is_co_registered(channel_b) {
        return Err(TileMaskError::NotCoRegistered);
    }

    // Pad both channels to whole tiles
    let mut grid_a = pad(&channel_a.data, config.tile_size)?;
    let mut grid_b = pad(&channel_b.data, config.tile_size)?;
    if grid_a.padded_dim() != grid_b.padded_dim() {
        return Err(TileMaskError::ShapeMismatch(grid_a.padded_dim(), grid_b.padded_dim()));
    }

    // No-data positions from channel A, before clipping
    let invalid = grid_a.invalid_pixels();
    info!(
        "{}x{} tiles of {}px, {} invalid pixels",
        grid_a.cols,
        grid_a.rows,
        config.tile_size,
        invalid.count()
    );

    if let Some(range) = config.clip {
        clip_values(grid_a.buffer_mut(), range);
        clip_values(grid_b.buffer_mut(), range);
    }

    // Run the model batch by batch over paired tiles
    let tiles_a = grid_a.tiles()?;
    let tiles_b = grid_b.tiles()?;

    let mut predictions = Vec::with_capacity(tiles_a.len());
    for (chunk_a, chunk_b) in tiles_a.chunks(config.batch_size).zip(tiles_b.chunks(config.batch_size)) {
        let batch = stack_tiles(chunk_a, chunk_b)?;
        predictions.extend(predict_tiles(runner, &batch, config.batch_size)?);
    }

    // Reassemble and blank out no-data
    let mut mask = stitch(&predictions, grid_a.rows, grid_a.cols, grid_a.tile_size())?;
    invalid.apply(&mut mask)?;

    if config.crop_to_original {
        let (height, width) = grid_a.original_dim();
        mask = tiling::crop(&mask, height, width)?;
    }

    Raster::new(mask, channel_a.geotransform, channel_a.projection.clone())
}

/// Read both channels, build the mask and write it as a GeoTIFF with no-data `0`.
pub fn create_mask_from_files<R>(
    runner: &mut R,
    channel_a: &Path,
    channel_b: &Path,
    output: &Path,
    config: &MaskConfig,
) -> Result<()>
where
    R: ModelRunner + ?Sized,
{
    io::ensure_exists(channel_a)?;
    io::ensure_exists(channel_b)?;
    config.validate()?;

    let raster_a = io::read_raster(channel_a)?;
    let raster_b = io::read_raster(channel_b)?;

    let mask = create_mask(runner, &raster_a, &raster_b, config)?;
    io::write_mask_raster(output, &mask, &config.output)?;

    info!("Wrote {}x{} mask to {}", mask.width(), mask.height(), output.display());
    Ok(())
}

/// One dual-polarization scene and where its mask goes.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskJob {
    pub channel_a: PathBuf,
    pub channel_b: PathBuf,
    pub output: PathBuf,
}

/// Run several mask jobs in order, checking `cancel` between images.
pub fn create_masks<R>(runner: &mut R, jobs: &[MaskJob], config: &MaskConfig, cancel: &AtomicBool) -> Result<Vec<PathBuf>>
where
    R: ModelRunner + ?Sized,
{
    let mut written = Vec::with_capacity(jobs.len());
    for (index, job) in jobs.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            info!("Cancelled after {} of {} images", index, jobs.len());
            return Err(TileMaskError::Cancelled {
                completed: index,
                total: jobs.len(),
            });
        }

        info!("[{}/{}] {}", index + 1, jobs.len(), job.output.display());
        create_mask_from_files(runner, &job.channel_a, &job.channel_b, &job.output, config)?;
        written.push(job.output.clone());
    }
    Ok(written)
}
