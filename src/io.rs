use crate::error::{Result, TileMaskError};
use crate::output::OutputOptions;
use crate::overlap::PixelWindow;
use crate::raster::{GeoTransform, Raster, RasterMetadata};
use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, GdalType, RasterBand};
use gdal::{Dataset, DriverManager};
use log::{debug, info, warn};
use ndarray::Array2;
use std::path::Path;

/// No-data value of every raster this crate writes.
pub const OUTPUT_NODATA: f64 = 0.0;

pub fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(TileMaskError::FileNotFound(path.to_path_buf()));
    }
    Ok(())
}

pub fn open_dataset(path: &Path) -> Result<Dataset> {
    ensure_exists(path)?;
    debug!("Opening raster: {}", path.display());
    Ok(Dataset::open(path)?)
}

/// Extract band 1 metadata from a dataset without reading pixels
pub fn metadata_from_dataset(dataset: &Dataset) -> Result<RasterMetadata> {
    let rasterband: RasterBand = dataset.rasterband(1)?;

    let width = rasterband.x_size() as usize;
    let height = rasterband.y_size() as usize;

    if width == 0 || height == 0 {
        return Err(TileMaskError::InvalidDimensions(width, height));
    }

    Ok(RasterMetadata {
        width,
        height,
        geotransform: GeoTransform(dataset.geo_transform()?),
        projection: dataset.projection(),
        nodata: rasterband.no_data_value(),
    })
}

pub fn read_metadata(path: &Path) -> Result<RasterMetadata> {
    let dataset = open_dataset(path)?;
    metadata_from_dataset(&dataset)
}

/// Read the full first band of a raster as `f32`
pub fn read_raster(path: &Path) -> Result<Raster> {
    info!("Reading raster: {}", path.display());
    let dataset = open_dataset(path)?;
    let metadata = metadata_from_dataset(&dataset)?;

    let window = PixelWindow {
        x_offset: 0,
        y_offset: 0,
        cols: metadata.width,
        rows: metadata.height,
    };
    let data = read_window(&dataset, &window)?;

    debug!("Raster dimensions: {}x{}", metadata.width, metadata.height);

    Raster::new(data, metadata.geotransform, metadata.projection)
}

/// Read only `window` of band 1
pub fn read_window(dataset: &Dataset, window: &PixelWindow) -> Result<Array2<f32>> {
    if window.cols == 0 || window.rows == 0 {
        return Err(TileMaskError::InvalidDimensions(window.cols, window.rows));
    }

    let rasterband = dataset.rasterband(1)?;

    debug!(
        "Reading window: offset=({},{}), size=({},{})",
        window.x_offset, window.y_offset, window.cols, window.rows
    );

    let buffer = rasterband.read_as::<f32>(
        (window.x_offset as isize, window.y_offset as isize),
        (window.cols, window.rows),
        (window.cols, window.rows),
        None,
    )?;

    let data_vec: Vec<f32> = buffer.into_iter().collect();
    let data = Array2::from_shape_vec((window.rows, window.cols), data_vec)?;

    Ok(data)
}

/// Write a single-band GeoTIFF with no-data `0`.
///
/// A partially written file is removed if any step fails.
pub fn write_band<T>(
    path: &Path,
    data: &Array2<T>,
    geotransform: &GeoTransform,
    projection: &str,
    options: &OutputOptions,
) -> Result<()>
where
    T: GdalType + Copy,
{
    let result = write_band_inner(path, data, geotransform, projection, options);
    if result.is_err() && path.exists() {
        warn!("Removing incomplete output: {}", path.display());
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
    result
}

fn write_band_inner<T>(
    path: &Path,
    data: &Array2<T>,
    geotransform: &GeoTransform,
    projection: &str,
    options: &OutputOptions,
) -> Result<()>
where
    T: GdalType + Copy,
{
    info!("Creating output raster: {}", path.display());
    options.validate()?;

    let (height, width) = data.dim();
    if width == 0 || height == 0 {
        return Err(TileMaskError::InvalidDimensions(width, height));
    }

    let driver = DriverManager::get_driver_by_name("GTiff")?;

    let creation_options = options.creation_options();
    let mut dataset = if creation_options.is_empty() {
        driver.create_with_band_type::<T, _>(path, width, height, 1)?
    } else {
        let mut gdal_options = CslStringList::new();
        for opt in creation_options {
            gdal_options.add_string(&opt)?;
        }
        driver.create_with_band_type_with_options::<T, _>(path, width, height, 1, &gdal_options)?
    };

    dataset.set_geo_transform(&geotransform.0)?;
    dataset.set_projection(projection)?;

    let mut raster_band = dataset.rasterband(1)?;

    // ndarray iteration is logical row-major, which is GDAL's buffer order
    let values: Vec<T> = data.iter().copied().collect();
    let mut buffer = Buffer::new((width, height), values);

    raster_band.write((0, 0), (width, height), &mut buffer)?;
    raster_band.set_no_data_value(Some(OUTPUT_NODATA))?;

    debug!("Wrote {}x{} band to {}", width, height, path.display());
    Ok(())
}

/// Write a mask raster reusing the source geotransform and projection verbatim
pub fn write_mask_raster(path: &Path, mask: &Raster, options: &OutputOptions) -> Result<()> {
    write_band(path, &mask.data, &mask.geotransform, &mask.projection, options)
}
