use crate::config::{OverlapMode, OverlapOptions};
use crate::error::{Result, TileMaskError};
use crate::io;
use crate::output::OutputOptions;
use crate::overlap::overlap;
use log::{info, warn};
use ndarray::{Array2, ArrayBase, Data, Ix2, Zip};
use std::path::Path;

pub const UNCHANGED: u8 = 0;
pub const GAINED: u8 = 1;
pub const LOST: u8 = 2;

/// Pixel counts per difference class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DifferenceSummary {
    pub unchanged: usize,
    pub gained: usize,
    pub lost: usize,
}

impl DifferenceSummary {
    pub fn of(mask: &Array2<u8>) -> Self {
        mask.iter().fold(Self::default(), |mut summary, &value| {
            match value {
                GAINED => summary.gained += 1,
                LOST => summary.lost += 1,
                _ => summary.unchanged += 1,
            }
            summary
        })
    }
}

fn classify(before: f32, after: f32) -> u8 {
    if before == 0.0 && after == 1.0 {
        GAINED
    } else if before == 1.0 && after == 0.0 {
        LOST
    } else {
        UNCHANGED
    }
}

/// Tri-state change mask between two binary masks of the same window.
pub fn difference<S1, S2>(before: &ArrayBase<S1, Ix2>, after: &ArrayBase<S2, Ix2>) -> Result<Array2<u8>>
where
    S1: Data<Elem = f32>,
    S2: Data<Elem = f32>,
{
    if before.dim() != after.dim() {
        return Err(TileMaskError::ShapeMismatch(before.dim(), after.dim()));
    }

    Ok(Zip::from(before)
        .and(after)
        .par_map_collect(|&b, &a| classify(b, a)))
}

/// Difference of two mask rasters over their footprint intersection.
///
/// Only the overlapping window of each raster is read. The output is a byte
/// raster anchored at the top-left of the intersection envelope.
pub fn difference_from_files(
    before_path: &Path,
    after_path: &Path,
    output_path: &Path,
    options: &OverlapOptions,
    output: &OutputOptions,
) -> Result<DifferenceSummary> {
    io::ensure_exists(before_path)?;
    io::ensure_exists(after_path)?;
    output.validate()?;

    let mut options = *options;
    if options.mode != OverlapMode::Intersection {
        warn!("Difference masks are computed over the intersection only");
        options.mode = OverlapMode::Intersection;
    }

    // Only metadata is needed to find the shared window
    let before_ds = io::open_dataset(before_path)?;
    let after_ds = io::open_dataset(after_path)?;
    let before_meta = io::metadata_from_dataset(&before_ds)?;
    let after_meta = io::metadata_from_dataset(&after_ds)?;

    let overlap = overlap(&before_meta, &after_meta, &options)?;
    let window_before = overlap.window_a();
    let window_after = overlap.window_b();

    info!(
        "Overlap: {}x{} pixels at ({},{}) in {} and ({},{}) in {}",
        window_before.cols,
        window_before.rows,
        window_before.x_offset,
        window_before.y_offset,
        before_path.display(),
        window_after.x_offset,
        window_after.y_offset,
        after_path.display()
    );

    // Read just the overlapping pixels of each mask
    let before = io::read_window(&before_ds, &window_before)?;
    let after = io::read_window(&after_ds, &window_after)?;
    let mask = difference(&before, &after)?;

    let summary = DifferenceSummary::of(&mask);
    info!(
        "Difference: {} unchanged, {} gained, {} lost",
        summary.unchanged, summary.gained, summary.lost
    );

    // Anchor output at the top-left of the intersection
    let env = overlap.envelope();
    let geotransform = before_meta.geotransform.with_origin(env.min_x, env.max_y);
    io::write_band(output_path, &mask, &geotransform, &before_meta.projection, output)?;

    Ok(summary)
}
