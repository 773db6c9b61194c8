//! Footprint polygons of georeferenced rasters and the pixel windows of their overlap.
//!
//! Footprints are built from the geotransform alone and combined with OGR
//! polygon operations. Only the envelope of the combined polygon is used to
//! derive pixel windows, so a union yields the window of its bounding box.

use crate::config::{OverlapMode, OverlapOptions};
use crate::crs;
use crate::error::{Result, TileMaskError};
use crate::raster::RasterMetadata;
use gdal::vector::Geometry;
use log::{debug, info, warn};

/// Offsets within this fraction of a pixel of an integer snap to it.
const SNAP_TOLERANCE: f64 = 1e-6;

/// Relative tolerance when comparing pixel sizes of two rasters.
const PIXEL_SIZE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    fn of(geometry: &Geometry) -> Self {
        let env = geometry.envelope();
        Self {
            min_x: env.MinX,
            max_x: env.MaxX,
            min_y: env.MinY,
            max_y: env.MaxY,
        }
    }
}

/// Pixel offsets and counts into one raster's own grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub x_offset: usize,
    pub y_offset: usize,
    pub cols: usize,
    pub rows: usize,
}

impl PixelWindow {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

/// Closed rectangular ring covered by a raster, in projected coordinates.
pub struct Footprint {
    ring: [(f64, f64); 5],
    geometry: Geometry,
}

impl Footprint {
    pub fn ring(&self) -> &[(f64, f64)] {
        &self.ring
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn envelope(&self) -> Envelope {
        Envelope::of(&self.geometry)
    }
}

fn ring_wkt(ring: &[(f64, f64)]) -> String {
    let points: Vec<String> = ring.iter().map(|(x, y)| format!("{} {}", x, y)).collect();
    format!("POLYGON (({}))", points.join(", "))
}

/// Footprint from the geotransform and pixel dimensions.
///
/// The ring follows the sign of the pixel height, so north-up rasters need no
/// normalization.
pub fn footprint_polygon(metadata: &RasterMetadata) -> Result<Footprint> {
    let gt = &metadata.geotransform;
    if gt.is_rotated() {
        return Err(TileMaskError::RotatedGeoTransform(gt.0));
    }

    let x0 = gt.origin_x();
    let y0 = gt.origin_y();
    let x1 = x0 + metadata.width as f64 * gt.pixel_width();
    let y1 = y0 + metadata.height as f64 * gt.pixel_height();

    let ring = [(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)];
    let geometry = Geometry::from_wkt(&ring_wkt(&ring))?;

    Ok(Footprint { ring, geometry })
}

/// Both footprints, their combined polygon and the shared pixel size.
pub struct Overlap {
    pub footprint_a: Footprint,
    pub footprint_b: Footprint,
    pub polygon: Geometry,
    pub pixel_size: f64,
}

impl Overlap {
    pub fn envelope(&self) -> Envelope {
        Envelope::of(&self.polygon)
    }

    pub fn window_a(&self) -> PixelWindow {
        overlap_indices(&self.footprint_a.envelope(), &self.envelope(), self.pixel_size)
    }

    pub fn window_b(&self) -> PixelWindow {
        overlap_indices(&self.footprint_b.envelope(), &self.envelope(), self.pixel_size)
    }
}

fn sizes_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= PIXEL_SIZE_TOLERANCE * a.abs().max(b.abs())
}

fn check_grids(a: &RasterMetadata, b: &RasterMetadata, permissive: bool) -> Result<()> {
    let (width_a, height_a) = (a.geotransform.pixel_width(), a.geotransform.pixel_height().abs());
    let (width_b, height_b) = (b.geotransform.pixel_width(), b.geotransform.pixel_height().abs());

    // Windows are counted in A's pixel width along both axes
    let square = sizes_match(width_a, height_a);
    let width_matches = sizes_match(width_a, width_b);
    let height_matches = sizes_match(height_a, height_b);
    let projection_matches = crs::projections_equivalent(&a.projection, &b.projection);

    if permissive {
        if !square {
            warn!(
                "Non-square pixels detected ({:.6} x {:.6}), using width for calculations",
                width_a, height_a
            );
        }
        if !width_matches || !height_matches {
            warn!(
                "Pixel sizes differ ({} x {} vs {} x {}), using {}",
                width_a, height_a, width_b, height_b, width_a
            );
        }
        if !projection_matches {
            warn!("Projections differ, footprints compared as-is");
        }
        return Ok(());
    }

    if !square {
        return Err(TileMaskError::PixelSizeMismatch(width_a, height_a));
    }
    if !width_matches {
        return Err(TileMaskError::PixelSizeMismatch(width_a, width_b));
    }
    if !height_matches {
        return Err(TileMaskError::PixelSizeMismatch(height_a, height_b));
    }
    if !projection_matches {
        return Err(TileMaskError::ProjectionMismatch);
    }
    Ok(())
}

/// Intersect or union the footprints of two rasters.
///
/// The pixel size is taken from `a`.
pub fn overlap(a: &RasterMetadata, b: &RasterMetadata, options: &OverlapOptions) -> Result<Overlap> {
    let pixel_size = a.geotransform.pixel_width();
    if pixel_size <= 0.0 {
        return Err(TileMaskError::InvalidPixelSize(pixel_size));
    }

    check_grids(a, b, options.permissive)?;

    // Footprints are built before combining so rotation is rejected for both
    let footprint_a = footprint_polygon(a)?;
    let footprint_b = footprint_polygon(b)?;

    let polygon = match options.mode {
        OverlapMode::Intersection => footprint_a.geometry().intersection(footprint_b.geometry()),
        OverlapMode::Union => footprint_a.geometry().union(footprint_b.geometry()),
    };
    // Touching edges or corners leave a degenerate polygon
    let polygon = match polygon {
        Some(p) if !p.is_empty() && p.area() > 0.0 => p,
        _ => return Err(TileMaskError::NoOverlap),
    };

    let overlap = Overlap {
        footprint_a,
        footprint_b,
        polygon,
        pixel_size,
    };

    let env = overlap.envelope();
    info!(
        "{:?} envelope: x=[{}, {}], y=[{}, {}] ({:?} units, pixel size {})",
        options.mode,
        env.min_x,
        env.max_x,
        env.min_y,
        env.max_y,
        crs::linear_unit(&a.projection),
        pixel_size
    );

    Ok(overlap)
}

fn snap_floor(value: f64) -> f64 {
    (value + SNAP_TOLERANCE).floor()
}

fn to_index(value: f64) -> usize {
    let snapped = snap_floor(value);
    if snapped <= 0.0 {
        0
    } else {
        snapped as usize
    }
}

/// Pixel offsets and counts of `overlap` inside the grid anchored at `footprint`.
pub fn overlap_indices(footprint: &Envelope, overlap: &Envelope, pixel_size: f64) -> PixelWindow {
    let window = PixelWindow {
        x_offset: to_index((overlap.min_x - footprint.min_x) / pixel_size),
        y_offset: to_index((footprint.max_y - overlap.max_y) / pixel_size),
        cols: to_index(overlap.width() / pixel_size),
        rows: to_index(overlap.height() / pixel_size),
    };
    debug!("Overlap window: {:?}", window);
    window
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;

    fn metadata(origin_x: f64, origin_y: f64, pixel: f64, width: usize, height: usize) -> RasterMetadata {
        RasterMetadata {
            width,
            height,
            geotransform: GeoTransform([origin_x, pixel, 0.0, origin_y, 0.0, -pixel]),
            projection: String::new(),
            nodata: None,
        }
    }

    #[test]
    fn test_footprint_ring() {
        let footprint = footprint_polygon(&metadata(100.0, 200.0, 10.0, 3, 2)).unwrap();
        assert_eq!(
            footprint.ring(),
            &[(100.0, 200.0), (130.0, 200.0), (130.0, 180.0), (100.0, 180.0), (100.0, 200.0)]
        );
        let env = footprint.envelope();
        assert_eq!(env, Envelope { min_x: 100.0, max_x: 130.0, min_y: 180.0, max_y: 200.0 });
    }

    #[test]
    fn test_rotated_geotransform_rejected() {
        let mut meta = metadata(0.0, 0.0, 1.0, 2, 2);
        meta.geotransform.0[2] = 0.5;
        assert!(matches!(
            footprint_polygon(&meta),
            Err(TileMaskError::RotatedGeoTransform(_))
        ));
    }

    #[test]
    fn test_self_overlap_is_full_window() {
        let meta = metadata(500000.0, 4600000.0, 10.0, 1234, 987);
        let result = overlap(&meta, &meta, &OverlapOptions::default()).unwrap();
        let expected = PixelWindow { x_offset: 0, y_offset: 0, cols: 1234, rows: 987 };
        assert_eq!(result.window_a(), expected);
        assert_eq!(result.window_b(), expected);
    }

    #[test]
    fn test_partial_intersection_windows() {
        // a covers x 0..100, y 0..100; b is shifted by (30, -20)
        let a = metadata(0.0, 100.0, 10.0, 10, 10);
        let b = metadata(30.0, 80.0, 10.0, 10, 10);
        let result = overlap(&a, &b, &OverlapOptions::default()).unwrap();

        let env = result.envelope();
        assert_eq!(env, Envelope { min_x: 30.0, max_x: 100.0, min_y: 0.0, max_y: 80.0 });

        assert_eq!(result.window_a(), PixelWindow { x_offset: 3, y_offset: 2, cols: 7, rows: 8 });
        assert_eq!(result.window_b(), PixelWindow { x_offset: 0, y_offset: 0, cols: 7, rows: 8 });
        assert_eq!(result.window_a().shape(), result.window_b().shape());
    }

    #[test]
    fn test_union_envelope_is_bounding_box() {
        let a = metadata(0.0, 100.0, 10.0, 10, 10);
        let b = metadata(30.0, 80.0, 10.0, 10, 10);
        let options = OverlapOptions { mode: OverlapMode::Union, permissive: false };
        let result = overlap(&a, &b, &options).unwrap();
        assert_eq!(
            result.envelope(),
            Envelope { min_x: 0.0, max_x: 130.0, min_y: -20.0, max_y: 100.0 }
        );
        assert_eq!(result.window_a(), PixelWindow { x_offset: 0, y_offset: 0, cols: 13, rows: 12 });
    }

    #[test]
    fn test_disjoint_footprints() {
        let a = metadata(0.0, 100.0, 10.0, 5, 5);
        let b = metadata(500.0, 100.0, 10.0, 5, 5);
        assert!(matches!(
            overlap(&a, &b, &OverlapOptions::default()),
            Err(TileMaskError::NoOverlap)
        ));
    }

    #[test]
    fn test_pixel_size_mismatch() {
        let a = metadata(0.0, 100.0, 10.0, 10, 10);
        let b = metadata(0.0, 100.0, 20.0, 10, 10);
        assert!(matches!(
            overlap(&a, &b, &OverlapOptions::default()),
            Err(TileMaskError::PixelSizeMismatch(_, _))
        ));

        let permissive = OverlapOptions { mode: OverlapMode::Intersection, permissive: true };
        let result = overlap(&a, &b, &permissive).unwrap();
        assert_eq!(result.pixel_size, 10.0);
    }

    fn with_pixel(mut meta: RasterMetadata, width: f64, height: f64) -> RasterMetadata {
        meta.geotransform.0[1] = width;
        meta.geotransform.0[5] = -height;
        meta
    }

    #[test]
    fn test_pixel_height_mismatch() {
        let a = metadata(0.0, 100.0, 10.0, 10, 10);
        let b = with_pixel(metadata(0.0, 100.0, 10.0, 10, 10), 10.0, 20.0);
        assert!(matches!(
            overlap(&a, &b, &OverlapOptions::default()),
            Err(TileMaskError::PixelSizeMismatch(h_a, h_b)) if h_a == 10.0 && h_b == 20.0
        ));

        let permissive = OverlapOptions { mode: OverlapMode::Intersection, permissive: true };
        let result = overlap(&a, &b, &permissive).unwrap();
        assert_eq!(result.window_a(), PixelWindow { x_offset: 0, y_offset: 0, cols: 10, rows: 10 });
    }

    #[test]
    fn test_non_square_pixels() {
        let a = with_pixel(metadata(0.0, 100.0, 10.0, 10, 5), 10.0, 20.0);
        let b = a.clone();
        assert!(matches!(
            overlap(&a, &b, &OverlapOptions::default()),
            Err(TileMaskError::PixelSizeMismatch(w, h)) if w == 10.0 && h == 20.0
        ));

        let permissive = OverlapOptions { mode: OverlapMode::Intersection, permissive: true };
        let result = overlap(&a, &b, &permissive).unwrap();
        assert_eq!(result.pixel_size, 10.0);
        assert_eq!(
            result.envelope(),
            Envelope { min_x: 0.0, max_x: 100.0, min_y: 0.0, max_y: 100.0 }
        );
    }

    #[test]
    fn test_overlap_indices_floor() {
        let footprint = Envelope { min_x: 0.0, max_x: 100.0, min_y: 0.0, max_y: 100.0 };
        let overlap = Envelope { min_x: 15.0, max_x: 100.0, min_y: 0.0, max_y: 74.0 };
        let window = overlap_indices(&footprint, &overlap, 10.0);
        assert_eq!(window, PixelWindow { x_offset: 1, y_offset: 2, cols: 8, rows: 7 });
    }

    #[test]
    fn test_overlap_indices_tolerates_round_off() {
        let footprint = Envelope { min_x: 0.0, max_x: 0.3, min_y: 0.0, max_y: 0.3 };
        let window = overlap_indices(&footprint, &footprint, 0.1);
        assert_eq!(window, PixelWindow { x_offset: 0, y_offset: 0, cols: 3, rows: 3 });
    }
}
