use gdal::spatial_ref::SpatialRef;
use ndarray::{s, Array2, Array4, ArrayView4};
use sar_tilemask::difference::{GAINED, LOST, UNCHANGED};
use sar_tilemask::io;
use sar_tilemask::{
    create_mask_from_files, create_masks, difference_from_files, GeoTransform, MaskConfig, MaskJob, ModelRunner,
    OutputOptions, OverlapOptions, ThresholdRunner, TileMaskError,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

fn utm_wkt() -> String {
    SpatialRef::from_epsg(32633).unwrap().to_wkt().unwrap()
}

fn write_f32(path: &Path, data: &Array2<f32>, gt: [f64; 6]) {
    io::write_band(path, data, &GeoTransform(gt), &utm_wkt(), &OutputOptions::default()).unwrap();
}

#[test]
fn mask_pipeline_round_trip() {
    let dir = TempDir::new().unwrap();
    let vv = dir.path().join("vv.tif");
    let vh = dir.path().join("vh.tif");
    let out = dir.path().join("mask.tif");
    let gt = [400000.0, 10.0, 0.0, 5500000.0, 0.0, -10.0];

    // Left half bright, one no-data pixel in the bright half
    let mut data_vv = Array2::from_shape_fn((5, 7), |(_, c)| if c < 4 { 0.8 } else { 0.1 });
    data_vv[[2, 1]] = 0.0;
    let data_vh = Array2::from_elem((5, 7), 0.3f32);
    write_f32(&vv, &data_vv, gt);
    write_f32(&vh, &data_vh, gt);

    let config = MaskConfig {
        tile_size: 4,
        batch_size: 3,
        ..MaskConfig::default()
    };
    let mut runner = ThresholdRunner { channel: 0, threshold: 0.5 };
    create_mask_from_files(&mut runner, &vv, &vh, &out, &config).unwrap();

    let mask = io::read_raster(&out).unwrap();
    assert_eq!(mask.data.dim(), (8, 8));
    assert_eq!(mask.geotransform.0, gt);
    assert_eq!(mask.data[[0, 0]], 1.0);
    assert_eq!(mask.data[[2, 1]], 0.0);
    assert_eq!(mask.data[[0, 5]], 0.0);
    assert_eq!(mask.data[[6, 0]], 0.0);
    assert_eq!(mask.data.sum(), 19.0);

    let meta = io::read_metadata(&out).unwrap();
    assert_eq!(meta.nodata, Some(0.0));
}

#[test]
fn mask_pipeline_crops_when_asked() {
    let dir = TempDir::new().unwrap();
    let vv = dir.path().join("vv.tif");
    let vh = dir.path().join("vh.tif");
    let out = dir.path().join("mask.tif");
    let gt = [400000.0, 10.0, 0.0, 5500000.0, 0.0, -10.0];

    write_f32(&vv, &Array2::from_elem((5, 7), 1.0), gt);
    write_f32(&vh, &Array2::from_elem((5, 7), 1.0), gt);

    let config = MaskConfig {
        tile_size: 4,
        crop_to_original: true,
        ..MaskConfig::default()
    };
    let mut runner = ThresholdRunner { channel: 1, threshold: 0.5 };
    create_mask_from_files(&mut runner, &vv, &vh, &out, &config).unwrap();

    let mask = io::read_raster(&out).unwrap();
    assert_eq!(mask.data.dim(), (5, 7));
    assert!(mask.data.iter().all(|&v| v == 1.0));
}

#[test]
fn missing_channel_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let vv = dir.path().join("vv.tif");
    let out = dir.path().join("mask.tif");
    write_f32(&vv, &Array2::from_elem((4, 4), 1.0), [0.0, 1.0, 0.0, 4.0, 0.0, -1.0]);

    let mut runner = ThresholdRunner { channel: 0, threshold: 0.5 };
    let result = create_mask_from_files(
        &mut runner,
        &vv,
        &dir.path().join("vh.tif"),
        &out,
        &MaskConfig::default(),
    );
    assert!(matches!(result, Err(TileMaskError::FileNotFound(p)) if p.ends_with("vh.tif")));
    assert!(!out.exists());
}

/// Predicts all ones and raises the cancel flag during its first call.
struct CancelDuringFirstImage<'a> {
    cancel: &'a AtomicBool,
    calls: usize,
}

impl ModelRunner for CancelDuringFirstImage<'_> {
    fn predict(&mut self, batch: ArrayView4<'_, f32>) -> sar_tilemask::Result<Array4<f32>> {
        self.calls += 1;
        self.cancel.store(true, Ordering::Relaxed);
        let (n, h, w, _) = batch.dim();
        Ok(Array4::ones((n, h, w, 1)))
    }
}

#[test]
fn cancel_finishes_current_image_then_stops() {
    let dir = TempDir::new().unwrap();
    let gt = [0.0, 1.0, 0.0, 4.0, 0.0, -1.0];
    let jobs: Vec<MaskJob> = (1..=2)
        .map(|i| {
            let job = MaskJob {
                channel_a: dir.path().join(format!("vv_{}.tif", i)),
                channel_b: dir.path().join(format!("vh_{}.tif", i)),
                output: dir.path().join(format!("mask_{}.tif", i)),
            };
            write_f32(&job.channel_a, &Array2::from_elem((4, 4), 1.0), gt);
            write_f32(&job.channel_b, &Array2::from_elem((4, 4), 1.0), gt);
            job
        })
        .collect();

    let config = MaskConfig {
        tile_size: 4,
        ..MaskConfig::default()
    };
    let cancel = AtomicBool::new(false);
    let mut runner = CancelDuringFirstImage { cancel: &cancel, calls: 0 };
    let result = create_masks(&mut runner, &jobs, &config, &cancel);

    assert!(matches!(result, Err(TileMaskError::Cancelled { completed: 1, total: 2 })));
    assert_eq!(runner.calls, 1);
    assert!(jobs[0].output.exists());
    assert!(!jobs[1].output.exists());

    let mask = io::read_raster(&jobs[0].output).unwrap();
    assert!(mask.data.iter().all(|&v| v == 1.0));
}

#[test]
fn difference_over_shifted_masks() {
    let dir = TempDir::new().unwrap();
    let before = dir.path().join("before.tif");
    let after = dir.path().join("after.tif");
    let out = dir.path().join("diff.tif");

    // before spans x 0..60, after is shifted 20 east and 10 south
    let before_gt = [0.0, 10.0, 0.0, 60.0, 0.0, -10.0];
    let after_gt = [20.0, 10.0, 0.0, 50.0, 0.0, -10.0];

    let mut before_data = Array2::<f32>::zeros((6, 6));
    before_data.slice_mut(s![1.., 2..4]).fill(1.0);
    let mut after_data = Array2::<f32>::zeros((6, 6));
    after_data.slice_mut(s![..2, ..]).fill(1.0);
    write_f32(&before, &before_data, before_gt);
    write_f32(&after, &after_data, after_gt);

    let summary = difference_from_files(
        &before,
        &after,
        &out,
        &OverlapOptions::default(),
        &OutputOptions::default(),
    )
    .unwrap();

    let meta = io::read_metadata(&out).unwrap();
    assert_eq!((meta.width, meta.height), (4, 5));
    assert_eq!(meta.geotransform.0, [20.0, 10.0, 0.0, 50.0, 0.0, -10.0]);

    let diff = io::read_raster(&out).unwrap().data;
    let before_window = before_data.slice(s![1..6, 2..6]);
    let after_window = after_data.slice(s![0..5, 0..4]);
    for ((r, c), &value) in diff.indexed_iter() {
        let expected = match (before_window[[r, c]], after_window[[r, c]]) {
            (b, a) if b == 0.0 && a == 1.0 => GAINED,
            (b, a) if b == 1.0 && a == 0.0 => LOST,
            _ => UNCHANGED,
        };
        assert_eq!(value as u8, expected, "at ({}, {})", r, c);
    }
    assert_eq!(summary.gained + summary.lost + summary.unchanged, 20);
    assert_eq!(summary.lost, 6);
    assert_eq!(summary.gained, 4);
}

#[test]
fn difference_of_raster_with_itself_is_unchanged() {
    let dir = TempDir::new().unwrap();
    let mask = dir.path().join("mask.tif");
    let out = dir.path().join("diff.tif");
    let data = Array2::from_shape_fn((9, 11), |(r, c)| ((r + c) % 2) as f32);
    write_f32(&mask, &data, [100.0, 5.0, 0.0, 200.0, 0.0, -5.0]);

    let summary = difference_from_files(
        &mask,
        &mask,
        &out,
        &OverlapOptions::default(),
        &OutputOptions::default(),
    )
    .unwrap();
    assert_eq!(summary.unchanged, 99);
    assert_eq!(summary.gained + summary.lost, 0);
}
