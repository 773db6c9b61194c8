use clap::Parser;
use env_logger::Env;
use log::{debug, info, warn};
use std::sync::atomic::AtomicBool;

use sar_tilemask::cli::{Args, Command, DifferenceArgs, MaskArgs, OverlapArgs};
use sar_tilemask::error::{Result, TileMaskError};
use sar_tilemask::model::{ModelRunner, NamedModel, ThresholdRunner};
use sar_tilemask::{difference, inference, io, overlap};

#[cfg(feature = "onnx")]
fn load_model(path: &std::path::Path, name: String, args: &MaskArgs, threads: Option<usize>) -> Result<Box<dyn ModelRunner>> {
    debug!("Model input override: {:?}", args.input_name);
    let runner = sar_tilemask::model::OnnxRunner::from_file(path, args.input_name.as_deref(), threads.unwrap_or(1))?;
    Ok(Box::new(NamedModel::new(runner, name)))
}

#[cfg(not(feature = "onnx"))]
fn load_model(_path: &std::path::Path, name: String, _args: &MaskArgs, _threads: Option<usize>) -> Result<Box<dyn ModelRunner>> {
    Err(TileMaskError::InvalidArguments(format!(
        "model '{}' needs a build with the `onnx` feature",
        name
    )))
}

fn build_runner(args: &MaskArgs, threads: Option<usize>) -> Result<Box<dyn ModelRunner>> {
    if let Some(path) = &args.model {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        return load_model(path, name, args, threads);
    }

    match args.threshold {
        Some(threshold) => {
            info!(
                "Thresholding channel {} at {} instead of running a model",
                args.threshold_channel, threshold
            );
            let runner = ThresholdRunner {
                channel: args.threshold_channel,
                threshold,
            };
            Ok(Box::new(NamedModel::new(runner, "threshold")))
        }
        None => Err(TileMaskError::InvalidArguments(
            "either --model or --threshold is required".to_string(),
        )),
    }
}

fn run_mask(args: &MaskArgs, threads: Option<usize>) -> Result<()> {
    let config = args.config();
    config.validate()?;
    debug!("Mask config: {:?}", config);
    let jobs = args.jobs()?;
    let mut runner = build_runner(args, threads)?;

    let cancel = AtomicBool::new(false);
    let written = inference::create_masks(&mut *runner, &jobs, &config, &cancel)?;
    info!("Wrote {} mask(s)", written.len());
    Ok(())
}

fn run_difference(args: &DifferenceArgs) -> Result<()> {
    let options = sar_tilemask::OverlapOptions {
        permissive: args.permissive,
        ..Default::default()
    };
    let summary = difference::difference_from_files(
        &args.before,
        &args.after,
        &args.output,
        &options,
        &args.output_options.to_options(),
    )?;
    info!(
        "Changed pixels: {} gained, {} lost",
        summary.gained, summary.lost
    );
    Ok(())
}

fn run_overlap(args: &OverlapArgs) -> Result<()> {
    let a = io::read_metadata(&args.raster_a)?;
    let b = io::read_metadata(&args.raster_b)?;
    let result = overlap::overlap(&a, &b, &args.options())?;

    let env = result.envelope();
    info!(
        "Envelope: x=[{}, {}], y=[{}, {}]",
        env.min_x, env.max_x, env.min_y, env.max_y
    );
    for (path, window) in [(&args.raster_a, result.window_a()), (&args.raster_b, result.window_b())] {
        info!(
            "{}: x_offset={} y_offset={} cols={} rows={}",
            path.display(),
            window.x_offset,
            window.y_offset,
            window.cols,
            window.rows
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("=== SAR Tile Mask ===");

    // Set thread pool size if specified
    if let Some(n_threads) = args.threads {
        match rayon::ThreadPoolBuilder::new().num_threads(n_threads).build_global() {
            Ok(()) => info!("Using {} threads", n_threads),
            Err(e) => warn!("Failed to size thread pool ({}), using defaults", e),
        }
    } else {
        info!("Using all available threads");
    }

    match &args.command {
        Command::Mask(mask) => run_mask(mask, args.threads)?,
        Command::Difference(diff) => run_difference(diff)?,
        Command::Overlap(ov) => run_overlap(ov)?,
    }

    info!("=== Done! ===");
    Ok(())
}
