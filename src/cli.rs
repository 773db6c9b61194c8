use crate::config::{MaskConfig, OverlapMode, OverlapOptions, DEFAULT_BATCH_SIZE, DEFAULT_TILE_SIZE};
use crate::error::{Result, TileMaskError};
use crate::inference::MaskJob;
use crate::output::OutputOptions;
use crate::tiling::ValueRange;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sar-tilemask")]
#[command(about = "Tile-based mask inference and change masks for dual-polarization SAR rasters")]
#[command(version)]
#[command(author = "Huimori Project")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Number of threads (default: all available)
    #[arg(short, long, value_name = "N", global = true)]
    pub threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Predict a binary mask from two polarization rasters
    Mask(MaskArgs),

    /// Change mask (0 unchanged, 1 gained, 2 lost) between two mask rasters
    Difference(DifferenceArgs),

    /// Report the footprint overlap windows of two rasters
    Overlap(OverlapArgs),
}

#[derive(clap::Args, Debug)]
pub struct OutputArgs {
    /// GTiff compression (DEFLATE, LZW, ZSTD, NONE)
    #[arg(long, value_name = "TYPE")]
    pub compress: Option<String>,

    /// Internal GTiff block size (multiple of 16)
    #[arg(long, value_name = "PIXELS")]
    pub block_size: Option<usize>,
}

impl OutputArgs {
    pub fn to_options(&self) -> OutputOptions {
        OutputOptions {
            compression: self.compress.clone(),
            block_size: self.block_size,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct MaskArgs {
    /// First polarization GeoTIFF (repeat for several scenes)
    #[arg(short = 'a', long, value_name = "FILE", required = true)]
    pub channel_a: Vec<PathBuf>,

    /// Second polarization GeoTIFF, paired with --channel-a by position
    #[arg(short = 'b', long, value_name = "FILE", required = true)]
    pub channel_b: Vec<PathBuf>,

    /// Output mask GeoTIFF, paired with --channel-a by position
    #[arg(short, long, value_name = "FILE", required = true)]
    pub output: Vec<PathBuf>,

    /// ONNX model taking (N, T, T, 2) input (requires the `onnx` feature)
    #[arg(short, long, value_name = "FILE")]
    pub model: Option<PathBuf>,

    /// Override the ONNX input tensor name
    #[arg(long, value_name = "NAME")]
    pub input_name: Option<String>,

    /// Threshold one channel instead of running a model
    #[arg(long, value_name = "VALUE", conflicts_with = "model")]
    pub threshold: Option<f32>,

    /// Channel index compared against --threshold
    #[arg(long, value_name = "INDEX", default_value_t = 0)]
    pub threshold_channel: usize,

    /// Tile edge length in pixels
    #[arg(long, value_name = "PIXELS", default_value_t = DEFAULT_TILE_SIZE)]
    pub tile_size: usize,

    /// Tiles per model call
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Crop the mask back to the input extent instead of the padded one
    #[arg(long)]
    pub crop: bool,

    /// Clamp input values to MIN,MAX before inference
    #[arg(long, value_name = "MIN,MAX", allow_hyphen_values = true)]
    pub clip: Option<ValueRange>,

    #[command(flatten)]
    pub output_options: OutputArgs,
}

impl MaskArgs {
    pub fn config(&self) -> MaskConfig {
        MaskConfig {
            tile_size: self.tile_size,
            batch_size: self.batch_size,
            crop_to_original: self.crop,
            clip: self.clip,
            output: self.output_options.to_options(),
        }
    }

    pub fn jobs(&self) -> Result<Vec<MaskJob>> {
        if self.channel_a.len() != self.channel_b.len() || self.channel_a.len() != self.output.len() {
            return Err(TileMaskError::InvalidArguments(format!(
                "got {} --channel-a, {} --channel-b and {} --output values",
                self.channel_a.len(),
                self.channel_b.len(),
                self.output.len()
            )));
        }

        Ok(self
            .channel_a
            .iter()
            .zip(&self.channel_b)
            .zip(&self.output)
            .map(|((a, b), out)| MaskJob {
                channel_a: a.clone(),
                channel_b: b.clone(),
                output: out.clone(),
            })
            .collect())
    }
}

#[derive(clap::Args, Debug)]
pub struct DifferenceArgs {
    /// Earlier binary mask GeoTIFF
    #[arg(long, value_name = "FILE")]
    pub before: PathBuf,

    /// Later binary mask GeoTIFF
    #[arg(long, value_name = "FILE")]
    pub after: PathBuf,

    /// Output difference GeoTIFF (byte)
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Allow differing pixel sizes or projections
    #[arg(long)]
    pub permissive: bool,

    #[command(flatten)]
    pub output_options: OutputArgs,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Intersection,
    Union,
}

impl From<ModeArg> for OverlapMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Intersection => OverlapMode::Intersection,
            ModeArg::Union => OverlapMode::Union,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct OverlapArgs {
    #[arg(short = 'a', long, value_name = "FILE")]
    pub raster_a: PathBuf,

    #[arg(short = 'b', long, value_name = "FILE")]
    pub raster_b: PathBuf,

    /// Combine footprints by intersection or union
    #[arg(long, value_enum, default_value_t = ModeArg::Intersection)]
    pub mode: ModeArg,

    /// Allow differing pixel sizes or projections
    #[arg(long)]
    pub permissive: bool,
}

impl OverlapArgs {
    pub fn options(&self) -> OverlapOptions {
        OverlapOptions {
            mode: self.mode.into(),
            permissive: self.permissive,
        }
    }
}
