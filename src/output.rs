use crate::error::{Result, TileMaskError};

const VALID_COMPRESSION: [&str; 4] = ["DEFLATE", "LZW", "ZSTD", "NONE"];

/// GTiff creation options for written mask and difference rasters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputOptions {
    pub compression: Option<String>,
    pub block_size: Option<usize>,
}

impl OutputOptions {
    pub fn validate(&self) -> Result<()> {
        if let Some(compression) = &self.compression {
            validate_compression(compression)?;
        }
        if let Some(block_size) = self.block_size {
            validate_block_size(block_size)?;
        }
        Ok(())
    }

    /// `KEY=VALUE` strings handed to the GTiff driver; empty means driver defaults.
    pub fn creation_options(&self) -> Vec<String> {
        let mut options = Vec::new();
        if let Some(compression) = &self.compression {
            options.push(format!("COMPRESS={}", compression));
        }
        if let Some(block_size) = self.block_size {
            options.push("TILED=YES".to_string());
            options.push(format!("BLOCKXSIZE={}", block_size));
            options.push(format!("BLOCKYSIZE={}", block_size));
        }
        if !options.is_empty() {
            options.push("BIGTIFF=IF_SAFER".to_string());
        }
        options
    }
}

pub fn validate_compression(compression: &str) -> Result<()> {
    if !VALID_COMPRESSION.contains(&compression) {
        return Err(TileMaskError::InvalidCompression(compression.to_string()));
    }
    Ok(())
}

/// GTiff block sizes must be multiples of 16.
pub fn validate_block_size(block_size: usize) -> Result<()> {
    if block_size == 0 || block_size % 16 != 0 {
        return Err(TileMaskError::InvalidBlockSize(block_size));
    }
    Ok(())
}
