//! CLI command implementations

pub mod convert;
pub mod devices;

use luma_core::{GrayImage, RgbaImage};
use luma_gpu::{ImageError, ImageResult};
use std::path::{Path, PathBuf};

/// Load image from path. Any failure is a per-image decode error.
pub fn load_image(path: &Path) -> ImageResult<RgbaImage> {
    luma_io::read(path).map_err(|e| ImageError::Decode(e.to_string()))
}

/// Save image under `output_dir` with the input's file name.
pub fn save_image(input: &Path, output_dir: &Path, image: &GrayImage) -> ImageResult<PathBuf> {
    let output = luma_io::output_path(input, output_dir)
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    luma_io::write(&output, image).map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(output)
}
