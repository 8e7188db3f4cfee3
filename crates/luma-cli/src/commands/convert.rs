//! Directory conversion command

use crate::ConvertArgs;
use super::{load_image, save_image};
use anyhow::{Context, Result};
use luma_core::GrayImage;
use luma_gpu::{Converter, ImageResult, SourceImage, WgpuBackend};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, trace};

pub fn run(args: ConvertArgs, verbose: u8) -> Result<()> {
    trace!(input = %args.input.display(), output = %args.output.display(), "convert::run");

    let config = args
        .device
        .config()
        .tile(args.tile)
        .timeout(args.timeout_ms.map(Duration::from_millis));
    config.validate()?;

    let files = luma_io::scan_dir(&args.input)
        .with_context(|| format!("Failed to read input directory: {}", args.input.display()))?;
    info!(files = files.len(), input = %args.input.display(), "Found input images");

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory: {}", args.output.display()))?;

    let backend = WgpuBackend::new(&config).context("GPU initialization failed")?;
    if verbose > 0 {
        println!(
            "Using {} ({:?}), tile {}",
            backend.context().device_name(),
            backend.context().kind(),
            backend.program().tile()
        );
    }

    let converter = Converter::new(backend);
    let sources = files.into_iter().map(|path| {
        let image = load_image(&path);
        SourceImage::new(path, image)
    });

    let output_dir: &Path = &args.output;
    let mut sink = |input: &Path, image: &GrayImage| -> ImageResult<PathBuf> {
        let output = save_image(input, output_dir, image)?;
        if verbose > 0 {
            println!("{} -> {}", input.display(), output.display());
        }
        Ok(output)
    };

    let report = converter.run_batch(sources, &mut sink);
    println!("{report}");

    Ok(())
}
