//! CPU backend using rayon for parallelization.
//!
//! Host reference for the luma kernel. Same buffer contract as the wgpu
//! backend (input staged as RGBA bytes, output as one byte per pixel), with
//! rows processed in parallel instead of 2D work-groups.

use rayon::prelude::*;

use luma_core::{luma, RgbaImage, GRAY_CHANNELS, RGBA_CHANNELS};

use super::ComputeBackend;
use crate::{ImageError, ImageResult};

/// CPU buffer - data stored in RAM.
#[derive(Debug)]
pub struct CpuBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl CpuBuffer {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Host reference backend.
#[derive(Debug, Clone, Default)]
pub struct CpuBackend {
    max_buffer_bytes: Option<u64>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject allocations above `bytes`, like a device buffer limit.
    pub fn with_buffer_limit(bytes: u64) -> Self {
        Self {
            max_buffer_bytes: Some(bytes),
        }
    }

    fn allocate(&self, bytes: u64) -> ImageResult<()> {
        match self.max_buffer_bytes {
            Some(limit) if bytes > limit => Err(ImageError::Alloc(format!(
                "{bytes} bytes exceeds buffer limit {limit}"
            ))),
            _ => Ok(()),
        }
    }
}

impl ComputeBackend for CpuBackend {
    type Buffer = CpuBuffer;

    fn name(&self) -> &str {
        "cpu"
    }

    fn stage_input(&self, image: &RgbaImage) -> ImageResult<CpuBuffer> {
        self.allocate(image.size_bytes() as u64)?;
        Ok(CpuBuffer {
            data: image.data().to_vec(),
            width: image.width(),
            height: image.height(),
        })
    }

    fn stage_output(&self, width: u32, height: u32) -> ImageResult<CpuBuffer> {
        let size = width as u64 * height as u64 * GRAY_CHANNELS as u64;
        if size == 0 {
            return Err(ImageError::Alloc(format!("invalid dimensions {width}x{height}")));
        }
        self.allocate(size)?;
        Ok(CpuBuffer {
            data: vec![0; size as usize],
            width,
            height,
        })
    }

    fn dispatch(
        &self,
        input: &CpuBuffer,
        output: &mut CpuBuffer,
        width: u32,
        height: u32,
    ) -> ImageResult<()> {
        if input.dimensions() != (width, height) || output.dimensions() != (width, height) {
            return Err(ImageError::Dispatch(format!(
                "buffers sized for {:?} / {:?}, dispatch requested {width}x{height}",
                input.dimensions(),
                output.dimensions()
            )));
        }

        let w = width as usize;
        let row_bytes = w * RGBA_CHANNELS as usize;
        output
            .data
            .par_chunks_mut(w)
            .zip(input.data.par_chunks(row_bytes))
            .for_each(|(out, inp)| {
                for (dst, px) in out.iter_mut().zip(inp.chunks_exact(RGBA_CHANNELS as usize)) {
                    *dst = luma(px[0], px[1], px[2]);
                }
            });

        Ok(())
    }

    fn retrieve(&self, output: &CpuBuffer, width: u32, height: u32) -> ImageResult<Vec<u8>> {
        if output.dimensions() != (width, height) {
            return Err(ImageError::Read(format!(
                "buffer {:?} does not match requested {width}x{height}",
                output.dimensions()
            )));
        }
        Ok(output.data.clone())
    }
}
