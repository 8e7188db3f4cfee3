//! Compute backends for the per-image pipeline.
//!
//! [`ComputeBackend`] is the seam between the orchestrator and the device:
//! the orchestrator only sequences calls and owns the returned buffers, so
//! swapping in a host implementation or a test double needs no other change.

mod cpu_backend;
mod wgpu_backend;

pub use cpu_backend::{CpuBackend, CpuBuffer};
pub use wgpu_backend::WgpuBackend;

use luma_core::RgbaImage;

use crate::ImageResult;

/// Staging, dispatch and readback for one image at a time.
pub trait ComputeBackend {
    /// Owned device-side allocation. Dropping it releases the memory.
    type Buffer;

    /// Backend name.
    fn name(&self) -> &str;

    /// Allocate an input buffer holding the image's RGBA bytes.
    fn stage_input(&self, image: &RgbaImage) -> ImageResult<Self::Buffer>;

    /// Allocate an output buffer for `width * height` luma bytes.
    fn stage_output(&self, width: u32, height: u32) -> ImageResult<Self::Buffer>;

    /// Run the luma kernel from `input` into `output`.
    fn dispatch(
        &self,
        input: &Self::Buffer,
        output: &mut Self::Buffer,
        width: u32,
        height: u32,
    ) -> ImageResult<()>;

    /// Blocking copy of the result into a fresh host buffer.
    fn retrieve(&self, output: &Self::Buffer, width: u32, height: u32) -> ImageResult<Vec<u8>>;
}
