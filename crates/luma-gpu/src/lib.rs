//! GPU offload pipeline for batch grayscale conversion.
//!
//! Converts decoded RGBA images to 8-bit luma with a wgpu compute kernel.
//! The device context and compiled kernel are created once; every image gets
//! fresh device buffers that are released when its processing ends.
//!
//! # Architecture
//!
//! ```text
//! Converter (per-image orchestrator, failure isolation)
//!     └── ComputeBackend trait
//!             ├── WgpuBackend
//!             │       ├── GpuContext     (device selection, device + queue)
//!             │       ├── KernelProgram  (rgb_to_gray pipeline)
//!             │       ├── BufferStager   (stage input/output, retrieve)
//!             │       └── Dispatcher     (work partition, submit)
//!             └── CpuBackend (rayon host reference)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use luma_gpu::{Converter, ConverterConfig, WgpuBackend};
//!
//! let backend = WgpuBackend::new(&ConverterConfig::default())?;
//! let converter = Converter::new(backend);
//! let gray = converter.process_image(&rgba)?;
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod pipeline;
pub mod program;
pub mod stager;
mod shaders;

pub use backend::{ComputeBackend, CpuBackend, CpuBuffer, WgpuBackend};
pub use config::{ConverterConfig, TileSize, DEFAULT_TILE};
pub use context::{
    choose_device, list_devices, selector_for, DeviceCandidate, DeviceKind, DeviceSelector,
    ExactIndex, GpuContext, PreferGpu,
};
pub use dispatch::{DispatchChunk, Dispatcher, WorkPartition};
pub use pipeline::{
    BatchReport, ConvertedImage, Converter, ImageSink, PipelineState, SkippedImage, SourceImage,
};
pub use program::{KernelProgram, KERNEL_ENTRY};
pub use stager::{BufferRole, BufferStager, DeviceBuffer};

use std::time::Duration;
use thiserror::Error;

/// Process-level failures. Any of these aborts the run before the first
/// image is touched.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No compute platforms found")]
    NoPlatformFound,

    #[error("No suitable compute device found ({0})")]
    NoDeviceFound(String),

    #[error("Failed to create device context: {0}")]
    ContextCreationFailed(String),

    #[error("Kernel build failed:\n{0}")]
    Build(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Per-image failures. The orchestrator records these and moves on.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Invalid image: {0}")]
    InvalidImage(#[from] luma_core::Error),

    #[error("Device allocation failed: {0}")]
    Alloc(String),

    #[error("Kernel dispatch failed: {0}")]
    Dispatch(String),

    #[error("Result readback failed: {0}")]
    Read(String),

    #[error("Device did not finish within {0:?}")]
    DeviceTimeout(Duration),

    #[error("Encode failed: {0}")]
    Encode(String),
}

impl ImageError {
    /// Short error kind for logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "DecodeError",
            Self::InvalidImage(_) => "InvalidImage",
            Self::Alloc(_) => "AllocError",
            Self::Dispatch(_) => "DispatchError",
            Self::Read(_) => "ReadError",
            Self::DeviceTimeout(_) => "DeviceTimeout",
            Self::Encode(_) => "EncodeError",
        }
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;
pub type ImageResult<T> = Result<T, ImageError>;
