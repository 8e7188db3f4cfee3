//! wgpu backend implementation.
//!
//! Owns the process-wide device context and compiled kernel; everything
//! per-image goes through [`BufferStager`] and [`Dispatcher`].

use luma_core::RgbaImage;
use tracing::info;

use super::ComputeBackend;
use crate::context::GpuContext;
use crate::dispatch::Dispatcher;
use crate::program::KernelProgram;
use crate::stager::{BufferStager, DeviceBuffer};
use crate::{ConverterConfig, DeviceResult, ImageResult};

/// GPU backend: one device, one queue, one compiled kernel.
pub struct WgpuBackend {
    // Field order is drop order: kernel and helpers before the context.
    program: KernelProgram,
    stager: BufferStager,
    dispatcher: Dispatcher,
    context: GpuContext,
}

impl WgpuBackend {
    /// Select a device, create its context and build the kernel.
    ///
    /// Every error here is fatal for the run.
    pub fn new(config: &ConverterConfig) -> DeviceResult<Self> {
        config.validate()?;
        let context = GpuContext::create(config)?;
        Self::with_context(context, config)
    }

    /// Build the kernel on an existing context.
    pub fn with_context(context: GpuContext, config: &ConverterConfig) -> DeviceResult<Self> {
        let program = KernelProgram::build(&context, config.tile)?;
        let stager = BufferStager::new(&context, config.timeout);
        let dispatcher = Dispatcher::new(&context);

        info!(
            device = context.device_name(),
            tile = %program.tile(),
            timeout = ?config.timeout,
            "wgpu backend ready"
        );
        Ok(Self {
            program,
            stager,
            dispatcher,
            context,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn program(&self) -> &KernelProgram {
        &self.program
    }
}

impl ComputeBackend for WgpuBackend {
    type Buffer = DeviceBuffer;

    fn name(&self) -> &str {
        "wgpu"
    }

    fn stage_input(&self, image: &RgbaImage) -> ImageResult<DeviceBuffer> {
        self.stager.stage_input(image)
    }

    fn stage_output(&self, width: u32, height: u32) -> ImageResult<DeviceBuffer> {
        self.stager.stage_output(width, height)
    }

    fn dispatch(
        &self,
        input: &DeviceBuffer,
        output: &mut DeviceBuffer,
        width: u32,
        height: u32,
    ) -> ImageResult<()> {
        self.dispatcher
            .dispatch(&self.program, input, output, width, height)
            .map(|_| ())
    }

    fn retrieve(&self, output: &DeviceBuffer, width: u32, height: u32) -> ImageResult<Vec<u8>> {
        self.stager.retrieve(output, width, height)
    }
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("context", &self.context)
            .field("program", &self.program)
            .finish()
    }
}
