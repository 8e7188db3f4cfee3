//! Kernel program builder.
//!
//! Compiles the luma kernel once per context. Compilation runs inside a
//! validation error scope so a broken kernel comes back as
//! [`DeviceError::Build`] carrying the compiler log rather than a panic.

use tracing::{debug, info, warn};

use crate::context::GpuContext;
use crate::shaders;
use crate::{DeviceError, DeviceResult, TileSize};

/// Entry point of the luma kernel.
pub const KERNEL_ENTRY: &str = "rgb_to_gray";

/// Compiled kernel bound to one device.
pub struct KernelProgram {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    tile: TileSize,
}

impl KernelProgram {
    /// Build the built-in luma kernel.
    pub fn build(ctx: &GpuContext, tile: TileSize) -> DeviceResult<Self> {
        Self::build_source(ctx, shaders::RGB_TO_GRAY, tile)
    }

    /// Build a kernel template exposing [`KERNEL_ENTRY`].
    pub fn build_source(ctx: &GpuContext, source: &str, tile: TileSize) -> DeviceResult<Self> {
        check_tile(ctx.limits(), tile)?;

        let source = shaders::instantiate(source, tile);
        let device = &ctx.device;

        pollster::block_on(async {
            device.push_error_scope(wgpu::ErrorFilter::Validation);

            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(KERNEL_ENTRY),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            let compilation = module.get_compilation_info().await;

            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("rgb_to_gray_pipeline"),
                layout: None, // Auto layout
                module: &module,
                entry_point: Some(KERNEL_ENTRY),
                compilation_options: Default::default(),
                cache: None,
            });

            let scope = device.pop_error_scope().await;
            let log = compilation_log(&compilation);

            if let Some(err) = scope {
                let log = if log.is_empty() { err.to_string() } else { log };
                return Err(DeviceError::Build(log));
            }
            if has_errors(&compilation) {
                return Err(DeviceError::Build(log));
            }
            if !log.is_empty() {
                warn!(log = %log, "Kernel compiled with diagnostics");
            }

            let layout = pipeline.get_bind_group_layout(0);
            info!(entry = KERNEL_ENTRY, tile = %tile, "Kernel built");
            Ok(Self {
                pipeline,
                layout,
                tile,
            })
        })
    }

    /// Work-group size baked into the kernel.
    pub fn tile(&self) -> TileSize {
        self.tile
    }

    pub(crate) fn pipeline(&self) -> &wgpu::ComputePipeline {
        &self.pipeline
    }

    pub(crate) fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }
}

impl std::fmt::Debug for KernelProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelProgram")
            .field("entry", &KERNEL_ENTRY)
            .field("tile", &self.tile)
            .finish()
    }
}

/// Rejects work-group sizes the device cannot launch.
fn check_tile(limits: &wgpu::Limits, tile: TileSize) -> DeviceResult<()> {
    if tile.x == 0 || tile.y == 0 {
        return Err(DeviceError::InvalidConfig(format!("tile {tile} has a zero edge")));
    }
    if tile.x > limits.max_compute_workgroup_size_x || tile.y > limits.max_compute_workgroup_size_y {
        return Err(DeviceError::InvalidConfig(format!(
            "tile {tile} exceeds device work-group size {}x{}",
            limits.max_compute_workgroup_size_x, limits.max_compute_workgroup_size_y
        )));
    }
    if tile.invocations() > limits.max_compute_invocations_per_workgroup {
        return Err(DeviceError::InvalidConfig(format!(
            "tile {tile} needs {} invocations, device allows {}",
            tile.invocations(),
            limits.max_compute_invocations_per_workgroup
        )));
    }
    debug!(tile = %tile, "Tile fits device limits");
    Ok(())
}

fn has_errors(info: &wgpu::CompilationInfo) -> bool {
    info.messages
        .iter()
        .any(|m| m.message_type == wgpu::CompilationMessageType::Error)
}

/// Formats compiler messages as `line:col: kind: message`.
fn compilation_log(info: &wgpu::CompilationInfo) -> String {
    info.messages
        .iter()
        .map(|m| {
            let kind = match m.message_type {
                wgpu::CompilationMessageType::Error => "error",
                wgpu::CompilationMessageType::Warning => "warning",
                wgpu::CompilationMessageType::Info => "info",
            };
            match &m.location {
                Some(loc) => format!(
                    "{}:{}: {kind}: {}",
                    loc.line_number, loc.line_position, m.message
                ),
                None => format!("{kind}: {}", m.message),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_tile_against_defaults() {
        let limits = wgpu::Limits::default();
        assert!(check_tile(&limits, TileSize::square(16)).is_ok());
        assert!(check_tile(&limits, TileSize::new(256, 1)).is_ok());
        assert!(matches!(
            check_tile(&limits, TileSize::square(32)),
            Err(DeviceError::InvalidConfig(_))
        ));
        assert!(matches!(
            check_tile(&limits, TileSize::new(1, 512)),
            Err(DeviceError::InvalidConfig(_))
        ));
    }
}
