//! Work partitioning and kernel submission.
//!
//! The global extent is always the full image. The work-group count is
//! rounded up, so trailing groups contain work-items past the right and
//! bottom edges; the kernel discards those with its bounds check. An axis
//! needing more work-groups than the device allows per dimension is split
//! into several launches, each told its pixel origin through the uniform.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use tracing::{debug, trace};
use wgpu::util::DeviceExt;

use crate::context::{capture_errors, GpuContext};
use crate::program::KernelProgram;
use crate::stager::{BufferRole, DeviceBuffer};
use crate::{ImageError, ImageResult, TileSize};

/// Dimensions uniform: [width, height, origin_x, origin_y]
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct DimsUniform {
    dims: [u32; 4],
}

/// Global and local extents for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkPartition {
    /// Work-items per dimension, equal to the image size.
    pub global: (u32, u32),
    /// Work-group size.
    pub local: (u32, u32),
}

/// One kernel launch covering a rectangle of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchChunk {
    /// Pixel coordinate of the chunk's first work-item.
    pub origin: (u32, u32),
    /// Work-groups launched per dimension.
    pub groups: (u32, u32),
}

impl WorkPartition {
    pub fn plan(width: u32, height: u32, tile: TileSize) -> Self {
        Self {
            global: (width, height),
            local: (tile.x, tile.y),
        }
    }

    /// Work-groups per dimension.
    pub fn workgroups(&self) -> (u32, u32) {
        (
            self.global.0.div_ceil(self.local.0),
            self.global.1.div_ceil(self.local.1),
        )
    }

    /// Work-items actually launched per dimension (>= `global`).
    pub fn launched(&self) -> (u64, u64) {
        let (gx, gy) = self.workgroups();
        (gx as u64 * self.local.0 as u64, gy as u64 * self.local.1 as u64)
    }

    /// Launched work-items that fall outside the image.
    pub fn guarded_items(&self) -> u64 {
        let (lx, ly) = self.launched();
        lx * ly - self.global.0 as u64 * self.global.1 as u64
    }

    /// Launches needed when at most `max_groups` work-groups fit in one
    /// dimension. Chunks tile the image row-major without overlap; every
    /// chunk but the last on each axis is a whole number of tiles.
    pub fn split(&self, max_groups: u32) -> Vec<DispatchChunk> {
        let max_groups = max_groups.max(1) as u64;
        let step = |global: u32, local: u32| {
            (max_groups * local as u64).min(global as u64).max(1) as u32
        };
        let (step_x, step_y) = (step(self.global.0, self.local.0), step(self.global.1, self.local.1));

        let mut chunks = Vec::new();
        for y in (0..self.global.1).step_by(step_y as usize) {
            let rows = step_y.min(self.global.1 - y);
            for x in (0..self.global.0).step_by(step_x as usize) {
                let cols = step_x.min(self.global.0 - x);
                chunks.push(DispatchChunk {
                    origin: (x, y),
                    groups: (cols.div_ceil(self.local.0), rows.div_ceil(self.local.1)),
                });
            }
        }
        chunks
    }
}

/// Binds arguments and submits the luma kernel.
pub struct Dispatcher {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    max_workgroups: u32,
}

impl Dispatcher {
    pub fn new(ctx: &GpuContext) -> Self {
        Self {
            device: Arc::clone(&ctx.device),
            queue: Arc::clone(&ctx.queue),
            max_workgroups: ctx.limits().max_compute_workgroups_per_dimension,
        }
    }

    /// Submits one image. Returns as soon as the work is queued; completion
    /// is observed by the following readback.
    pub fn dispatch(
        &self,
        program: &KernelProgram,
        input: &DeviceBuffer,
        output: &DeviceBuffer,
        width: u32,
        height: u32,
    ) -> ImageResult<WorkPartition> {
        if input.role() != BufferRole::Input || output.role() != BufferRole::Output {
            return Err(ImageError::Dispatch("buffer roles swapped".into()));
        }
        if input.dimensions() != (width, height) || output.dimensions() != (width, height) {
            return Err(ImageError::Dispatch(format!(
                "buffers sized for {:?} / {:?}, dispatch requested {width}x{height}",
                input.dimensions(),
                output.dimensions()
            )));
        }

        let partition = WorkPartition::plan(width, height, program.tile());
        let chunks = partition.split(self.max_workgroups);

        capture_errors(&self.device, || {
            let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("compute_encoder"),
            });
            for chunk in &chunks {
                let uniform = DimsUniform {
                    dims: [width, height, chunk.origin.0, chunk.origin.1],
                };
                let dims_buf = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("dims_uniform"),
                    contents: bytemuck::bytes_of(&uniform),
                    usage: wgpu::BufferUsages::UNIFORM,
                });

                let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("rgb_to_gray_bind_group"),
                    layout: program.layout(),
                    entries: &[
                        wgpu::BindGroupEntry { binding: 0, resource: input.buffer.as_entire_binding() },
                        wgpu::BindGroupEntry { binding: 1, resource: output.buffer.as_entire_binding() },
                        wgpu::BindGroupEntry { binding: 2, resource: dims_buf.as_entire_binding() },
                    ],
                });

                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("compute_pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(program.pipeline());
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(chunk.groups.0, chunk.groups.1, 1);
                trace!(origin = ?chunk.origin, groups = ?chunk.groups, "Chunk recorded");
            }
            self.queue.submit(std::iter::once(encoder.finish()));
        })
        .map_err(|e| ImageError::Dispatch(e.to_string()))?;

        let (gx, gy) = partition.workgroups();
        debug!(
            width,
            height,
            groups_x = gx,
            groups_y = gy,
            launches = chunks.len(),
            guarded = partition.guarded_items(),
            "Kernel dispatched"
        );
        Ok(partition)
    }
}
