//! Device buffer staging and readback.
//!
//! Every allocation runs inside [`capture_errors`] so out-of-memory and
//! validation failures come back as [`ImageError::Alloc`] for that image
//! only. Buffers are owned by [`DeviceBuffer`] and destroyed on drop.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};
use wgpu::util::DeviceExt;

use luma_core::{RgbaImage, GRAY_CHANNELS, RGBA_CHANNELS};

use crate::context::{capture_errors, GpuContext};
use crate::{ImageError, ImageResult};

/// Sleep between device polls while waiting on a deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Direction of a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRole {
    /// RGBA pixels, written once by the host, read by the kernel.
    Input,
    /// Luma bytes, written by the kernel, read once by the host.
    Output,
}

/// Owned device allocation for one image.
pub struct DeviceBuffer {
    pub(crate) buffer: wgpu::Buffer,
    role: BufferRole,
    width: u32,
    height: u32,
    size_bytes: u64,
}

impl DeviceBuffer {
    pub fn role(&self) -> BufferRole {
        self.role
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Allocated size, including copy-alignment padding.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
        trace!(role = ?self.role, bytes = self.size_bytes, "Device buffer released");
    }
}

impl std::fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("role", &self.role)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

/// Byte size of an output buffer: one byte per pixel, padded to the copy
/// alignment so readback can copy it whole.
pub(crate) fn output_size(width: u32, height: u32) -> u64 {
    let bytes = width as u64 * height as u64 * GRAY_CHANNELS as u64;
    bytes.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT
}

/// Allocates per-image buffers and reads results back.
pub struct BufferStager {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    max_binding_bytes: u64,
    timeout: Option<Duration>,
}

impl BufferStager {
    pub fn new(ctx: &GpuContext, timeout: Option<Duration>) -> Self {
        let limits = ctx.limits();
        let max_binding_bytes =
            (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        Self {
            device: Arc::clone(&ctx.device),
            queue: Arc::clone(&ctx.queue),
            max_binding_bytes,
            timeout,
        }
    }

    fn check_size(&self, bytes: u64, width: u32, height: u32) -> ImageResult<()> {
        if bytes > self.max_binding_bytes {
            return Err(ImageError::Alloc(format!(
                "{width}x{height} needs {bytes} bytes, device binding limit is {}",
                self.max_binding_bytes
            )));
        }
        Ok(())
    }

    /// Allocates a read-only buffer of `width * height * 4` bytes holding
    /// the image's pixels.
    pub fn stage_input(&self, image: &RgbaImage) -> ImageResult<DeviceBuffer> {
        let (width, height) = (image.width(), image.height());
        let size_bytes = width as u64 * height as u64 * RGBA_CHANNELS as u64;
        self.check_size(size_bytes, width, height)?;

        let buffer = capture_errors(&self.device, || {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("input_image"),
                contents: image.data(),
                usage: wgpu::BufferUsages::STORAGE,
            })
        })
        .map_err(|e| ImageError::Alloc(e.to_string()))?;

        debug!(width, height, bytes = size_bytes, "Input staged");
        Ok(DeviceBuffer {
            buffer,
            role: BufferRole::Input,
            width,
            height,
            size_bytes,
        })
    }

    /// Allocates the kernel's output buffer. New buffers are zero-filled by
    /// the device, which the kernel's byte-OR writes rely on.
    pub fn stage_output(&self, width: u32, height: u32) -> ImageResult<DeviceBuffer> {
        if width == 0 || height == 0 {
            return Err(ImageError::Alloc(format!("invalid dimensions {width}x{height}")));
        }
        let size_bytes = output_size(width, height);
        self.check_size(size_bytes, width, height)?;

        let buffer = capture_errors(&self.device, || {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("output_image"),
                size: size_bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        })
        .map_err(|e| ImageError::Alloc(e.to_string()))?;

        debug!(width, height, bytes = size_bytes, "Output allocated");
        Ok(DeviceBuffer {
            buffer,
            role: BufferRole::Output,
            width,
            height,
            size_bytes,
        })
    }

    /// Copies `width * height` luma bytes back to the host, blocking until
    /// the device has finished every command submitted before it.
    pub fn retrieve(&self, output: &DeviceBuffer, width: u32, height: u32) -> ImageResult<Vec<u8>> {
        if output.role != BufferRole::Output || output.dimensions() != (width, height) {
            return Err(ImageError::Read(format!(
                "buffer {:?} {}x{} does not match requested {width}x{height}",
                output.role, output.width, output.height
            )));
        }
        let size = output.size_bytes;
        let pixel_count = width as usize * height as usize;

        let staging = capture_errors(&self.device, || {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("readback_buffer"),
                size,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            })
        })
        .map_err(|e| ImageError::Read(e.to_string()))?;

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
        encoder.copy_buffer_to_buffer(&output.buffer, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });

        let waited = self.wait_for_map(&rx);
        if let Err(err) = waited {
            staging.destroy();
            return Err(err);
        }

        let data = slice.get_mapped_range();
        let pixels = data[..pixel_count].to_vec();
        drop(data);
        staging.unmap();
        staging.destroy();

        trace!(width, height, "Output retrieved");
        Ok(pixels)
    }

    fn wait_for_map(
        &self,
        rx: &Receiver<Result<(), wgpu::BufferAsyncError>>,
    ) -> ImageResult<()> {
        let mapped = match self.timeout {
            None => {
                self.device.poll(wgpu::Maintain::Wait);
                rx.recv()
                    .map_err(|_| ImageError::Read("Map channel closed".into()))?
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    self.device.poll(wgpu::Maintain::Poll);
                    match rx.try_recv() {
                        Ok(result) => break result,
                        Err(TryRecvError::Empty) if Instant::now() >= deadline => {
                            return Err(ImageError::DeviceTimeout(timeout));
                        }
                        Err(TryRecvError::Empty) => std::thread::sleep(POLL_INTERVAL),
                        Err(TryRecvError::Disconnected) => {
                            return Err(ImageError::Read("Map channel closed".into()));
                        }
                    }
                }
            }
        };
        mapped.map_err(|e| ImageError::Read(format!("Map failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_size_is_aligned() {
        assert_eq!(output_size(1, 1), 4);
        assert_eq!(output_size(2, 2), 4);
        assert_eq!(output_size(17, 5), 88);
        assert_eq!(output_size(1920, 1081), 1920 * 1081);
    }
}
