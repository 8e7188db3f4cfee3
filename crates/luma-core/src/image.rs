//! Host-side pixel buffers.
//!
//! Both buffer types hold tightly packed 8-bit samples in row-major order and
//! uphold `data.len() == width * height * channels` with non-zero dimensions.
//! The check happens once, in the constructor, so downstream stages can size
//! device allocations from `width`/`height` alone.

use crate::{Error, Result};

/// Channel count of [`RgbaImage`].
pub const RGBA_CHANNELS: u32 = 4;

/// Channel count of [`GrayImage`].
pub const GRAY_CHANNELS: u32 = 1;

/// Returns `width * height * channels`, rejecting zero or overflowing sizes.
pub fn byte_len(width: u32, height: u32, channels: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions {
            width,
            height,
            reason: "width and height must be non-zero".into(),
        });
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(channels as usize))
        .ok_or_else(|| Error::InvalidDimensions {
            width,
            height,
            reason: "byte size overflows usize".into(),
        })
}

/// Decoded color image, 4 channels (R, G, B, A) per pixel.
#[derive(Clone, PartialEq, Eq)]
pub struct RgbaImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbaImage {
    /// Wraps packed RGBA bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = byte_len(width, height, RGBA_CHANNELS)?;
        if data.len() != expected {
            return Err(Error::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Builds an RGBA image from 1 (gray), 2 (gray+alpha), 3 (RGB) or
    /// 4 (RGBA) channel data. Missing alpha is filled with 255.
    pub fn from_channels(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Result<Self> {
        let expected = byte_len(width, height, channels)?;
        if data.len() != expected {
            return Err(Error::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let rgba = match channels {
            4 => data,
            3 => data
                .chunks_exact(3)
                .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                .collect(),
            2 => data
                .chunks_exact(2)
                .flat_map(|ga| [ga[0], ga[0], ga[0], ga[1]])
                .collect(),
            1 => data.iter().flat_map(|&g| [g, g, g, 255]).collect(),
            n => return Err(Error::UnsupportedChannels(n)),
        };

        Self::new(width, height, rgba)
    }

    /// Fills every pixel with the same RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let len = byte_len(width, height, RGBA_CHANNELS)?;
        let data = rgba.iter().copied().cycle().take(len).collect();
        Ok(Self { width, height, data })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed RGBA bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size in bytes (`width * height * 4`).
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * RGBA_CHANNELS as usize;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    /// Consumes the image, returning its bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }
}

impl std::fmt::Debug for RgbaImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgbaImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}

/// Single-channel 8-bit grayscale image.
#[derive(Clone, PartialEq, Eq)]
pub struct GrayImage {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) data: Vec<u8>,
}

impl GrayImage {
    /// Wraps packed luma bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = byte_len(width, height, GRAY_CHANNELS)?;
        if data.len() != expected {
            return Err(Error::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Luma bytes, one per pixel.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Value at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y as usize * self.width as usize + x as usize])
    }

    /// Consumes the image, returning its bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }
}

impl std::fmt::Debug for GrayImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrayImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
