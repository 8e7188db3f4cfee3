//! Error types for luma-core operations.
//!
//! Host pixel buffers validate their shape on construction; every failure
//! mode of that validation is listed in [`Error`].

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building host pixel buffers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Width or height is zero, or the byte size overflows `usize`.
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Reason why dimensions are invalid
        reason: String,
    },

    /// Pixel data length does not equal `width * height * channels`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use luma_core::{Error, RgbaImage};
    ///
    /// let err = RgbaImage::new(2, 2, vec![0; 15]).unwrap_err();
    /// assert_eq!(err, Error::BufferSizeMismatch { expected: 16, actual: 15 });
    /// ```
    #[error("buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch {
        /// Expected byte count
        expected: usize,
        /// Actual byte count
        actual: usize,
    },

    /// Source data has a channel count the converter cannot expand to RGBA.
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u32),
}
