//! Error types for codec and traversal operations.

use std::io;
use thiserror::Error;

/// I/O operation error.
#[derive(Debug, Error)]
pub enum IoError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Unsupported format.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decoding error.
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Encoding error.
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Unsupported bit depth or color layout.
    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(String),

    /// Decoded pixels do not form a valid image.
    #[error("invalid image: {0}")]
    InvalidImage(#[from] luma_core::Error),
}

/// Result type for I/O operations.
pub type IoResult<T> = Result<T, IoError>;
