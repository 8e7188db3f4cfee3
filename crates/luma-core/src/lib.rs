//! # luma-core
//!
//! Core types shared by every luma-rs crate.
//!
//! - [`RgbaImage`] - decoded 4-channel 8-bit host pixel buffer
//! - [`GrayImage`] - single-channel 8-bit host pixel buffer
//! - [`luma`] - the integer luma formula used as the numeric reference
//!
//! ## Crate Structure
//!
//! ```text
//! luma-core (this crate)
//!    ^
//!    |
//!    +-- luma-gpu (device context, kernel, staging, dispatch, orchestrator)
//!    +-- luma-io (PNG/JPEG decode and encode, directory traversal)
//!    +-- luma-cli (the `luma` binary)
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod image;
pub mod luma;

pub use error::{Error, Result};
pub use image::{byte_len, GrayImage, RgbaImage, GRAY_CHANNELS, RGBA_CHANNELS};
pub use luma::{luma, rgba_to_gray, LUMA_B, LUMA_DIVISOR, LUMA_G, LUMA_R};
