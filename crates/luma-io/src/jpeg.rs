//! JPEG format support.
//!
//! Decodes baseline and progressive JPEGs (RGB, grayscale, CMYK, 16-bit
//! grayscale) into RGBA8 and encodes single-channel luma output.

use crate::{IoError, IoResult};
use luma_core::{GrayImage, RgbaImage};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Default encoder quality.
pub const DEFAULT_QUALITY: u8 = 90;

/// Reads a JPEG file from the given path.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<RgbaImage> {
    let file = File::open(path.as_ref())?;
    decode(BufReader::new(file))
}

/// Decodes a JPEG held in memory.
pub fn read_from_memory(data: &[u8]) -> IoResult<RgbaImage> {
    decode(data)
}

fn decode<R: Read>(reader: R) -> IoResult<RgbaImage> {
    let mut decoder = jpeg_decoder::Decoder::new(reader);
    let pixels = decoder
        .decode()
        .map_err(|e| IoError::DecodeError(e.to_string()))?;

    let info = decoder
        .info()
        .ok_or_else(|| IoError::DecodeError("missing JPEG info".into()))?;

    let width = info.width as u32;
    let height = info.height as u32;

    let (channels, data) = match info.pixel_format {
        jpeg_decoder::PixelFormat::RGB24 => (3, pixels),
        jpeg_decoder::PixelFormat::L8 => (1, pixels),
        jpeg_decoder::PixelFormat::CMYK32 => {
            // Approximate conversion, no color management
            let rgb: Vec<u8> = pixels
                .chunks_exact(4)
                .flat_map(|cmyk| {
                    let k = 255 - cmyk[3] as u32;
                    let channel = |v: u8| ((255 - v as u32) * k / 255) as u8;
                    [channel(cmyk[0]), channel(cmyk[1]), channel(cmyk[2])]
                })
                .collect();
            (3, rgb)
        }
        jpeg_decoder::PixelFormat::L16 => {
            // Keep the high byte
            let gray: Vec<u8> = pixels.chunks_exact(2).map(|l16| l16[0]).collect();
            (1, gray)
        }
    };

    Ok(RgbaImage::from_channels(width, height, channels, data)?)
}

/// Writes a grayscale image to a JPEG file at [`DEFAULT_QUALITY`].
pub fn write<P: AsRef<Path>>(path: P, image: &GrayImage) -> IoResult<()> {
    let bytes = write_to_memory(image, DEFAULT_QUALITY)?;
    std::fs::write(path.as_ref(), bytes)?;
    Ok(())
}

/// Encodes a grayscale image as a single-component JPEG.
pub fn write_to_memory(image: &GrayImage, quality: u8) -> IoResult<Vec<u8>> {
    use jpeg_encoder::{ColorType, Encoder};

    let (width, height) = (image.width(), image.height());
    if width > u16::MAX as u32 || height > u16::MAX as u32 {
        return Err(IoError::EncodeError(format!(
            "{width}x{height} exceeds the JPEG size limit"
        )));
    }

    let mut buffer = Vec::new();
    let encoder = Encoder::new(&mut buffer, quality);
    encoder
        .encode(image.data(), width as u16, height as u16, ColorType::Luma)
        .map_err(|e: jpeg_encoder::EncodingError| IoError::EncodeError(e.to_string()))?;

    Ok(buffer)
}
