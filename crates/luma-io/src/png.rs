//! PNG format support.
//!
//! Reads 8- and 16-bit PNGs of any color type into RGBA8 (palettes and low
//! bit depths are expanded, 16-bit samples stripped to their high byte) and
//! writes single-channel 8-bit grayscale.

use crate::{IoError, IoResult};
use luma_core::{GrayImage, RgbaImage};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Cursor, Seek, Write};
use std::path::Path;

/// Reads a PNG file from the given path.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<RgbaImage> {
    let file = File::open(path.as_ref())?;
    decode(BufReader::new(file))
}

/// Decodes a PNG held in memory.
pub fn read_from_memory(data: &[u8]) -> IoResult<RgbaImage> {
    decode(Cursor::new(data))
}

fn decode<R: BufRead + Seek>(reader: R) -> IoResult<RgbaImage> {
    let mut decoder = png::Decoder::new(reader);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e: png::DecodingError| IoError::DecodeError(e.to_string()))?;

    let buf_size = reader
        .output_buffer_size()
        .ok_or_else(|| IoError::DecodeError("cannot determine output buffer size".into()))?;
    let mut buf = vec![0u8; buf_size];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e: png::DecodingError| IoError::DecodeError(e.to_string()))?;
    buf.truncate(info.buffer_size());

    if info.bit_depth != png::BitDepth::Eight {
        return Err(IoError::UnsupportedBitDepth(format!(
            "{:?} {:?}",
            info.color_type, info.bit_depth
        )));
    }

    let channels = match info.color_type {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        png::ColorType::Indexed => {
            return Err(IoError::UnsupportedBitDepth("unexpanded palette".into()));
        }
    };

    Ok(RgbaImage::from_channels(info.width, info.height, channels, buf)?)
}

/// Writes a grayscale image to a PNG file.
pub fn write<P: AsRef<Path>>(path: P, image: &GrayImage) -> IoResult<()> {
    let file = File::create(path.as_ref())?;
    encode(BufWriter::new(file), image)
}

/// Encodes a grayscale image to PNG bytes.
pub fn write_to_memory(image: &GrayImage) -> IoResult<Vec<u8>> {
    let mut buffer = Vec::new();
    encode(&mut buffer, image)?;
    Ok(buffer)
}

fn encode<W: Write>(writer: W, image: &GrayImage) -> IoResult<()> {
    let mut encoder = png::Encoder::new(writer, image.width(), image.height());
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::default());

    let mut png_writer = encoder
        .write_header()
        .map_err(|e| IoError::EncodeError(e.to_string()))?;
    png_writer
        .write_image_data(image.data())
        .map_err(|e| IoError::EncodeError(e.to_string()))?;
    png_writer
        .finish()
        .map_err(|e| IoError::EncodeError(e.to_string()))?;

    Ok(())
}
