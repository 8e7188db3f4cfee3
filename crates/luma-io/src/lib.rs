//! Image codecs and directory traversal for the luma converter.
//!
//! The converter only ever sees [`RgbaImage`] going in and [`GrayImage`]
//! coming out; this crate owns everything between those and the disk.
//!
//! | Format | Read                                   | Write           |
//! |--------|----------------------------------------|-----------------|
//! | PNG    | gray, gray+alpha, RGB, RGBA, palette   | 8-bit grayscale |
//! | JPEG   | gray, RGB, CMYK                        | 8-bit luma      |
//!
//! # Example
//!
//! ```rust,ignore
//! use luma_io::{read, scan_dir, write};
//!
//! for path in scan_dir("frames")? {
//!     let rgba = read(&path)?;
//!     // ...
//! }
//! ```

pub mod detect;
mod error;

#[cfg(feature = "png")]
pub mod png;

#[cfg(feature = "jpeg")]
pub mod jpeg;

pub use detect::Format;
pub use error::{IoError, IoResult};

use luma_core::{GrayImage, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Reads an image, detecting the format from its contents.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be opened
/// - The format is not supported
/// - The file is corrupted
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<RgbaImage> {
    let path = path.as_ref();
    let format = Format::detect(path)?;
    trace!(path = %path.display(), ?format, "Decoding");

    match format {
        #[cfg(feature = "png")]
        Format::Png => png::read(path),

        #[cfg(feature = "jpeg")]
        Format::Jpeg => jpeg::read(path),

        _ => Err(unsupported(path)),
    }
}

/// Writes a grayscale image, choosing the codec from the extension.
pub fn write<P: AsRef<Path>>(path: P, image: &GrayImage) -> IoResult<()> {
    let path = path.as_ref();

    match Format::from_extension(path) {
        #[cfg(feature = "png")]
        Format::Png => png::write(path, image),

        #[cfg(feature = "jpeg")]
        Format::Jpeg => jpeg::write(path, image),

        _ => Err(unsupported(path)),
    }
}

fn unsupported(path: &Path) -> IoError {
    IoError::UnsupportedFormat(
        path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("unknown")
            .to_string(),
    )
}

/// Lists the image files of `dir` in sorted order.
///
/// Only regular files directly inside `dir` are considered. Files whose
/// extension has no compiled-in codec are skipped; a file with an image
/// extension is kept even if its contents turn out to be corrupt, so the
/// decode failure is reported for it later.
pub fn scan_dir<P: AsRef<Path>>(dir: P) -> IoResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if Format::from_extension(&path).is_supported() {
            files.push(path);
        } else {
            debug!(path = %path.display(), "Skipping non-image file");
        }
    }

    files.sort();
    debug!(dir = %dir.display(), files = files.len(), "Scanned input directory");
    Ok(files)
}

/// Output path for `input` under `output_dir`, keeping the file name.
pub fn output_path(input: &Path, output_dir: &Path) -> IoResult<PathBuf> {
    let name = input
        .file_name()
        .ok_or_else(|| IoError::UnsupportedFormat(format!("{} has no file name", input.display())))?;
    Ok(output_dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_dir_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.png", "a.jpg", "b.PNG", "notes.txt", "README"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let files = scan_dir(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.png"]);
    }

    #[test]
    fn test_scan_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            scan_dir(dir.path().join("missing")),
            Err(IoError::Io(_))
        ));
    }

    #[test]
    fn test_output_path_keeps_name() {
        let out = output_path(Path::new("/in/frame_01.png"), Path::new("/out")).unwrap();
        assert_eq!(out, Path::new("/out/frame_01.png"));
        assert!(output_path(Path::new("/"), Path::new("/out")).is_err());
    }

    #[test]
    fn test_roundtrip_through_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let gray = GrayImage::new(2, 2, vec![76; 4]).unwrap();

        let png_path = dir.path().join("x.png");
        write(&png_path, &gray).unwrap();
        let back = read(&png_path).unwrap();
        assert_eq!(back.pixel(0, 0), Some([76, 76, 76, 255]));

        let bad = dir.path().join("x.bmp");
        assert!(matches!(write(&bad, &gray), Err(IoError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_read_corrupt_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"\x89PNG\r\n\x1a\ntruncated").unwrap();
        assert!(read(&path).is_err());
    }
}
