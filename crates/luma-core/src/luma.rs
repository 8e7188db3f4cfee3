//! Luma formula shared by the GPU kernel and the host reference.
//!
//! `gray = floor(0.299 R + 0.587 G + 0.114 B)` is evaluated as
//! `(299 R + 587 G + 114 B) / 1000` in integer arithmetic. The weights sum to
//! exactly 1000, so gray inputs (R = G = B) map to themselves and white stays
//! 255; a float evaluation would land on 254.99998 and truncate to 254.

use rayon::prelude::*;

use crate::{GrayImage, RgbaImage, RGBA_CHANNELS};

/// Red weight, in thousandths.
pub const LUMA_R: u32 = 299;
/// Green weight, in thousandths.
pub const LUMA_G: u32 = 587;
/// Blue weight, in thousandths.
pub const LUMA_B: u32 = 114;
/// Sum of the weights.
pub const LUMA_DIVISOR: u32 = 1000;

/// Truncated luma of one RGB triple.
///
/// ```rust
/// assert_eq!(luma_core::luma(255, 0, 0), 76);
/// assert_eq!(luma_core::luma(255, 255, 255), 255);
/// ```
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((LUMA_R * r as u32 + LUMA_G * g as u32 + LUMA_B * b as u32) / LUMA_DIVISOR) as u8
}

/// Host reference conversion of a whole image (alpha ignored).
pub fn rgba_to_gray(image: &RgbaImage) -> GrayImage {
    let data: Vec<u8> = image
        .data()
        .par_chunks_exact(RGBA_CHANNELS as usize)
        .map(|px| luma(px[0], px[1], px[2]))
        .collect();

    GrayImage {
        width: image.width(),
        height: image.height(),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primaries() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(255, 0, 0), 76);
        assert_eq!(luma(0, 255, 0), 149);
        assert_eq!(luma(0, 0, 255), 29);
    }

    #[test]
    fn test_matches_decimal_floor() {
        // Real-valued weighted sum, floored: got <= exact < got + 1.
        for r in (0..=255u8).step_by(15) {
            for g in (0..=255u8).step_by(17) {
                for b in (0..=255u8).step_by(51) {
                    let exact = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
                    let got = luma(r, g, b) as f64;
                    assert!(got <= exact + 1e-9, "({r}, {g}, {b}): {got} > {exact}");
                    assert!(exact < got + 1.0 - 1e-9, "({r}, {g}, {b}): {got} too low for {exact}");
                }
            }
        }
    }

    #[test]
    fn test_gray_is_fixed_point() {
        for v in 0..=255u8 {
            assert_eq!(luma(v, v, v), v);
        }
    }

    #[test]
    fn test_rgba_to_gray_ignores_alpha() {
        let img = RgbaImage::new(2, 1, vec![255, 0, 0, 0, 255, 0, 0, 255]).unwrap();
        let gray = rgba_to_gray(&img);
        assert_eq!(gray.data(), &[76, 76]);
    }
}
