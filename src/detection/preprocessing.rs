use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use imageproc::map::map_colors;

use crate::config::BinarizePolicy;

/// Sigma OpenCV derives for a 5x5 Gaussian kernel
pub const SHEET_BLUR_SIGMA: f32 = 1.1;
/// Sigma OpenCV derives for a 3x3 Gaussian kernel
pub const CELL_BLUR_SIGMA: f32 = 0.8;

pub const INK: u8 = 255;
pub const PAPER: u8 = 0;

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

pub fn rgb_to_grayscale(img: &RgbImage) -> GrayImage {
    image::imageops::grayscale(img)
}

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Pixels at or below `level` become ink (255), the rest paper (0)
pub fn ink_mask(gray: &GrayImage, level: u8) -> GrayImage {
    map_colors(gray, |Luma([v])| {
        if v > level { Luma([PAPER]) } else { Luma([INK]) }
    })
}

/// Effective Otsu-delta level: the Otsu split raised by `delta`, clamped to
/// the valid range.
pub fn otsu_delta_level(gray: &GrayImage, delta: i16) -> u8 {
    let otsu = otsu_level(gray) as i16;
    (otsu + delta).clamp(0, 255) as u8
}

/// Turn a grayscale sheet into an ink mask according to `policy`
pub fn binarize(gray: &GrayImage, policy: BinarizePolicy) -> GrayImage {
    match policy {
        BinarizePolicy::FixedThreshold { threshold } => ink_mask(gray, threshold),
        BinarizePolicy::OtsuDelta { delta } => {
            let blurred = apply_blur(gray, SHEET_BLUR_SIGMA);
            let level = otsu_delta_level(&blurred, delta);
            tracing::debug!(level, delta, "otsu-delta threshold");
            ink_mask(&blurred, level)
        }
    }
}
