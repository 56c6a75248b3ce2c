//! Morphology with line and small rectangular structuring elements.
//!
//! Elements are anchored at their center, so an element of length `k` covers
//! `[i - k/2, i - k/2 + k - 1]`. Pixels outside the image are ignored by
//! both erosion and dilation.

use image::{GrayImage, Luma};
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode};

/// Largest element side `Mask` accepts
const MAX_ELEMENT: u32 = 511;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Line element length for a side of `extent` pixels
pub fn line_length(extent: u32, divisor: u32, min_len: u32) -> u32 {
    (extent / divisor.max(1)).max(min_len).max(1)
}

/// Erode `iterations` times then dilate as many times with a line element.
/// Keeps only runs of set pixels along `axis` that are long enough to hold
/// the element.
pub fn open_lines(mask: &GrayImage, axis: Axis, len: u32, iterations: u32) -> GrayImage {
    let element = match axis {
        Axis::Horizontal => rect_mask(len, 1),
        Axis::Vertical => rect_mask(1, len),
    };
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = grayscale_erode(&out, &element);
    }
    for _ in 0..iterations {
        out = grayscale_dilate(&out, &element);
    }
    out
}

/// Pixel-wise maximum of two equally sized masks
pub fn combine_max(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        Luma([a.get_pixel(x, y)[0].max(b.get_pixel(x, y)[0])])
    })
}

/// Grayscale dilation with a `kw` x `kh` rectangle
pub fn dilate_rect(img: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    grayscale_dilate(img, &rect_mask(kw, kh))
}

fn rect_mask(kw: u32, kh: u32) -> Mask {
    let (kw, kh) = (kw.clamp(1, MAX_ELEMENT), kh.clamp(1, MAX_ELEMENT));
    let element = GrayImage::from_pixel(kw, kh, Luma([255u8]));
    Mask::from_image(&element, (kw / 2) as u8, (kh / 2) as u8)
}
