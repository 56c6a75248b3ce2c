//! Canonical cell normalization.
//!
//! A cell crop becomes a 28x28 image with a bright digit on black, the digit
//! scaled so its longer side is 20px and centered, which is the layout the
//! digit classifier was trained on.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;

use crate::config::SegmentConfig;
use crate::detection::contours::bounding_box;
use crate::detection::morphology::dilate_rect;
use crate::detection::preprocessing::{self, CELL_BLUR_SIGMA};
use crate::models::{BoundingBox, CANONICAL_SIZE, CanonicalCell};

/// Border kept around the located digit before rescaling
const DIGIT_MARGIN: u32 = 1;
/// Side of the structuring element that thickens strokes
const STROKE_DILATION: u32 = 2;

/// Parameters of the normalization, normally taken from the segment config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellNormalizer {
    pub margin: u32,
    pub digit_box: u32,
    /// Crops with a smaller gray range are blank
    pub min_contrast: u8,
}

impl Default for CellNormalizer {
    fn default() -> Self {
        Self {
            margin: 4,
            digit_box: 20,
            min_contrast: 1,
        }
    }
}

impl CellNormalizer {
    pub fn from_config(config: &SegmentConfig) -> Self {
        Self {
            margin: config.margin,
            digit_box: config.digit_box.clamp(1, CANONICAL_SIZE),
            min_contrast: config.min_cell_contrast,
        }
    }

    /// Crop `cell` out of the rectified sheet and normalize it
    pub fn normalize_cell(&self, sheet: &RgbImage, cell: &BoundingBox) -> CanonicalCell {
        match crop_with_margin(sheet, cell, self.margin) {
            Some(crop) => self.normalize(&preprocessing::rgb_to_grayscale(&crop)),
            None => CanonicalCell::blank(),
        }
    }

    /// Normalize an already cropped grayscale cell.
    ///
    /// Crops without any foreground yield the blank cell.
    pub fn normalize(&self, crop: &GrayImage) -> CanonicalCell {
        let Some(ink) = digit_mask(crop, self.min_contrast) else {
            return CanonicalCell::blank();
        };
        let Some(found) = foreground_box(&ink) else {
            return CanonicalCell::blank();
        };

        let region = expand_within(&found, DIGIT_MARGIN, ink.width(), ink.height());
        let digit = imageops::crop_imm(&ink, region.x, region.y, region.width, region.height)
            .to_image();
        let digit = dilate_rect(&digit, STROKE_DILATION, STROKE_DILATION);

        let (new_w, new_h) = fit_longer_side(region.width, region.height, self.digit_box);
        let resized = imageops::resize(&digit, new_w, new_h, FilterType::Triangle);

        let mut canvas = GrayImage::from_pixel(CANONICAL_SIZE, CANONICAL_SIZE, Luma([0u8]));
        let offset_x = (CANONICAL_SIZE - new_w) / 2;
        let offset_y = (CANONICAL_SIZE - new_h) / 2;
        imageops::replace(&mut canvas, &resized, offset_x.into(), offset_y.into());

        CanonicalCell::from_image(canvas)
    }
}

/// Cut the cell out of the sheet with an inward margin. The margin shrinks
/// for cells too small to hold it so at least one pixel remains.
pub fn crop_with_margin(sheet: &RgbImage, cell: &BoundingBox, margin: u32) -> Option<RgbImage> {
    let (sheet_w, sheet_h) = sheet.dimensions();
    let mx = margin.min(cell.width.saturating_sub(1) / 2);
    let my = margin.min(cell.height.saturating_sub(1) / 2);

    let x1 = (cell.x + mx).min(sheet_w);
    let y1 = (cell.y + my).min(sheet_h);
    let x2 = (cell.right() - mx).min(sheet_w);
    let y2 = (cell.bottom() - my).min(sheet_h);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(imageops::crop_imm(sheet, x1, y1, x2 - x1, y2 - y1).to_image())
}

/// Blurred, Otsu-thresholded and inverted crop: ink bright, paper black.
/// `None` when the crop's gray range is below `min_contrast`.
fn digit_mask(crop: &GrayImage, min_contrast: u8) -> Option<GrayImage> {
    if crop.width() == 0 || crop.height() == 0 {
        return None;
    }
    let (lo, hi) = crop
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if hi - lo < min_contrast.max(1) {
        return None;
    }
    let blurred = preprocessing::apply_blur(crop, CELL_BLUR_SIGMA);
    let level = otsu_level(&blurred);
    Some(preprocessing::ink_mask(&blurred, level))
}

fn foreground_box(mask: &GrayImage) -> Option<BoundingBox> {
    bounding_box(
        mask.enumerate_pixels()
            .filter(|(_, _, p)| p[0] > 0)
            .map(|(x, y, _)| (x as i32, y as i32)),
    )
}

fn expand_within(bbox: &BoundingBox, by: u32, width: u32, height: u32) -> BoundingBox {
    let x = bbox.x.saturating_sub(by);
    let y = bbox.y.saturating_sub(by);
    let w = (bbox.width + 2 * by).min(width - x);
    let h = (bbox.height + 2 * by).min(height - y);
    BoundingBox::new(x, y, w, h)
}

/// Scale `(w, h)` so the longer side becomes `target`, keeping at least one
/// pixel on the shorter side
pub fn fit_longer_side(w: u32, h: u32, target: u32) -> (u32, u32) {
    if w > h {
        let scaled = (h as u64 * target as u64 / w as u64) as u32;
        (target, scaled.max(1))
    } else {
        let scaled = (w as u64 * target as u64 / h.max(1) as u64) as u32;
        (scaled.max(1), target)
    }
}
