use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};

use crate::models::BoundingBox;

/// A traced border of the grid-line mask with its bounding box
#[derive(Debug, Clone)]
pub struct GridContour {
    pub bbox: BoundingBox,
    /// Hole borders enclose a cell interior; outer borders wrap a line component
    pub is_hole: bool,
    pub parent: Option<usize>,
}

/// Follow every border in the mask, outer and hole alike, and box it.
///
/// Cell interiors show up as holes of the line mask, so both kinds are kept;
/// size filtering downstream decides which boxes are cells.
pub fn find_grid_contours(mask: &GrayImage) -> Vec<GridContour> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter_map(|contour| {
            let bbox = bounding_box(contour.points.iter().map(|p| (p.x, p.y)))?;
            Some(GridContour {
                bbox,
                is_hole: matches!(contour.border_type, BorderType::Hole),
                parent: contour.parent,
            })
        })
        .collect()
}

/// Inclusive pixel extent of a point set as an (x, y, width, height) box
pub fn bounding_box<I>(points: I) -> Option<BoundingBox>
where
    I: IntoIterator<Item = (i32, i32)>,
{
    let mut iter = points.into_iter();
    let (x0, y0) = iter.next()?;
    let (min_x, min_y, max_x, max_y) = iter.fold(
        (x0, y0, x0, y0),
        |(min_x, min_y, max_x, max_y), (x, y)| {
            (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
        },
    );
    if min_x < 0 || min_y < 0 {
        return None;
    }
    Some(BoundingBox::new(
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}
