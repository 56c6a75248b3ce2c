//! Grid structure search on the rectified sheet.
//!
//! Each stage is a pure function so it can be exercised on its own: line
//! extraction, box filtering, row grouping and id-column selection.

use image::GrayImage;

use crate::config::SegmentConfig;
use crate::detection::contours::find_grid_contours;
use crate::detection::morphology::{self, Axis};
use crate::detection::preprocessing;
use crate::models::{BoundingBox, Row};

/// Limits a candidate cell box must satisfy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxFilter {
    pub min_fraction: f64,
    pub max_fraction: f64,
    /// `(min, max)` exclusive bounds on width / height, when enabled
    pub aspect: Option<(f64, f64)>,
}

impl BoxFilter {
    pub fn from_config(config: &SegmentConfig) -> Self {
        Self {
            min_fraction: config.min_box_fraction,
            max_fraction: config.max_box_fraction,
            aspect: config
                .aspect_filter
                .then_some((config.min_aspect, config.max_aspect)),
        }
    }

    /// Whether `bbox` can be a cell of a sheet of `width` x `height`
    pub fn accepts(&self, bbox: &BoundingBox, width: u32, height: u32) -> bool {
        let (w, h) = (bbox.width as f64, bbox.height as f64);
        let (sheet_w, sheet_h) = (width as f64, height as f64);
        let sized = w > sheet_w * self.min_fraction
            && w < sheet_w * self.max_fraction
            && h > sheet_h * self.min_fraction
            && h < sheet_h * self.max_fraction;
        if !sized {
            return false;
        }
        match self.aspect {
            Some((min, max)) => {
                let ratio = bbox.aspect_ratio();
                ratio > min && ratio < max
            }
            None => true,
        }
    }
}

/// Isolate the long horizontal and vertical rulings of the sheet.
///
/// Short strokes (handwriting, text, marker blobs) vanish under the opening;
/// what remains is the cell lattice.
pub fn extract_grid_lines(mask: &GrayImage, config: &SegmentConfig) -> GrayImage {
    let (width, height) = mask.dimensions();
    let horizontal_len =
        morphology::line_length(width, config.line_kernel_divisor, config.min_line_kernel);
    let vertical_len =
        morphology::line_length(height, config.line_kernel_divisor, config.min_line_kernel);

    let horizontal = morphology::open_lines(
        mask,
        Axis::Horizontal,
        horizontal_len,
        config.line_open_iterations,
    );
    let vertical = morphology::open_lines(
        mask,
        Axis::Vertical,
        vertical_len,
        config.line_open_iterations,
    );
    morphology::combine_max(&horizontal, &vertical)
}

/// Bounding boxes of all borders in the line mask that pass `filter`
pub fn candidate_boxes(lines: &GrayImage, filter: &BoxFilter) -> Vec<BoundingBox> {
    let (width, height) = lines.dimensions();
    find_grid_contours(lines)
        .into_iter()
        .map(|c| c.bbox)
        .filter(|b| filter.accepts(b, width, height))
        .collect()
}

/// Cluster boxes into rows of similar top edge.
///
/// Boxes are visited top to bottom; a box joins the current row when its y
/// is within `tolerance` of the row's most recently added box, otherwise it
/// starts a new row. Rows are then ordered left to right. The result does
/// not depend on the order of `boxes`.
pub fn group_rows(boxes: &[BoundingBox], tolerance: u32) -> Vec<Row> {
    let mut sorted = boxes.to_vec();
    sorted.sort_by_key(BoundingBox::reading_key);

    let rows = sorted.into_iter().fold(Vec::<Row>::new(), |mut rows, bbox| {
        let joins = rows
            .last()
            .and_then(|row| row.last())
            .is_some_and(|last| last.y.abs_diff(bbox.y) < tolerance);
        match rows.last_mut() {
            Some(row) if joins => row.push(bbox),
            _ => rows.push(vec![bbox]),
        }
        rows
    });

    rows.into_iter()
        .map(|mut row| {
            row.sort_by_key(|b| (b.x, b.y, b.width, b.height));
            row
        })
        .collect()
}

/// The trailing `columns` boxes of every row that has at least that many,
/// concatenated in reading order
pub fn select_id_cells(rows: &[Row], columns: usize) -> Vec<BoundingBox> {
    if columns == 0 {
        return Vec::new();
    }
    rows.iter()
        .filter(|row| row.len() >= columns)
        .flat_map(|row| row[row.len() - columns..].iter().copied())
        .collect()
}

/// Everything the grid search produced for one sheet
#[derive(Debug, Clone)]
pub struct GridLayout {
    pub binary: GrayImage,
    pub lines: GrayImage,
    pub candidates: Vec<BoundingBox>,
    pub rows: Vec<Row>,
    pub id_cells: Vec<BoundingBox>,
}

/// Run the whole grid search on a rectified grayscale sheet
pub fn segment_grid(gray: &GrayImage, config: &SegmentConfig) -> GridLayout {
    let binary = preprocessing::binarize(gray, config.binarize);
    let lines = extract_grid_lines(&binary, config);
    let candidates = candidate_boxes(&lines, &BoxFilter::from_config(config));
    let rows = group_rows(&candidates, config.row_cluster_px);
    let id_cells = select_id_cells(&rows, config.id_columns);

    tracing::debug!(
        candidates = candidates.len(),
        rows = rows.len(),
        id_cells = id_cells.len(),
        "grid search finished"
    );

    GridLayout {
        binary,
        lines,
        candidates,
        rows,
        id_cells,
    }
}
