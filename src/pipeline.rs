use image::{DynamicImage, ImageResult, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::SegmentConfig;
use crate::detection::cells::CellNormalizer;
use crate::detection::geometry::rectify;
use crate::detection::grid::segment_grid;
use crate::detection::markers::{MarkerDetector, prepare_for_detection, resolve_corners};
use crate::detection::preprocessing;
use crate::error::{Result, SegmentError, SegmentErrorKind};
use crate::models::{BoundingBox, CanonicalCell};

/// Outcome of segmenting one sheet
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Normalized id cells in reading order
    pub cells: Vec<CanonicalCell>,
    /// Box of each cell in the rectified sheet, parallel to `cells`
    pub cell_boxes: Vec<BoundingBox>,
    pub marker_count: usize,
    pub row_count: usize,
    /// Width and height of the rectified sheet
    pub rectified_size: (u32, u32),
}

impl Segmentation {
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Sheet segmentation pipeline: markers, rectification, grid search and
/// cell normalization, in that order.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    config: SegmentConfig,
    debug: Option<DebugConfig>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: SegmentConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Segment a photographed sheet into canonical id cells.
    ///
    /// Fails on the first structural problem; the error carries the marker
    /// and row counts known at that point.
    pub fn segment(
        &self,
        image: &DynamicImage,
        detector: &dyn MarkerDetector,
    ) -> Result<Segmentation> {
        let config = &self.config;
        self.save_debug("00_input.png", |p| image.save(p))?;

        let gray = preprocessing::to_grayscale(image);
        let marker_input = prepare_for_detection(&gray, config.marker_floor);
        self.save_debug("01_marker_input.png", |p| marker_input.save(p))?;

        let markers = detector
            .detect(&marker_input)
            .map_err(|e| SegmentError::new(SegmentErrorKind::Detection(e.into())))?;
        let marker_count = markers.len();
        info!(
            markers = marker_count,
            ids = ?markers.iter().map(|m| m.id).collect::<Vec<_>>(),
            "markers detected"
        );

        let corners = resolve_corners(&markers, config.corner_strategy)?;
        debug!(?corners, strategy = ?config.corner_strategy, "document corners resolved");

        let rectified =
            rectify(&image.to_rgb8(), &corners).map_err(|e| e.with_markers(marker_count))?;
        let sheet = rectified.image;
        let rectified_size = sheet.dimensions();
        debug!(width = rectified_size.0, height = rectified_size.1, "sheet rectified");
        self.save_debug("02_rectified.png", |p| sheet.save(p))?;

        let layout = segment_grid(&preprocessing::rgb_to_grayscale(&sheet), config);
        self.save_debug("03_binary.png", |p| layout.binary.save(p))?;
        self.save_debug("04_grid_lines.png", |p| layout.lines.save(p))?;

        let row_count = layout.rows.len();
        if layout.candidates.is_empty() && !config.allow_empty_grid {
            return Err(SegmentError::new(SegmentErrorKind::EmptyGrid)
                .with_markers(marker_count)
                .with_rows(row_count));
        }
        self.save_debug("05_id_cells.png", |p| {
            draw_cell_overlay(&sheet, &layout.id_cells).save(p)
        })?;

        let normalizer = CellNormalizer::from_config(config);
        let cells: Vec<CanonicalCell> = layout
            .id_cells
            .iter()
            .map(|cell| normalizer.normalize_cell(&sheet, cell))
            .collect();
        let blank = cells.iter().filter(|c| c.is_blank()).count();
        info!(
            rows = row_count,
            cells = cells.len(),
            blank,
            "id cells extracted"
        );
        self.save_cells(&cells)?;

        Ok(Segmentation {
            cells,
            cell_boxes: layout.id_cells,
            marker_count,
            row_count,
            rectified_size,
        })
    }

    fn save_debug<F>(&self, filename: &str, write: F) -> Result<()>
    where
        F: FnOnce(&Path) -> ImageResult<()>,
    {
        let Some(debug_config) = &self.debug else {
            return Ok(());
        };
        let path = debug_config.output_dir.join(filename);
        write(&path).map_err(|e| {
            SegmentError::new(SegmentErrorKind::DebugOutput(
                format!("Failed to save debug image {}: {}", path.display(), e).into(),
            ))
        })?;
        debug!(path = %path.display(), "debug image saved");
        Ok(())
    }

    fn save_cells(&self, cells: &[CanonicalCell]) -> Result<()> {
        let Some(debug_config) = &self.debug else {
            return Ok(());
        };
        let dir = debug_config.output_dir.join("06_cells");
        std::fs::create_dir_all(&dir)
            .map_err(|e| SegmentError::new(SegmentErrorKind::DebugOutput(e.into())))?;
        for (idx, cell) in cells.iter().enumerate() {
            self.save_debug(&format!("06_cells/cell_{:03}.png", idx + 1), |p| {
                cell.image().save(p)
            })?;
        }
        Ok(())
    }
}

/// Segment `image` with a pipeline built from `config`
pub fn segment(
    image: &DynamicImage,
    detector: &dyn MarkerDetector,
    config: &SegmentConfig,
) -> Result<Segmentation> {
    Pipeline::new().with_config(config.clone()).segment(image, detector)
}

/// Selected cells boxed in green, their centers joined in reading order in red
fn draw_cell_overlay(sheet: &RgbImage, cells: &[BoundingBox]) -> RgbImage {
    let mut overlay = sheet.clone();
    for cell in cells {
        if cell.width == 0 || cell.height == 0 {
            continue;
        }
        let rect = Rect::at(cell.x as i32, cell.y as i32).of_size(cell.width, cell.height);
        draw_hollow_rect_mut(&mut overlay, rect, Rgb([0u8, 255, 0]));
    }

    let centers: Vec<(f32, f32)> = cells
        .iter()
        .map(|c| ((c.x + c.width / 2) as f32, (c.y + c.height / 2) as f32))
        .collect();
    for pair in centers.windows(2) {
        draw_line_segment_mut(&mut overlay, pair[0], pair[1], Rgb([255u8, 0, 0]));
    }
    overlay
}
