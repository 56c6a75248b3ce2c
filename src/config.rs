//! Tunable parameters for segmentation.
//!
//! The defaults are the values the attendance sheets were tuned against.
//! Every field is optional in a JSON config file; missing fields keep their
//! default.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the four document corners are derived from detected markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerStrategy {
    /// Any four markers, ordered by position
    #[default]
    Generic4,
    /// Markers with ids 1, 2 and 3 at top-left, top-right and bottom-left;
    /// bottom-right completed as a parallelogram
    FixedId3,
}

/// How the rectified sheet is turned into an ink mask
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BinarizePolicy {
    /// Pixels brighter than `threshold` are paper. Suits clean scans.
    FixedThreshold { threshold: u8 },
    /// Otsu level of the blurred sheet, raised by `delta`. A positive delta
    /// keeps faint ink as foreground under uneven lighting.
    OtsuDelta { delta: i16 },
}

impl Default for BinarizePolicy {
    fn default() -> Self {
        BinarizePolicy::OtsuDelta {
            delta: DEFAULT_OTSU_DELTA,
        }
    }
}

pub const DEFAULT_FIXED_THRESHOLD: u8 = 200;
pub const DEFAULT_OTSU_DELTA: i16 = 40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub corner_strategy: CornerStrategy,
    pub binarize: BinarizePolicy,

    /// Grayscale values at or below this are forced to black before marker
    /// detection. `None` hands the plain grayscale image to the detector.
    pub marker_floor: Option<u8>,

    /// Number of trailing cells per row that hold the id digits
    pub id_columns: usize,
    /// Maximum y distance between consecutive boxes of one row
    pub row_cluster_px: u32,
    /// Inward crop applied to every id cell before normalization
    pub margin: u32,

    /// Line element length is the image side divided by this
    pub line_kernel_divisor: u32,
    pub min_line_kernel: u32,
    pub line_open_iterations: u32,

    /// Candidate boxes must be strictly larger than this fraction of the sheet
    pub min_box_fraction: f64,
    /// and strictly smaller than this one
    pub max_box_fraction: f64,
    pub aspect_filter: bool,
    pub min_aspect: f64,
    pub max_aspect: f64,

    /// Longer side of the digit once rescaled
    pub digit_box: u32,
    /// Side of the canonical canvas the digit is centered in
    pub canvas_size: u32,
    /// Cell crops whose gray levels span less than this hold no ink. The
    /// default of 1 only blanks perfectly flat crops.
    pub min_cell_contrast: u8,

    /// Cell count the sheet layout must produce (23 rows of 8 digits)
    pub expected_cells: usize,
    /// Return an empty segmentation instead of failing when no grid is found
    pub allow_empty_grid: bool,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            corner_strategy: CornerStrategy::default(),
            binarize: BinarizePolicy::default(),
            marker_floor: Some(100),
            id_columns: 8,
            row_cluster_px: 10,
            margin: 4,
            line_kernel_divisor: 30,
            min_line_kernel: 10,
            line_open_iterations: 2,
            min_box_fraction: 0.02,
            max_box_fraction: 0.95,
            aspect_filter: true,
            min_aspect: 0.5,
            max_aspect: 2.0,
            digit_box: 20,
            canvas_size: crate::models::CANONICAL_SIZE,
            min_cell_contrast: 1,
            expected_cells: 184,
            allow_empty_grid: false,
        }
    }
}

impl SegmentConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the pipeline cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.id_columns == 0 {
            anyhow::bail!("id_columns must be at least 1");
        }
        if self.line_kernel_divisor == 0 {
            anyhow::bail!("line_kernel_divisor must be at least 1");
        }
        if self.digit_box == 0 || self.digit_box > self.canvas_size {
            anyhow::bail!(
                "digit_box must be between 1 and canvas_size ({}), got {}",
                self.canvas_size,
                self.digit_box
            );
        }
        if self.canvas_size != crate::models::CANONICAL_SIZE {
            anyhow::bail!(
                "canvas_size is fixed at {} by the classifier input",
                crate::models::CANONICAL_SIZE
            );
        }
        if self.min_box_fraction >= self.max_box_fraction {
            anyhow::bail!("min_box_fraction must be below max_box_fraction");
        }
        if self.aspect_filter && self.min_aspect >= self.max_aspect {
            anyhow::bail!("min_aspect must be below max_aspect");
        }
        Ok(())
    }

    pub fn with_corner_strategy(mut self, strategy: CornerStrategy) -> Self {
        self.corner_strategy = strategy;
        self
    }

    pub fn with_binarize(mut self, policy: BinarizePolicy) -> Self {
        self.binarize = policy;
        self
    }

    pub fn with_aspect_filter(mut self, enabled: bool) -> Self {
        self.aspect_filter = enabled;
        self
    }
}
