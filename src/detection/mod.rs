pub mod cells;
pub mod classifier;
pub mod contours;
pub mod geometry;
pub mod grid;
pub mod markers;
pub mod morphology;
pub mod preprocessing;

pub use cells::CellNormalizer;
pub use classifier::DigitClassifier;
pub use geometry::{Homography, Rectified, rectify};
pub use grid::{GridLayout, segment_grid};
pub use markers::{MarkerDetector, MarkerFile, resolve_corners};
