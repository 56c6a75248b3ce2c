#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from sheetids for tests
pub use sheetids::{
    BinarizePolicy, BoundingBox, CornerStrategy, DocumentCorners, Marker, MarkerFile, Pipeline,
    Point, SegmentConfig, SegmentError, SegmentErrorKind,
};
