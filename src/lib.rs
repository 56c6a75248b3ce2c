pub mod config;
pub mod detection;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;

pub use config::{BinarizePolicy, CornerStrategy, SegmentConfig};
pub use detection::{DigitClassifier, MarkerDetector, MarkerFile};
pub use error::{Diagnostics, SegmentError, SegmentErrorKind};
pub use extract::{Extraction, IdExtractor, assemble_ids, decode_image, extract_many};
pub use models::{BoundingBox, CanonicalCell, DocumentCorners, Marker, Point, Quad, Row};
pub use pipeline::{DebugConfig, Pipeline, Segmentation, segment};
